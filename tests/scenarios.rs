// End-to-end scenarios: compile source text, run it, inspect memory and events

use cppstep::compiler::Program;
use cppstep::memory::Value;
use cppstep::runtime::{EventKind, SimulationState};
use cppstep::simulation::{Simulation, StepOutcome};

fn run(source: &str) -> Simulation {
    let mut sim = Simulation::from_source(source).expect("program should compile");
    sim.run_to_end().expect("run should not abort");
    sim
}

/// Value last stored in the object named `name`, even if it has died since
fn stored(sim: &Simulation, name: &str) -> Value {
    let (id, _) = sim
        .memory()
        .objects()
        .filter(|(_, o)| o.name == name)
        .last()
        .unwrap_or_else(|| panic!("no object named '{}'", name));
    sim.memory().stored_value(id).expect("object should have a value")
}

fn events_of(sim: &Simulation, kind: EventKind) -> Vec<String> {
    sim.events()
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn test_simple_locals() {
    let source = r#"
        int main() {
            int x = 5;
            int y = x + 2;
        }
    "#;
    let program = Program::compile_source(source);
    assert!(!program.has_errors(), "{:?}", program.errors().collect::<Vec<_>>());

    let sim = run(source);
    assert_eq!(sim.state(), SimulationState::Finished);
    let y = stored(&sim, "y");
    assert_eq!(y.as_int(), 7);
    assert!(y.valid);
    assert!(sim.events().is_empty());
}

#[test]
fn test_uninitialized_pointer_write() {
    let sim = run(r#"
        int main() {
            int* p;
            *p = 3;
        }
    "#);
    let bad = sim
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::UndefinedBehavior | EventKind::Crash));
    assert!(bad, "expected an event, got {:?}", sim.events());
}

#[test]
fn test_one_past_end_pointer() {
    let mut sim = Simulation::from_source(
        r#"
        int main() {
            int a[3];
            int* p = a + 3;
            *p;
        }
    "#,
    )
    .unwrap();

    // Forming the pointer is fine; only the dereference is reported
    let mut events_before_deref = None;
    loop {
        let top = sim.current_construct().and_then(|id| sim.program().constructs.kind(id));
        if matches!(top, Some(cppstep::compiler::ConstructKind::Dereference { .. })) && events_before_deref.is_none() {
            events_before_deref = Some(sim.events().len());
        }
        if sim.step_forward().unwrap() != StepOutcome::Stepped {
            break;
        }
    }
    assert_eq!(events_before_deref, Some(0));
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert_eq!(ub.len(), 1, "{:?}", ub);
    assert!(ub[0].contains("one past the end"));
}

#[test]
fn test_integer_division_in_double_function() {
    let source = r#"
        double avg(int a, int b) {
            return a / b;
        }

        int main() {
            double r = avg(7, 2);
            bool same = r == 3.5;
        }
    "#;
    let program = Program::compile_source(source);
    assert!(!program.has_errors());
    assert!(
        program.notes().any(|n| n.id == "conversion.integerDivision"),
        "the lost truncation should be noted"
    );

    let sim = run(source);
    assert_eq!(stored(&sim, "r").as_float(), 3.0);
    assert_eq!(stored(&sim, "same").as_int(), 0);
    // Both parameters were copy-initialized in avg's frame
    assert_eq!(stored(&sim, "a").as_int(), 7);
    assert_eq!(stored(&sim, "b").as_int(), 2);
}

#[test]
fn test_stepping_matches_running() {
    let source = r#"
        int sum(int* values, int n) {
            int total = 0;
            for (int i = 0; i < n; ++i) {
                total += values[i];
            }
            return total;
        }

        int main() {
            int data[4] = {3, 1, 4, 1};
            int unset;
            int s = sum(data, 4) + unset;
            cout << s << endl;
            return 0;
        }
    "#;

    let whole = run(source);

    let mut stepped = Simulation::from_source(source).unwrap();
    while stepped.step_forward().unwrap() == StepOutcome::Stepped {}

    assert_eq!(whole.state(), stepped.state());
    assert_eq!(whole.steps(), stepped.steps());
    assert_eq!(whole.events(), stepped.events());
    assert_eq!(whole.output().text(), stepped.output().text());
    let bytes = whole.memory().layout().total_bytes() as u64;
    assert_eq!(whole.memory().read_bytes(0, bytes), stepped.memory().read_bytes(0, bytes));
    // `unset` is reported where it is read, then `s` where its invalid
    // value is printed
    assert_eq!(
        events_of(&whole, EventKind::UndefinedBehavior),
        vec![
            "reading the uninitialized value of 'unset'".to_string(),
            "reading an invalid value of 's'".to_string(),
        ]
    );
}

#[test]
fn test_uninitialized_read_names_object() {
    let sim = run(r#"
        int main() {
            int x;
            int y = x;
        }
    "#);
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert_eq!(ub, vec!["reading the uninitialized value of 'x'".to_string()]);
    assert!(!stored(&sim, "y").valid);
}

#[test]
fn test_read_through_dangling_reference() {
    let sim = run(r#"
        int& local() {
            int x = 1;
            return x;
        }

        int main() {
            int y = local();
            return 0;
        }
    "#);
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert_eq!(ub, vec!["reading 'x', whose lifetime has ended".to_string()]);
    assert!(!stored(&sim, "y").valid);
}

#[test]
fn test_dangling_pointer_reported_once() {
    let sim = run(r#"
        int* escape() {
            int x = 1;
            return &x;
        }

        int main() {
            int* p = escape();
            int v = *p;
            return 0;
        }
    "#);
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert_eq!(ub.len(), 1, "{:?}", ub);
    assert!(ub[0].contains("whose lifetime has ended"));
}

#[test]
fn test_out_of_bounds_arithmetic() {
    let sim = run(r#"
        int main() {
            int a[2] = {1, 2};
            int* p = a + 5;
        }
    "#);
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert_eq!(ub.len(), 1);
    assert!(ub[0].contains("outside the bounds of 'a'"));
}

#[test]
fn test_pointer_difference_across_arrays() {
    let sim = run(r#"
        int main() {
            int a[2];
            int b[2];
            int same = &a[1] - &a[0];
            int d = &b[0] - &a[0];
        }
    "#);
    assert_eq!(stored(&sim, "same").as_int(), 1);
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert_eq!(ub.len(), 1);
    assert!(ub[0].contains("same array"));
}

#[test]
fn test_null_dereference_crashes() {
    let sim = run(r#"
        int main() {
            int* p = nullptr;
            cout << "before" << endl;
            int v = *p;
            cout << "after" << endl;
        }
    "#);
    assert_eq!(sim.state(), SimulationState::Halted);
    assert_eq!(sim.output().text(), "before\n");
    assert_eq!(events_of(&sim, EventKind::Crash).len(), 1);
}

#[test]
fn test_division_by_zero() {
    let sim = run(r#"
        int main() {
            int z = 0;
            int q = 4 / z;
            return 0;
        }
    "#);
    assert_eq!(sim.state(), SimulationState::Finished);
    assert_eq!(events_of(&sim, EventKind::UndefinedBehavior).len(), 1);
}

#[test]
fn test_missing_return_in_non_void_function() {
    let source = r#"
        int broken(int x) {
            if (x > 0) {
                return 1;
            }
        }

        int main() {
            int r = broken(-1);
            return 0;
        }
    "#;
    let sim = run(source);
    let ub = events_of(&sim, EventKind::UndefinedBehavior);
    assert!(ub.iter().any(|m| m.contains("control reached the end of non-void function 'broken'")));
}

#[test]
fn test_main_returns_zero_implicitly() {
    let sim = run("int main() { int x = 1; }");
    assert_eq!(sim.exit_code(), Some(0));
}
