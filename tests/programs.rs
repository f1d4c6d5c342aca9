// Integration tests for classes, references, streams, the heap and linking

use cppstep::compiler::{Program, SourceUnit};
use cppstep::config::SimulationConfig;
use cppstep::library::LibraryRegistry;
use cppstep::runtime::{EventKind, SimulationState};
use cppstep::simulation::{Simulation, StepOutcome};

fn run(source: &str) -> Simulation {
    let mut sim = Simulation::from_source(source).expect("program should compile");
    sim.run_to_end().expect("run should not abort");
    sim
}

fn count(sim: &Simulation, kind: EventKind) -> usize {
    sim.events().iter().filter(|e| e.kind == kind).count()
}

// ===== Functions and references =====

#[test]
fn test_function_call() {
    let sim = run(r#"
        int add(int a, int b) {
            return a + b;
        }

        int main() {
            int result = add(3, 4);
            return result;
        }
    "#);
    assert_eq!(sim.exit_code(), Some(7));
}

#[test]
fn test_reference_parameter() {
    let sim = run(r#"
        void bump(int& r) {
            r = r + 1;
        }

        int main() {
            int v = 1;
            bump(v);
            bump(v);
            return v;
        }
    "#);
    assert_eq!(sim.exit_code(), Some(3));
}

#[test]
fn test_recursion() {
    let sim = run(r#"
        int fact(int n) {
            if (n <= 1) {
                return 1;
            }
            return n * fact(n - 1);
        }

        int main() {
            cout << fact(5) << endl;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "120\n");
}

#[test]
fn test_loops_break_continue() {
    let sim = run(r#"
        int main() {
            int sum = 0;
            for (int i = 0; i < 10; i++) {
                if (i % 2 == 0) {
                    continue;
                }
                if (i > 7) {
                    break;
                }
                sum += i;
            }
            int n = 0;
            while (n < 3) {
                n++;
            }
            do {
                n--;
            } while (n > 1);
            cout << sum << " " << n << endl;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "16 1\n");
}

#[test]
fn test_do_while_runs_body_first() {
    let sim = run(r#"
        int main() {
            int i = 0;
            int total = 0;
            do {
                i++;
                if (i == 2) {
                    continue;
                }
                if (i > 4) {
                    break;
                }
                total += i;
            } while (i < 10);
            int once = 0;
            do {
                once++;
            } while (false);
            return total + once;
        }
    "#);
    assert_eq!(sim.exit_code(), Some(9));
}

#[test]
fn test_globals_initialized_before_main() {
    let sim = run(r#"
        int base = 40;
        int offset = base / 20;

        int main() {
            return base + offset;
        }
    "#);
    assert_eq!(sim.exit_code(), Some(42));
}

// ===== Classes =====

#[test]
fn test_constructors_and_destructors_run_in_order() {
    let sim = run(r#"
        class Tracer {
        public:
            int id;
            Tracer(int i) : id(i) {
                cout << "make " << id << endl;
            }
            ~Tracer() {
                cout << "drop " << id << endl;
            }
        };

        int main() {
            Tracer a(1);
            {
                Tracer b(2);
            }
            Tracer c(3);
            return 0;
        }
    "#);
    assert_eq!(
        sim.output().lines(),
        vec!["make 1", "make 2", "drop 2", "make 3", "drop 3", "drop 1"]
    );
}

#[test]
fn test_base_class_and_member_functions() {
    let sim = run(r#"
        class Shape {
        public:
            int sides;
            Shape(int s) : sides(s) {}
            int count() const {
                return sides;
            }
        };

        class Square : public Shape {
        public:
            int width;
            Square(int w) : Shape(4), width(w) {}
            int area() {
                return width * width;
            }
        };

        int main() {
            Square sq(3);
            return sq.area() + sq.count();
        }
    "#);
    assert_eq!(sim.exit_code(), Some(13));
}

#[test]
fn test_class_copy_and_assignment() {
    let sim = run(r#"
        struct Point {
            int x;
            int y;
        };

        int main() {
            Point a = {1, 2};
            Point b = a;
            b.x = 10;
            Point c = {0, 0};
            c = b;
            cout << a.x << " " << c.x << " " << c.y << endl;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "1 10 2\n");
}

#[test]
fn test_returned_object_temporary() {
    let sim = run(r#"
        struct Pair {
            int first;
            int second;
        };

        Pair make(int a, int b) {
            Pair p = {a, b};
            return p;
        }

        int main() {
            int total = make(2, 5).second + make(1, 1).first;
            return total;
        }
    "#);
    assert_eq!(sim.exit_code(), Some(6));
    assert!(sim.events().is_empty());
}

// ===== Streams =====

#[test]
fn test_output_formats() {
    let sim = run(r#"
        int main() {
            const char* s = "hi";
            char buf[] = "yo";
            bool flag = true;
            double d = 2.5;
            cout << s << " " << buf << " " << flag << " " << d << " " << 'c' << endl;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "hi yo 1 2.5 c\n");
}

#[test]
fn test_input_reads_values() {
    let mut sim = Simulation::from_source(
        r#"
        int main() {
            int a;
            double b;
            char c;
            cin >> a >> b >> c;
            cout << a + 1 << " " << b * 2 << " " << c << endl;
            return 0;
        }
    "#,
    )
    .unwrap();
    assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Blocked);
    assert_eq!(sim.state(), SimulationState::BlockedOnInput);
    sim.supply_input("41 1.25\n");
    assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Blocked);
    sim.supply_input("  z");
    assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
    assert_eq!(sim.output().text(), "42 2.5 z\n");
}

#[test]
fn test_malformed_input_sets_fail() {
    let mut sim = Simulation::from_source(
        r#"
        int main() {
            int n = 5;
            cin >> n;
            cout << n << endl;
            return 0;
        }
    "#,
    )
    .unwrap();
    sim.supply_input("abc");
    assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
    assert_eq!(sim.output().text(), "0\n");
    assert!(sim.runtime().input().state().fail);
}

#[test]
fn test_closed_input_does_not_block() {
    let mut sim = Simulation::from_source("int main() { int n = 3; cin >> n; cout << n; return 0; }").unwrap();
    sim.close_input();
    assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
    assert!(sim.runtime().input().state().eof);
}

#[test]
fn test_echo_input() {
    let program = Program::compile_source("int main() { int n; cin >> n; cout << '|' << n; return 0; }");
    let config = SimulationConfig {
        echo_input: true,
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(program, config).unwrap();
    sim.supply_input("12\n");
    sim.run_to_end().unwrap();
    assert_eq!(sim.output().text(), "12|12");
}

// ===== Heap =====

#[test]
fn test_new_and_delete() {
    let sim = run(r#"
        int main() {
            int* p = new int(5);
            int* arr = new int[3];
            arr[0] = *p;
            arr[2] = arr[0] * 2;
            cout << arr[2] << endl;
            delete p;
            delete[] arr;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "10\n");
    assert!(sim.events().is_empty(), "{:?}", sim.events());
}

#[test]
fn test_memory_leak_reported() {
    let sim = run(r#"
        int main() {
            int* kept = new int(1);
            int* freed = new int(2);
            delete freed;
            return 0;
        }
    "#);
    assert_eq!(count(&sim, EventKind::MemoryLeak), 1);
    let leak = sim.events().iter().find(|e| e.kind == EventKind::MemoryLeak).unwrap();
    assert!(leak.message.contains("4 bytes of type 'int'"));
}

#[test]
fn test_double_delete() {
    let sim = run(r#"
        int main() {
            int* p = new int;
            delete p;
            delete p;
            return 0;
        }
    "#);
    let ub: Vec<_> = sim.events().iter().filter(|e| e.kind == EventKind::UndefinedBehavior).collect();
    assert!(ub.iter().any(|e| e.message.contains("double delete")), "{:?}", ub);
    assert_eq!(sim.state(), SimulationState::Finished);
}

#[test]
fn test_delete_of_stack_object() {
    let sim = run(r#"
        int main() {
            int x = 1;
            int* p = &x;
            delete p;
            return 0;
        }
    "#);
    assert!(sim
        .events()
        .iter()
        .any(|e| e.kind == EventKind::UndefinedBehavior && e.message.contains("not allocated with new")));
}

#[test]
fn test_delete_runs_destructor() {
    let sim = run(r#"
        class Node {
        public:
            int value;
            Node(int v) : value(v) {}
            ~Node() {
                cout << "bye " << value << endl;
            }
        };

        int main() {
            Node* n = new Node(9);
            cout << n->value << endl;
            delete n;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "9\nbye 9\n");
    assert_eq!(count(&sim, EventKind::MemoryLeak), 0);
}

// ===== Library and linking =====

#[test]
fn test_assert_failure_halts() {
    let sim = run(r#"
        #include <cassert>

        int main() {
            int x = 1;
            assert(x == 2);
            cout << "after" << endl;
            return 0;
        }
    "#);
    assert_eq!(sim.state(), SimulationState::Halted);
    assert_eq!(count(&sim, EventKind::AssertionFailure), 1);
    assert_eq!(sim.output().text(), "");
}

#[test]
fn test_cmath_functions() {
    let sim = run(r#"
        #include <cmath>
        #include <cstdlib>

        int main() {
            double r = sqrt(16.0) + pow(2.0, 3.0) + fabs(-0.5);
            cout << r << " " << abs(-7) << endl;
            return 0;
        }
    "#);
    assert_eq!(sim.output().text(), "12.5 7\n");
}

#[test]
fn test_multiple_translation_units() {
    let sources = [
        SourceUnit::new("square.cpp", "int square(int x) { return x * x; }"),
        SourceUnit::new("main.cpp", "int square(int x);\nint main() { return square(6); }"),
    ];
    let mut sim = Simulation::compile(&sources, SimulationConfig::default()).unwrap();
    assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
    assert_eq!(sim.exit_code(), Some(36));
}

#[test]
fn test_undefined_function_is_link_error() {
    let program = Program::compile(
        &[SourceUnit::new("main.cpp", "int helper(int x);\nint main() { return helper(1); }")],
        &LibraryRegistry::standard(),
    );
    assert!(program.errors().any(|n| n.message.contains("undefined reference to 'helper'")));
    assert!(Simulation::new(program, SimulationConfig::default()).is_err());
}

#[test]
fn test_duplicate_definition_across_units() {
    let program = Program::compile(
        &[
            SourceUnit::new("a.cpp", "int twice(int x) { return 2 * x; }"),
            SourceUnit::new("b.cpp", "int twice(int x) { return x + x; }\nint main() { return twice(1); }"),
        ],
        &LibraryRegistry::standard(),
    );
    let duplicate = program.errors().find(|n| n.id == "link.duplicate").expect("linker note");
    assert_eq!(duplicate.message, "multiple definition of 'twice'");
    assert!(!program.errors().any(|n| n.id == "decl.redefinition"));

    // Within one unit the same mistake is an ordinary redefinition
    let program = Program::compile_source("int twice(int x) { return 2 * x; }
int twice(int x) { return x + x; }
int main() { return 0; }");
    assert!(program.errors().any(|n| n.id == "decl.redefinition"));
    assert!(!program.errors().any(|n| n.id == "link.duplicate"));
}

#[test]
fn test_compile_errors_are_collected() {
    let program = Program::compile_source(
        r#"
        int main() {
            int x = undefined_name;
            int y = x + missing;
            return "text";
        }
    "#,
    );
    assert!(program.errors().count() >= 3);
}
