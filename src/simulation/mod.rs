//! Simulation driver
//!
//! A [`Simulation`] owns a compiled [`Program`] and one [`Runtime`] executing
//! it, and exposes the stepping controls a front end drives: single steps,
//! stepping over or out of the current construct, running to the end, and
//! stepping backward.
//!
//! Stepping backward replays instead of snapshotting. The runtime is
//! deterministic, so rebuilding it and taking the same number of steps with
//! the same input reproduces the earlier state exactly. Input supplied from
//! outside is logged with the step count it arrived at, and replay feeds it
//! back at the same point.

use tracing::{debug, info, instrument};

use crate::compiler::{ConstructId, Program, SourceUnit};
use crate::config::SimulationConfig;
use crate::errors::Result;
use crate::library::LibraryRegistry;
use crate::memory::Memory;
use crate::parser::ast::SourceLocation;
use crate::runtime::{Instance, OutputBuffer, Runtime, RuntimeEvent, SimulationState};

/// What a stepping control achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Steps were taken and the program can continue
    Stepped,
    Finished,
    /// Waiting for input; supply some and step again
    Blocked,
    /// A crash or failed assertion stopped the program
    Halted,
    /// `max_steps` steps were taken without reaching the end
    StepLimit,
}

/// Input delivered from outside, with the step count it arrived at
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputEntry {
    Supply { step: usize, text: String },
    Close { step: usize },
}

impl InputEntry {
    fn step(&self) -> usize {
        match self {
            InputEntry::Supply { step, .. } | InputEntry::Close { step } => *step,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Simulation {
    program: Program,
    config: SimulationConfig,
    runtime: Runtime,
    input_log: Vec<InputEntry>,
}

impl Simulation {
    /// Start a simulation of a compiled program. Fails when the program has
    /// compile errors or no `main`.
    #[instrument(skip_all, fields(max_steps = config.max_steps))]
    pub fn new(program: Program, config: SimulationConfig) -> Result<Self> {
        let runtime = Runtime::new(&program, &config)?;
        info!(constructs = program.constructs.len(), "simulation started");
        Ok(Simulation {
            program,
            config,
            runtime,
            input_log: Vec::new(),
        })
    }

    /// Compile translation units against the standard library headers and
    /// start simulating them
    pub fn compile(sources: &[SourceUnit], config: SimulationConfig) -> Result<Self> {
        let program = Program::compile(sources, &LibraryRegistry::standard());
        Self::new(program, config)
    }

    /// Compile one source text with the default configuration
    pub fn from_source(text: &str) -> Result<Self> {
        Self::new(Program::compile_source(text), SimulationConfig::default())
    }

    // ===== Accessors =====

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn memory(&self) -> &Memory {
        self.runtime.memory()
    }

    /// The instance stack, bottom first
    pub fn stack(&self) -> &[Instance] {
        self.runtime.stack()
    }

    pub fn output(&self) -> &OutputBuffer {
        self.runtime.output()
    }

    pub fn events(&self) -> &[RuntimeEvent] {
        self.runtime.events()
    }

    pub fn steps(&self) -> usize {
        self.runtime.steps()
    }

    pub fn state(&self) -> SimulationState {
        self.runtime.state()
    }

    pub fn exit_code(&self) -> Option<i64> {
        self.runtime.exit_code()
    }

    /// Construct the top instance belongs to, if it is not program startup
    pub fn current_construct(&self) -> Option<ConstructId> {
        self.stack().last().and_then(Instance::construct)
    }

    pub fn current_location(&self) -> SourceLocation {
        self.current_construct()
            .map(|id| self.program.constructs.location(id))
            .unwrap_or_default()
    }

    // ===== Input =====

    pub fn supply_input(&mut self, text: &str) {
        self.input_log.push(InputEntry::Supply {
            step: self.runtime.steps(),
            text: text.to_string(),
        });
        self.runtime.supply_input(text);
    }

    /// Signal end of input; further reads set `eof` instead of blocking
    pub fn close_input(&mut self) {
        self.input_log.push(InputEntry::Close {
            step: self.runtime.steps(),
        });
        self.runtime.close_input();
    }

    // ===== Stepping =====

    /// Take one step
    pub fn step_forward(&mut self) -> Result<StepOutcome> {
        self.runtime.step(&self.program)?;
        Ok(self.outcome())
    }

    /// Step until the current top instance has been popped, running any
    /// calls it makes without stopping inside them
    pub fn step_over(&mut self) -> Result<StepOutcome> {
        let depth = self.stack().len();
        self.step_while(|sim| sim.stack().len() >= depth)
    }

    /// Step until the instance below the current top is popped
    pub fn step_out(&mut self) -> Result<StepOutcome> {
        let depth = self.stack().len();
        self.step_while(|sim| sim.stack().len() >= depth.saturating_sub(1))
    }

    /// Step until the program finishes, halts or blocks on input
    pub fn run_to_end(&mut self) -> Result<StepOutcome> {
        self.step_while(|_| true)
    }

    /// Go back `n` steps by replaying the run from the start. Input supplied
    /// after the target step is discarded.
    pub fn step_backward(&mut self, n: usize) -> Result<StepOutcome> {
        let target = self.runtime.steps().saturating_sub(n);
        self.input_log.retain(|entry| entry.step() <= target);
        debug!(from = self.runtime.steps(), to = target, "stepping backward");
        self.replay_to(target)?;
        Ok(self.outcome())
    }

    /// Discard all execution state and input, and start over
    pub fn reset(&mut self) -> Result<()> {
        self.runtime = Runtime::new(&self.program, &self.config)?;
        self.input_log.clear();
        info!("simulation reset");
        Ok(())
    }

    /// Take at least one step, then keep stepping while `more` holds and
    /// the program is running
    fn step_while(&mut self, more: impl Fn(&Simulation) -> bool) -> Result<StepOutcome> {
        let mut taken = 0;
        loop {
            let outcome = self.step_forward()?;
            taken += 1;
            if outcome != StepOutcome::Stepped || !more(self) {
                return Ok(outcome);
            }
            if taken >= self.config.max_steps {
                info!(steps = self.runtime.steps(), "step limit reached");
                return Ok(StepOutcome::StepLimit);
            }
        }
    }

    /// Rebuild the runtime and step it to `target`, feeding logged input
    /// back at the step it originally arrived at
    fn replay_to(&mut self, target: usize) -> Result<()> {
        self.runtime = Runtime::new(&self.program, &self.config)?;
        let mut next = 0;
        loop {
            while let Some(entry) = self.input_log.get(next).filter(|e| e.step() <= self.runtime.steps()) {
                match entry {
                    InputEntry::Supply { text, .. } => self.runtime.supply_input(text),
                    InputEntry::Close { .. } => self.runtime.close_input(),
                }
                next += 1;
            }
            if self.runtime.steps() >= target || self.runtime.state() != SimulationState::Running {
                return Ok(());
            }
            self.runtime.step(&self.program)?;
        }
    }

    fn outcome(&self) -> StepOutcome {
        match self.runtime.state() {
            SimulationState::Running | SimulationState::Aborted => StepOutcome::Stepped,
            SimulationState::BlockedOnInput => StepOutcome::Blocked,
            SimulationState::Finished => StepOutcome::Finished,
            SimulationState::Halted => StepOutcome::Halted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EventKind;

    fn simulation(source: &str) -> Simulation {
        Simulation::from_source(source).expect("program should compile")
    }

    #[test]
    fn test_run_to_end_finishes() {
        let mut sim = simulation("int main() { int x = 2; cout << x * 21 << endl; return 0; }");
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
        assert_eq!(sim.output().text(), "42\n");
        assert_eq!(sim.exit_code(), Some(0));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn test_rejects_program_with_errors() {
        assert!(Simulation::from_source("int main() { return y; }").is_err());
    }

    #[test]
    fn test_step_limit_stops_infinite_loop() {
        let program = Program::compile_source("int main() { while (true) { } }");
        let config = SimulationConfig {
            max_steps: 500,
            ..SimulationConfig::default()
        };
        let mut sim = Simulation::new(program, config).unwrap();
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::StepLimit);
        assert_eq!(sim.state(), SimulationState::Running);
    }

    #[test]
    fn test_blocks_on_input_until_supplied() {
        let mut sim = simulation("int main() { int n; cin >> n; cout << n + 1; }");
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Blocked);
        let blocked_at = sim.steps();

        sim.supply_input("41\n");
        assert_eq!(sim.state(), SimulationState::Running);
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
        assert_eq!(sim.output().text(), "42");
        assert!(sim.steps() > blocked_at);
    }

    #[test]
    fn test_step_over_skips_call_body() {
        let source = "int twice(int v) { int r = v * 2; return r; }\n\
                      int main() { int a = twice(4); return a; }";
        let mut sim = simulation(source);
        // Step until the call is the top instance
        while !matches!(
            sim.current_construct().and_then(|id| sim.program().constructs.kind(id)),
            Some(crate::compiler::ConstructKind::FunctionCall { .. })
        ) {
            assert_eq!(sim.step_forward().unwrap(), StepOutcome::Stepped);
        }
        let depth = sim.stack().len();
        let before = sim.steps();
        assert_eq!(sim.step_over().unwrap(), StepOutcome::Stepped);
        assert!(sim.stack().len() < depth);
        // Argument, frame, body and return were all covered by one call
        assert!(sim.steps() > before + 4);
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
        assert_eq!(sim.exit_code(), Some(8));
    }

    #[test]
    fn test_step_out_leaves_current_instance() {
        let mut sim = simulation("int main() { int a = 1; a = a + 1; return a; }");
        for _ in 0..6 {
            sim.step_forward().unwrap();
        }
        let depth = sim.stack().len();
        sim.step_out().unwrap();
        assert!(sim.stack().len() < depth - 1 || sim.state() == SimulationState::Finished);
    }

    #[test]
    fn test_step_backward_reproduces_earlier_state() {
        let mut sim = simulation("int main() { int a = 1; int b = a + 2; cout << b; return b; }");
        for _ in 0..10 {
            sim.step_forward().unwrap();
        }
        let stack_depth = sim.stack().len();
        let output = sim.output().text().to_string();
        for _ in 0..5 {
            sim.step_forward().unwrap();
        }

        assert_eq!(sim.step_backward(5).unwrap(), StepOutcome::Stepped);
        assert_eq!(sim.steps(), 10);
        assert_eq!(sim.stack().len(), stack_depth);
        assert_eq!(sim.output().text(), output);
    }

    #[test]
    fn test_step_backward_replays_input() {
        let mut sim = simulation("int main() { int n; cin >> n; cout << n; return 0; }");
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Blocked);
        sim.supply_input("7");
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
        let total = sim.steps();

        sim.step_backward(1).unwrap();
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Finished);
        assert_eq!(sim.steps(), total);
        assert_eq!(sim.output().text(), "7");
    }

    #[test]
    fn test_reset_starts_over() {
        let mut sim = simulation("int main() { cout << 'x'; return 3; }");
        sim.run_to_end().unwrap();
        sim.reset().unwrap();
        assert_eq!(sim.steps(), 0);
        assert_eq!(sim.output().text(), "");
        assert_eq!(sim.state(), SimulationState::Running);
    }

    #[test]
    fn test_crash_halts() {
        let mut sim = simulation("int main() { int* p = nullptr; *p = 1; return 0; }");
        assert_eq!(sim.run_to_end().unwrap(), StepOutcome::Halted);
        assert!(sim.events().iter().any(|e| e.kind == EventKind::Crash));
        assert_eq!(sim.step_forward().unwrap(), StepOutcome::Halted);
    }
}
