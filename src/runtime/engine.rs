// Step-driven execution engine

use tracing::{debug, info, warn};

use super::events::{EventKind, RuntimeEvent};
use super::instance::{EvalResult, Flow, Instance, InstanceKind, Jump, Phase};
use super::streams::{InputStream, OutputBuffer};
use crate::compiler::{ConstructId, ConstructKind, Program};
use crate::config::SimulationConfig;
use crate::entities::{EntityId, EntityKind, StorageKind};
use crate::errors::{Result, SimError};
use crate::memory::{Memory, ObjectId};
use crate::parser::ast::SourceLocation;

/// Where a runtime is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Running,
    /// Waiting for input on `cin`
    BlockedOnInput,
    /// `main` returned and the leak check ran
    Finished,
    /// A fatal event stopped the program
    Halted,
    /// An internal error stopped the engine
    Aborted,
}

/// Execution state of one run of a program: memory, the instance stack,
/// the event feed and the standard streams
#[derive(Debug, Clone)]
pub struct Runtime {
    pub(crate) memory: Memory,
    pub(crate) stack: Vec<Instance>,
    events: Vec<RuntimeEvent>,
    pub(crate) output: OutputBuffer,
    pub(crate) input: InputStream,
    pub(crate) echo_input: bool,
    jump: Option<Jump>,
    steps: usize,
    pub(crate) state: SimulationState,
    pub(crate) exit_code: Option<i64>,
}

impl Runtime {
    /// Prepare a run of `program`. The program must have compiled without
    /// errors and define `main`.
    pub fn new(program: &Program, config: &SimulationConfig) -> Result<Self> {
        let count = program.errors().count();
        if count > 0 {
            return Err(SimError::NotCompiled { count });
        }
        let main = program.main().ok_or(SimError::NoMain)?;
        program.definition(main).ok_or(SimError::NoMain)?;

        Ok(Runtime {
            memory: Memory::new(config.layout, program.classes.clone()),
            stack: vec![Instance::startup()],
            events: Vec::new(),
            output: OutputBuffer::new(),
            input: InputStream::new(),
            echo_input: config.echo_input,
            jump: None,
            steps: 0,
            state: SimulationState::Running,
            exit_code: None,
        })
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// The instance stack, bottom first
    pub fn stack(&self) -> &[Instance] {
        &self.stack
    }

    pub fn events(&self) -> &[RuntimeEvent] {
        &self.events
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn input(&self) -> &InputStream {
        &self.input
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Value returned by `main`, once the program finished
    pub fn exit_code(&self) -> Option<i64> {
        self.exit_code
    }

    pub fn supply_input(&mut self, text: &str) {
        self.input.supply(text);
        if self.state == SimulationState::BlockedOnInput {
            self.state = SimulationState::Running;
        }
    }

    pub fn close_input(&mut self) {
        self.input.close();
        if self.state == SimulationState::BlockedOnInput {
            self.state = SimulationState::Running;
        }
    }

    /// Advance the top instance by one transition. Does nothing once the
    /// program has finished or halted, or while it waits for input.
    pub fn step(&mut self, program: &Program) -> Result<()> {
        match self.state {
            SimulationState::Running => {}
            SimulationState::Aborted => return Err(SimError::Aborted),
            _ => return Ok(()),
        }
        let result = self.step_inner(program);
        if let Err(err) = &result {
            warn!(error = %err, step = self.steps, "simulation aborted");
            self.state = SimulationState::Aborted;
        }
        result
    }

    fn step_inner(&mut self, program: &Program) -> Result<()> {
        self.steps += 1;
        if let Some(jump) = self.jump.take() {
            return self.unwind(program, jump);
        }
        let mut instance = self
            .stack
            .pop()
            .ok_or_else(|| SimError::internal("step with an empty instance stack"))?;
        if instance.phase == Phase::Cleanup {
            return self.cleanup(program, instance);
        }
        let flow = self.advance(program, &mut instance)?;
        self.apply(program, instance, flow)
    }

    fn apply(&mut self, program: &Program, mut instance: Instance, flow: Flow) -> Result<()> {
        match flow {
            Flow::Push(child) => {
                self.stack.push(instance);
                self.stack.push(child);
            }
            Flow::Done(result) => {
                instance.result = Some(result);
                instance.phase = Phase::Cleanup;
                self.cleanup(program, instance)?;
            }
            Flow::Wait => {
                self.stack.push(instance);
                self.steps -= 1;
                self.state = SimulationState::BlockedOnInput;
            }
            Flow::Jump(jump) => {
                instance.unwinding = Some(jump);
                instance.phase = Phase::Cleanup;
                self.cleanup(program, instance)?;
            }
            Flow::Halt => {
                self.stack.push(instance);
                self.state = SimulationState::Halted;
            }
        }
        Ok(())
    }

    fn advance(&mut self, program: &Program, instance: &mut Instance) -> Result<Flow> {
        let id = match instance.kind {
            InstanceKind::Startup => return self.advance_startup(program, instance),
            InstanceKind::Construct(id) => id,
        };
        let construct = program
            .constructs
            .get(id)
            .ok_or_else(|| SimError::internal(format!("construct {} does not exist", id.0)))?;
        match &construct.kind {
            kind if kind.is_expression() => self.advance_expression(program, instance, id),
            ConstructKind::Initializer { .. } => self.advance_initializer(program, instance, id),
            ConstructKind::FunctionDefinition { .. } => self.advance_function_body(program, instance, id),
            ConstructKind::DestructorCall { dtor } => self.advance_destructor(program, instance, *dtor),
            _ => self.advance_statement(program, instance, id),
        }
    }

    // ===== Cleanup and unwinding =====

    /// Run destructors for the objects an instance owns, one per step, then
    /// kill them and pop the instance
    fn cleanup(&mut self, program: &Program, mut instance: Instance) -> Result<()> {
        if instance.destroy_queue.is_none() {
            let mut queue = Vec::new();
            for object in instance.owned.iter().rev() {
                self.destructible_parts(program, *object, &mut queue);
            }
            queue.reverse();
            instance.destroy_queue = Some(queue);
        }

        if let Some(object) = instance.destroy_queue.as_mut().and_then(Vec::pop) {
            let destructor = self.destructor_instance(program, object, instance.frame)?;
            self.stack.push(instance);
            self.stack.push(destructor);
            return Ok(());
        }

        for object in &instance.owned {
            self.memory.kill(*object);
        }
        if let Some(jump) = instance.unwinding.take() {
            self.jump = Some(jump);
            return Ok(());
        }
        let result = instance.result.take().unwrap_or(EvalResult::Void);
        match self.stack.last_mut() {
            Some(parent) => parent.results.push(result),
            None => {
                self.state = SimulationState::Finished;
                info!(steps = self.steps, exit_code = ?self.exit_code, events = self.events.len(), "program finished");
            }
        }
        Ok(())
    }

    /// Pop instances until one handles `jump`, cleaning up each on the way
    fn unwind(&mut self, program: &Program, jump: Jump) -> Result<()> {
        let mut instance = self
            .stack
            .pop()
            .ok_or_else(|| SimError::internal("jump escaped the instance stack"))?;
        let kind = instance.construct().and_then(|id| program.constructs.kind(id));
        let handles = match (&jump, kind) {
            (Jump::Break | Jump::Continue, Some(kind)) => matches!(
                kind,
                ConstructKind::While { .. } | ConstructKind::DoWhile { .. } | ConstructKind::For { .. }
            ),
            (Jump::Return(_), Some(kind)) => matches!(kind, ConstructKind::FunctionDefinition { .. }),
            (_, None) => return Err(SimError::internal("jump reached program startup")),
        };
        if !handles {
            instance.unwinding = Some(jump);
            instance.phase = Phase::Cleanup;
            return self.cleanup(program, instance);
        }

        match jump {
            Jump::Break => self.apply(program, instance, Flow::Done(EvalResult::Void)),
            Jump::Continue => {
                self.continue_loop(program, &mut instance)?;
                self.stack.push(instance);
                Ok(())
            }
            Jump::Return(result) => {
                let result = match instance.return_object {
                    Some(object) => EvalResult::Object(object),
                    None => result,
                };
                self.apply(program, instance, Flow::Done(result))
            }
        }
    }

    /// Class objects within `object` whose destructor must run, in order
    pub(crate) fn destructible_parts(&self, program: &Program, object: ObjectId, out: &mut Vec<ObjectId>) {
        let Some(obj) = self.memory.object(object) else {
            return;
        };
        if !obj.alive {
            return;
        }
        if let Some(class) = obj.ty.class_id() {
            if program.destructor_call(class).is_some() {
                out.push(object);
                return;
            }
        }
        let members: Vec<ObjectId> = obj.subobjects.iter().rev().copied().chain(obj.base).collect();
        for member in members {
            self.destructible_parts(program, member, out);
        }
    }

    fn destructor_instance(&self, program: &Program, object: ObjectId, frame: Option<usize>) -> Result<Instance> {
        let call = self
            .memory
            .object(object)
            .and_then(|o| o.ty.class_id())
            .and_then(|class| program.destructor_call(class))
            .ok_or_else(|| SimError::internal("destructor requested for an object without one"))?;
        Ok(Instance::new(call, frame).with_dest(Some(object)))
    }

    // ===== Shared helpers =====

    /// Append an event to the feed. Returns whether it is fatal.
    pub(crate) fn raise(&mut self, kind: EventKind, message: impl Into<String>, location: SourceLocation) -> bool {
        let event = RuntimeEvent {
            kind,
            message: message.into(),
            location,
            step: self.steps,
        };
        debug!(kind = kind.label(), message = %event.message, line = location.line, "event raised");
        self.events.push(event);
        kind.is_fatal()
    }

    /// Give a temporary to the innermost full expression on the stack,
    /// which kills it when it completes
    pub(crate) fn register_temporary(&mut self, program: &Program, current: &mut Instance, object: ObjectId) {
        if owns_temporaries(program, current) {
            current.owned.push(object);
            return;
        }
        if let Some(owner) = self.stack.iter_mut().rev().find(|i| owns_temporaries(program, i)) {
            owner.owned.push(object);
        }
    }

    /// Return slot of the innermost function body being executed
    pub(crate) fn enclosing_return_object(&self, program: &Program) -> Option<ObjectId> {
        self.stack
            .iter()
            .rev()
            .find(|i| {
                matches!(
                    i.construct().and_then(|id| program.constructs.kind(id)),
                    Some(ConstructKind::FunctionDefinition { .. })
                )
            })
            .and_then(|i| i.return_object)
    }

    /// Object a variable or reference entity denotes in `frame`
    pub(crate) fn variable(&self, frame: Option<usize>, entity: EntityId, program: &Program) -> Result<ObjectId> {
        self.memory.variable(frame, entity).ok_or_else(|| {
            SimError::internal(format!(
                "no object is bound to '{}'",
                program.entities.name(entity)
            ))
        })
    }

    /// Objects of the automatic object entities among `entities` in `frame`
    pub(crate) fn automatic_objects(&self, program: &Program, frame: Option<usize>, entities: &[EntityId]) -> Vec<ObjectId> {
        let Some(frame) = frame.and_then(|f| self.memory.frame(f)) else {
            return Vec::new();
        };
        entities
            .iter()
            .filter(|e| {
                matches!(
                    program.entities.get(**e).map(|e| &e.kind),
                    Some(EntityKind::Object { storage: StorageKind::Automatic, .. })
                )
            })
            .filter_map(|e| frame.objects.get(e).copied())
            .collect()
    }
}

/// Statements own the temporaries created by the expressions they contain
fn owns_temporaries(program: &Program, instance: &Instance) -> bool {
    let Some(kind) = instance.construct().and_then(|id: ConstructId| program.constructs.kind(id)) else {
        return false;
    };
    matches!(
        kind,
        ConstructKind::ExpressionStatement { .. }
            | ConstructKind::VariableDefinition { .. }
            | ConstructKind::If { .. }
            | ConstructKind::While { .. }
            | ConstructKind::DoWhile { .. }
            | ConstructKind::For { .. }
            | ConstructKind::Return { .. }
            | ConstructKind::CtorInitializer { .. }
    )
}
