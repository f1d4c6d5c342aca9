//! Runtime instances
//!
//! An [`Instance`] is one activation of a construct on the runtime's explicit
//! instance stack. Each step advances the top instance by one transition:
//!
//! ```text
//! Pushing ──(push child)──▶ Pushing ──(own effect)──▶ Cleanup ──▶ popped
//! ```
//!
//! While pushing, an instance either pushes its next child (whose result is
//! appended to [`Instance::results`] when it is popped) or performs its own
//! effect. During cleanup it runs destructors for the objects it owns, kills
//! them and hands its result to the instance below.

use crate::compiler::ConstructId;
use crate::entities::EntityId;
use crate::memory::{ObjectId, Value};

/// What a finished instance hands to its parent
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Void,
    Value(Value),
    Object(ObjectId),
}

impl EvalResult {
    pub fn value(&self) -> Option<&Value> {
        match self {
            EvalResult::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn object(&self) -> Option<ObjectId> {
        match self {
            EvalResult::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// Non-local control transfer travelling down the instance stack
#[derive(Debug, Clone, PartialEq)]
pub enum Jump {
    Break,
    Continue,
    Return(EvalResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pushing,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    /// Static initialization, the call to `main` and the final leak check
    Startup,
    Construct(ConstructId),
}

/// State of a function call whose frame has been pushed
#[derive(Debug, Clone)]
pub struct CallState {
    pub function: EntityId,
    /// Index of the callee's memory frame
    pub frame: usize,
    pub params: Vec<EntityId>,
    /// Number of argument initializers pushed
    pub next_arg: usize,
    /// Number of argument results already bound to their parameters
    pub bound: usize,
    /// Result slot for class-typed return values
    pub return_object: Option<ObjectId>,
    pub entered: bool,
}

/// Outcome of advancing an instance by one step
#[derive(Debug)]
pub(crate) enum Flow {
    Push(Instance),
    Done(EvalResult),
    /// Blocked on input; retry once more input arrives
    Wait,
    Jump(Jump),
    /// A fatal event was raised
    Halt,
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub kind: InstanceKind,
    pub phase: Phase,
    /// Memory frame the instance resolves local variables in
    pub frame: Option<usize>,
    /// Object being initialized or destroyed
    pub dest: Option<ObjectId>,
    /// Results of finished children, in completion order
    pub results: Vec<EvalResult>,
    /// Kind-specific progress counter
    pub progress: usize,
    pub call: Option<CallState>,
    /// Objects destroyed and killed when the instance is cleaned up
    pub owned: Vec<ObjectId>,
    /// Objects waiting for a destructor call, next one last
    pub pending: Vec<ObjectId>,
    pub result: Option<EvalResult>,
    /// Return slot of a function body for class-typed return values
    pub return_object: Option<ObjectId>,
    pub(crate) destroy_queue: Option<Vec<ObjectId>>,
    pub(crate) unwinding: Option<Jump>,
}

impl Instance {
    pub fn new(construct: ConstructId, frame: Option<usize>) -> Self {
        Instance {
            kind: InstanceKind::Construct(construct),
            phase: Phase::Pushing,
            frame,
            dest: None,
            results: Vec::new(),
            progress: 0,
            call: None,
            owned: Vec::new(),
            pending: Vec::new(),
            result: None,
            return_object: None,
            destroy_queue: None,
            unwinding: None,
        }
    }

    pub fn startup() -> Self {
        Instance {
            kind: InstanceKind::Startup,
            ..Instance::new(ConstructId(0), None)
        }
    }

    pub fn with_dest(mut self, dest: Option<ObjectId>) -> Self {
        self.dest = dest;
        self
    }

    pub fn construct(&self) -> Option<ConstructId> {
        match self.kind {
            InstanceKind::Construct(id) => Some(id),
            InstanceKind::Startup => None,
        }
    }

    pub fn last_value(&self) -> Option<&Value> {
        self.results.last().and_then(EvalResult::value)
    }

    pub fn last_object(&self) -> Option<ObjectId> {
        self.results.last().and_then(EvalResult::object)
    }

    /// Push `child` as the next child, inheriting this instance's frame
    pub(crate) fn child(&self, child: ConstructId) -> Flow {
        Flow::Push(Instance::new(child, self.frame))
    }

    /// Push the next of `operands` that has not produced a result yet
    pub(crate) fn next_operand(&self, operands: &[ConstructId]) -> Option<Flow> {
        operands.get(self.results.len()).map(|next| self.child(*next))
    }
}
