//! Step-driven runtime
//!
//! The runtime executes a compiled [`Program`](crate::compiler::Program) one
//! small transition at a time. Instead of recursing through the construct
//! tree, it keeps an explicit stack of [`Instance`]s: the top instance either
//! pushes a child, performs its own effect, or cleans up and hands its result
//! down. That makes every intermediate state observable and lets a driver
//! stop between any two steps.
//!
//! ## Modules
//!
//! - [`engine`]: the [`Runtime`] itself, the step loop, cleanup and jumps
//! - [`instance`]: instances, their results and control transfers
//! - [`events`]: the undefined-behavior, crash and leak event feed
//! - [`streams`]: the `cout` buffer and the `cin` input queue
//!
//! Expression, statement, initializer and call semantics live in private
//! modules that extend [`Runtime`] with one `advance_*` method per family.

pub(crate) mod arithmetic;
mod calls;
pub mod engine;
pub mod events;
mod expressions;
mod initializers;
pub mod instance;
mod statements;
pub mod streams;

pub use engine::{Runtime, SimulationState};
pub use events::{EventKind, RuntimeEvent};
pub use instance::{EvalResult, Instance, InstanceKind, Jump, Phase};
pub use streams::{InputRead, InputStream, IoState, OutputBuffer, OutputWrite};
