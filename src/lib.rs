//! # Introduction
//!
//! cppstep compiles a teaching subset of C++ into a tree of checked
//! constructs and executes it one small step at a time. Between any two steps
//! a front end can inspect the full memory image, the stack of active
//! constructs, the output written so far and the feed of behavior events
//! (undefined behavior, crashes, leaks) the program has triggered.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Lexer → Parser → Syntax tree → Compiler → Program → Runtime → Simulation
//! ```
//!
//! 1. [`parser`]: tokenises the source and builds a syntax tree.
//! 2. [`compiler`]: resolves names through [`entities`], type checks against
//!    [`types`], inserts the implicit conversions and records notes instead
//!    of failing. Several translation units and the headers of the
//!    [`library`] registry link into one [`compiler::Program`].
//! 3. [`memory`]: a byte-addressed memory image with static, stack, heap and
//!    temporary regions and a typed object graph laid over it.
//! 4. [`runtime`]: the step-driven engine with its explicit instance stack.
//! 5. [`simulation`]: the driver exposing stepping, running, stepping back
//!    and input.
//!
//! ## Example
//!
//! ```no_run
//! use cppstep::simulation::{Simulation, StepOutcome};
//!
//! let mut sim = Simulation::from_source("int main() { cout << 6 * 7 << endl; }")?;
//! assert_eq!(sim.run_to_end()?, StepOutcome::Finished);
//! assert_eq!(sim.output().text(), "42\n");
//! # Ok::<(), cppstep::errors::SimError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod entities;
pub mod errors;
pub mod library;
pub mod memory;
pub mod parser;
pub mod runtime;
pub mod simulation;
pub mod types;
