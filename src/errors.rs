//! Host-level error types
//!
//! This module defines [`SimError`], the failures of the runtime control
//! boundary itself. They are distinct from compile-time notes (attached to
//! constructs) and runtime events (reported on the event feed), which describe
//! problems with the simulated program rather than with the interpreter.
//!
//! [`SimError::Internal`] is the "host-fatal" tier: an interpreter invariant was
//! violated, and the simulation refuses to step further once it is returned.

use thiserror::Error;

use crate::parser::ast::SourceLocation;

/// Result alias for the runtime control boundary
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by the simulation driver
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// The program has compile errors and cannot run
    #[error("program has {count} compile error(s) and cannot be run")]
    NotCompiled { count: usize },

    /// No definition of `main` was linked
    #[error("no 'main' function was defined")]
    NoMain,

    /// A called intrinsic name has no host implementation
    #[error("intrinsic '{name}' is not registered")]
    UnknownIntrinsic { name: String },

    /// An intrinsic received arguments it cannot handle
    #[error("intrinsic '{name}' failed at {location}: {message}")]
    IntrinsicFailed {
        name: String,
        message: String,
        location: SourceLocation,
    },

    /// The simulation was aborted earlier by an internal error
    #[error("simulation was aborted by an earlier internal error")]
    Aborted,

    /// Interpreter invariant violation
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SimError {
    pub fn internal(message: impl Into<String>) -> Self {
        SimError::Internal {
            message: message.into(),
        }
    }
}
