//! Runtime events
//!
//! Events describe problems with the simulated program detected while it
//! runs. They go onto the runtime's event feed in the order they are raised.
//! Crashes and assertion failures halt the program; every other kind is
//! informational and execution continues.

use std::fmt;

use crate::parser::ast::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    UndefinedBehavior,
    UnspecifiedBehavior,
    ImplementationDefined,
    Crash,
    AssertionFailure,
    MemoryLeak,
}

impl EventKind {
    /// Whether raising this event halts the program
    pub fn is_fatal(self) -> bool {
        matches!(self, EventKind::Crash | EventKind::AssertionFailure)
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::UndefinedBehavior => "undefined behavior",
            EventKind::UnspecifiedBehavior => "unspecified behavior",
            EventKind::ImplementationDefined => "implementation-defined behavior",
            EventKind::Crash => "crash",
            EventKind::AssertionFailure => "assertion failure",
            EventKind::MemoryLeak => "memory leak",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeEvent {
    pub kind: EventKind,
    pub message: String,
    pub location: SourceLocation,
    /// Number of steps taken when the event was raised
    pub step: usize,
}

impl fmt::Display for RuntimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.line == 0 {
            write!(f, "{}: {}", self.kind.label(), self.message)
        } else {
            write!(f, "{} at {}: {}", self.kind.label(), self.location, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(EventKind::Crash.is_fatal());
        assert!(EventKind::AssertionFailure.is_fatal());
        assert!(!EventKind::UndefinedBehavior.is_fatal());
        assert!(!EventKind::MemoryLeak.is_fatal());
    }

    #[test]
    fn test_display_includes_location() {
        let event = RuntimeEvent {
            kind: EventKind::Crash,
            message: "boom".to_string(),
            location: SourceLocation::new(3, 5),
            step: 10,
        };
        assert_eq!(event.to_string(), "crash at line 3, column 5: boom");
    }
}
