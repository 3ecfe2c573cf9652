//! Runtime lifecycle state of a context.
//!
//! A context starts `Open` and reaches `Closed` through exactly one
//! finalizing transition.

use std::fmt;

/// How a context was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// Work was durably applied.
    Completed,
    /// Work was discarded.
    Aborted,
}

impl fmt::Display for Finalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finalization::Completed => write!(f, "completed"),
            Finalization::Aborted => write!(f, "aborted"),
        }
    }
}

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// Usable; not yet finalized.
    #[default]
    Open,
    /// Finalized. Terminal.
    Closed(Finalization),
}

impl ContextState {
    /// Returns true while the context is usable.
    pub fn is_open(self) -> bool {
        matches!(self, ContextState::Open)
    }

    /// Returns how the context was finalized, or `None` while open.
    pub fn finalization(self) -> Option<Finalization> {
        match self {
            ContextState::Open => None,
            ContextState::Closed(how) => Some(how),
        }
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Open => write!(f, "open"),
            ContextState::Closed(how) => write!(f, "closed ({})", how),
        }
    }
}
