//! Error types for repcrec
//!
//! Defines a unified error type for conditions the simulator cannot absorb internally.
//! Lock contention, site-down reads/writes, and unavailable variables are *not* errors —
//! they are state transitions the transaction manager turns into waiting (spec.md §7);
//! this type is reserved for malformed input and misuse.

use std::fmt;
use std::io;

/// Unified error type for repcrec operations
#[derive(Debug)]
pub enum SimError {
    /// I/O error reading the command source
    Io(io::Error),
    /// Malformed input line (unknown command, wrong arity, non-numeric argument)
    Parse(String),
    /// Command referenced a transaction id that was never begun
    UnknownTransaction(String),
    /// Command referenced a site id outside the configured range
    UnknownSite(u32),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Io(e) => write!(f, "{}", e),
            SimError::Parse(msg) => write!(f, "parse error: {}", msg),
            SimError::UnknownTransaction(id) => write!(f, "unknown transaction '{}'", id),
            SimError::UnknownSite(id) => write!(f, "unknown site {}", id),
        }
    }
}

impl std::error::Error for SimError {}

impl From<io::Error> for SimError {
    fn from(e: io::Error) -> Self {
        SimError::Io(e)
    }
}

/// Result type alias for repcrec operations
pub type Result<T> = std::result::Result<T, SimError>;
