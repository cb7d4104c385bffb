/*!
 * Error Types
 * Construction and configuration errors with thiserror and miette support
 *
 * Misuse of a primitive (unlocking an unlocked mutex, a corrupted state
 * word) is not represented here: those are fatal and panic at the call site.
 */

use miette::Diagnostic;
use thiserror::Error;

/// Result type for fallible constructors and config validation
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised while building a primitive
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SyncError {
    #[error("Invalid capacity {capacity}: {reason}")]
    #[diagnostic(
        code(sync::invalid_capacity),
        help("Ring capacities must be a non-zero power of two no larger than 2^30.")
    )]
    InvalidCapacity { capacity: usize, reason: &'static str },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Check the configured limits against the documented ranges.")
    )]
    InvalidConfig(String),
}

impl SyncError {
    /// Shorthand for a capacity rejection
    #[inline]
    pub(crate) fn capacity(capacity: usize, reason: &'static str) -> Self {
        Self::InvalidCapacity { capacity, reason }
    }
}
