//! Error types for the database state machine.
//!
//! Lock conflicts and precondition mismatches are NOT errors: they are
//! ordinary replicated results carried by [`Outcome`](crate::partition::outcome::Outcome)
//! or a `false` flag. Only conditions that indicate replicas disagree about
//! valid input, or that the dispatcher broke its ordering contract, surface
//! as [`DatabaseError`].

use thiserror::Error;

/// Errors raised while applying replicated operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A replicated payload could not be understood (unknown command tag,
    /// unknown update kind, truncated payload).
    ///
    /// Indicates a version skew between the submitting peer and this
    /// replica. Never retried or masked.
    #[error("protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    /// The dispatcher delivered a log index that does not advance the
    /// last applied index.
    #[error("apply order violation: index {index} <= last applied {last_applied}")]
    ApplyOrder { index: u64, last_applied: u64 },

    /// Snapshot encoding or decoding failed.
    #[error("snapshot error: {message}")]
    Snapshot { message: String },
}

impl DatabaseError {
    /// Create a ProtocolViolation error.
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: reason.into(),
        }
    }

    /// Create a Snapshot error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Check if this error means replicas may have diverged.
    ///
    /// Such errors must halt processing of the offending entry rather than
    /// being converted into a replicated response.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. } | Self::ApplyOrder { .. })
    }
}

/// Result type using DatabaseError.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
