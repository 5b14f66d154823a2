//! Errors raised by executors and by the tool registry.

use thiserror::Error;

/// Result alias for executor bodies.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Failure reported by a tool executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor observed its cancellation token and stopped early.
    #[error("execution cancelled")]
    Cancelled,

    /// Tool logic rejected the request or could not complete it.
    #[error("{reason}")]
    Failed {
        /// Human-readable explanation returned to the orchestrator.
        reason: String,
    },

    /// Unexpected fault inside the executor.
    #[error("internal executor fault: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ExecutorError {
    /// Creates a [`ExecutorError::Failed`] from the supplied reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`ExecutorError::Cancelled`].
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors produced by tool registration and lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Descriptor failed validation.
    #[error("invalid tool descriptor: {reason}")]
    InvalidDescriptor {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateName {
        /// Name of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    NotFound {
        /// Name of the missing tool.
        name: String,
    },
}
