//! Errors returned by the dispatcher.

use capcall_primitives::OperationId;
use capcall_schema::ValidationError;
use capcall_tools::{CancelReason, ExecutorError};
use serde::Serialize;
use thiserror::Error;

/// Coarse classification an orchestrator can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No tool is registered under the requested name.
    NotFound,
    /// An access policy refused the call.
    Denied,
    /// The input violated the tool's schema.
    Validation,
    /// The invocation was cancelled.
    Cancelled,
    /// The executor failed.
    Execution,
}

/// Failure outcome of [`crate::Dispatcher::invoke`].
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The name did not resolve.
    #[error("tool `{name}` is not registered")]
    NotFound {
        /// Requested name.
        name: String,
    },
    /// An access policy refused the call.
    #[error("access to tool `{tool}` denied for operation {operation_id}: {reason}")]
    Denied {
        /// Tool name.
        tool: String,
        /// Invocation identifier.
        operation_id: OperationId,
        /// Policy explanation.
        reason: String,
    },
    /// The input violated the tool's schema; the executor never ran.
    #[error("invalid input for tool `{tool}` (operation {operation_id}): {source}")]
    Validation {
        /// Tool name.
        tool: String,
        /// Invocation identifier.
        operation_id: OperationId,
        /// First violation found.
        #[source]
        source: ValidationError,
    },
    /// The token flipped before a result was accepted.
    #[error("tool `{tool}` cancelled ({reason}) for operation {operation_id}")]
    Cancelled {
        /// Tool name.
        tool: String,
        /// Invocation identifier.
        operation_id: OperationId,
        /// Reason recorded on the token.
        reason: CancelReason,
    },
    /// The executor failed, panicked, or reported an internal fault.
    #[error("tool `{tool}` failed for operation {operation_id}: {source}")]
    Execution {
        /// Tool name.
        tool: String,
        /// Invocation identifier.
        operation_id: OperationId,
        /// Executor failure.
        #[source]
        source: ExecutorError,
    },
}

impl InvokeError {
    /// Returns the coarse classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Denied { .. } => ErrorKind::Denied,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Execution { .. } => ErrorKind::Execution,
        }
    }

    /// Returns `true` when retrying with the same request cannot succeed.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Denied { .. } | Self::Validation { .. }
        )
    }

    /// Tool name the error concerns.
    #[must_use]
    pub fn tool(&self) -> &str {
        match self {
            Self::NotFound { name } => name,
            Self::Denied { tool, .. }
            | Self::Validation { tool, .. }
            | Self::Cancelled { tool, .. }
            | Self::Execution { tool, .. } => tool,
        }
    }

    /// Invocation identifier, absent when the name never resolved.
    #[must_use]
    pub const fn operation_id(&self) -> Option<OperationId> {
        match self {
            Self::NotFound { .. } => None,
            Self::Denied { operation_id, .. }
            | Self::Validation { operation_id, .. }
            | Self::Cancelled { operation_id, .. }
            | Self::Execution { operation_id, .. } => Some(*operation_id),
        }
    }
}

/// Result alias for dispatcher operations.
pub type InvokeResult<T> = Result<T, InvokeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let operation_id = OperationId::random();
        let validation = InvokeError::Validation {
            tool: "echo".into(),
            operation_id,
            source: ValidationError::MissingField {
                path: "message".into(),
            },
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert!(validation.is_caller_error());
        assert_eq!(validation.operation_id(), Some(operation_id));
        assert!(validation.to_string().contains("message"));

        let cancelled = InvokeError::Cancelled {
            tool: "echo".into(),
            operation_id,
            reason: CancelReason::Timeout,
        };
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        assert!(!cancelled.is_caller_error());
        assert!(cancelled.to_string().contains("timeout"));

        let missing = InvokeError::NotFound {
            name: "nope".into(),
        };
        assert_eq!(missing.tool(), "nope");
        assert_eq!(missing.operation_id(), None);
        assert!(missing.is_caller_error());
    }
}
