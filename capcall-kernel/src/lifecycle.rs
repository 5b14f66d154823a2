//! State machine followed by every invocation.

use std::fmt::{self, Display, Formatter};

use capcall_primitives::OperationId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// States an invocation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    /// Dispatch accepted, nothing inspected yet.
    Pending,
    /// Raw input is being checked against the schema.
    Validating,
    /// The executor is running.
    Executing,
    /// The executor returned a result before any cancellation.
    Succeeded,
    /// Validation or execution failed.
    Failed,
    /// The token flipped before a result was accepted.
    Cancelled,
}

impl InvocationState {
    /// Returns `true` for the three outcome states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl Display for InvocationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Events that drive invocation transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationEvent {
    /// The dispatcher picked the invocation up.
    Dispatch,
    /// Input satisfied the schema.
    Validated,
    /// Input violated the schema.
    Rejected,
    /// The executor produced an accepted result.
    Completed,
    /// The executor failed.
    Faulted,
    /// The token flipped, or the executor reported cancellation.
    Cancel,
}

/// Tracks the state of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvocationLifecycle {
    operation_id: OperationId,
    state: InvocationState,
}

impl InvocationLifecycle {
    /// Constructs a lifecycle in [`InvocationState::Pending`].
    #[must_use]
    pub const fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            state: InvocationState::Pending,
        }
    }

    /// Returns the owning operation identifier.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> InvocationState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state. Terminal states accept no events.
    pub fn transition(&mut self, event: InvocationEvent) -> LifecycleResult<InvocationState> {
        let next = match (self.state, event) {
            (InvocationState::Pending, InvocationEvent::Dispatch) => Some(InvocationState::Validating),
            (InvocationState::Validating, InvocationEvent::Validated) => {
                Some(InvocationState::Executing)
            }
            (InvocationState::Validating, InvocationEvent::Rejected)
            | (InvocationState::Executing, InvocationEvent::Faulted) => Some(InvocationState::Failed),
            (InvocationState::Executing, InvocationEvent::Completed) => {
                Some(InvocationState::Succeeded)
            }
            (InvocationState::Executing, InvocationEvent::Cancel) => Some(InvocationState::Cancelled),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                operation_id: self.operation_id,
                from: self.state,
                event,
            });
        };

        debug!(
            operation_id = %self.operation_id,
            from = %self.state,
            to = %next_state,
            ?event,
            "invocation transition"
        );
        self.state = next_state;
        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid invocation transition from {from} via {event:?} for operation {operation_id}")]
    InvalidTransition {
        /// Invocation whose transition failed.
        operation_id: OperationId,
        /// State prior to the attempted transition.
        from: InvocationState,
        /// Event that triggered the failure.
        event: InvocationEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
