//! Cooperative, monotonic cancellation for a single invocation.

use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken as SignalToken;
use tracing::debug;

use crate::error::{ExecutorError, ExecutorResult};

/// Why an invocation was cancelled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The orchestrator asked for cancellation without a more specific cause.
    Requested,
    /// The invocation exceeded its time limit.
    Timeout,
    /// A newer request replaced this one.
    Superseded,
    /// The caller went away.
    Disconnected,
}

impl Display for CancelReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Requested => "requested",
            Self::Timeout => "timeout",
            Self::Superseded => "superseded",
            Self::Disconnected => "disconnected",
        };
        f.write_str(label)
    }
}

/// Cancellation signal shared between an orchestrator and one executor.
///
/// Clones observe the same state. Once cancelled the token never becomes
/// active again, and the first recorded [`CancelReason`] is kept.
///
/// Hand each invocation its own token, or a [`child_token`](Self::child_token)
/// of a session-wide one: the dispatcher cancels the token it was given when
/// a timeout elapses.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    signal: SignalToken,
    reason: Arc<OnceLock<CancelReason>>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    /// Creates an active token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` until the token is cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.signal.is_cancelled()
    }

    /// Returns `true` once the token is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Cancels with [`CancelReason::Requested`].
    ///
    /// Returns `true` if this call flipped the token.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::Requested)
    }

    /// Cancels with an explicit reason.
    ///
    /// Returns `true` if this call flipped the token; later calls keep the
    /// original reason.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        let first = !self.signal.is_cancelled() && self.reason.set(reason).is_ok();
        self.signal.cancel();
        if first {
            debug!(%reason, "cancellation token flipped");
        }
        first
    }

    /// Returns the recorded reason once cancelled.
    ///
    /// A child cancelled through its parent reports the parent's reason.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.reason
            .get()
            .copied()
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.reason()))
    }

    /// Creates a token that is cancelled whenever this one is.
    ///
    /// Cancelling the child leaves this token and its other children active.
    #[must_use]
    pub fn child_token(&self) -> Self {
        Self {
            signal: self.signal.child_token(),
            reason: Arc::default(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        self.signal.cancelled().await;
    }

    /// Fails with [`ExecutorError::Cancelled`] once the token is cancelled.
    ///
    /// Executors call this at every step boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Cancelled`] when the token is no longer active.
    pub fn check(&self) -> ExecutorResult<()> {
        if self.is_cancelled() {
            Err(ExecutorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drives `future` until it completes or the token is cancelled.
    ///
    /// The future is dropped on cancellation, which releases anything it owns.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Cancelled`] if the token flips first.
    pub async fn run_until_cancelled<F>(&self, future: F) -> ExecutorResult<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.signal.cancelled() => Err(ExecutorError::Cancelled),
            output = future => Ok(output),
        }
    }
}
