//! Invocation pipeline: resolve, authorize, validate, execute, wrap.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use capcall_tools::{
    CancelReason, CancellationToken, EnvelopeMetadata, ExecutorError, InvocationContext,
    ResultEnvelope, ToolDescriptor, ToolRegistry,
};
use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::access::{AccessDecision, AccessPolicy};
use crate::config::DispatchConfig;
use crate::error::{InvokeError, InvokeResult};
use crate::lifecycle::{InvocationEvent, InvocationLifecycle};
use crate::observer::{InvocationObserver, Transition};

/// Runs tools from a registry on behalf of an orchestrator.
///
/// Every invocation follows the same order: resolve the name, consult the
/// access policy, validate the input, then run the executor under the
/// caller's cancellation token. A result produced after the token flipped is
/// discarded and reported as [`InvokeError::Cancelled`].
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    config: DispatchConfig,
    observer: Option<Arc<dyn InvocationObserver>>,
    access: Option<Arc<dyn AccessPolicy>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("observer_configured", &self.observer.is_some())
            .field("access_policy_configured", &self.access.is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: DispatchConfig) -> Self {
        Self {
            registry,
            config,
            observer: None,
            access: None,
        }
    }

    /// Installs an observer notified on every state transition.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn InvocationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Installs an access policy consulted before validation.
    #[must_use]
    pub fn with_access_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.access = Some(policy);
        self
    }

    /// Returns the registry this dispatcher resolves against.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the dispatcher defaults.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Invokes the named tool.
    ///
    /// When the descriptor (or the dispatcher) defines a timeout and it
    /// elapses, the token is cancelled with [`CancelReason::Timeout`] and the
    /// executor is still awaited so it can release what it holds.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::NotFound`] when the name does not resolve.
    /// - [`InvokeError::Denied`] when the access policy refuses the call.
    /// - [`InvokeError::Validation`] when the input violates the schema; the
    ///   executor is not run.
    /// - [`InvokeError::Cancelled`] when the token is cancelled before a
    ///   result is accepted.
    /// - [`InvokeError::Execution`] when the executor fails or panics.
    pub async fn invoke(
        &self,
        name: &str,
        raw: Value,
        ctx: InvocationContext,
        token: CancellationToken,
    ) -> InvokeResult<ResultEnvelope> {
        let Some(descriptor) = self.registry.get(name) else {
            debug!(tool = name, operation_id = %ctx.operation_id(), "tool not registered");
            return Err(InvokeError::NotFound {
                name: name.to_owned(),
            });
        };
        let operation_id = ctx.operation_id();
        let tool = descriptor.name().to_owned();

        if let Some(policy) = &self.access {
            if let AccessDecision::Deny { reason } = policy.evaluate(&descriptor, &ctx) {
                warn!(%operation_id, tool = %tool, caller_id = %ctx.caller_id(), reason = %reason, "invocation denied");
                return Err(InvokeError::Denied {
                    tool,
                    operation_id,
                    reason,
                });
            }
        }

        let mut run = Run::new(self.observer.as_deref(), &descriptor, &ctx);
        run.advance(InvocationEvent::Dispatch);

        let strictness = descriptor
            .strictness()
            .unwrap_or_else(|| self.config.strictness());
        let input = match descriptor.schema().validate(&raw, strictness) {
            Ok(input) => input,
            Err(source) => {
                debug!(%operation_id, tool = %tool, %source, "input rejected");
                run.advance(InvocationEvent::Rejected);
                return Err(InvokeError::Validation {
                    tool,
                    operation_id,
                    source,
                });
            }
        };
        run.advance(InvocationEvent::Validated);

        if let Some(reason) = cancelled_reason(&token) {
            info!(%operation_id, tool = %tool, %reason, "token cancelled before execution");
            run.advance(InvocationEvent::Cancel);
            return Err(InvokeError::Cancelled {
                tool,
                operation_id,
                reason,
            });
        }

        let started = Instant::now();
        let execution = AssertUnwindSafe(descriptor.executor().execute(
            input,
            ctx.clone(),
            token.clone(),
        ))
        .catch_unwind();

        let outcome = match descriptor.timeout().or(self.config.default_timeout()) {
            Some(limit) => {
                tokio::pin!(execution);
                tokio::select! {
                    outcome = &mut execution => outcome,
                    () = tokio::time::sleep(limit) => {
                        if token.cancel_with(CancelReason::Timeout) {
                            info!(%operation_id, tool = %tool, timeout = ?limit, "invocation timed out");
                        }
                        execution.await
                    }
                }
            }
            None => execution.await,
        };
        let duration = started.elapsed();

        let output = match outcome {
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(%operation_id, tool = %tool, %message, "executor panicked");
                run.advance(InvocationEvent::Faulted);
                return Err(InvokeError::Execution {
                    tool,
                    operation_id,
                    source: ExecutorError::Internal(anyhow!("executor panicked: {message}")),
                });
            }
            Ok(Err(ExecutorError::Cancelled)) => {
                let reason = token.reason().unwrap_or(CancelReason::Requested);
                info!(%operation_id, tool = %tool, %reason, "executor observed cancellation");
                run.advance(InvocationEvent::Cancel);
                return Err(InvokeError::Cancelled {
                    tool,
                    operation_id,
                    reason,
                });
            }
            Ok(Err(source)) => {
                warn!(%operation_id, tool = %tool, error = %source, "executor failed");
                run.advance(InvocationEvent::Faulted);
                return Err(InvokeError::Execution {
                    tool,
                    operation_id,
                    source,
                });
            }
            Ok(Ok(output)) => output,
        };

        if let Some(reason) = cancelled_reason(&token) {
            info!(%operation_id, tool = %tool, %reason, "discarding result produced after cancellation");
            run.advance(InvocationEvent::Cancel);
            return Err(InvokeError::Cancelled {
                tool,
                operation_id,
                reason,
            });
        }

        run.advance(InvocationEvent::Completed);
        let (data, extra) = output.into_parts();
        let metadata = EnvelopeMetadata::new(
            ctx.caller_id().clone(),
            tool,
            operation_id,
            Utc::now(),
            duration,
        )
        .with_extra(extra);
        Ok(ResultEnvelope::new(data, metadata))
    }
}

fn cancelled_reason(token: &CancellationToken) -> Option<CancelReason> {
    token
        .is_cancelled()
        .then(|| token.reason().unwrap_or(CancelReason::Requested))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Lifecycle of one invocation plus the observer it reports to.
struct Run<'a> {
    lifecycle: InvocationLifecycle,
    observer: Option<&'a dyn InvocationObserver>,
    descriptor: &'a ToolDescriptor,
    ctx: &'a InvocationContext,
}

impl<'a> Run<'a> {
    fn new(
        observer: Option<&'a dyn InvocationObserver>,
        descriptor: &'a ToolDescriptor,
        ctx: &'a InvocationContext,
    ) -> Self {
        Self {
            lifecycle: InvocationLifecycle::new(ctx.operation_id()),
            observer,
            descriptor,
            ctx,
        }
    }

    fn advance(&mut self, event: InvocationEvent) {
        let from = self.lifecycle.state();
        let to = match self.lifecycle.transition(event) {
            Ok(to) => to,
            Err(err) => {
                warn!(error = %err, tool = self.descriptor.name(), "dispatcher skipped an invalid transition");
                return;
            }
        };
        if let Some(observer) = self.observer {
            observer.on_transition(&Transition {
                operation_id: self.ctx.operation_id(),
                tool: self.descriptor.name().to_owned(),
                caller_id: self.ctx.caller_id().clone(),
                from,
                to,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use capcall_primitives::{CallerId, Tag};
    use capcall_schema::{FieldSpec, FieldType, ParameterSchema, Strictness, ValidatedInput};
    use capcall_tools::ToolOutput;
    use serde_json::json;

    use super::*;
    use crate::access::TagAllowList;
    use crate::error::ErrorKind;
    use crate::lifecycle::InvocationState;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(InvocationState, InvocationState)>>);

    impl InvocationObserver for Recording {
        fn on_transition(&self, transition: &Transition) {
            self.0
                .lock()
                .unwrap()
                .push((transition.from, transition.to));
        }
    }

    impl Recording {
        fn terminal(&self) -> Option<InvocationState> {
            self.0.lock().unwrap().last().map(|(_, to)| *to)
        }
    }

    fn ctx() -> InvocationContext {
        InvocationContext::builder(CallerId::new("planner").unwrap()).build()
    }

    fn schema() -> ParameterSchema {
        ParameterSchema::builder()
            .field(FieldSpec::required("message", FieldType::String, "text to echo"))
            .field(FieldSpec::optional("repeat", FieldType::Integer, "").with_default(1))
            .build()
            .unwrap()
    }

    fn counting_echo(calls: Arc<AtomicUsize>) -> ToolDescriptor {
        ToolDescriptor::builder("echo")
            .description("echoes its input")
            .schema(schema())
            .tag(Tag::new("safe").unwrap())
            .build(
                move |input: ValidatedInput, _ctx: InvocationContext, _token: CancellationToken| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, ExecutorError>(ToolOutput::new(input.into_value()).with_metadata("attempt", 1))
                    }
                },
            )
            .unwrap()
    }

    fn dispatcher_with(descriptors: Vec<ToolDescriptor>, config: DispatchConfig) -> Dispatcher {
        let registry = ToolRegistry::new();
        for descriptor in descriptors {
            registry.register(descriptor).unwrap();
        }
        Dispatcher::new(Arc::new(registry), config)
    }

    #[tokio::test]
    async fn success_wraps_output_and_reports_transitions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher_with(vec![counting_echo(calls.clone())], DispatchConfig::new())
            .with_observer(recording.clone());
        let ctx = ctx();

        let envelope = dispatcher
            .invoke("echo", json!({ "message": "hi" }), ctx.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert!(envelope.success());
        assert_eq!(envelope.data(), &json!({ "message": "hi", "repeat": 1 }));
        assert_eq!(envelope.metadata().executed_by(), ctx.caller_id());
        assert_eq!(envelope.metadata().operation_id(), ctx.operation_id());
        assert_eq!(envelope.metadata().tool(), "echo");
        assert_eq!(envelope.metadata().extra()["attempt"], 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *recording.0.lock().unwrap(),
            vec![
                (InvocationState::Pending, InvocationState::Validating),
                (InvocationState::Validating, InvocationState::Executing),
                (InvocationState::Executing, InvocationState::Succeeded),
            ]
        );
    }

    #[tokio::test]
    async fn validation_failure_skips_executor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher_with(vec![counting_echo(calls.clone())], DispatchConfig::new())
            .with_observer(recording.clone());

        let err = dispatcher
            .invoke("echo", json!({ "repeat": 2 }), ctx(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(recording.terminal(), Some(InvocationState::Failed));
    }

    #[tokio::test]
    async fn per_tool_strictness_overrides_default() {
        let lenient = ToolDescriptor::builder("lenient")
            .description("ignores unknown keys")
            .schema(schema())
            .strictness(Strictness::Lenient)
            .build(|input: ValidatedInput, _: InvocationContext, _: CancellationToken| async move {
                Ok::<_, ExecutorError>(ToolOutput::new(input.into_value()))
            })
            .unwrap();
        let dispatcher = dispatcher_with(
            vec![lenient, counting_echo(Arc::default())],
            DispatchConfig::new(),
        );
        let raw = json!({ "message": "hi", "extra": true });

        let envelope = dispatcher
            .invoke("lenient", raw.clone(), ctx(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(envelope.data(), &json!({ "message": "hi", "repeat": 1 }));

        let err = dispatcher
            .invoke("echo", raw, ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn pre_cancelled_token_never_runs_executor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with(vec![counting_echo(calls.clone())], DispatchConfig::new());
        let token = CancellationToken::new();
        token.cancel_with(CancelReason::Superseded);

        let err = dispatcher
            .invoke("echo", json!({ "message": "hi" }), ctx(), token)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InvokeError::Cancelled {
                reason: CancelReason::Superseded,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn late_success_is_discarded() {
        let stubborn = ToolDescriptor::builder("stubborn")
            .description("ignores its token")
            .build(|_: ValidatedInput, _: InvocationContext, token: CancellationToken| async move {
                token.cancel();
                Ok::<_, ExecutorError>(ToolOutput::new(json!("done anyway")))
            })
            .unwrap();
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher_with(vec![stubborn], DispatchConfig::new())
            .with_observer(recording.clone());

        let err = dispatcher
            .invoke("stubborn", json!({}), ctx(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(recording.terminal(), Some(InvocationState::Cancelled));
    }

    #[tokio::test]
    async fn timeout_cancels_token_and_awaits_cleanup() {
        let cleaned_up = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&cleaned_up);
        let slow = ToolDescriptor::builder("slow")
            .description("waits for cancellation")
            .timeout(Duration::from_millis(20))
            .build(move |_: ValidatedInput, _: InvocationContext, token: CancellationToken| {
                let flag = Arc::clone(&flag);
                async move {
                    let outcome = token
                        .run_until_cancelled(tokio::time::sleep(Duration::from_secs(30)))
                        .await;
                    flag.fetch_add(1, Ordering::SeqCst);
                    outcome.map(|()| ToolOutput::new(Value::Null))
                }
            })
            .unwrap();
        let dispatcher = dispatcher_with(vec![slow], DispatchConfig::new());
        let token = CancellationToken::new();

        let err = dispatcher
            .invoke("slow", json!({}), ctx(), token.clone())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InvokeError::Cancelled {
                reason: CancelReason::Timeout,
                ..
            }
        ));
        assert_eq!(token.reason(), Some(CancelReason::Timeout));
        assert_eq!(cleaned_up.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn default_timeout_applies_without_override() {
        let slow = ToolDescriptor::builder("slow")
            .description("never finishes on its own")
            .build(|_: ValidatedInput, _: InvocationContext, token: CancellationToken| async move {
                token.cancelled().await;
                Err::<ToolOutput, _>(ExecutorError::Cancelled)
            })
            .unwrap();
        let config = DispatchConfig::new().with_default_timeout(Some(Duration::from_millis(10)));
        let dispatcher = dispatcher_with(vec![slow], config);

        let err = dispatcher
            .invoke("slow", json!({}), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Cancelled {
                reason: CancelReason::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn timeout_stays_local_to_child_token() {
        let slow = ToolDescriptor::builder("slow")
            .description("sleeps past its limit")
            .timeout(Duration::from_millis(20))
            .build(|_: ValidatedInput, _: InvocationContext, token: CancellationToken| async move {
                token
                    .run_until_cancelled(tokio::time::sleep(Duration::from_secs(30)))
                    .await
                    .map(|()| ToolOutput::new(Value::Null))
            })
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with(vec![slow, counting_echo(calls.clone())], DispatchConfig::new());
        let session = CancellationToken::new();

        let err = dispatcher
            .invoke("slow", json!({}), ctx(), session.child_token())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Cancelled {
                reason: CancelReason::Timeout,
                ..
            }
        ));
        assert!(session.is_active());

        let envelope = dispatcher
            .invoke("echo", json!({ "message": "next" }), ctx(), session.child_token())
            .await
            .unwrap();
        assert_eq!(envelope.data()["message"], "next");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        session.cancel_with(CancelReason::Disconnected);
        let err = dispatcher
            .invoke("echo", json!({ "message": "late" }), ctx(), session.child_token())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Cancelled {
                reason: CancelReason::Disconnected,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn executor_failure_and_panic_become_execution_errors() {
        let failing = ToolDescriptor::builder("failing")
            .description("always fails")
            .build(|_: ValidatedInput, _: InvocationContext, _: CancellationToken| async move {
                Err::<ToolOutput, _>(ExecutorError::failed("disk full"))
            })
            .unwrap();
        let panicking = ToolDescriptor::builder("panicking")
            .description("always panics")
            .build(|input: ValidatedInput, _: InvocationContext, _: CancellationToken| async move {
                assert!(input.contains("never supplied"), "boom");
                Ok::<_, ExecutorError>(ToolOutput::default())
            })
            .unwrap();
        let dispatcher = dispatcher_with(vec![failing, panicking], DispatchConfig::new());

        let err = dispatcher
            .invoke("failing", json!({}), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            InvokeError::Execution { source: ExecutorError::Failed { reason }, .. } if reason == "disk full"
        ));
        assert!(!err.is_caller_error());

        let err = dispatcher
            .invoke("panicking", json!({}), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            InvokeError::Execution {
                source: ExecutorError::Internal(inner),
                ..
            } => assert!(inner.to_string().contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_and_denied_tools() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with(vec![counting_echo(calls.clone())], DispatchConfig::new())
            .with_access_policy(Arc::new(TagAllowList::new([Tag::new("admin").unwrap()])));

        let err = dispatcher
            .invoke("missing", json!({}), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = dispatcher
            .invoke("echo", json!({ "message": "hi" }), ctx(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Denied);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
