//! Dispatcher that turns a tool name and raw input into a result envelope.
//!
//! [`Dispatcher::invoke`] resolves the tool, applies the optional
//! [`AccessPolicy`], validates the input against the tool's schema and runs the
//! executor under the caller's cancellation token. Each invocation walks the
//! [`InvocationLifecycle`] state machine and reports every step to an optional
//! [`InvocationObserver`].

#![warn(missing_docs, clippy::pedantic)]

pub mod access;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod observer;

pub use access::{AccessDecision, AccessPolicy, TagAllowList};
pub use config::DispatchConfig;
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, InvokeError, InvokeResult};
pub use lifecycle::{
    InvocationEvent, InvocationLifecycle, InvocationState, LifecycleError, LifecycleResult,
};
pub use observer::{CompositeObserver, InvocationObserver, TracingObserver, Transition};
