//! Observability utilities for tool invocations.
//!
//! [`init_tracing`] installs the process-wide subscriber and
//! [`TracingLogger`] is the [`ToolLogger`] handed to executors.

#![warn(missing_docs, clippy::pedantic)]

use anyhow::anyhow;
use capcall_primitives::{LogLevel, OperationId, ToolLogger};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit ANSI colour codes.
    pub ansi: bool,
    /// Include the event target in each line.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            ansi: true,
            with_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Resolves the filter, preferring `RUST_LOG` when it is set and valid.
    ///
    /// # Errors
    ///
    /// Returns an error when the configured directive cannot be parsed.
    pub fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter)
            .map_err(|err| anyhow!("invalid log filter `{}`: {err}", self.filter))
    }
}

/// Installs a global `fmt` subscriber.
///
/// # Errors
///
/// Returns an error when the filter is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter()?)
        .with_ansi(config.ansi)
        .with_target(config.with_target)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

/// [`ToolLogger`] that forwards executor messages into `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    operation_id: OperationId,
    tool: String,
}

impl TracingLogger {
    /// Creates a logger scoped to one invocation.
    #[must_use]
    pub fn new(operation_id: OperationId, tool: impl Into<String>) -> Self {
        Self {
            operation_id,
            tool: tool.into(),
        }
    }

    /// Operation the logger is scoped to.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Tool the logger is scoped to.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }
}

impl ToolLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let operation_id = self.operation_id;
        let tool = self.tool.as_str();
        match level {
            LogLevel::Trace => trace!(%operation_id, tool, "{message}"),
            LogLevel::Debug => debug!(%operation_id, tool, "{message}"),
            LogLevel::Info => info!(%operation_id, tool, "{message}"),
            LogLevel::Warn => warn!(%operation_id, tool, "{message}"),
            LogLevel::Error => error!(%operation_id, tool, "{message}"),
        }
    }
}
