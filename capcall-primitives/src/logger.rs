//! Write-only logging capability passed to executors.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Severity attached to an executor log line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Fine-grained diagnostics.
    Trace,
    /// Developer-oriented diagnostics.
    Debug,
    /// Normal progress messages.
    Info,
    /// Recoverable anomalies.
    Warn,
    /// Failures.
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Scoped logging sink an orchestrator may hand to an executor.
///
/// The handle is write-only: executors cannot read back what was logged.
pub trait ToolLogger: Send + Sync {
    /// Records a single log line.
    fn log(&self, level: LogLevel, message: &str);
}

/// Logger that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl ToolLogger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}
