//! Success shape returned to orchestrators.

use std::time::Duration;

use capcall_primitives::{CallerId, OperationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const RESERVED_KEYS: [&str; 5] = ["executedBy", "timestamp", "tool", "operationId", "durationMs"];

/// Payload produced by an executor before the dispatcher stamps it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolOutput {
    data: Value,
    metadata: Map<String, Value>,
}

impl ToolOutput {
    /// Wraps a tool-specific payload.
    #[must_use]
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            metadata: Map::new(),
        }
    }

    /// Attaches an extra metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Splits into payload and metadata extras.
    #[must_use]
    pub fn into_parts(self) -> (Value, Map<String, Value>) {
        (self.data, self.metadata)
    }
}

impl From<Value> for ToolOutput {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// Audit metadata stamped onto every successful result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    executed_by: CallerId,
    timestamp: DateTime<Utc>,
    tool: String,
    operation_id: OperationId,
    duration_ms: u64,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl EnvelopeMetadata {
    /// Creates metadata for a completed invocation.
    #[must_use]
    pub fn new(
        executed_by: CallerId,
        tool: impl Into<String>,
        operation_id: OperationId,
        timestamp: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            executed_by,
            timestamp,
            tool: tool.into(),
            operation_id,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            extra: Map::new(),
        }
    }

    /// Merges executor-supplied extras, skipping keys the dispatcher owns.
    #[must_use]
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        for (key, value) in extra {
            if RESERVED_KEYS.contains(&key.as_str()) {
                debug!(key = %key, tool = %self.tool, "ignoring reserved metadata key from executor");
                continue;
            }
            self.extra.insert(key, value);
        }
        self
    }

    /// Identity of the caller the invocation ran for.
    #[must_use]
    pub fn executed_by(&self) -> &CallerId {
        &self.executed_by
    }

    /// Completion time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Name of the tool that ran.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Correlation id of the invocation.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Wall-clock execution time in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Executor-supplied extras.
    #[must_use]
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Structured success result of an invocation.
///
/// Failures are never represented here; they surface as errors from the
/// dispatcher, so `success` is always `true` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultEnvelope {
    success: bool,
    data: Value,
    metadata: EnvelopeMetadata,
}

impl ResultEnvelope {
    /// Wraps a payload with its metadata.
    #[must_use]
    pub fn new(data: Value, metadata: EnvelopeMetadata) -> Self {
        Self {
            success: true,
            data,
            metadata,
        }
    }

    /// Always `true`.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// Tool-specific payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Audit metadata.
    #[must_use]
    pub fn metadata(&self) -> &EnvelopeMetadata {
        &self.metadata
    }

    /// Consumes the envelope, returning the payload.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }
}
