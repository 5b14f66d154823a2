//! Ambient values passed explicitly to every executor call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use capcall_primitives::{CallerId, LogLevel, OperationId, ToolLogger};

/// Immutable per-invocation context.
///
/// Built by the orchestrator right before dispatch. Cloning is cheap and every
/// clone shares the same read-only attributes; there is no way to mutate a
/// context after [`InvocationContextBuilder::build`].
#[derive(Clone)]
pub struct InvocationContext {
    caller_id: CallerId,
    operation_id: OperationId,
    attributes: Arc<BTreeMap<String, String>>,
    logger: Option<Arc<dyn ToolLogger>>,
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("caller_id", &self.caller_id)
            .field("operation_id", &self.operation_id)
            .field("attributes", &self.attributes)
            .field("logger_configured", &self.logger.is_some())
            .finish()
    }
}

impl InvocationContext {
    /// Starts building a context for the given caller.
    #[must_use]
    pub fn builder(caller_id: CallerId) -> InvocationContextBuilder {
        InvocationContextBuilder {
            caller_id,
            operation_id: None,
            attributes: BTreeMap::new(),
            logger: None,
        }
    }

    /// Returns the identity of the requester.
    #[must_use]
    pub fn caller_id(&self) -> &CallerId {
        &self.caller_id
    }

    /// Returns the correlation id of this invocation.
    #[must_use]
    pub const fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    /// Looks up a single attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns `true` when a logger handle was supplied.
    #[must_use]
    pub fn has_logger(&self) -> bool {
        self.logger.is_some()
    }

    /// Writes through the logger handle; a no-op without one.
    pub fn log(&self, level: LogLevel, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log(level, message);
        }
    }
}

/// Builder for [`InvocationContext`].
pub struct InvocationContextBuilder {
    caller_id: CallerId,
    operation_id: Option<OperationId>,
    attributes: BTreeMap<String, String>,
    logger: Option<Arc<dyn ToolLogger>>,
}

impl fmt::Debug for InvocationContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContextBuilder")
            .field("caller_id", &self.caller_id)
            .field("operation_id", &self.operation_id)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl InvocationContextBuilder {
    /// Uses a specific operation id instead of a freshly generated one.
    #[must_use]
    pub fn operation_id(mut self, operation_id: OperationId) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    /// Adds a caller attribute, replacing any previous value for the key.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds several caller attributes.
    #[must_use]
    pub fn attributes<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes
            .extend(attributes.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Supplies a scoped logger handle.
    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn ToolLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Finalises the context.
    #[must_use]
    pub fn build(self) -> InvocationContext {
        InvocationContext {
            caller_id: self.caller_id,
            operation_id: self.operation_id.unwrap_or_else(OperationId::random),
            attributes: Arc::new(self.attributes),
            logger: self.logger,
        }
    }
}
