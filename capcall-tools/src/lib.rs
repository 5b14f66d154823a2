//! Tool registration and the values that travel with every invocation.
//!
//! A [`ToolDescriptor`] pairs a stable name and parameter schema with a
//! [`ToolExecutor`]. Executors receive validated input, an immutable
//! [`InvocationContext`] and a [`CancellationToken`]; on success they return a
//! [`ToolOutput`] that the dispatcher wraps in a [`ResultEnvelope`].

#![warn(missing_docs, clippy::pedantic)]

pub mod cancel;
pub mod context;
pub mod envelope;
pub mod error;
pub mod registry;

pub use cancel::{CancelReason, CancellationToken};
pub use context::{InvocationContext, InvocationContextBuilder};
pub use envelope::{EnvelopeMetadata, ResultEnvelope, ToolOutput};
pub use error::{ExecutorError, ExecutorResult, RegistryError, RegistryResult};
pub use registry::{ToolDescriptor, ToolDescriptorBuilder, ToolExecutor, ToolManifest, ToolRegistry};
