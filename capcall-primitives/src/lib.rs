//! Core shared types for capcall tool invocations.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod logger;
mod tag;

/// Error type and result alias shared across the primitives.
pub use error::{Error, Result};
/// Identifiers attached to every invocation.
pub use ids::{CallerId, OperationId};
/// Write-only logging capability handed to executors.
pub use logger::{LogLevel, NoopLogger, ToolLogger};
/// Category labels used for grouping and access control.
pub use tag::Tag;
