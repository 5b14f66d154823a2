//! Tool capability invocation contract facade.
//!
//! Depend on this crate via `cargo add capcall`. It bundles the component
//! crates behind feature flags so hosts only compile what they use.

#![warn(missing_docs, clippy::pedantic)]

/// Identifiers, tags and the logger capability.
pub use capcall_primitives as primitives;

/// Parameter schemas and input validation.
pub use capcall_schema as schema;

/// Context, cancellation, envelopes and the tool registry (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use capcall_tools as tools;

/// Invocation dispatcher (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use capcall_kernel as kernel;

/// Tracing setup and logger handles (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use capcall_telemetry as telemetry;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use capcall_config as config;
