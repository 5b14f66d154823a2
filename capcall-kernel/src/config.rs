//! Dispatcher-wide defaults.

use std::time::Duration;

use capcall_schema::Strictness;

/// Defaults applied when a descriptor does not override them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    strictness: Strictness,
    default_timeout: Option<Duration>,
}

impl DispatchConfig {
    /// Strict validation and no time limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strictness used for tools without their own.
    #[must_use]
    pub const fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Sets the time limit used for tools without their own.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Default strictness.
    #[must_use]
    pub const fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Default time limit, if any.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}
