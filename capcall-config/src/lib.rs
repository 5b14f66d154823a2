//! Configuration loading for capcall hosts.
//!
//! Settings come from an optional TOML file, then `CAPCALL_*` environment
//! variables override individual fields:
//!
//! | variable | field |
//! |---|---|
//! | `CAPCALL_STRICTNESS` | `dispatch.strictness` |
//! | `CAPCALL_TIMEOUT_MS` | `dispatch.default_timeout_ms` (`0` disables) |
//! | `CAPCALL_LOG` | `telemetry.filter` |

#![warn(missing_docs, clippy::pedantic)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use capcall_kernel::DispatchConfig;
use capcall_schema::Strictness;
use capcall_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the validation strictness.
pub const ENV_STRICTNESS: &str = "CAPCALL_STRICTNESS";
/// Environment variable overriding the default timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "CAPCALL_TIMEOUT_MS";
/// Environment variable overriding the log filter.
pub const ENV_LOG: &str = "CAPCALL_LOG";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapcallConfig {
    /// Dispatcher defaults.
    pub dispatch: DispatchSection,
    /// Subscriber settings.
    pub telemetry: TelemetryConfig,
}

/// `[dispatch]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchSection {
    /// Handling of unknown input fields; `strict` unless set.
    pub strictness: Strictness,
    /// Time limit for tools without their own; no limit unless set.
    pub default_timeout_ms: Option<u64>,
}

impl CapcallConfig {
    /// Parses a TOML document without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse capcall configuration")
    }

    /// Loads configuration from `path` (defaults when `None`) and applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// override holds an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "loading capcall configuration");
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                Self::from_toml_str(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns an error when a strictness or timeout value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_STRICTNESS) {
            self.dispatch.strictness = raw
                .trim()
                .parse()
                .map_err(|err| anyhow!("{ENV_STRICTNESS}: {err}"))?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_MS} must be a whole number of milliseconds"))?;
            self.dispatch.default_timeout_ms = (millis > 0).then_some(millis);
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.telemetry.filter = filter;
        }
        Ok(())
    }

    /// Converts the `[dispatch]` table into dispatcher defaults.
    #[must_use]
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new()
            .with_strictness(self.dispatch.strictness)
            .with_default_timeout(self.dispatch.default_timeout_ms.map(Duration::from_millis))
    }
}
