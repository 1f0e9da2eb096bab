//! Monitoring configuration loading and validation.
//!
//! The configuration file is a YAML mapping with two required keys and a few
//! optional probe-tuning knobs:
//!
//! ```yaml
//! servers:
//!   - 1.1.1.1
//!   - example.com
//! interval: 30
//! probe_count: 5
//! metrics_port: 8989
//! probe_timeout: 3s
//! ```
//!
//! Loading either returns a fully validated [`MonitorConfig`] or a
//! [`ConfigError`] naming the file and the specific problem. No partial or
//! degraded configuration is ever returned.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default number of echo requests per host per round.
pub const DEFAULT_PROBE_COUNT: u32 = 5;

/// Default per-packet probe timeout (3 seconds).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Conventional metrics port, used by the example configs.
pub const DEFAULT_METRICS_PORT: u16 = 8989;

fn default_probe_count() -> u32 {
    DEFAULT_PROBE_COUNT
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

/// Configuration error types.
///
/// Every variant names the offending file; `Schema` additionally carries a
/// message specific enough to act on.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("config file '{path}' not found")]
    NotFound { path: String },

    /// Configuration file exists but is not readable.
    #[error("permission denied reading config file '{path}'")]
    PermissionDenied { path: String },

    /// Any other I/O failure while reading the file.
    #[error("i/o error reading config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed YAML.
    #[error("invalid YAML syntax in '{path}': {source}")]
    Syntax {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but does not describe a valid configuration.
    #[error("invalid config in '{path}': {reason}")]
    Schema { path: String, reason: String },
}

/// Validated monitoring configuration.
///
/// Immutable after [`MonitorConfig::load`]; the process exits before polling
/// if the file is invalid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorConfig {
    /// Hosts to probe, in round order. Must be non-empty.
    pub servers: Vec<String>,

    /// Seconds to sleep between rounds. Must be positive.
    pub interval: u64,

    /// Echo requests per host per round (default: 5).
    #[serde(default = "default_probe_count")]
    pub probe_count: u32,

    /// Port for the metrics endpoint. The endpoint is served only when a
    /// port is configured here or on the command line.
    #[serde(default)]
    pub metrics_port: Option<u16>,

    /// Per-packet probe timeout (default: 3s). Bounds how long one
    /// unreachable host can stall a round.
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl MonitorConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound {
                path: display.clone(),
            },
            std::io::ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
                path: display.clone(),
            },
            _ => ConfigError::Io {
                path: display.clone(),
                source: e,
            },
        })?;

        Self::from_yaml(&content, &display)
    }

    /// Parse and validate a YAML document.
    ///
    /// Separated from [`MonitorConfig::load`] so schema handling is testable
    /// without touching the filesystem.
    pub fn from_yaml(content: &str, path: &str) -> Result<Self, ConfigError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
            ConfigError::Syntax {
                path: path.to_string(),
                source: e,
            }
        })?;

        // An empty document parses as null. The required keys cannot be
        // derived from nothing, so this is a schema error, not a default.
        if doc.is_null() {
            return Err(schema_error(
                path,
                "document is empty; 'servers' and 'interval' are required",
            ));
        }

        if !doc.is_mapping() {
            return Err(schema_error(
                path,
                format!("root must be a mapping, got {}", yaml_kind(&doc)),
            ));
        }

        for key in ["servers", "interval"] {
            if doc.get(key).is_none() {
                return Err(schema_error(path, format!("missing required key '{key}'")));
            }
        }

        let config: Self = serde_yaml::from_value(doc)
            .map_err(|e| schema_error(path, e.to_string()))?;

        config.validate(path)?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Schema` if any field is invalid.
    fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(schema_error(
                path,
                "server list is empty; add at least one server to ping",
            ));
        }

        for server in &self.servers {
            if server.trim().is_empty() {
                return Err(schema_error(
                    path,
                    "'servers' entries must be non-empty host strings",
                ));
            }
        }

        if self.interval == 0 {
            return Err(schema_error(
                path,
                "'interval' must be a positive number of seconds",
            ));
        }

        if self.probe_count == 0 {
            return Err(schema_error(path, "'probe_count' must be a positive integer"));
        }

        if self.metrics_port == Some(0) {
            return Err(schema_error(path, "'metrics_port' must be a positive integer"));
        }

        if self.probe_timeout.is_zero() {
            return Err(schema_error(path, "'probe_timeout' must be a positive duration"));
        }

        Ok(())
    }

    /// Sleep duration between rounds.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

fn schema_error(path: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Schema {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Human-readable name for a YAML node type, for diagnostics.
fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
