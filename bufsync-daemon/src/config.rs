//! Configuration loading for bufsync-daemon.
//!
//! Configuration is loaded from a TOML file (default: `bufsync.toml`).
//! Every section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use bufsync_core::{
    ProcessorConfig, DEFAULT_CAPACITY, DEFAULT_MAX_EDIT_DISTANCE, DEFAULT_SUPPORTED_EXTENSIONS,
};

/// Root configuration for bufsync-daemon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Event processor configuration.
    #[serde(default)]
    pub processor: ProcessorSection,
    /// File-state cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event processor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorSection {
    /// Texts of this size or larger are rejected (default: 1MB).
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: usize,
    /// Extensions accepted, without the dot.
    #[serde(default = "default_supported_extensions")]
    pub supported_extensions: Vec<String>,
    /// Per-key dedup horizon in seconds (default: 60).
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,
    /// Edit distance past which the differ replaces the changed region
    /// wholesale (default: 1024). 0 always replaces.
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
}

/// File-state cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Live drivers per process (default: 20).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Deadline around cache mutation and provider output, in milliseconds
    /// (default: 1000).
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
    /// Drop full text from incremental events before they reach the cache
    /// (default: true).
    #[serde(default = "default_elide_text_on_diff")]
    pub elide_text_on_diff: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive (default: "info").
    /// `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_max_file_size_bytes() -> usize {
    1024 * 1024 // 1MB
}

fn default_supported_extensions() -> Vec<String> {
    DEFAULT_SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_response_ttl_secs() -> u64 {
    60
}

fn default_max_edit_distance() -> usize {
    DEFAULT_MAX_EDIT_DISTANCE
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_event_timeout_ms() -> u64 {
    1000
}

fn default_elide_text_on_diff() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ProcessorSection {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size_bytes(),
            supported_extensions: default_supported_extensions(),
            response_ttl_secs: default_response_ttl_secs(),
            max_edit_distance: default_max_edit_distance(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_timeout_ms: default_event_timeout_ms(),
            elide_text_on_diff: default_elide_text_on_diff(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// [`validate`](Self::validate).
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would disable the processor or the cache.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = |field: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                reason: format!("{} must be greater than zero", field),
            })
        };
        if self.cache.capacity == 0 {
            return zero("cache.capacity");
        }
        if self.processor.max_file_size_bytes == 0 {
            return zero("processor.max_file_size_bytes");
        }
        if self.processor.response_ttl_secs == 0 {
            return zero("processor.response_ttl_secs");
        }
        if self.session.event_timeout_ms == 0 {
            return zero("session.event_timeout_ms");
        }
        Ok(())
    }

    /// Settings for the event processor.
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_file_size_bytes: self.processor.max_file_size_bytes,
            supported_extensions: self.processor.supported_extensions.clone(),
            response_ttl: Duration::from_secs(self.processor.response_ttl_secs),
            max_edit_distance: self.processor.max_edit_distance,
        }
    }

    /// Deadline around cache access.
    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.session.event_timeout_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Parsed, but unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}
