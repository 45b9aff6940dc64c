//! Audit logger configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use pqbridge_common::{Error, Result};

/// Deployment mode, which decides how much is retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

/// Configuration for [`crate::SecureAuditLogger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub environment: Environment,
    /// Records held in memory before the oldest is evicted.
    pub max_records: usize,
    /// Seconds between flushes to the sink.
    pub flush_interval_secs: u64,
    /// Seconds a single sink write may take before it counts as failed.
    pub flush_timeout_secs: u64,
    /// Seconds between full integrity checks.
    pub integrity_check_interval_secs: u64,
    /// Deepest nesting the sanitizer walks before giving up.
    pub max_depth: usize,
    /// Mirror records to `tracing` outside production.
    pub mirror_to_tracing: bool,
    /// Field-name markers added to the built-in list.
    pub sensitive_markers: Vec<String>,
}

impl LoggerConfig {
    /// Production defaults.
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }

    pub fn integrity_check_interval(&self) -> Duration {
        Duration::from_secs(self.integrity_check_interval_secs)
    }

    /// Reject values that would stall the logger.
    pub fn validate(&self) -> Result<()> {
        if self.max_records == 0 {
            return Err(Error::Config("max_records must be positive".to_string()));
        }
        if self.flush_interval_secs == 0
            || self.flush_timeout_secs == 0
            || self.integrity_check_interval_secs == 0
        {
            return Err(Error::Config("intervals must be positive".to_string()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be positive".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("Invalid logger config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            max_records: 1000,
            flush_interval_secs: 30,
            flush_timeout_secs: 10,
            integrity_check_interval_secs: 300,
            max_depth: 16,
            mirror_to_tracing: true,
            sensitive_markers: Vec::new(),
        }
    }
}
