//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter used when RUST_LOG is unset
    /// Env: HG_LOG_LEVEL
    /// Default: "warn"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string() }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("HG_LOG_LEVEL") {
            self.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            bail!("logging.level must not be empty");
        }
        Ok(())
    }
}
