//! Configuration system for heapgrow
//!
//! Values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (CLI flags applied by the caller)
//! 2. **Environment Variables** (`HG_*`)
//! 3. **Config File** (`heapgrow.toml` or `--config`)
//! 4. **Defaults**
//!
//! # Example
//!
//! ```no_run
//! use heapgrow_core::config::HeapgrowConfig;
//!
//! let config = HeapgrowConfig::load()?;
//! config.validate()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod hooks;
pub mod logging;
pub mod monitor;
pub mod server;
pub mod workload;

pub use hooks::{HookMode, HooksConfig};
pub use logging::LoggingConfig;
pub use monitor::MonitorConfig;
pub use server::ServerConfig;
pub use workload::WorkloadConfig;

use crate::error::ErrorPolicies;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "heapgrow.toml";

/// Complete heapgrow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapgrowConfig {
    pub server: ServerConfig,
    pub workload: WorkloadConfig,
    pub hooks: HooksConfig,
    pub monitor: MonitorConfig,
    pub policies: ErrorPolicies,
    pub logging: LoggingConfig,
}

impl HeapgrowConfig {
    /// Load configuration with full supersedence chain
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Defaults, then `path` if it exists, then environment variables
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.server.merge(other.server);
        self.workload.merge(other.workload);
        self.hooks.merge(other.hooks);
        self.monitor.merge(other.monitor);
        self.policies.merge(other.policies);
        self.logging.merge(other.logging);
    }

    /// Apply `HG_*` environment variables
    pub fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_env_from(&|name| std::env::var(name).ok())
    }

    /// Unparsable numbers are skipped; an unknown mode or policy name is an error
    pub fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        self.server.apply_env_from(lookup);
        self.workload.apply_env_from(lookup);
        self.hooks.apply_env_from(lookup).context("Invalid environment override")?;
        self.monitor.apply_env_from(lookup);
        self.policies.apply_env_from(lookup).context("Invalid environment override")?;
        self.logging.apply_env_from(lookup);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.workload.validate()?;
        self.hooks.validate()?;
        self.monitor.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Render as TOML, as accepted by [`HeapgrowConfig::from_file`]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
