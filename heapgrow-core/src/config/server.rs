//! Target server configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the load goes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server address (host:port)
    /// Env: HG_ADDR
    /// Default: "127.0.0.1:9851"
    pub addr: String,

    /// Connection open timeout in milliseconds
    /// Env: HG_CONNECT_TIMEOUT_MS
    /// Default: 5000
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: "127.0.0.1:9851".to_string(), connect_timeout_ms: 5000 }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.addr = other.addr;
        self.connect_timeout_ms = other.connect_timeout_ms;
    }

    pub fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("HG_ADDR") {
            self.addr = addr;
        }
        if let Some(t) = lookup("HG_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = t;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() {
            bail!("server.addr must not be empty");
        }
        if self.connect_timeout_ms == 0 {
            bail!("server.connect_timeout_ms must be greater than 0");
        }
        Ok(())
    }
}
