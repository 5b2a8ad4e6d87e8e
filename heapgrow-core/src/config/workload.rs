//! Write workload configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shape of the write load
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Concurrent writer connections
    /// Env: HG_CLIENTS
    /// Default: 1
    pub clients: usize,

    /// Writes per pipelined batch
    /// Env: HG_PIPELINE
    /// Default: 1
    pub pipeline: usize,

    /// Minimum object TTL in seconds
    /// Env: HG_MIN_TTL
    /// Default: 30
    pub min_ttl: f64,

    /// Maximum object TTL in seconds
    /// Env: HG_MAX_TTL
    /// Default: 30
    pub max_ttl: f64,

    /// Collection key every write lands in (hooks watch it too)
    /// Env: HG_COLLECTION
    /// Default: "__tmpkey__"
    pub collection: String,

    /// First reconnect delay after a writer connection failure, in milliseconds
    /// Env: HG_RECONNECT_BACKOFF_MS
    /// Default: 100
    pub reconnect_backoff_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    /// Env: HG_MAX_BACKOFF_MS
    /// Default: 5000
    pub max_backoff_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            clients: 1,
            pipeline: 1,
            min_ttl: 30.0,
            max_ttl: 30.0,
            collection: "__tmpkey__".to_string(),
            reconnect_backoff_ms: 100,
            max_backoff_ms: 5000,
        }
    }
}

impl WorkloadConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("HG_CLIENTS").and_then(|v| v.parse().ok()) {
            self.clients = n;
        }
        if let Some(n) = lookup("HG_PIPELINE").and_then(|v| v.parse().ok()) {
            self.pipeline = n;
        }
        if let Some(t) = lookup("HG_MIN_TTL").and_then(|v| v.parse().ok()) {
            self.min_ttl = t;
        }
        if let Some(t) = lookup("HG_MAX_TTL").and_then(|v| v.parse().ok()) {
            self.max_ttl = t;
        }
        if let Some(key) = lookup("HG_COLLECTION") {
            self.collection = key;
        }
        if let Some(ms) = lookup("HG_RECONNECT_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            self.reconnect_backoff_ms = ms;
        }
        if let Some(ms) = lookup("HG_MAX_BACKOFF_MS").and_then(|v| v.parse().ok()) {
            self.max_backoff_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.clients == 0 {
            bail!("workload.clients must be at least 1");
        }
        if self.pipeline == 0 {
            bail!("workload.pipeline must be at least 1");
        }
        if !self.min_ttl.is_finite() || !self.max_ttl.is_finite() {
            bail!("workload TTL bounds must be finite");
        }
        if self.min_ttl < 0.0 {
            bail!("workload.min_ttl must not be negative (got {})", self.min_ttl);
        }
        if self.min_ttl > self.max_ttl {
            bail!(
                "workload.min_ttl ({}) must not exceed workload.max_ttl ({})",
                self.min_ttl,
                self.max_ttl
            );
        }
        if self.collection.is_empty() {
            bail!("workload.collection must not be empty");
        }
        if self.reconnect_backoff_ms == 0 || self.max_backoff_ms < self.reconnect_backoff_ms {
            bail!("workload backoff must satisfy 0 < reconnect_backoff_ms <= max_backoff_ms");
        }
        Ok(())
    }
}
