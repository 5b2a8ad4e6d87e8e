//! Compaction and stat polling cadence

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Stat poll period in milliseconds
    /// Env: HG_POLL_INTERVAL_MS
    /// Default: 100
    pub poll_interval_ms: u64,

    /// Minimum wall-clock gap between summary lines, in milliseconds
    /// Env: HG_SUMMARY_INTERVAL_MS
    /// Default: 5000
    pub summary_interval_ms: u64,

    /// AOFSHRINK period in milliseconds
    /// Env: HG_COMPACTION_INTERVAL_MS
    /// Default: 5000
    pub compaction_interval_ms: u64,

    /// Grace period for tasks to stop after shutdown, in milliseconds
    /// Default: 2000
    pub shutdown_grace_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            summary_interval_ms: 5000,
            compaction_interval_ms: 5000,
            shutdown_grace_ms: 2000,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.summary_interval_ms)
    }

    pub fn compaction_interval(&self) -> Duration {
        Duration::from_millis(self.compaction_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(ms) = lookup("HG_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = ms;
        }
        if let Some(ms) = lookup("HG_SUMMARY_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.summary_interval_ms = ms;
        }
        if let Some(ms) = lookup("HG_COMPACTION_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.compaction_interval_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("monitor.poll_interval_ms must be greater than 0");
        }
        if self.summary_interval_ms == 0 {
            bail!("monitor.summary_interval_ms must be greater than 0");
        }
        if self.compaction_interval_ms == 0 {
            bail!("monitor.compaction_interval_ms must be greater than 0");
        }
        Ok(())
    }
}
