//! Geofence hook provisioning configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// How each geofence subscription delivers its notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    /// SETHOOK towards an external message-queue endpoint
    Hook,
    /// SETCHAN, a server-side pub/sub channel
    Channel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Number of subscriptions registered before the load starts
    /// Env: HG_HOOKS
    /// Default: 100
    pub count: usize,

    /// Env: HG_HOOK_MODE ("hook" or "channel")
    /// Default: hook
    pub mode: HookMode,

    /// Message-queue endpoint used in hook mode
    /// Env: HG_HOOK_ENDPOINT
    pub endpoint: String,

    /// Side length of every fence bounding box, in degrees
    /// Default: 5.0
    pub span: f64,

    /// Name prefix for hooks (hook mode)
    pub hook_prefix: String,

    /// Name prefix for channels (channel mode)
    pub channel_prefix: String,

    /// Listen on the provisioned channels and count notifications (channel mode only)
    /// Env: HG_SUBSCRIBE
    /// Default: false
    pub subscribe: bool,

    /// Delete the provisioned hooks/channels after a clean shutdown
    /// Env: HG_CLEANUP_HOOKS
    /// Default: false
    pub cleanup_on_exit: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            count: 100,
            mode: HookMode::Hook,
            endpoint: "kafka://broker:9091/test?auth=sasl&ssl=false&sha512=true".to_string(),
            span: 5.0,
            hook_prefix: "__tmphook__".to_string(),
            channel_prefix: "__tmpchan__".to_string(),
            subscribe: false,
            cleanup_on_exit: false,
        }
    }
}

impl HooksConfig {
    /// Prefix of the subscriptions registered in the active mode
    pub fn prefix(&self) -> &str {
        match self.mode {
            HookMode::Hook => &self.hook_prefix,
            HookMode::Channel => &self.channel_prefix,
        }
    }

    /// Name of the `index`th subscription
    pub fn name(&self, index: usize) -> String {
        format!("{}:{}", self.prefix(), index)
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env_from(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(n) = lookup("HG_HOOKS").and_then(|v| v.parse().ok()) {
            self.count = n;
        }
        if let Some(mode) = lookup("HG_HOOK_MODE") {
            match mode.trim().to_ascii_lowercase().as_str() {
                "hook" => self.mode = HookMode::Hook,
                "channel" => self.mode = HookMode::Channel,
                other => bail!("HG_HOOK_MODE={}: expected hook or channel", other),
            }
        }
        if let Some(endpoint) = lookup("HG_HOOK_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(flag) = lookup("HG_SUBSCRIBE") {
            self.subscribe = flag.parse().unwrap_or(false);
        }
        if let Some(flag) = lookup("HG_CLEANUP_HOOKS") {
            self.cleanup_on_exit = flag.parse().unwrap_or(false);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.span.is_finite() && self.span > 0.0) {
            bail!("hooks.span must be a positive number of degrees (got {})", self.span);
        }
        if self.mode == HookMode::Hook && self.count > 0 && self.endpoint.trim().is_empty() {
            bail!("hooks.endpoint is required in hook mode");
        }
        if self.prefix().is_empty() {
            bail!("hook name prefix must not be empty");
        }
        if self.subscribe && self.mode != HookMode::Channel {
            bail!("hooks.subscribe requires hooks.mode = \"channel\"");
        }
        Ok(())
    }
}
