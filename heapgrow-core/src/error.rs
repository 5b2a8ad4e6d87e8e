//! Error types and per-call-site failure policies

use serde::{Deserialize, Serialize};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, HeapgrowError>;

/// Errors raised while talking to the target server or running the harness
#[derive(thiserror::Error, Debug)]
pub enum HeapgrowError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server error reply: {0}")]
    Server(String),
    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },
    #[error("Connection closed by server")]
    ConnectionClosed,
    #[error("Malformed stat field {field}: {value:?}")]
    StatField { field: String, value: String },
    #[error("Task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<tokio::task::JoinError> for HeapgrowError {
    fn from(err: tokio::task::JoinError) -> Self {
        HeapgrowError::Task(err.to_string())
    }
}

/// What a call site does when its operation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the whole run and exit non-zero
    Fatal,
    /// Count the failure (or default the value) and keep going
    Degrade,
}

impl ErrorPolicy {
    pub fn is_fatal(self) -> bool {
        self == ErrorPolicy::Fatal
    }
}

/// Failure policy for every call site that talks to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicies {
    /// Hook or channel registration
    pub provision: ErrorPolicy,
    /// Opening a writer connection
    pub write_connect: ErrorPolicy,
    /// Sending writes or reading their replies
    pub write_command: ErrorPolicy,
    /// AOFSHRINK issuance
    pub compaction: ErrorPolicy,
    /// SERVER / SERVER EXT queries
    pub stats_query: ErrorPolicy,
    /// Individual numeric fields inside a stats reply
    pub stats_fields: ErrorPolicy,
    /// Notification listener connection and reads
    pub subscribe: ErrorPolicy,
}

impl Default for ErrorPolicies {
    fn default() -> Self {
        Self {
            provision: ErrorPolicy::Fatal,
            write_connect: ErrorPolicy::Degrade,
            write_command: ErrorPolicy::Fatal,
            compaction: ErrorPolicy::Fatal,
            stats_query: ErrorPolicy::Fatal,
            stats_fields: ErrorPolicy::Degrade,
            subscribe: ErrorPolicy::Degrade,
        }
    }
}

impl ErrorPolicies {
    /// Every call site degrades; nothing ends the run early
    pub fn tolerant() -> Self {
        Self {
            provision: ErrorPolicy::Degrade,
            write_connect: ErrorPolicy::Degrade,
            write_command: ErrorPolicy::Degrade,
            compaction: ErrorPolicy::Degrade,
            stats_query: ErrorPolicy::Degrade,
            stats_fields: ErrorPolicy::Degrade,
            subscribe: ErrorPolicy::Degrade,
        }
    }

    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    /// Apply `HG_POLICY_*`; a value other than `fatal` or `degrade` is an error
    pub fn apply_env_from(
        &mut self,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let fields: [(&str, &mut ErrorPolicy); 7] = [
            ("HG_POLICY_PROVISION", &mut self.provision),
            ("HG_POLICY_WRITE_CONNECT", &mut self.write_connect),
            ("HG_POLICY_WRITE_COMMAND", &mut self.write_command),
            ("HG_POLICY_COMPACTION", &mut self.compaction),
            ("HG_POLICY_STATS_QUERY", &mut self.stats_query),
            ("HG_POLICY_STATS_FIELDS", &mut self.stats_fields),
            ("HG_POLICY_SUBSCRIBE", &mut self.subscribe),
        ];
        for (var, slot) in fields {
            if let Some(value) = lookup(var) {
                match value.trim().to_ascii_lowercase().as_str() {
                    "fatal" => *slot = ErrorPolicy::Fatal,
                    "degrade" => *slot = ErrorPolicy::Degrade,
                    other => anyhow::bail!("{}={}: expected fatal or degrade", var, other),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_split_fatal_and_degrade() {
        let p = ErrorPolicies::default();
        assert!(p.provision.is_fatal());
        assert!(p.write_command.is_fatal());
        assert!(p.compaction.is_fatal());
        assert!(p.stats_query.is_fatal());
        assert!(!p.write_connect.is_fatal());
        assert!(!p.stats_fields.is_fatal());
    }

    #[test]
    fn env_overrides_single_site() {
        let vars: HashMap<&str, &str> = [("HG_POLICY_COMPACTION", "Degrade")].into();
        let mut p = ErrorPolicies::default();
        p.apply_env_from(&|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(p.compaction, ErrorPolicy::Degrade);
        assert_eq!(p.provision, ErrorPolicy::Fatal);
    }

    #[test]
    fn unknown_env_policy_is_rejected() {
        let vars: HashMap<&str, &str> = [("HG_POLICY_PROVISION", "bogus")].into();
        let mut p = ErrorPolicies::default();
        let err = p.apply_env_from(&|k| vars.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(err.to_string().contains("HG_POLICY_PROVISION=bogus"), "{}", err);
        assert_eq!(p.provision, ErrorPolicy::Fatal);
    }

    #[test]
    fn policy_toml_is_lowercase() {
        let p: ErrorPolicies = toml::from_str("stats_query = \"degrade\"").unwrap();
        assert_eq!(p.stats_query, ErrorPolicy::Degrade);
        assert_eq!(p.write_command, ErrorPolicy::Fatal);
    }
}
