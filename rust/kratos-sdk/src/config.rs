//! Client Configuration
//!
//! Network topology, retry budgets and timeouts, fee ceilings and the status
//! classification table. Every field has a default, so a config file only
//! needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::operation_id::MAX_CHUNKS_PER_OPERATION;
use crate::status::StatusPolicy;
use crate::types::{AccountId, Balance, NodeAddress, KRAT};

pub const CONFIG_FILENAME: &str = "client.toml";

/// Main configuration for a [`Client`](crate::client::Client)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // === Network ===

    /// Human-readable network name
    pub network_name: String,

    /// Consensus nodes operations are sent to
    pub nodes: Vec<NodeAddress>,

    /// Fixed nodes the address book is read from; the consensus nodes when empty
    pub bootstrap_nodes: Vec<NodeAddress>,

    /// Mirror node endpoints (history reads)
    pub mirror_endpoints: Vec<String>,

    /// Refresh the address book this often (seconds); never when unset
    pub network_update_period_secs: Option<u64>,

    // === Retries ===

    /// Attempts per execution, across all nodes
    pub max_attempts: u32,

    /// Deadline of a single attempt (milliseconds)
    pub attempt_timeout_ms: u64,

    /// Deadline of a whole execution (milliseconds)
    pub request_timeout_ms: u64,

    /// First delay after a retryable rejection (milliseconds)
    pub min_backoff_ms: u64,

    /// Delay ceiling between attempts (milliseconds)
    pub max_backoff_ms: u64,

    /// First backoff of a failing node (seconds)
    pub node_min_backoff_secs: u64,

    /// Backoff ceiling of a failing node (seconds)
    pub node_max_backoff_secs: u64,

    /// How long to poll for a receipt (seconds)
    pub receipt_timeout_secs: u64,

    // === Fees ===

    /// Fee ceiling for transactions that do not set one
    pub default_max_transaction_fee: Balance,

    /// Ceiling for quoted query costs
    pub default_max_query_payment: Balance,

    // === Transactions ===

    /// Validity window of a frozen transaction (seconds)
    pub valid_duration_secs: u64,

    /// Bytes of content per chunk
    pub chunk_size: usize,

    /// Most chunks one submission may be split into
    pub max_chunks: usize,

    // === Status classification ===
    pub status_policy: StatusPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network_name: "local".to_string(),
            nodes: vec![NodeAddress {
                account_id: AccountId::from_num(3),
                endpoints: vec!["http://127.0.0.1:9933".to_string()],
                description: "local node".to_string(),
            }],
            bootstrap_nodes: Vec::new(),
            mirror_endpoints: Vec::new(),
            network_update_period_secs: None,

            max_attempts: 10,
            attempt_timeout_ms: 10_000,   // 10 seconds
            request_timeout_ms: 120_000,  // 2 minutes
            min_backoff_ms: 250,
            max_backoff_ms: 8_000,
            node_min_backoff_secs: 8,
            node_max_backoff_secs: 3_600, // 1 hour
            receipt_timeout_secs: 120,

            default_max_transaction_fee: 2 * KRAT,
            default_max_query_payment: KRAT,

            valid_duration_secs: 120,
            chunk_size: 1024,
            max_chunks: 20,

            status_policy: StatusPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// `~/.config/kratos-sdk/client.toml` (platform config dir)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kratos-sdk")
            .join(CONFIG_FILENAME)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("serialization error: {}", e)))?;
        std::fs::write(path, text)
            .map_err(|e| Error::Config(format!("failed to write {}: {}", path.display(), e)))
    }

    // Builder-style overrides

    pub fn with_nodes(mut self, nodes: Vec<NodeAddress>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_bootstrap_nodes(mut self, nodes: Vec<NodeAddress>) -> Self {
        self.bootstrap_nodes = nodes;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff_ms = min.as_millis() as u64;
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_max_query_payment(mut self, max: Balance) -> Self {
        self.default_max_query_payment = max;
        self
    }

    pub fn with_chunking(mut self, chunk_size: usize, max_chunks: usize) -> Self {
        self.chunk_size = chunk_size;
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_network_update_period(mut self, period: Option<Duration>) -> Self {
        self.network_update_period_secs = period.map(|p| p.as_secs());
        self
    }

    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    // Durations

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn node_min_backoff(&self) -> Duration {
        Duration::from_secs(self.node_min_backoff_secs)
    }

    pub fn node_max_backoff(&self) -> Duration {
        Duration::from_secs(self.node_max_backoff_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn valid_duration(&self) -> Duration {
        Duration::from_secs(self.valid_duration_secs)
    }

    pub fn network_update_period(&self) -> Option<Duration> {
        self.network_update_period_secs.map(Duration::from_secs)
    }

    /// Nodes discovery reads from
    pub fn discovery_nodes(&self) -> &[NodeAddress] {
        if self.bootstrap_nodes.is_empty() {
            &self.nodes
        } else {
            &self.bootstrap_nodes
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        if self.nodes.is_empty() {
            return fail("at least one consensus node is required".to_string());
        }
        if let Some(node) = self
            .nodes
            .iter()
            .chain(&self.bootstrap_nodes)
            .find(|n| n.endpoints.is_empty())
        {
            return fail(format!("node {} has no endpoints", node.account_id));
        }
        if self.max_attempts == 0 {
            return fail("max_attempts must be at least 1".to_string());
        }
        if self.attempt_timeout_ms == 0 || self.attempt_timeout_ms > self.request_timeout_ms {
            return fail(format!(
                "attempt_timeout_ms ({}) must be positive and at most request_timeout_ms ({})",
                self.attempt_timeout_ms, self.request_timeout_ms
            ));
        }
        if self.min_backoff_ms > self.max_backoff_ms {
            return fail(format!(
                "min_backoff_ms ({}) must not exceed max_backoff_ms ({})",
                self.min_backoff_ms, self.max_backoff_ms
            ));
        }
        if self.node_min_backoff_secs > self.node_max_backoff_secs {
            return fail(format!(
                "node_min_backoff_secs ({}) must not exceed node_max_backoff_secs ({})",
                self.node_min_backoff_secs, self.node_max_backoff_secs
            ));
        }
        if self.chunk_size == 0 || self.max_chunks == 0 {
            return fail("chunk_size and max_chunks must be positive".to_string());
        }
        if self.max_chunks > MAX_CHUNKS_PER_OPERATION as usize {
            return fail(format!(
                "max_chunks ({}) must not exceed {}",
                self.max_chunks, MAX_CHUNKS_PER_OPERATION
            ));
        }
        if self.network_update_period_secs == Some(0) {
            return fail("network_update_period_secs must be positive".to_string());
        }
        self.status_policy.validate().map_err(Error::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.default_max_query_payment, KRAT);
        assert_eq!(config.discovery_nodes(), config.nodes.as_slice());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let config = ClientConfig::default().with_backoff(Duration::from_secs(9), Duration::from_secs(1));
        assert!(config.validate().is_err());

        let config = ClientConfig::default().with_attempt_timeout(Duration::from_secs(500));
        assert!(config.validate().is_err());

        let config = ClientConfig::default().with_nodes(vec![]);
        assert!(config.validate().is_err());

        let config = ClientConfig::default().with_chunking(1024, 5_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let text = r#"
            network_name = "testnet"
            max_attempts = 3

            [[nodes]]
            account_id = "0.0.3"
            endpoints = ["http://10.0.0.1:9933"]

            [status_policy]
            version = 2
            retryable = ["BUSY"]
            node_level = ["BUSY"]
            pending = ["UNKNOWN", "RECEIPT_NOT_FOUND"]
        "#;
        let config: ClientConfig = toml::from_str(text).unwrap();
        assert_eq!(config.network_name, "testnet");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.nodes[0].account_id, AccountId::from_num(3));
        assert_eq!(config.chunk_size, 1024);
        assert!(!config.status_policy.is_retryable(Status::PlatformNotActive));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);
        let config = ClientConfig::default()
            .with_max_attempts(4)
            .with_network_update_period(Some(Duration::from_secs(600)));

        config.save(&path).unwrap();
        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
