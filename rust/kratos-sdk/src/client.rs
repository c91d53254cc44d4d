//! Client - shared entry point for every operation
//!
//! Owns the configuration, the node registry, the transport and the
//! operator. Cloning a client is cheap and clones share all of that state,
//! so concurrent executions see the same node health.

use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ClientConfig;
use crate::crypto::KeyHandle;
use crate::error::{Error, Result};
use crate::execute::{ExecutionContext, ExecutionOptions};
use crate::network::{discovery, NetworkSnapshot, NodeRegistry};
use crate::operation_id::OperationId;
use crate::query::{AccountBalanceQuery, Query};
use crate::receipt::{self, Receipt, Record};
use crate::status::StatusPolicy;
use crate::transport::{JsonRpcTransport, Transport};
use crate::types::AccountId;

/// Account paying for operations, with the key that signs for it
#[derive(Debug, Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub key: Arc<dyn KeyHandle>,
}

impl Operator {
    pub fn new(account_id: AccountId, key: Arc<dyn KeyHandle>) -> Self {
        Self { account_id, key }
    }
}

struct ClientInner {
    config: Arc<ClientConfig>,
    registry: Arc<NodeRegistry>,
    /// Nodes the address book is read from; the registry itself when no
    /// bootstrap set is configured
    bootstrap: Arc<NodeRegistry>,
    transport: Arc<dyn Transport>,
    policy: Arc<StatusPolicy>,
    operator: RwLock<Option<Operator>>,
}

/// Handle to one network
#[derive(Clone)]
pub struct Client(Arc<ClientInner>);

impl Client {
    /// Client over an arbitrary transport
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(NodeRegistry::new(
            &config.nodes,
            config.mirror_endpoints.clone(),
            config.node_min_backoff(),
            config.node_max_backoff(),
        ));
        let bootstrap = if config.bootstrap_nodes.is_empty() {
            Arc::clone(&registry)
        } else {
            Arc::new(NodeRegistry::new(
                &config.bootstrap_nodes,
                Vec::new(),
                config.node_min_backoff(),
                config.node_max_backoff(),
            ))
        };

        info!(
            "Client for network '{}' with {} node(s)",
            config.network_name,
            config.nodes.len()
        );

        Ok(Self(Arc::new(ClientInner {
            policy: Arc::new(config.status_policy.clone()),
            config: Arc::new(config),
            registry,
            bootstrap,
            transport,
            operator: RwLock::new(None),
        })))
    }

    /// Client speaking JSON-RPC over HTTP
    pub fn for_config(config: ClientConfig) -> Result<Self> {
        let transport = JsonRpcTransport::new()
            .map_err(|e| Error::Config(format!("failed to build transport: {}", e)))?;
        Self::new(config, Arc::new(transport))
    }

    /// Set the account paying for operations and the key signing for it
    pub fn set_operator(&self, account_id: AccountId, key: Arc<dyn KeyHandle>) -> &Self {
        let mut guard = self.0.operator.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Operator::new(account_id, key));
        self
    }

    pub fn operator(&self) -> Option<Operator> {
        self.0
            .operator
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.0.config
    }

    /// Current topology
    pub fn network(&self) -> Arc<NetworkSnapshot> {
        self.0.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.0.registry
    }

    /// Immutable context for one execution
    pub fn context(&self, options: &ExecutionOptions) -> ExecutionContext {
        self.context_over(&self.0.registry, options)
    }

    fn context_over(&self, registry: &Arc<NodeRegistry>, options: &ExecutionOptions) -> ExecutionContext {
        ExecutionContext::new(
            Arc::clone(&self.0.config),
            Arc::clone(registry),
            Arc::clone(&self.0.transport),
            Arc::clone(&self.0.policy),
            self.operator(),
        )
        .with_options(options)
    }

    /// Re-read the address book from the bootstrap nodes and replace the
    /// node set. In-flight executions keep the snapshot they started with.
    pub async fn refresh_network(&self) -> Result<Arc<NetworkSnapshot>> {
        let ctx = self.context_over(&self.0.bootstrap, &ExecutionOptions::default());
        discovery::refresh_from(&ctx, &self.0.registry).await
    }

    /// Start refreshing the network every configured period.
    ///
    /// Returns the token stopping the task, or `None` when no period is
    /// configured.
    pub fn spawn_network_updates(&self) -> Option<CancellationToken> {
        let period = self.0.config.network_update_period()?;
        let token = CancellationToken::new();
        discovery::spawn_updater(self.clone(), period, token.clone());
        Some(token)
    }

    /// Ask `node` alone for its own balance
    pub async fn ping(&self, node: AccountId) -> Result<()> {
        Query::new(AccountBalanceQuery::new(node))
            .with_node_account_ids(vec![node])
            .with_max_attempts(1)
            .execute(self)
            .await?;
        Ok(())
    }

    /// Poll any node for the receipt of `operation_id`
    pub async fn await_receipt(&self, operation_id: OperationId) -> Result<Receipt> {
        let ctx = self.context(&ExecutionOptions::default());
        receipt::await_receipt_in(&ctx, operation_id, None).await
    }

    /// Wait for the receipt of `operation_id`, then fetch its record
    pub async fn await_record(&self, operation_id: OperationId) -> Result<Record> {
        let ctx = self.context(&ExecutionOptions::default());
        receipt::await_record_in(&ctx, operation_id, None).await
    }
}
