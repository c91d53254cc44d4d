//! State-changing operations
//!
//! `Transaction<K>` is configured, then frozen into a [`FrozenTransaction`]:
//! one immutable payload per (chunk, node) pair, all sharing the operation
//! id scheme. Frozen transactions are signed and executed; each chunk is
//! submitted only after the previous one was accepted by a node.

mod kinds;

pub use kinds::{
    AccountCreate, AccountCreateTransaction, ContractExecute, ContractExecuteTransaction,
    FileAppend, FileAppendTransaction, TopicMessageSubmit, TopicMessageSubmitTransaction,
    Transfer, TransferTransaction,
};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::Client;
use crate::codec::{self, ChunkInfo, SubmitResponse, TransactionBody, TransactionData};
use crate::crypto::{CallbackKey, KeyGroup, KeyHandle, PublicKey};
use crate::error::{CodecError, Error, Result};
use crate::execute::{self, Executable, ExecutionContext, ExecutionOptions, Interpretation};
use crate::frame::{self, FrozenPayload};
use crate::operation_id::OperationId;
use crate::receipt::TransactionResponse;
use crate::signer::{sign_body, SignaturePair, Signer};
use crate::transport::Method;
use crate::types::{AccountId, Balance};

/// Longest memo nodes accept, in bytes
pub const MAX_MEMO_BYTES: usize = 100;

/// Content of one chunk handed to a chunked kind
#[derive(Debug, Clone, Copy)]
pub struct ChunkSlice<'a> {
    pub info: ChunkInfo,
    pub content: &'a [u8],
}

/// Operation-specific part of a transaction
pub trait TransactionKind: Clone + Send + Sync + 'static {
    const NAME: &'static str;

    /// Local checks of the operation's own fields
    fn validate(&self) -> Result<()>;

    /// Content split into chunks, for kinds that chunk
    fn chunked_content(&self) -> Option<&[u8]> {
        None
    }

    /// Body data; `chunk` is set exactly when `chunked_content` is
    fn build_data(&self, chunk: Option<ChunkSlice<'_>>) -> Result<TransactionData>;
}

/// Transaction under construction
#[derive(Debug, Clone)]
pub struct Transaction<K> {
    kind: K,
    operation_id: Option<OperationId>,
    max_transaction_fee: Option<Balance>,
    valid_duration: Option<Duration>,
    memo: String,
    chunk_size: Option<usize>,
    max_chunks: Option<usize>,
    options: ExecutionOptions,
}

impl<K: TransactionKind> Transaction<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            operation_id: None,
            max_transaction_fee: None,
            valid_duration: None,
            memo: String::new(),
            chunk_size: None,
            max_chunks: None,
            options: ExecutionOptions::default(),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Use this id instead of generating one for the operator
    pub fn with_operation_id(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id);
        self
    }

    pub fn with_max_transaction_fee(mut self, fee: Balance) -> Self {
        self.max_transaction_fee = Some(fee);
        self
    }

    pub fn with_valid_duration(mut self, duration: Duration) -> Self {
        self.valid_duration = Some(duration);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = Some(max_chunks);
        self
    }

    /// Try exactly these nodes, in this order
    pub fn with_node_account_ids(mut self, nodes: Vec<AccountId>) -> Self {
        self.options.node_account_ids = Some(nodes);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.options.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.options.attempt_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = Some(timeout);
        self
    }

    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.options.min_backoff = Some(min);
        self.options.max_backoff = Some(max);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.options.cancel = Some(token);
        self
    }

    /// Finalize the body bytes for every chunk and candidate node
    pub fn freeze_with(&self, client: &Client) -> Result<FrozenTransaction<K>> {
        let config = client.config();

        self.kind.validate()?;
        if self.memo.len() > MAX_MEMO_BYTES {
            return Err(Error::invalid(
                K::NAME,
                format!("memo is {} bytes, limit is {}", self.memo.len(), MAX_MEMO_BYTES),
            ));
        }

        let base_id = match self.operation_id {
            Some(id) => id,
            None => match client.operator() {
                Some(operator) => OperationId::generate(operator.account_id),
                None => return Err(Error::missing(K::NAME, "payer")),
            },
        };

        let fee = self
            .max_transaction_fee
            .unwrap_or(config.default_max_transaction_fee);
        let valid_duration = self.valid_duration.unwrap_or_else(|| config.valid_duration());
        if valid_duration.is_zero() {
            return Err(Error::invalid(K::NAME, "valid duration must be positive"));
        }

        let snapshot = client.network();
        let nodes = match &self.options.node_account_ids {
            Some(explicit) => {
                if let Some(unknown) = explicit.iter().find(|id| snapshot.get(id).is_none()) {
                    return Err(Error::UnknownNode(*unknown));
                }
                explicit.clone()
            }
            None => snapshot.node_ids(),
        };
        if nodes.is_empty() {
            return Err(Error::NoNodes);
        }

        let body = |operation_id: OperationId, node: AccountId, data: TransactionData| {
            FrozenPayload::freeze(&TransactionBody {
                operation_id,
                node_account_id: node,
                transaction_fee: fee,
                valid_duration_secs: valid_duration.as_secs(),
                memo: self.memo.clone(),
                data,
            })
        };

        let chunks = match self.kind.chunked_content() {
            None => {
                let data = self.kind.build_data(None)?;
                let payloads = nodes
                    .iter()
                    .map(|&node| body(base_id, node, data.clone()))
                    .collect::<std::result::Result<Vec<_>, CodecError>>()?;
                vec![FrozenChunk {
                    operation_id: base_id,
                    payloads,
                }]
            }
            Some(content) => {
                let pieces = frame::split_chunks(
                    K::NAME,
                    content,
                    self.chunk_size.unwrap_or(config.chunk_size),
                    self.max_chunks.unwrap_or(config.max_chunks),
                )?;
                let total = pieces.len() as u32;

                let mut chunks = Vec::with_capacity(pieces.len());
                for (index, piece) in pieces.into_iter().enumerate() {
                    let index = index as u32;
                    let operation_id = OperationId::derive_chunk(&base_id, index);
                    let data = self.kind.build_data(Some(ChunkSlice {
                        info: ChunkInfo {
                            initial_operation_id: base_id,
                            index,
                            total,
                        },
                        content: piece,
                    }))?;
                    let payloads = nodes
                        .iter()
                        .map(|&node| body(operation_id, node, data.clone()))
                        .collect::<std::result::Result<Vec<_>, CodecError>>()?;
                    chunks.push(FrozenChunk {
                        operation_id,
                        payloads,
                    });
                }
                chunks
            }
        };

        Ok(FrozenTransaction {
            kind: self.kind.clone(),
            explicit: self.options.node_account_ids.is_some(),
            nodes,
            chunks,
            options: self.options.clone(),
        })
    }

    /// Freeze, sign with the operator and submit
    pub async fn execute(&self, client: &Client) -> Result<TransactionResponse> {
        self.freeze_with(client)?.execute(client).await
    }
}

/// Payloads of one chunk, one per node
#[derive(Debug, Clone)]
pub struct FrozenChunk {
    operation_id: OperationId,
    payloads: Vec<FrozenPayload>,
}

impl FrozenChunk {
    pub fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    pub fn payloads(&self) -> &[FrozenPayload] {
        &self.payloads
    }

    pub fn payload(&self, node: &AccountId) -> Option<&FrozenPayload> {
        self.payloads.iter().find(|p| &p.node_account_id() == node)
    }
}

/// Transaction with immutable bodies; only signatures can be added
#[derive(Debug, Clone)]
pub struct FrozenTransaction<K> {
    kind: K,
    nodes: Vec<AccountId>,
    explicit: bool,
    chunks: Vec<FrozenChunk>,
    options: ExecutionOptions,
}

impl<K: TransactionKind> FrozenTransaction<K> {
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Id of the first chunk, the id of the whole submission
    pub fn operation_id(&self) -> OperationId {
        self.chunks[0].operation_id
    }

    pub fn chunks(&self) -> &[FrozenChunk] {
        &self.chunks
    }

    pub fn node_account_ids(&self) -> &[AccountId] {
        &self.nodes
    }

    /// Every payload, chunk by chunk
    pub fn payloads(&self) -> impl Iterator<Item = &FrozenPayload> {
        self.chunks.iter().flat_map(|c| c.payloads.iter())
    }

    /// Sign every payload with the handles of `signer`
    pub fn sign_with_signer(mut self, signer: &Signer) -> Result<Self> {
        for chunk in &mut self.chunks {
            for payload in &mut chunk.payloads {
                let pairs = signer.sign(payload)?;
                payload.add_signatures(pairs);
            }
        }
        Ok(self)
    }

    /// Sign with one key handle
    pub fn sign(self, handle: Arc<dyn KeyHandle>) -> Result<Self> {
        let mut signer = Signer::new();
        signer.add_key(handle);
        self.sign_with_signer(&signer)
    }

    /// Sign through an external callback
    pub fn sign_with<F>(self, public_key: PublicKey, callback: F) -> Result<Self>
    where
        F: Fn(&[u8]) -> std::result::Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        self.sign(Arc::new(CallbackKey::new(public_key, callback)))
    }

    /// Sign with a threshold group
    pub fn sign_group(self, group: KeyGroup) -> Result<Self> {
        let mut signer = Signer::new();
        signer.add_group(group);
        self.sign_with_signer(&signer)
    }

    /// Attach a signature produced elsewhere for one payload.
    /// The signature must verify against that payload's body.
    pub fn add_signature(
        &mut self,
        operation_id: OperationId,
        node: AccountId,
        pair: SignaturePair,
    ) -> Result<()> {
        let payload = self
            .chunks
            .iter_mut()
            .find(|c| c.operation_id == operation_id)
            .and_then(|c| c.payloads.iter_mut().find(|p| p.node_account_id() == node))
            .ok_or_else(|| {
                Error::invalid(K::NAME, format!("no payload for {} on node {}", operation_id, node))
            })?;

        if !pair.verify(payload.body_bytes()) {
            return Err(Error::Signing {
                public_key: pair.public_key.to_string(),
                reason: "signature does not match the frozen body".to_string(),
            });
        }
        payload.add_signatures([pair]);
        Ok(())
    }

    /// Submit every chunk and return the last chunk's response
    pub async fn execute(&self, client: &Client) -> Result<TransactionResponse> {
        let mut responses = self.execute_all(client).await?;
        responses.pop().ok_or(Error::NoNodes)
    }

    /// Submit every chunk in order; responses in chunk order
    pub async fn execute_all(&self, client: &Client) -> Result<Vec<TransactionResponse>> {
        let ctx = client.context(&self.options);
        self.execute_in(&ctx).await
    }

    pub(crate) async fn execute_in(&self, ctx: &ExecutionContext) -> Result<Vec<TransactionResponse>> {
        let mut responses = Vec::with_capacity(self.chunks.len());
        for (index, chunk) in self.chunks.iter().enumerate() {
            let op = StateChangingOperation {
                name: K::NAME,
                chunk,
                nodes: &self.nodes,
                explicit: self.explicit,
            };
            let response = execute::execute(&op, ctx).await?;
            if self.chunks.len() > 1 {
                info!(
                    "{} chunk {}/{} accepted by node {}",
                    K::NAME,
                    index + 1,
                    self.chunks.len(),
                    response.node_account_id
                );
            } else {
                info!("{} {} accepted by node {}", K::NAME, chunk.operation_id, response.node_account_id);
            }
            responses.push(response);
        }
        Ok(responses)
    }
}

/// Engine view of one frozen chunk
pub(crate) struct StateChangingOperation<'a> {
    name: &'static str,
    chunk: &'a FrozenChunk,
    nodes: &'a [AccountId],
    explicit: bool,
}

impl Executable for StateChangingOperation<'_> {
    type Output = TransactionResponse;

    fn name(&self) -> &'static str {
        self.name
    }

    fn operation_id(&self) -> Option<OperationId> {
        Some(self.chunk.operation_id)
    }

    fn explicit_nodes(&self) -> Option<&[AccountId]> {
        self.explicit.then_some(self.nodes)
    }

    fn allowed_nodes(&self) -> Option<&[AccountId]> {
        (!self.explicit).then_some(self.nodes)
    }

    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.operator.is_none() && self.chunk.payloads.iter().any(|p| p.signatures().is_empty()) {
            return Err(Error::missing(self.name, "operator"));
        }
        Ok(())
    }

    fn method(&self) -> Method {
        Method::SubmitTransaction
    }

    fn build_attempt(&self, node: AccountId, ctx: &ExecutionContext) -> Result<Vec<u8>> {
        let frozen = self.chunk.payload(&node).ok_or(Error::UnknownNode(node))?;

        let mut payload = frozen.clone();
        if let Some(operator) = &ctx.operator {
            if !payload.is_signed_by(&operator.key.public_key()) {
                payload.add_signatures([sign_body(operator.key.as_ref(), payload.body_bytes())?]);
            }
        }
        Ok(payload.to_bytes()?)
    }

    fn interpret_response(
        &self,
        response: &[u8],
        node: AccountId,
        _ctx: &ExecutionContext,
    ) -> std::result::Result<Interpretation<TransactionResponse>, CodecError> {
        let response: SubmitResponse = codec::decode(response)?;
        if !response.precheck.is_ok() {
            return Ok(Interpretation::Rejected(response.precheck));
        }

        let hash = self
            .chunk
            .payload(&node)
            .map(|p| p.hash().to_vec())
            .unwrap_or_default();
        Ok(Interpretation::Accepted(TransactionResponse {
            node_account_id: node,
            operation_id: self.chunk.operation_id,
            transaction_hash: hash,
        }))
    }
}
