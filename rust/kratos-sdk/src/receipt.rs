//! Consensus outcomes and the result poller
//!
//! A node accepting a transaction only admits it for consensus. The outcome
//! is read afterwards with receipt (free) and record (paid) queries, polled
//! until the status stops being pending. The poller never interprets the
//! final status; `Receipt::validate_status` does that on request.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::backoff::ExponentialBackoff;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::execute::ExecutionContext;
use crate::operation_id::OperationId;
use crate::query::{Query, QueryKind, TransactionReceiptQuery, TransactionRecordQuery};
use crate::status::Status;
use crate::types::{AccountId, AccountTransfer, Balance, ContractId, FileId, Timestamp, TopicId};

/// Minimal consensus outcome of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: Status,
    pub account_id: Option<AccountId>,
    pub file_id: Option<FileId>,
    pub topic_id: Option<TopicId>,
    pub contract_id: Option<ContractId>,
    pub topic_sequence_number: Option<u64>,
    pub consensus_timestamp: Option<Timestamp>,
}

impl Receipt {
    /// Receipt carrying only a status
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            account_id: None,
            file_id: None,
            topic_id: None,
            contract_id: None,
            topic_sequence_number: None,
            consensus_timestamp: None,
        }
    }

    /// Turn anything but SUCCESS into an error
    pub fn validate_status(self, operation_id: OperationId) -> Result<Self> {
        if self.status == Status::Success {
            Ok(self)
        } else {
            Err(Error::ReceiptStatus {
                status: self.status,
                operation_id,
            })
        }
    }
}

/// Full consensus outcome including computed effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub receipt: Receipt,
    pub transaction_hash: Vec<u8>,
    pub consensus_timestamp: Timestamp,
    pub operation_id: OperationId,
    pub memo: String,
    pub transaction_fee: Balance,
    pub transfers: Vec<AccountTransfer>,
    /// Output of a contract call, if the transaction made one
    pub contract_call_result: Option<Vec<u8>>,
}

/// One poll read: still pending, or resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    Pending(Status),
    Ready(T),
}

/// Node-level acceptance of one submitted transaction (or chunk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResponse {
    pub node_account_id: AccountId,
    pub operation_id: OperationId,
    /// SHA-384 of the accepted body
    pub transaction_hash: Vec<u8>,
}

impl TransactionResponse {
    /// Poll for the receipt, asking the accepting node first
    pub async fn get_receipt(&self, client: &Client) -> Result<Receipt> {
        let ctx = client.context(&Default::default());
        await_receipt_in(&ctx, self.operation_id, Some(self.node_account_id)).await
    }

    /// Wait for the receipt, then fetch the (paid) record
    pub async fn get_record(&self, client: &Client) -> Result<Record> {
        let ctx = client.context(&Default::default());
        await_record_in(&ctx, self.operation_id, Some(self.node_account_id)).await
    }
}

/// Submitting node first, then the rest of the snapshot
fn poll_order(ctx: &ExecutionContext, preferred: Option<AccountId>) -> Vec<AccountId> {
    let mut nodes = Vec::with_capacity(ctx.snapshot.len());
    if let Some(node) = preferred.filter(|n| ctx.snapshot.get(n).is_some()) {
        nodes.push(node);
    }
    nodes.extend(
        ctx.snapshot
            .node_ids()
            .into_iter()
            .filter(|id| Some(*id) != preferred),
    );
    nodes
}

/// Re-run `query` until it resolves or the receipt timeout passes
async fn poll_until_resolved<K, T>(
    ctx: &ExecutionContext,
    operation_id: OperationId,
    preferred: Option<AccountId>,
    query: Query<K>,
) -> Result<T>
where
    K: QueryKind<Output = Poll<T>>,
    T: Send,
{
    let timeout = ctx.config.receipt_timeout();
    let deadline = Instant::now() + timeout;
    let query = query.with_node_account_ids(poll_order(ctx, preferred));
    let mut backoff = ExponentialBackoff::new(ctx.min_backoff, ctx.max_backoff).with_jitter(true);
    let mut polls: u32 = 0;

    // Each poll may run until the receipt deadline, no further
    let mut poll_ctx = ctx.clone();
    poll_ctx.deadline = deadline;
    poll_ctx.request_timeout = timeout;
    poll_ctx.attempt_timeout = ctx.attempt_timeout.min(timeout);

    loop {
        if Instant::now() >= deadline {
            return Err(poll_timeout(operation_id, timeout, polls));
        }

        polls += 1;
        let status = match query.execute_in(&poll_ctx).await? {
            Poll::Ready(value) => return Ok(value),
            Poll::Pending(status) => status,
        };

        let delay = backoff.next_delay();
        debug!(
            "{} for {} still {} after {} poll(s), next in {:?}",
            K::NAME,
            operation_id,
            status,
            polls,
            delay
        );
        if Instant::now() + delay >= deadline {
            return Err(poll_timeout(operation_id, timeout, polls));
        }
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return Err(Error::Cancelled { operation_id: Some(operation_id) })
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn poll_timeout(operation_id: OperationId, timeout: Duration, polls: u32) -> Error {
    Error::DeadlineExceeded {
        operation_id: Some(operation_id),
        timeout,
        attempts: polls,
        last_error: None,
    }
}

pub(crate) async fn await_receipt_in(
    ctx: &ExecutionContext,
    operation_id: OperationId,
    preferred: Option<AccountId>,
) -> Result<Receipt> {
    let query = Query::new(TransactionReceiptQuery::new(operation_id));
    poll_until_resolved(ctx, operation_id, preferred, query).await
}

pub(crate) async fn await_record_in(
    ctx: &ExecutionContext,
    operation_id: OperationId,
    preferred: Option<AccountId>,
) -> Result<Record> {
    await_receipt_in(ctx, operation_id, preferred).await?;
    let query = Query::new(TransactionRecordQuery::new(operation_id));
    poll_until_resolved(ctx, operation_id, preferred, query).await
}
