//! Execution engine shared by transactions and queries
//!
//! One execution walks the candidate nodes of a registry snapshot, sending
//! at most one request at a time:
//!
//! - transport failures and undecodable responses move on to the next node
//! - retryable rejections wait out an exponential backoff, then move on
//! - terminal rejections and acceptances end the execution
//!
//! The attempt budget, per-attempt timeout, overall deadline and
//! cancellation token come from the [`ExecutionContext`]. The deadline is
//! fixed when the context is built, so every engine run sharing a context
//! (the chunks of one submission, a cost read and its paid read) shares it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backoff::ExponentialBackoff;
use crate::client::Operator;
use crate::config::ClientConfig;
use crate::error::{CodecError, Error, Result, TransportError};
use crate::network::{NetworkSnapshot, NodeRegistry};
use crate::operation_id::OperationId;
use crate::status::{Status, StatusPolicy};
use crate::transport::{Method, Transport};
use crate::types::AccountId;

/// Result of one attempt, as far as node health is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    ImmediateReject(Status),
    ImmediateAccept,
    TransportFailure,
}

/// Decoded immediate response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation<T> {
    Accepted(T),
    Rejected(Status),
}

/// Per-operation overrides of the client defaults
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub max_attempts: Option<u32>,
    pub attempt_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub min_backoff: Option<Duration>,
    pub max_backoff: Option<Duration>,
    /// Nodes to try, in this order
    pub node_account_ids: Option<Vec<AccountId>>,
    pub cancel: Option<CancellationToken>,
}

/// Everything one execution needs, fixed when it starts
#[derive(Clone)]
pub struct ExecutionContext {
    pub config: Arc<ClientConfig>,
    pub snapshot: Arc<NetworkSnapshot>,
    pub registry: Arc<NodeRegistry>,
    pub transport: Arc<dyn Transport>,
    pub policy: Arc<StatusPolicy>,
    pub operator: Option<Operator>,
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub request_timeout: Duration,
    /// Absolute end of the execution: start + `request_timeout`
    pub deadline: Instant,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub cancel: CancellationToken,
    started: Instant,
}

impl ExecutionContext {
    /// Context with the engine settings taken from `config`
    pub fn new(
        config: Arc<ClientConfig>,
        registry: Arc<NodeRegistry>,
        transport: Arc<dyn Transport>,
        policy: Arc<StatusPolicy>,
        operator: Option<Operator>,
    ) -> Self {
        let started = Instant::now();
        Self {
            snapshot: registry.snapshot(),
            registry,
            transport,
            policy,
            operator,
            max_attempts: config.max_attempts,
            attempt_timeout: config.attempt_timeout(),
            request_timeout: config.request_timeout(),
            deadline: started + config.request_timeout(),
            min_backoff: config.min_backoff(),
            max_backoff: config.max_backoff(),
            cancel: CancellationToken::new(),
            started,
            config,
        }
    }

    pub fn with_options(mut self, options: &ExecutionOptions) -> Self {
        if let Some(max_attempts) = options.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(timeout) = options.attempt_timeout {
            self.attempt_timeout = timeout;
        }
        if let Some(timeout) = options.request_timeout {
            self.request_timeout = timeout;
            self.deadline = self.started + timeout;
        }
        if let Some(min) = options.min_backoff {
            self.min_backoff = min;
        }
        if let Some(max) = options.max_backoff {
            self.max_backoff = max;
        }
        if let Some(cancel) = &options.cancel {
            self.cancel = cancel.clone();
        }
        self
    }

    /// Reject settings no execution can honour, before anything is sent
    pub fn validate(&self, operation: &'static str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid(operation, "max attempts must be at least 1"));
        }
        if self.attempt_timeout.is_zero() || self.attempt_timeout > self.request_timeout {
            return Err(Error::invalid(
                operation,
                format!(
                    "attempt timeout {:?} must be positive and at most the request timeout {:?}",
                    self.attempt_timeout, self.request_timeout
                ),
            ));
        }
        if self.min_backoff > self.max_backoff {
            return Err(Error::invalid(
                operation,
                format!(
                    "min backoff {:?} exceeds max backoff {:?}",
                    self.min_backoff, self.max_backoff
                ),
            ));
        }
        Ok(())
    }

    /// The operator, or a missing-field error naming `operation`
    pub fn require_operator(&self, operation: &'static str) -> Result<&Operator> {
        self.operator
            .as_ref()
            .ok_or_else(|| Error::missing(operation, "operator"))
    }
}

/// Capabilities the engine needs from an operation
pub trait Executable: Send + Sync {
    type Output: Send;

    /// Operation name used in logs and errors
    fn name(&self) -> &'static str;

    fn operation_id(&self) -> Option<OperationId>;

    /// Nodes to try in exactly this order
    fn explicit_nodes(&self) -> Option<&[AccountId]> {
        None
    }

    /// Restriction of the candidate set that keeps health ordering
    fn allowed_nodes(&self) -> Option<&[AccountId]> {
        None
    }

    /// Local checks; a failure here never reaches the network
    fn validate(&self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    fn method(&self) -> Method;

    /// Encoded request for `node`. Synchronous: signing happens here.
    fn build_attempt(&self, node: AccountId, ctx: &ExecutionContext) -> Result<Vec<u8>>;

    fn interpret_response(
        &self,
        response: &[u8],
        node: AccountId,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Interpretation<Self::Output>, CodecError>;

    fn is_retryable(&self, status: Status, policy: &StatusPolicy) -> bool {
        policy.is_retryable(status)
    }
}

/// Run `op` to an accepted response or a surfaced failure
pub async fn execute<E>(op: &E, ctx: &ExecutionContext) -> Result<E::Output>
where
    E: Executable + ?Sized,
{
    ctx.validate(op.name())?;
    op.validate(ctx)?;

    let operation_id = op.operation_id();
    let candidates =
        ctx.snapshot
            .candidates(op.explicit_nodes(), op.allowed_nodes(), rand::random())?;

    let deadline = ctx.deadline;
    let mut backoff = ExponentialBackoff::new(ctx.min_backoff, ctx.max_backoff);
    let mut tried: HashSet<AccountId> = HashSet::with_capacity(candidates.len());
    let mut pending_delay: Option<Duration> = None;
    let mut last_error: Option<Error> = None;
    let mut attempts: u32 = 0;

    let deadline_exceeded = |attempts: u32, last_error: Option<Error>| Error::DeadlineExceeded {
        operation_id,
        timeout: ctx.request_timeout,
        attempts,
        last_error: last_error.map(Box::new),
    };

    for node in candidates.iter().cycle() {
        if attempts >= ctx.max_attempts {
            break;
        }
        let node_id = node.account_id();

        // Coming back to a node already tried means the rotation wrapped
        let revisit = !tried.insert(node_id);
        let delay = pending_delay
            .take()
            .or_else(|| revisit.then(|| backoff.next_delay()));

        if let Some(delay) = delay {
            if Instant::now() + delay >= deadline {
                return Err(deadline_exceeded(attempts, last_error));
            }
            debug!("{} waiting {:?} before next attempt", op.name(), delay);
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(Error::Cancelled { operation_id }),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if ctx.cancel.is_cancelled() {
            return Err(Error::Cancelled { operation_id });
        }
        if Instant::now() >= deadline {
            return Err(deadline_exceeded(attempts, last_error));
        }

        // Signing failures surface here and are not retried
        let request = op.build_attempt(node_id, ctx)?;
        attempts += 1;

        let failure = match node.endpoint() {
            None => TransportError::Connection("node has no endpoints".to_string()),
            Some(endpoint) => {
                debug!(
                    "{} attempt {}/{} on node {} ({})",
                    op.name(),
                    attempts,
                    ctx.max_attempts,
                    node_id,
                    endpoint
                );

                let attempt_deadline = (Instant::now() + ctx.attempt_timeout).min(deadline);
                let sent = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => return Err(Error::Cancelled { operation_id }),
                    sent = tokio::time::timeout_at(
                        attempt_deadline,
                        ctx.transport.send(endpoint, op.method(), request),
                    ) => sent,
                };

                match sent {
                    Ok(Ok(bytes)) => match op.interpret_response(&bytes, node_id, ctx) {
                        Ok(Interpretation::Accepted(output)) => {
                            ctx.registry.report_outcome(
                                node,
                                AttemptOutcome::ImmediateAccept,
                                &ctx.policy,
                            );
                            debug!("{} accepted by node {}", op.name(), node_id);
                            return Ok(output);
                        }
                        Ok(Interpretation::Rejected(status)) => {
                            ctx.registry.report_outcome(
                                node,
                                AttemptOutcome::ImmediateReject(status),
                                &ctx.policy,
                            );
                            let retryable = op.is_retryable(status, &ctx.policy);
                            let error = Error::NodeRejected {
                                status,
                                retryable,
                                node: node_id,
                                operation_id,
                            };
                            if !retryable {
                                return Err(error);
                            }

                            let delay = backoff.next_delay();
                            warn!(
                                "{} rejected by node {} with {}, retrying in {:?}",
                                op.name(),
                                node_id,
                                status,
                                delay
                            );
                            pending_delay = Some(delay);
                            last_error = Some(error);
                            continue;
                        }
                        // Never a terminal rejection: the node is misbehaving
                        Err(e) => TransportError::MalformedResponse(e.to_string()),
                    },
                    Ok(Err(e)) => e,
                    Err(_elapsed) => TransportError::Timeout,
                }
            }
        };

        ctx.registry
            .report_outcome(node, AttemptOutcome::TransportFailure, &ctx.policy);
        warn!(
            "{} attempt {} on node {} failed: {}",
            op.name(),
            attempts,
            node_id,
            failure
        );
        last_error = Some(Error::Transport {
            node: node_id,
            operation_id,
            source: failure,
        });

        if Instant::now() >= deadline {
            return Err(deadline_exceeded(attempts, last_error));
        }
    }

    Err(last_error.unwrap_or(Error::NoNodes))
}
