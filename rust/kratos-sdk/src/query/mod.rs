//! Read operations
//!
//! A `Query<K>` asks one node for a piece of state. Free queries carry no
//! payment; paid ones first negotiate a cost (see [`payment`]) and then
//! attach a signed payment transfer to the node answering them.

mod kinds;
pub mod payment;

pub use kinds::{
    AccountBalanceQuery, AccountInfoQuery, AddressBookQuery, TransactionReceiptQuery,
    TransactionRecordQuery,
};
pub use payment::PaymentAttachment;

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::Client;
use crate::codec::{
    self, QueryAnswer, QueryData, QueryHeader, QueryRequest, QueryResponse, ResponseType,
};
use crate::error::{CodecError, Result};
use crate::execute::{self, Executable, ExecutionContext, ExecutionOptions, Interpretation};
use crate::operation_id::OperationId;
use crate::status::{Status, StatusPolicy};
use crate::transport::Method;
use crate::types::{AccountId, Balance};

/// Operation-specific part of a query
pub trait QueryKind: Clone + Send + Sync + 'static {
    const NAME: &'static str;

    /// Whether nodes charge for answering
    const PAID: bool;

    type Output: Send;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn data(&self) -> QueryData;

    /// Operation the query is about, for errors and logs
    fn operation_id(&self) -> Option<OperationId> {
        None
    }

    /// Extract the output from an OK answer
    fn map_answer(
        &self,
        answer: QueryAnswer,
        policy: &StatusPolicy,
    ) -> std::result::Result<Self::Output, CodecError>;

    fn interpret(
        &self,
        response: QueryResponse,
        policy: &StatusPolicy,
    ) -> std::result::Result<Interpretation<Self::Output>, CodecError> {
        if !response.header.precheck.is_ok() {
            return Ok(Interpretation::Rejected(response.header.precheck));
        }
        let answer = response
            .answer
            .ok_or(CodecError::UnexpectedAnswer { expected: Self::NAME })?;
        self.map_answer(answer, policy).map(Interpretation::Accepted)
    }

    fn is_retryable(&self, status: Status, policy: &StatusPolicy) -> bool {
        policy.is_retryable(status)
    }
}

/// Query under construction
#[derive(Debug, Clone)]
pub struct Query<K> {
    kind: K,
    payment_amount: Option<Balance>,
    max_query_payment: Option<Balance>,
    options: ExecutionOptions,
}

impl<K: QueryKind> Query<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            payment_amount: None,
            max_query_payment: None,
            options: ExecutionOptions::default(),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Pay exactly this much; skips the cost read
    pub fn with_payment_amount(mut self, amount: Balance) -> Self {
        self.payment_amount = Some(amount);
        self
    }

    /// Refuse quotes above this ceiling
    pub fn with_max_query_payment(mut self, max: Balance) -> Self {
        self.max_query_payment = Some(max);
        self
    }

    /// Ask exactly these nodes, in this order
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

    pub async fn execute(&self, client: &Client) -> Result<K::Output> {
        let ctx = client.context(&self.options);
        self.execute_in(&ctx).await
    }

    /// Quoted cost; free queries cost nothing and skip the network
    pub async fn get_cost(&self, client: &Client) -> Result<Balance> {
        if !K::PAID {
            return Ok(0);
        }
        let ctx = client.context(&self.options);
        self.kind.validate()?;
        execute::execute(&CostRead { query: self }, &ctx).await
    }

    pub(crate) async fn execute_in(&self, ctx: &ExecutionContext) -> Result<K::Output> {
        self.kind.validate()?;

        let payment = if K::PAID {
            let attachment = payment::negotiate(self, ctx).await?;
            debug!(
                "{} paying {} with {}",
                K::NAME,
                attachment.amount,
                attachment.operation_id
            );
            Some(attachment)
        } else {
            None
        };

        let op = ReadOperation {
            query: self,
            payment,
        };
        execute::execute(&op, ctx).await
    }
}

/// Engine view of an answering read
pub(crate) struct ReadOperation<'a, K> {
    query: &'a Query<K>,
    payment: Option<PaymentAttachment>,
}

impl<K: QueryKind> Executable for ReadOperation<'_, K> {
    type Output = K::Output;

    fn name(&self) -> &'static str {
        K::NAME
    }

    fn operation_id(&self) -> Option<OperationId> {
        self.query.kind.operation_id()
    }

    fn explicit_nodes(&self) -> Option<&[AccountId]> {
        self.query.options.node_account_ids.as_deref()
    }

    fn validate(&self, ctx: &ExecutionContext) -> Result<()> {
        if self.payment.is_some() {
            ctx.require_operator(K::NAME)?;
        }
        Ok(())
    }

    fn method(&self) -> Method {
        Method::Query
    }

    fn build_attempt(&self, node: AccountId, ctx: &ExecutionContext) -> Result<Vec<u8>> {
        let payment = match &self.payment {
            Some(attachment) => Some(attachment.envelope_for(node, ctx, K::NAME)?),
            None => None,
        };
        let request = QueryRequest {
            header: QueryHeader {
                payment,
                response_type: ResponseType::AnswerOnly,
            },
            data: self.query.kind.data(),
        };
        Ok(codec::encode(&request)?)
    }

    fn interpret_response(
        &self,
        response: &[u8],
        _node: AccountId,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Interpretation<K::Output>, CodecError> {
        let response: QueryResponse = codec::decode(response)?;
        self.query.kind.interpret(response, &ctx.policy)
    }

    fn is_retryable(&self, status: Status, policy: &StatusPolicy) -> bool {
        self.query.kind.is_retryable(status, policy)
    }
}

/// Engine view of a cost-only read; never carries a payment
pub(crate) struct CostRead<'a, K> {
    query: &'a Query<K>,
}

impl<K: QueryKind> Executable for CostRead<'_, K> {
    type Output = Balance;

    fn name(&self) -> &'static str {
        K::NAME
    }

    fn operation_id(&self) -> Option<OperationId> {
        self.query.kind.operation_id()
    }

    fn explicit_nodes(&self) -> Option<&[AccountId]> {
        self.query.options.node_account_ids.as_deref()
    }

    fn method(&self) -> Method {
        Method::Query
    }

    fn build_attempt(&self, _node: AccountId, _ctx: &ExecutionContext) -> Result<Vec<u8>> {
        let request = QueryRequest {
            header: QueryHeader {
                payment: None,
                response_type: ResponseType::CostAnswer,
            },
            data: self.query.kind.data(),
        };
        Ok(codec::encode(&request)?)
    }

    fn interpret_response(
        &self,
        response: &[u8],
        _node: AccountId,
        _ctx: &ExecutionContext,
    ) -> std::result::Result<Interpretation<Balance>, CodecError> {
        let response: QueryResponse = codec::decode(response)?;
        if response.header.precheck.is_ok() {
            Ok(Interpretation::Accepted(response.header.cost))
        } else {
            Ok(Interpretation::Rejected(response.header.precheck))
        }
    }

    fn is_retryable(&self, status: Status, policy: &StatusPolicy) -> bool {
        self.query.kind.is_retryable(status, policy)
    }
}
