// Error types - one taxonomy shared by transactions, queries and the poller

use std::time::Duration;

use crate::operation_id::OperationId;
use crate::status::Status;
use crate::types::{AccountId, Balance};

/// Result alias used throughout the SDK
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single network exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The node answered with bytes we could not decode
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Wire codec failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unexpected answer: expected {expected}")]
    UnexpectedAnswer { expected: &'static str },
}

/// SDK error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field was never set; the network was not contacted
    #[error("{operation}: missing required field `{field}`")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    /// Local validation failed; the network was not contacted
    #[error("invalid {operation}: {reason}")]
    Validation {
        operation: &'static str,
        reason: String,
    },

    /// A key handle or signing callback failed
    #[error("signing failed for key {public_key}: {reason}")]
    Signing { public_key: String, reason: String },

    #[error("transport failure on node {node} ({}): {source}", fmt_operation(.operation_id))]
    Transport {
        node: AccountId,
        operation_id: Option<OperationId>,
        #[source]
        source: TransportError,
    },

    /// The contacted node refused the request at precheck
    #[error("node {node} rejected {} with {status}", fmt_operation(.operation_id))]
    NodeRejected {
        status: Status,
        retryable: bool,
        node: AccountId,
        operation_id: Option<OperationId>,
    },

    /// The quoted query cost is above the caller's ceiling
    #[error("{query} costs {cost}, above the maximum payment of {max}")]
    MaxQueryPaymentExceeded {
        query: &'static str,
        cost: Balance,
        max: Balance,
    },

    #[error("deadline of {timeout:?} exceeded after {attempts} attempt(s) ({})", fmt_operation(.operation_id))]
    DeadlineExceeded {
        operation_id: Option<OperationId>,
        timeout: Duration,
        attempts: u32,
        last_error: Option<Box<Error>>,
    },

    #[error("execution cancelled ({})", fmt_operation(.operation_id))]
    Cancelled { operation_id: Option<OperationId> },

    /// Raised by `Receipt::validate_status`, never by the poller itself
    #[error("operation {operation_id} reached consensus with status {status}")]
    ReceiptStatus {
        status: Status,
        operation_id: OperationId,
    },

    #[error("unknown node account {0}")]
    UnknownNode(AccountId),

    #[error("no nodes available")]
    NoNodes,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("keystore error: {0}")]
    Keystore(String),
}

impl Error {
    pub(crate) fn missing(operation: &'static str, field: &'static str) -> Self {
        Error::MissingField { operation, field }
    }

    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            operation,
            reason: reason.into(),
        }
    }

    /// True for errors raised before any network contact
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::MissingField { .. }
                | Error::Validation { .. }
                | Error::Signing { .. }
                | Error::MaxQueryPaymentExceeded { .. }
                | Error::UnknownNode(_)
                | Error::NoNodes
                | Error::Config(_)
                | Error::Keystore(_)
        )
    }

    /// Precheck or receipt status carried by this error, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::NodeRejected { status, .. } | Error::ReceiptStatus { status, .. } => {
                Some(*status)
            }
            Error::DeadlineExceeded {
                last_error: Some(last),
                ..
            } => last.status(),
            _ => None,
        }
    }

    /// Node the failing attempt was sent to
    pub fn node(&self) -> Option<AccountId> {
        match self {
            Error::Transport { node, .. } | Error::NodeRejected { node, .. } => Some(*node),
            Error::DeadlineExceeded {
                last_error: Some(last),
                ..
            } => last.node(),
            _ => None,
        }
    }

    /// Operation the failure belongs to; enough to resubmit or poll by hand
    pub fn operation_id(&self) -> Option<OperationId> {
        match self {
            Error::Transport { operation_id, .. }
            | Error::NodeRejected { operation_id, .. }
            | Error::DeadlineExceeded { operation_id, .. }
            | Error::Cancelled { operation_id } => *operation_id,
            Error::ReceiptStatus { operation_id, .. } => Some(*operation_id),
            _ => None,
        }
    }
}

fn fmt_operation(operation_id: &Option<OperationId>) -> String {
    match operation_id {
        Some(id) => id.to_string(),
        None => "no operation id".to_string(),
    }
}
