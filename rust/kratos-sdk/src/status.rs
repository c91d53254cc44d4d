//! Ledger status codes and their retry classification
//!
//! Which statuses are retryable is versioned configuration data, not logic:
//! `StatusPolicy` ships with defaults and can be overridden from the client
//! configuration file.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! statuses {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:literal,)*) => {
        /// Response code returned by a node at precheck or in a receipt
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Status {
            $($(#[$doc])* $variant,)*
            /// Code unknown to this SDK version
            Unrecognized(i32),
        }

        impl Status {
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => Status::$variant,)*
                    other => Status::Unrecognized(other),
                }
            }

            pub fn code(&self) -> i32 {
                match self {
                    $(Status::$variant => $code,)*
                    Status::Unrecognized(code) => *code,
                }
            }

            /// Canonical SCREAMING_SNAKE name
            pub fn name(&self) -> Option<&'static str> {
                match self {
                    $(Status::$variant => Some($name),)*
                    Status::Unrecognized(_) => None,
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Status::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

statuses! {
    Ok = 0 => "OK",
    InvalidTransaction = 1 => "INVALID_TRANSACTION",
    PayerAccountNotFound = 2 => "PAYER_ACCOUNT_NOT_FOUND",
    /// The node account in the body does not match the node contacted
    InvalidNodeAccount = 3 => "INVALID_NODE_ACCOUNT",
    TransactionExpired = 4 => "TRANSACTION_EXPIRED",
    InvalidTransactionStart = 5 => "INVALID_TRANSACTION_START",
    InvalidTransactionDuration = 6 => "INVALID_TRANSACTION_DURATION",
    InvalidSignature = 7 => "INVALID_SIGNATURE",
    MemoTooLong = 8 => "MEMO_TOO_LONG",
    InsufficientTxFee = 9 => "INSUFFICIENT_TX_FEE",
    InsufficientPayerBalance = 10 => "INSUFFICIENT_PAYER_BALANCE",
    DuplicateTransaction = 11 => "DUPLICATE_TRANSACTION",
    /// The node is temporarily overloaded
    Busy = 12 => "BUSY",
    NotSupported = 13 => "NOT_SUPPORTED",
    InvalidFileId = 14 => "INVALID_FILE_ID",
    InvalidAccountId = 15 => "INVALID_ACCOUNT_ID",
    InvalidContractId = 16 => "INVALID_CONTRACT_ID",
    InvalidTransactionId = 17 => "INVALID_TRANSACTION_ID",
    ReceiptNotFound = 18 => "RECEIPT_NOT_FOUND",
    RecordNotFound = 19 => "RECORD_NOT_FOUND",
    InvalidSolidityId = 20 => "INVALID_SOLIDITY_ID",
    /// Consensus outcome not known yet
    Unknown = 21 => "UNKNOWN",
    Success = 22 => "SUCCESS",
    FailInvalid = 23 => "FAIL_INVALID",
    FailFee = 24 => "FAIL_FEE",
    FailBalance = 25 => "FAIL_BALANCE",
    KeyRequired = 26 => "KEY_REQUIRED",
    BadEncoding = 27 => "BAD_ENCODING",
    InsufficientAccountBalance = 28 => "INSUFFICIENT_ACCOUNT_BALANCE",
    InvalidSolidityAddress = 29 => "INVALID_SOLIDITY_ADDRESS",
    InsufficientGas = 30 => "INSUFFICIENT_GAS",
    ContractSizeLimitExceeded = 31 => "CONTRACT_SIZE_LIMIT_EXCEEDED",
    LocalCallModificationException = 32 => "LOCAL_CALL_MODIFICATION_EXCEPTION",
    ContractRevertExecuted = 33 => "CONTRACT_REVERT_EXECUTED",
    ContractExecutionException = 34 => "CONTRACT_EXECUTION_EXCEPTION",
    InvalidReceivingNodeAccount = 35 => "INVALID_RECEIVING_NODE_ACCOUNT",
    MissingQueryHeader = 36 => "MISSING_QUERY_HEADER",
    AccountUpdateFailed = 37 => "ACCOUNT_UPDATE_FAILED",
    InvalidKeyEncoding = 38 => "INVALID_KEY_ENCODING",
    NullSolidityAddress = 39 => "NULL_SOLIDITY_ADDRESS",
    ContractUpdateFailed = 40 => "CONTRACT_UPDATE_FAILED",
    InvalidQueryHeader = 41 => "INVALID_QUERY_HEADER",
    InvalidFeeSubmitted = 42 => "INVALID_FEE_SUBMITTED",
    InvalidPayerSignature = 43 => "INVALID_PAYER_SIGNATURE",
    KeyNotProvided = 44 => "KEY_NOT_PROVIDED",
    InvalidExpirationTime = 45 => "INVALID_EXPIRATION_TIME",
    NoWaclKey = 46 => "NO_WACL_KEY",
    FileContentEmpty = 47 => "FILE_CONTENT_EMPTY",
    InvalidAccountAmounts = 48 => "INVALID_ACCOUNT_AMOUNTS",
    EmptyTransactionBody = 49 => "EMPTY_TRANSACTION_BODY",
    InvalidTransactionBody = 50 => "INVALID_TRANSACTION_BODY",
    /// The platform failed to create the consensus event for the request
    PlatformTransactionNotCreated = 68 => "PLATFORM_TRANSACTION_NOT_CREATED",
    /// The node's platform is not active (starting up or reconnecting)
    PlatformNotActive = 84 => "PLATFORM_NOT_ACTIVE",
    InvalidTopicId = 150 => "INVALID_TOPIC_ID",
    InvalidChunkNumber = 162 => "INVALID_CHUNK_NUMBER",
    InvalidChunkTransactionId = 163 => "INVALID_CHUNK_TRANSACTION_ID",
}

impl Status {
    /// Accepted at precheck
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNRECOGNIZED({})", self.code()),
        }
    }
}

// Names in config files, codes on the wire
impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            match self.name() {
                Some(name) => serializer.serialize_str(name),
                None => serializer.serialize_i32(self.code()),
            }
        } else {
            serializer.serialize_i32(self.code())
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i32),
            Name(String),
        }

        if deserializer.is_human_readable() {
            match Repr::deserialize(deserializer)? {
                Repr::Code(code) => Ok(Status::from_code(code)),
                Repr::Name(name) => Status::from_name(&name).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown status `{}`", name))
                }),
            }
        } else {
            Ok(Status::from_code(i32::deserialize(deserializer)?))
        }
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Current version of the built-in classification table
pub const STATUS_POLICY_VERSION: u32 = 1;

/// Retry classification of precheck and receipt statuses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPolicy {
    /// Table version, bumped whenever the sets change
    pub version: u32,

    /// Node-level rejections worth retrying on another (or the same) node
    pub retryable: BTreeSet<Status>,

    /// Rejections that say something about the node rather than the
    /// request; they count against node health
    pub node_level: BTreeSet<Status>,

    /// Statuses meaning "outcome not known yet" while polling for receipts
    pub pending: BTreeSet<Status>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            version: STATUS_POLICY_VERSION,
            retryable: [
                Status::Busy,
                Status::PlatformNotActive,
                Status::PlatformTransactionNotCreated,
                Status::InvalidNodeAccount,
            ]
            .into_iter()
            .collect(),
            node_level: [
                Status::Busy,
                Status::PlatformNotActive,
                Status::InvalidNodeAccount,
            ]
            .into_iter()
            .collect(),
            pending: [
                Status::Unknown,
                Status::ReceiptNotFound,
                Status::RecordNotFound,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl StatusPolicy {
    pub fn is_retryable(&self, status: Status) -> bool {
        self.retryable.contains(&status)
    }

    pub fn is_node_level(&self, status: Status) -> bool {
        self.node_level.contains(&status)
    }

    pub fn is_pending(&self, status: Status) -> bool {
        self.pending.contains(&status)
    }

    /// Reject tables where a status is both pending and retryable
    pub fn validate(&self) -> Result<(), String> {
        if let Some(status) = self.pending.intersection(&self.retryable).next() {
            return Err(format!(
                "status {} cannot be both pending and retryable",
                status
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_and_unrecognized() {
        assert_eq!(Status::from_code(12), Status::Busy);
        assert_eq!(Status::Busy.code(), 12);
        assert_eq!(Status::from_code(9999), Status::Unrecognized(9999));
        assert_eq!(Status::Unrecognized(9999).to_string(), "UNRECOGNIZED(9999)");
        assert_eq!(Status::from_name("SUCCESS"), Some(Status::Success));
    }

    #[test]
    fn test_default_policy() {
        let policy = StatusPolicy::default();
        assert!(policy.is_retryable(Status::Busy));
        assert!(!policy.is_retryable(Status::DuplicateTransaction));
        assert!(!policy.is_retryable(Status::InsufficientTxFee));
        assert!(!policy.is_retryable(Status::TransactionExpired));
        assert!(policy.is_node_level(Status::PlatformNotActive));
        assert!(!policy.is_node_level(Status::InvalidSignature));
        assert!(policy.is_pending(Status::Unknown));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_from_toml() {
        let text = r#"
            version = 2
            retryable = ["BUSY"]
            node_level = ["BUSY", "INVALID_NODE_ACCOUNT"]
            pending = ["UNKNOWN"]
        "#;
        let policy: StatusPolicy = toml::from_str(text).unwrap();
        assert_eq!(policy.version, 2);
        assert!(policy.is_retryable(Status::Busy));
        assert!(!policy.is_retryable(Status::PlatformNotActive));
        assert!(policy.is_node_level(Status::InvalidNodeAccount));
    }

    #[test]
    fn test_overlapping_policy_rejected() {
        let mut policy = StatusPolicy::default();
        policy.retryable.insert(Status::Unknown);
        assert!(policy.validate().is_err());
    }
}
