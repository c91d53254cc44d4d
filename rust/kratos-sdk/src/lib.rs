//! KratOs SDK
//!
//! Build, sign and submit operations to a KratOs ledger network, then
//! follow them to consensus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        KRATOS SDK                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transaction<K> ── freeze ──> FrozenTransaction ── sign     │
//! │  Query<K>       ── cost negotiation + payment attachment    │
//! │  Execution engine ←── one attempt in flight, node rotation, │
//! │                       backoff, deadline, cancellation       │
//! │  Node registry  ←── immutable snapshots, per-node health    │
//! │  Receipt poller ←── pending vs resolved, submitting node 1st│
//! │  Transport      ←── JSON-RPC over HTTP (pluggable)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backoff;
pub mod client;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod execute;
pub mod frame;
pub mod keystore;
pub mod network;
pub mod operation_id;
pub mod query;
pub mod receipt;
pub mod signer;
pub mod status;
pub mod transaction;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{Client, Operator};
pub use config::ClientConfig;
pub use crypto::{CallbackKey, KeyGroup, KeyHandle, PrivateKey, PublicKey, Signature};
pub use error::{Error, Result};
pub use execute::ExecutionOptions;
pub use operation_id::OperationId;
pub use query::{
    AccountBalanceQuery, AccountInfoQuery, AddressBookQuery, Query, QueryKind,
    TransactionReceiptQuery, TransactionRecordQuery,
};
pub use receipt::{Poll, Receipt, Record, TransactionResponse};
pub use status::{Status, StatusPolicy};
pub use transaction::{
    AccountCreateTransaction, ContractExecuteTransaction, FileAppendTransaction,
    FrozenTransaction, TopicMessageSubmitTransaction, Transaction, TransactionKind,
    TransferTransaction,
};
pub use types::{AccountId, Balance, ContractId, FileId, Timestamp, TopicId, KRAT};
