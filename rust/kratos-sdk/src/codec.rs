// Wire codec - bincode-encoded request and response envelopes
//
// The engine only looks at the fixed envelope (node identity, validity
// window, status, signatures); operation-specific fields travel inside
// `TransactionData`, `QueryData` and `QueryAnswer`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::error::CodecError;
use crate::operation_id::OperationId;
use crate::receipt::{Receipt, Record};
use crate::signer::SignaturePair;
use crate::status::Status;
use crate::types::{
    AccountId, AccountInfo, AccountTransfer, Balance, ContractId, FileId, NodeAddress, TopicId,
};

/// Encode any wire value
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode any wire value
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Signed part of a state-changing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub operation_id: OperationId,
    /// Node the body was frozen for; nodes reject bodies naming another node
    pub node_account_id: AccountId,
    /// Maximum fee the payer accepts
    pub transaction_fee: Balance,
    pub valid_duration_secs: u64,
    pub memo: String,
    pub data: TransactionData,
}

/// Position of one chunk inside a chunked submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Id of chunk 0
    pub initial_operation_id: OperationId,
    /// Zero-based
    pub index: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionData {
    Transfer {
        transfers: Vec<AccountTransfer>,
    },
    AccountCreate {
        key: PublicKey,
        initial_balance: Balance,
        account_memo: String,
    },
    ContractExecute {
        contract_id: ContractId,
        gas: u64,
        amount: Balance,
        function_parameters: Vec<u8>,
    },
    TopicMessageSubmit {
        topic_id: TopicId,
        message: Vec<u8>,
        chunk_info: Option<ChunkInfo>,
    },
    FileAppend {
        file_id: FileId,
        contents: Vec<u8>,
        chunk_info: Option<ChunkInfo>,
    },
}

impl TransactionData {
    pub fn chunk_info(&self) -> Option<&ChunkInfo> {
        match self {
            TransactionData::TopicMessageSubmit { chunk_info, .. }
            | TransactionData::FileAppend { chunk_info, .. } => chunk_info.as_ref(),
            _ => None,
        }
    }
}

/// Body bytes plus the signatures collected over them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub body_bytes: Vec<u8>,
    pub signatures: Vec<SignaturePair>,
}

/// Immediate answer to a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub precheck: Status,
    /// Fee the node estimated, informational
    pub cost: Balance,
}

// =============================================================================
// QUERIES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    /// Answer the query, charging the attached payment
    AnswerOnly,
    /// Only quote the cost; no payment attached
    CostAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHeader {
    pub payment: Option<SignedEnvelope>,
    pub response_type: ResponseType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryData {
    AccountBalance { account_id: AccountId },
    AccountInfo { account_id: AccountId },
    Receipt { operation_id: OperationId },
    Record { operation_id: OperationId },
    AddressBook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub header: QueryHeader,
    pub data: QueryData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub precheck: Status,
    /// Quoted cost for `CostAnswer` requests
    pub cost: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryAnswer {
    AccountBalance {
        account_id: AccountId,
        balance: Balance,
    },
    AccountInfo(AccountInfo),
    Receipt(Receipt),
    Record(Record),
    AddressBook(Vec<NodeAddress>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub header: ResponseHeader,
    pub answer: Option<QueryAnswer>,
}

impl QueryResponse {
    pub fn answer(answer: QueryAnswer) -> Self {
        Self {
            header: ResponseHeader {
                precheck: Status::Ok,
                cost: 0,
            },
            answer: Some(answer),
        }
    }

    pub fn cost(cost: Balance) -> Self {
        Self {
            header: ResponseHeader {
                precheck: Status::Ok,
                cost,
            },
            answer: None,
        }
    }

    pub fn rejected(status: Status) -> Self {
        Self {
            header: ResponseHeader {
                precheck: status,
                cost: 0,
            },
            answer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn test_body_decodes_to_same_value() {
        let id = OperationId::new(AccountId::from_num(2), Timestamp::new(1, 2), 3);
        let body = TransactionBody {
            operation_id: id,
            node_account_id: AccountId::from_num(3),
            transaction_fee: 100,
            valid_duration_secs: 120,
            memo: "hi".to_string(),
            data: TransactionData::TopicMessageSubmit {
                topic_id: TopicId::from_num(9),
                message: b"abc".to_vec(),
                chunk_info: Some(ChunkInfo {
                    initial_operation_id: id,
                    index: 0,
                    total: 1,
                }),
            },
        };
        let bytes = encode(&body).unwrap();
        let back: TransactionBody = decode(&bytes).unwrap();
        assert_eq!(back, body);
        assert_eq!(back.data.chunk_info().map(|c| c.total), Some(1));
    }

    #[test]
    fn test_unknown_status_survives_the_wire() {
        let response = SubmitResponse {
            precheck: Status::Unrecognized(4242),
            cost: 0,
        };
        let back: SubmitResponse = decode(&encode(&response).unwrap()).unwrap();
        assert_eq!(back.precheck, Status::Unrecognized(4242));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let result = decode::<QueryResponse>(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
