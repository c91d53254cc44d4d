// Query kinds - account balance, account info, transaction receipt,
// transaction record and address book

use super::QueryKind;
use crate::codec::{QueryAnswer, QueryData, QueryResponse};
use crate::error::{CodecError, Error, Result};
use crate::execute::Interpretation;
use crate::operation_id::OperationId;
use crate::receipt::{Poll, Receipt, Record};
use crate::status::StatusPolicy;
use crate::types::{AccountId, AccountInfo, Balance, NodeAddress};

/// Pending precheck statuses resolve to `Poll::Pending` instead of a
/// rejection, so the poller can keep asking.
fn interpret_poll<K, T>(
    kind: &K,
    response: QueryResponse,
    policy: &StatusPolicy,
) -> std::result::Result<Interpretation<Poll<T>>, CodecError>
where
    K: QueryKind<Output = Poll<T>>,
{
    let precheck = response.header.precheck;
    if policy.is_pending(precheck) {
        return Ok(Interpretation::Accepted(Poll::Pending(precheck)));
    }
    if !precheck.is_ok() {
        return Ok(Interpretation::Rejected(precheck));
    }
    let answer = response
        .answer
        .ok_or(CodecError::UnexpectedAnswer { expected: K::NAME })?;
    kind.map_answer(answer, policy).map(Interpretation::Accepted)
}

// =============================================================================
// ACCOUNT BALANCE (free)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBalanceQuery {
    pub account_id: Option<AccountId>,
}

impl AccountBalanceQuery {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
        }
    }
}

impl QueryKind for AccountBalanceQuery {
    const NAME: &'static str = "AccountBalanceQuery";
    const PAID: bool = false;
    type Output = Balance;

    fn validate(&self) -> Result<()> {
        match self.account_id {
            Some(_) => Ok(()),
            None => Err(Error::missing(Self::NAME, "account_id")),
        }
    }

    fn data(&self) -> QueryData {
        QueryData::AccountBalance {
            account_id: self.account_id.unwrap_or_default(),
        }
    }

    fn map_answer(
        &self,
        answer: QueryAnswer,
        _policy: &StatusPolicy,
    ) -> std::result::Result<Balance, CodecError> {
        match answer {
            QueryAnswer::AccountBalance { balance, .. } => Ok(balance),
            _ => Err(CodecError::UnexpectedAnswer {
                expected: "AccountBalance",
            }),
        }
    }
}

// =============================================================================
// ACCOUNT INFO (paid)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfoQuery {
    pub account_id: Option<AccountId>,
}

impl AccountInfoQuery {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
        }
    }
}

impl QueryKind for AccountInfoQuery {
    const NAME: &'static str = "AccountInfoQuery";
    const PAID: bool = true;
    type Output = AccountInfo;

    fn validate(&self) -> Result<()> {
        match self.account_id {
            Some(_) => Ok(()),
            None => Err(Error::missing(Self::NAME, "account_id")),
        }
    }

    fn data(&self) -> QueryData {
        QueryData::AccountInfo {
            account_id: self.account_id.unwrap_or_default(),
        }
    }

    fn map_answer(
        &self,
        answer: QueryAnswer,
        _policy: &StatusPolicy,
    ) -> std::result::Result<AccountInfo, CodecError> {
        match answer {
            QueryAnswer::AccountInfo(info) => Ok(info),
            _ => Err(CodecError::UnexpectedAnswer {
                expected: "AccountInfo",
            }),
        }
    }
}

// =============================================================================
// TRANSACTION RECEIPT (free, polled)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceiptQuery {
    pub operation_id: OperationId,
}

impl TransactionReceiptQuery {
    pub fn new(operation_id: OperationId) -> Self {
        Self { operation_id }
    }
}

impl QueryKind for TransactionReceiptQuery {
    const NAME: &'static str = "TransactionReceiptQuery";
    const PAID: bool = false;
    type Output = Poll<Receipt>;

    fn data(&self) -> QueryData {
        QueryData::Receipt {
            operation_id: self.operation_id,
        }
    }

    fn operation_id(&self) -> Option<OperationId> {
        Some(self.operation_id)
    }

    fn map_answer(
        &self,
        answer: QueryAnswer,
        policy: &StatusPolicy,
    ) -> std::result::Result<Poll<Receipt>, CodecError> {
        match answer {
            QueryAnswer::Receipt(receipt) if policy.is_pending(receipt.status) => {
                Ok(Poll::Pending(receipt.status))
            }
            QueryAnswer::Receipt(receipt) => Ok(Poll::Ready(receipt)),
            _ => Err(CodecError::UnexpectedAnswer { expected: "Receipt" }),
        }
    }

    fn interpret(
        &self,
        response: QueryResponse,
        policy: &StatusPolicy,
    ) -> std::result::Result<Interpretation<Poll<Receipt>>, CodecError> {
        interpret_poll(self, response, policy)
    }
}

// =============================================================================
// TRANSACTION RECORD (paid, polled)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecordQuery {
    pub operation_id: OperationId,
}

impl TransactionRecordQuery {
    pub fn new(operation_id: OperationId) -> Self {
        Self { operation_id }
    }
}

impl QueryKind for TransactionRecordQuery {
    const NAME: &'static str = "TransactionRecordQuery";
    const PAID: bool = true;
    type Output = Poll<Record>;

    fn data(&self) -> QueryData {
        QueryData::Record {
            operation_id: self.operation_id,
        }
    }

    fn operation_id(&self) -> Option<OperationId> {
        Some(self.operation_id)
    }

    fn map_answer(
        &self,
        answer: QueryAnswer,
        policy: &StatusPolicy,
    ) -> std::result::Result<Poll<Record>, CodecError> {
        match answer {
            QueryAnswer::Record(record) if policy.is_pending(record.receipt.status) => {
                Ok(Poll::Pending(record.receipt.status))
            }
            QueryAnswer::Record(record) => Ok(Poll::Ready(record)),
            _ => Err(CodecError::UnexpectedAnswer { expected: "Record" }),
        }
    }

    fn interpret(
        &self,
        response: QueryResponse,
        policy: &StatusPolicy,
    ) -> std::result::Result<Interpretation<Poll<Record>>, CodecError> {
        interpret_poll(self, response, policy)
    }
}

// =============================================================================
// ADDRESS BOOK (free, discovery)
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressBookQuery;

impl QueryKind for AddressBookQuery {
    const NAME: &'static str = "AddressBookQuery";
    const PAID: bool = false;
    type Output = Vec<NodeAddress>;

    fn data(&self) -> QueryData {
        QueryData::AddressBook
    }

    fn map_answer(
        &self,
        answer: QueryAnswer,
        _policy: &StatusPolicy,
    ) -> std::result::Result<Vec<NodeAddress>, CodecError> {
        match answer {
            QueryAnswer::AddressBook(nodes) => Ok(nodes),
            _ => Err(CodecError::UnexpectedAnswer {
                expected: "AddressBook",
            }),
        }
    }
}
