// Transaction kinds - transfer, account create, contract execute,
// topic message submit and file append

use super::{ChunkSlice, Transaction, TransactionKind};
use crate::codec::TransactionData;
use crate::crypto::PublicKey;
use crate::error::{Error, Result};
use crate::types::{AccountId, AccountTransfer, Balance, ContractId, FileId, TopicId};

pub type TransferTransaction = Transaction<Transfer>;
pub type AccountCreateTransaction = Transaction<AccountCreate>;
pub type ContractExecuteTransaction = Transaction<ContractExecute>;
pub type TopicMessageSubmitTransaction = Transaction<TopicMessageSubmit>;
pub type FileAppendTransaction = Transaction<FileAppend>;

impl<K: TransactionKind + Default> Default for Transaction<K> {
    fn default() -> Self {
        Self::new(K::default())
    }
}

// =============================================================================
// TRANSFER
// =============================================================================

/// Balance transfers between accounts; amounts must net to zero
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfer {
    pub transfers: Vec<AccountTransfer>,
}

impl TransactionKind for Transfer {
    const NAME: &'static str = "TransferTransaction";

    fn validate(&self) -> Result<()> {
        if self.transfers.is_empty() {
            return Err(Error::missing(Self::NAME, "transfers"));
        }
        let net: i128 = self.transfers.iter().map(|t| t.amount).sum();
        if net != 0 {
            return Err(Error::invalid(
                Self::NAME,
                format!("transfers must net to zero, got {}", net),
            ));
        }
        Ok(())
    }

    fn build_data(&self, _chunk: Option<ChunkSlice<'_>>) -> Result<TransactionData> {
        Ok(TransactionData::Transfer {
            transfers: self.transfers.clone(),
        })
    }
}

impl Transaction<Transfer> {
    /// Signed balance change of one account
    pub fn add_transfer(mut self, account_id: AccountId, amount: i128) -> Self {
        self.kind.transfers.push(AccountTransfer::new(account_id, amount));
        self
    }

    /// Move `amount` from `from` to `to`
    pub fn add_send(self, from: AccountId, to: AccountId, amount: Balance) -> Self {
        self.add_transfer(from, -(amount as i128))
            .add_transfer(to, amount as i128)
    }
}

// =============================================================================
// ACCOUNT CREATE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountCreate {
    pub key: Option<PublicKey>,
    pub initial_balance: Balance,
    pub account_memo: String,
}

impl TransactionKind for AccountCreate {
    const NAME: &'static str = "AccountCreateTransaction";

    fn validate(&self) -> Result<()> {
        if self.key.is_none() {
            return Err(Error::missing(Self::NAME, "key"));
        }
        if self.account_memo.len() > super::MAX_MEMO_BYTES {
            return Err(Error::invalid(Self::NAME, "account memo too long"));
        }
        Ok(())
    }

    fn build_data(&self, _chunk: Option<ChunkSlice<'_>>) -> Result<TransactionData> {
        Ok(TransactionData::AccountCreate {
            key: self.key.ok_or_else(|| Error::missing(Self::NAME, "key"))?,
            initial_balance: self.initial_balance,
            account_memo: self.account_memo.clone(),
        })
    }
}

impl Transaction<AccountCreate> {
    pub fn with_key(mut self, key: PublicKey) -> Self {
        self.kind.key = Some(key);
        self
    }

    pub fn with_initial_balance(mut self, balance: Balance) -> Self {
        self.kind.initial_balance = balance;
        self
    }

    pub fn with_account_memo(mut self, memo: impl Into<String>) -> Self {
        self.kind.account_memo = memo.into();
        self
    }
}

// =============================================================================
// CONTRACT EXECUTE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractExecute {
    pub contract_id: Option<ContractId>,
    pub gas: u64,
    pub amount: Balance,
    pub function_parameters: Vec<u8>,
}

impl TransactionKind for ContractExecute {
    const NAME: &'static str = "ContractExecuteTransaction";

    fn validate(&self) -> Result<()> {
        if self.contract_id.is_none() {
            return Err(Error::missing(Self::NAME, "contract_id"));
        }
        if self.gas == 0 {
            return Err(Error::missing(Self::NAME, "gas"));
        }
        Ok(())
    }

    fn build_data(&self, _chunk: Option<ChunkSlice<'_>>) -> Result<TransactionData> {
        Ok(TransactionData::ContractExecute {
            contract_id: self
                .contract_id
                .ok_or_else(|| Error::missing(Self::NAME, "contract_id"))?,
            gas: self.gas,
            amount: self.amount,
            function_parameters: self.function_parameters.clone(),
        })
    }
}

impl Transaction<ContractExecute> {
    pub fn with_contract_id(mut self, contract_id: ContractId) -> Self {
        self.kind.contract_id = Some(contract_id);
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.kind.gas = gas;
        self
    }

    pub fn with_payable_amount(mut self, amount: Balance) -> Self {
        self.kind.amount = amount;
        self
    }

    pub fn with_function_parameters(mut self, parameters: Vec<u8>) -> Self {
        self.kind.function_parameters = parameters;
        self
    }
}

// =============================================================================
// TOPIC MESSAGE SUBMIT (chunked)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMessageSubmit {
    pub topic_id: Option<TopicId>,
    pub message: Vec<u8>,
}

impl TransactionKind for TopicMessageSubmit {
    const NAME: &'static str = "TopicMessageSubmitTransaction";

    fn validate(&self) -> Result<()> {
        if self.topic_id.is_none() {
            return Err(Error::missing(Self::NAME, "topic_id"));
        }
        if self.message.is_empty() {
            return Err(Error::missing(Self::NAME, "message"));
        }
        Ok(())
    }

    fn chunked_content(&self) -> Option<&[u8]> {
        Some(&self.message)
    }

    fn build_data(&self, chunk: Option<ChunkSlice<'_>>) -> Result<TransactionData> {
        Ok(TransactionData::TopicMessageSubmit {
            topic_id: self
                .topic_id
                .ok_or_else(|| Error::missing(Self::NAME, "topic_id"))?,
            message: chunk.map(|c| c.content.to_vec()).unwrap_or_default(),
            chunk_info: chunk.map(|c| c.info),
        })
    }
}

impl Transaction<TopicMessageSubmit> {
    pub fn with_topic_id(mut self, topic_id: TopicId) -> Self {
        self.kind.topic_id = Some(topic_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<Vec<u8>>) -> Self {
        self.kind.message = message.into();
        self
    }
}

// =============================================================================
// FILE APPEND (chunked)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAppend {
    pub file_id: Option<FileId>,
    pub contents: Vec<u8>,
}

impl TransactionKind for FileAppend {
    const NAME: &'static str = "FileAppendTransaction";

    fn validate(&self) -> Result<()> {
        if self.file_id.is_none() {
            return Err(Error::missing(Self::NAME, "file_id"));
        }
        if self.contents.is_empty() {
            return Err(Error::missing(Self::NAME, "contents"));
        }
        Ok(())
    }

    fn chunked_content(&self) -> Option<&[u8]> {
        Some(&self.contents)
    }

    fn build_data(&self, chunk: Option<ChunkSlice<'_>>) -> Result<TransactionData> {
        Ok(TransactionData::FileAppend {
            file_id: self
                .file_id
                .ok_or_else(|| Error::missing(Self::NAME, "file_id"))?,
            contents: chunk.map(|c| c.content.to_vec()).unwrap_or_default(),
            chunk_info: chunk.map(|c| c.info),
        })
    }
}

impl Transaction<FileAppend> {
    pub fn with_file_id(mut self, file_id: FileId) -> Self {
        self.kind.file_id = Some(file_id);
        self
    }

    pub fn with_contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.kind.contents = contents.into();
        self
    }
}
