// Request frames - frozen, signable payloads and content chunking

use sha2::{Digest, Sha384};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::{self, SignedEnvelope, TransactionBody};
use crate::error::{CodecError, Error, Result};
use crate::operation_id::{OperationId, MAX_CHUNKS_PER_OPERATION};
use crate::signer::SignaturePair;
use crate::types::{AccountId, Timestamp};

/// Immutable body bytes frozen for one node.
///
/// Only the signature list can change after construction.
#[derive(Debug, Clone)]
pub struct FrozenPayload {
    operation_id: OperationId,
    node_account_id: AccountId,
    valid_start: Timestamp,
    valid_duration: Duration,
    body_bytes: Arc<[u8]>,
    signatures: Vec<SignaturePair>,
}

impl FrozenPayload {
    /// Freeze `body`; the envelope fields are read from the body itself
    pub fn freeze(body: &TransactionBody) -> std::result::Result<Self, CodecError> {
        let body_bytes = codec::encode(body)?;
        Ok(Self {
            operation_id: body.operation_id,
            node_account_id: body.node_account_id,
            valid_start: body.operation_id.valid_start,
            valid_duration: Duration::from_secs(body.valid_duration_secs),
            body_bytes: body_bytes.into(),
            signatures: Vec::new(),
        })
    }

    pub fn operation_id(&self) -> OperationId {
        self.operation_id
    }

    pub fn node_account_id(&self) -> AccountId {
        self.node_account_id
    }

    pub fn valid_start(&self) -> Timestamp {
        self.valid_start
    }

    pub fn valid_duration(&self) -> Duration {
        self.valid_duration
    }

    /// End of the validity window
    pub fn valid_until(&self) -> Timestamp {
        self.valid_start.plus(self.valid_duration)
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn signatures(&self) -> &[SignaturePair] {
        &self.signatures
    }

    pub fn is_signed_by(&self, public_key: &crate::crypto::PublicKey) -> bool {
        self.signatures.iter().any(|p| &p.public_key == public_key)
    }

    /// Attach signatures; a key that already signed is not added twice
    pub fn add_signatures<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = SignaturePair>,
    {
        for pair in pairs {
            if !self.is_signed_by(&pair.public_key) {
                self.signatures.push(pair);
            }
        }
    }

    /// SHA-384 of the body bytes; the network's transaction hash
    pub fn hash(&self) -> [u8; 48] {
        let digest = Sha384::digest(&self.body_bytes[..]);
        let mut hash = [0u8; 48];
        hash.copy_from_slice(&digest);
        hash
    }

    pub fn to_envelope(&self) -> SignedEnvelope {
        SignedEnvelope {
            body_bytes: self.body_bytes.to_vec(),
            signatures: self.signatures.clone(),
        }
    }

    /// Wire bytes of the signed envelope
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, CodecError> {
        codec::encode(&self.to_envelope())
    }
}

/// Split `content` into `chunk_size` pieces.
///
/// Empty content yields one empty chunk. More than `max_chunks` pieces, or
/// more than one operation id can derive, is a local validation failure.
pub fn split_chunks<'a>(
    operation: &'static str,
    content: &'a [u8],
    chunk_size: usize,
    max_chunks: usize,
) -> Result<Vec<&'a [u8]>> {
    if chunk_size == 0 {
        return Err(Error::invalid(operation, "chunk size must be positive"));
    }
    if content.is_empty() {
        return Ok(vec![content]);
    }

    let max_chunks = max_chunks.min(MAX_CHUNKS_PER_OPERATION as usize);
    let chunks: Vec<&[u8]> = content.chunks(chunk_size).collect();
    if chunks.len() > max_chunks {
        return Err(Error::invalid(
            operation,
            format!(
                "content of {} bytes needs {} chunks, more than the maximum of {}",
                content.len(),
                chunks.len(),
                max_chunks
            ),
        ));
    }
    Ok(chunks)
}
