// Signer - produces signature pairs over frozen payload bodies

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::crypto::{domain_separate, KeyGroup, KeyHandle, PublicKey, Signature, DOMAIN_PAYLOAD};
use crate::error::{Error, Result};
use crate::frame::FrozenPayload;

/// One public key and its signature over a payload body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl SignaturePair {
    /// Check the signature against the body it claims to cover
    pub fn verify(&self, body_bytes: &[u8]) -> bool {
        self.public_key
            .verify(&signing_message(body_bytes), &self.signature)
    }
}

/// Bytes actually signed for a body
pub fn signing_message(body_bytes: &[u8]) -> Vec<u8> {
    domain_separate(DOMAIN_PAYLOAD, body_bytes)
}

/// Sign `body_bytes` with one handle
pub fn sign_body(handle: &dyn KeyHandle, body_bytes: &[u8]) -> Result<SignaturePair> {
    let signature = handle.sign(&signing_message(body_bytes))?;
    Ok(SignaturePair {
        public_key: handle.public_key(),
        signature,
    })
}

#[derive(Debug, Clone)]
enum SignerEntry {
    Single(Arc<dyn KeyHandle>),
    Group(KeyGroup),
}

/// Ordered set of key handles and groups
#[derive(Debug, Clone, Default)]
pub struct Signer {
    entries: Vec<SignerEntry>,
}

impl Signer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, handle: Arc<dyn KeyHandle>) -> &mut Self {
        self.entries.push(SignerEntry::Single(handle));
        self
    }

    pub fn add_group(&mut self, group: KeyGroup) -> &mut Self {
        self.entries.push(SignerEntry::Group(group));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signatures for every registered handle over `payload`.
    ///
    /// A failing single key fails the whole call. Inside a group, failing
    /// members are skipped as long as the threshold is still met.
    pub fn sign(&self, payload: &FrozenPayload) -> Result<Vec<SignaturePair>> {
        self.sign_bytes(payload.body_bytes())
    }

    pub fn sign_bytes(&self, body_bytes: &[u8]) -> Result<Vec<SignaturePair>> {
        let mut pairs = Vec::new();
        for entry in &self.entries {
            match entry {
                SignerEntry::Single(handle) => pairs.push(sign_body(handle.as_ref(), body_bytes)?),
                SignerEntry::Group(group) => pairs.extend(sign_group(group, body_bytes)?),
            }
        }
        Ok(pairs)
    }
}

fn sign_group(group: &KeyGroup, body_bytes: &[u8]) -> Result<Vec<SignaturePair>> {
    let mut pairs = Vec::with_capacity(group.members().len());
    let mut last_failure = None;

    for member in group.members() {
        match sign_body(member.as_ref(), body_bytes) {
            Ok(pair) => pairs.push(pair),
            Err(e) => {
                warn!("Group member {} failed to sign: {}", member.public_key(), e);
                last_failure = Some(e);
            }
        }
    }

    if pairs.len() < group.threshold() {
        let reason = match last_failure {
            Some(e) => format!(
                "{} of {} required signatures ({})",
                pairs.len(),
                group.threshold(),
                e
            ),
            None => format!("{} of {} required signatures", pairs.len(), group.threshold()),
        };
        return Err(Error::Signing {
            public_key: format!("group of {}", group.members().len()),
            reason,
        });
    }
    Ok(pairs)
}
