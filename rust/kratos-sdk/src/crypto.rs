// Cryptographic primitives for the SDK
// - Ed25519 keys and signatures
// - Key handles: local keys, external signing callbacks, threshold groups

use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Domain separator for payload signatures
pub const DOMAIN_PAYLOAD: &[u8] = b"KRATOS_SDK_PAYLOAD_V1:";

/// Create a domain-separated message for signing
#[inline]
pub fn domain_separate(domain: &[u8], message: &[u8]) -> Vec<u8> {
    let mut separated = Vec::with_capacity(domain.len() + message.len());
    separated.extend_from_slice(domain);
    separated.extend_from_slice(message);
    separated
}

// =============================================================================
// KEYS
// =============================================================================

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| Error::Keystore(format!("invalid public key: {}", e)))?;
        Ok(Self(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify `signature` over `message`
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let key = match VerifyingKey::from_bytes(&self.0) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = decode_hex32(s)?;
        Self::from_bytes(bytes)
    }
}

/// Ed25519 signature (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 64] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        Signature::from_slice(&bytes)
            .ok_or_else(|| serde::de::Error::custom("Signature must be 64 bytes"))
    }
}

/// Ed25519 private key held in memory
#[derive(Clone)]
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    /// Generate new random key
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from existing secret key bytes
    pub fn from_bytes(secret: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Secret key bytes (USE WITH CAUTION)
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message
    pub fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl FromStr for PrivateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::from_bytes(decode_hex32(s)?))
    }
}

fn decode_hex32(s: &str) -> Result<[u8; 32]> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|e| Error::Keystore(format!("invalid hex: {}", e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::Keystore(format!("invalid key length: {} bytes (expected 32)", bytes.len()))
    })
}

// =============================================================================
// KEY HANDLES
// =============================================================================

/// Anything that can produce a signature for one public key.
///
/// Signing is synchronous and CPU-bound; handles backed by remote devices
/// must block inside `sign` rather than suspend.
pub trait KeyHandle: Send + Sync + fmt::Debug {
    fn public_key(&self) -> PublicKey;

    fn sign(&self, message: &[u8]) -> Result<Signature>;
}

impl KeyHandle for PrivateKey {
    fn public_key(&self) -> PublicKey {
        PrivateKey::public_key(self)
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.sign_message(message))
    }
}

/// Signing callback supplied by the caller (hardware wallets, remote signers)
pub type SignCallback = dyn Fn(&[u8]) -> std::result::Result<Vec<u8>, String> + Send + Sync;

/// Key handle that delegates signing to an external callback
#[derive(Clone)]
pub struct CallbackKey {
    public_key: PublicKey,
    callback: Arc<SignCallback>,
}

impl CallbackKey {
    pub fn new<F>(public_key: PublicKey, callback: F) -> Self
    where
        F: Fn(&[u8]) -> std::result::Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        Self {
            public_key,
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CallbackKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl KeyHandle for CallbackKey {
    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign(&self, message: &[u8]) -> Result<Signature> {
        let signing_error = |reason: String| Error::Signing {
            public_key: self.public_key.to_string(),
            reason,
        };

        let bytes = (self.callback)(message).map_err(signing_error)?;
        let signature = Signature::from_slice(&bytes).ok_or_else(|| {
            signing_error(format!("callback returned {} bytes, expected 64", bytes.len()))
        })?;

        // A callback bound to the wrong key would otherwise only fail at the node
        if !self.public_key.verify(message, &signature) {
            return Err(signing_error("callback signature does not verify".to_string()));
        }
        Ok(signature)
    }
}

/// Threshold group: at least `threshold` members must sign
#[derive(Debug, Clone)]
pub struct KeyGroup {
    threshold: usize,
    members: Vec<Arc<dyn KeyHandle>>,
}

impl KeyGroup {
    pub fn new(threshold: usize, members: Vec<Arc<dyn KeyHandle>>) -> Result<Self> {
        if threshold == 0 || threshold > members.len() {
            return Err(Error::invalid(
                "KeyGroup",
                format!("threshold {} with {} members", threshold, members.len()),
            ));
        }
        Ok(Self { threshold, members })
    }

    /// Group where every member must sign
    pub fn all_of(members: Vec<Arc<dyn KeyHandle>>) -> Result<Self> {
        Self::new(members.len(), members)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn members(&self) -> &[Arc<dyn KeyHandle>] {
        &self.members
    }
}
