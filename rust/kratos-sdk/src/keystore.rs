// Keystore - password-encrypted operator key on disk
//
// Argon2 derives the cipher key from the password; the secret key is sealed
// with AES-256-GCM. The file is JSON and, on unix, readable by the owner only.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{PrivateKey, PublicKey};
use crate::error::{Error, Result};
use crate::types::AccountId;

pub const KEYSTORE_FILENAME: &str = "operator.json";

const KEYSTORE_VERSION: u32 = 1;

/// On-disk keystore layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKey {
    /// Encrypted secret key (32 bytes + AES-GCM tag)
    pub encrypted_secret: Vec<u8>,
    pub salt: String,
    pub nonce: [u8; 12],
    /// Checked after decryption
    pub public_key: PublicKey,
    /// Account the key operates, if known
    #[serde(default)]
    pub account_id: Option<AccountId>,
    pub version: u32,
}

/// Derive the cipher key from a password
pub fn derive_key(password: &str, salt: &str) -> Result<[u8; 32]> {
    let salt = SaltString::from_b64(salt)
        .map_err(|e| Error::Keystore(format!("invalid salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Keystore(format!("key derivation failed: {}", e)))?;
    let output = hash
        .hash
        .ok_or_else(|| Error::Keystore("key derivation produced no output".to_string()))?;

    let bytes = output.as_bytes();
    if bytes.len() < 32 {
        return Err(Error::Keystore("key derivation output too short".to_string()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[..32]);
    Ok(key)
}

/// Seal `key` under `password`
pub fn encrypt_key(
    key: &PrivateKey,
    account_id: Option<AccountId>,
    password: &str,
) -> Result<EncryptedKey> {
    let salt = SaltString::generate(&mut OsRng).as_str().to_string();
    let cipher_key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&cipher_key)
        .map_err(|e| Error::Keystore(format!("cipher error: {}", e)))?;

    let mut nonce_bytes = [0u8; 12];
    rand::Rng::fill(&mut OsRng, &mut nonce_bytes);

    let encrypted_secret = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), key.to_bytes().as_ref())
        .map_err(|e| Error::Keystore(format!("encryption failed: {}", e)))?;

    Ok(EncryptedKey {
        encrypted_secret,
        salt,
        nonce: nonce_bytes,
        public_key: key.public_key(),
        account_id,
        version: KEYSTORE_VERSION,
    })
}

/// Open a sealed key
pub fn decrypt_key(sealed: &EncryptedKey, password: &str) -> Result<PrivateKey> {
    let cipher_key = derive_key(password, &sealed.salt)?;
    let cipher = Aes256Gcm::new_from_slice(&cipher_key)
        .map_err(|e| Error::Keystore(format!("cipher error: {}", e)))?;

    let decrypted = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.encrypted_secret.as_ref())
        .map_err(|_| Error::Keystore("invalid password or corrupted keystore".to_string()))?;

    let secret: [u8; 32] = decrypted
        .try_into()
        .map_err(|_| Error::Keystore("invalid decrypted key length".to_string()))?;
    let key = PrivateKey::from_bytes(secret);

    if key.public_key() != sealed.public_key {
        return Err(Error::Keystore("key verification failed".to_string()));
    }
    Ok(key)
}

/// Keystore directory manager
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// `~/.kratos-sdk`, falling back to the working directory
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".kratos-sdk"))
            .unwrap_or_else(|| PathBuf::from(".kratos-sdk"))
    }

    fn path(&self) -> PathBuf {
        self.dir.join(KEYSTORE_FILENAME)
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn save(
        &self,
        key: &PrivateKey,
        account_id: Option<AccountId>,
        password: &str,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Keystore(format!("failed to create keystore directory: {}", e)))?;

        let sealed = encrypt_key(key, account_id, password)?;
        let json = serde_json::to_string_pretty(&sealed)
            .map_err(|e| Error::Keystore(format!("serialization error: {}", e)))?;

        write_private(&self.path(), json.as_bytes())
    }

    /// Decrypt the stored key and return it with its account id
    pub fn load(&self, password: &str) -> Result<(PrivateKey, Option<AccountId>)> {
        let sealed = self.read()?;
        let key = decrypt_key(&sealed, password)?;
        Ok((key, sealed.account_id))
    }

    /// Public part of the keystore, no password needed
    pub fn info(&self) -> Result<(PublicKey, Option<AccountId>)> {
        let sealed = self.read()?;
        Ok((sealed.public_key, sealed.account_id))
    }

    fn read(&self) -> Result<EncryptedKey> {
        let json = fs::read_to_string(self.path())
            .map_err(|e| Error::Keystore(format!("failed to read keystore: {}", e)))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Keystore(format!("invalid keystore format: {}", e)))
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| Error::Keystore(format!("failed to create keystore file: {}", e)))?;

        file.write_all(bytes)
            .map_err(|e| Error::Keystore(format!("failed to write keystore file: {}", e)))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, bytes)
            .map_err(|e| Error::Keystore(format!("failed to write keystore file: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let keystore = Keystore::new(dir.path());
        let key = PrivateKey::generate();
        let account = AccountId::from_num(1001);

        keystore.save(&key, Some(account), "test_password").unwrap();
        assert!(keystore.exists());

        let (loaded, loaded_account) = keystore.load("test_password").unwrap();
        assert_eq!(loaded.public_key(), key.public_key());
        assert_eq!(loaded_account, Some(account));

        let (public_key, _) = keystore.info().unwrap();
        assert_eq!(public_key, key.public_key());
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempdir().unwrap();
        let keystore = Keystore::new(dir.path());
        keystore.save(&PrivateKey::generate(), None, "correct").unwrap();

        assert!(matches!(keystore.load("wrong"), Err(Error::Keystore(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let keystore = Keystore::new(dir.path());
        keystore.save(&PrivateKey::generate(), None, "pw").unwrap();

        let mode = fs::metadata(dir.path().join(KEYSTORE_FILENAME))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_keystore() {
        let dir = tempdir().unwrap();
        let keystore = Keystore::new(&dir.path().join("nope"));
        assert!(!keystore.exists());
        assert!(keystore.load("pw").is_err());
    }
}
