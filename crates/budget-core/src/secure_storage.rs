//! Encrypted records under the `secure:` namespace.
//!
//! Each record is stored as JSON `{iv, ciphertext}` (both base64) and is
//! sealed with a fresh 12-byte IV on every write. Reads never raise on a
//! bad record: wrong key, tampering and malformed JSON all collapse into
//! [`SecureLoad::Inaccessible`]. Only storage failures propagate.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto::{b64_decode, b64_encode, generate_iv, EncryptionKey, IV_LEN};
use crate::error::{SecurityError, StorageError};
use crate::storage::KeyValueStore;

pub const STORAGE_PREFIX: &str = "secure:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurePayload {
    pub iv: String,
    pub ciphertext: String,
    /// Accepted for compatibility; the GCM tag is carried inside `ciphertext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Outcome of reading a sealed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureLoad<T> {
    Found(T),
    Missing,
    Inaccessible,
}

impl<T> SecureLoad<T> {
    /// Collapse to the nullable contract: absent and inaccessible are both `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            SecureLoad::Found(value) => Some(value),
            SecureLoad::Missing | SecureLoad::Inaccessible => None,
        }
    }

    pub fn is_inaccessible(&self) -> bool {
        matches!(self, SecureLoad::Inaccessible)
    }
}

pub fn storage_key(name: &str) -> String {
    format!("{STORAGE_PREFIX}{name}")
}

pub struct SecureStorage<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> SecureStorage<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn save_secure<T: Serialize + ?Sized>(
        &self,
        name: &str,
        data: &T,
        key: &EncryptionKey,
    ) -> Result<(), SecurityError> {
        let payload = seal(data, key)?;
        self.store
            .set(&storage_key(name), &serde_json::to_string(&payload)?)?;
        debug!(record = name, "sealed record written");
        Ok(())
    }

    pub fn load_secure<T: DeserializeOwned>(
        &self,
        name: &str,
        key: &EncryptionKey,
    ) -> Result<SecureLoad<T>, StorageError> {
        let Some(raw) = self.store.get(&storage_key(name))? else {
            return Ok(SecureLoad::Missing);
        };
        match open_raw(&raw, key) {
            Ok(value) => Ok(SecureLoad::Found(value)),
            Err(e) => {
                warn!(record = name, error = %e, "failed to decrypt secure payload");
                Ok(SecureLoad::Inaccessible)
            }
        }
    }

    /// Remove every `secure:` entry: sealed records, both salts and the PIN
    /// verifier.
    pub fn clear_secure(&self) -> Result<usize, StorageError> {
        let doomed: Vec<String> = self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(STORAGE_PREFIX))
            .collect();
        for key in &doomed {
            self.store.remove(key)?;
        }
        info!(removed = doomed.len(), "secure namespace cleared");
        Ok(doomed.len())
    }
}

/// Encrypt `data` as JSON under a fresh IV.
pub fn seal<T: Serialize + ?Sized>(
    data: &T,
    key: &EncryptionKey,
) -> Result<SecurePayload, SecurityError> {
    let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(data)?);
    let iv = generate_iv();
    let ciphertext = key.encrypt(&iv, &plaintext)?;
    Ok(SecurePayload {
        iv: b64_encode(&iv),
        ciphertext: b64_encode(&ciphertext),
        tag: None,
    })
}

pub fn open<T: DeserializeOwned>(
    payload: &SecurePayload,
    key: &EncryptionKey,
) -> Result<T, SecurityError> {
    let iv: [u8; IV_LEN] = b64_decode(&payload.iv)?
        .try_into()
        .map_err(|_| SecurityError::DecryptionFailed)?;
    let ciphertext = b64_decode(&payload.ciphertext)?;
    let plaintext = key.decrypt(&iv, &ciphertext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

pub fn open_raw<T: DeserializeOwned>(raw: &str, key: &EncryptionKey) -> Result<T, SecurityError> {
    let payload: SecurePayload = serde_json::from_str(raw)?;
    open(&payload, key)
}
