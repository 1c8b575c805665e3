//! Encrypted export blobs and remote backup hooks.
//!
//! An export is the same `{iv, ciphertext}` JSON shape as a sealed record,
//! keyed by the PIN and this install's master salt, so it only opens on the
//! device that produced it (or one holding the same store).
//!
//! Implementation status:
//!   - Export / import: complete
//!   - Drive app-data upload / restore: stub, needs an OAuth client

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::SecurityError;
use crate::kdf::derive_key_from_pin;
use crate::secure_storage::{open_raw, seal};
use crate::storage::KeyValueStore;

pub fn encrypt_export<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    payload: &T,
    pin: &str,
) -> Result<String, SecurityError> {
    let key = derive_key_from_pin(store, pin, None)?;
    let blob = serde_json::to_string(&seal(payload, &key)?)?;
    info!(bytes = blob.len(), "export blob created");
    Ok(blob)
}

/// Any failure to parse or open the blob is `DecryptionFailed`.
pub fn decrypt_import<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    exported: &str,
    pin: &str,
) -> Result<T, SecurityError> {
    let key = derive_key_from_pin(store, pin, None)?;
    open_raw(exported, &key).map_err(|_| SecurityError::DecryptionFailed)
}

pub fn upload_to_drive_app_data(
    _encrypted_json: &str,
    _access_token: &str,
) -> Result<(), SecurityError> {
    Err(SecurityError::NotImplemented(
        "Drive app-data upload (requires Google OAuth client integration)",
    ))
}

pub fn restore_from_drive_app_data(_access_token: &str) -> Result<String, SecurityError> {
    Err(SecurityError::NotImplemented(
        "Drive app-data restore (requires Google OAuth client integration)",
    ))
}
