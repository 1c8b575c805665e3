//! PIN → data-encryption key.
//!
//! PBKDF2-HMAC-SHA256, 150 000 iterations, over the PIN and the *master*
//! salt. The PIN verifier salt is never an input here.

use tracing::debug;

use crate::crypto::{pbkdf2_sha256, EncryptionKey, KEY_DERIVATION_ITERATIONS};
use crate::error::StorageError;
use crate::salt::{Salt, SaltStore};
use crate::storage::KeyValueStore;

/// Derive the session key. Without an explicit `salt` the master salt is
/// loaded (and created on first use).
pub fn derive_key_from_pin(
    store: &dyn KeyValueStore,
    pin: &str,
    salt: Option<&Salt>,
) -> Result<EncryptionKey, StorageError> {
    let salt = match salt {
        Some(salt) => *salt,
        None => SaltStore::new(store).ensure_salt()?,
    };
    Ok(derive_with_salt(pin, &salt))
}

pub fn derive_with_salt(pin: &str, salt: &Salt) -> EncryptionKey {
    let bytes = pbkdf2_sha256(pin.as_bytes(), salt.as_bytes(), KEY_DERIVATION_ITERATIONS);
    debug!(iterations = KEY_DERIVATION_ITERATIONS, "derived data key");
    EncryptionKey::from_bytes(bytes)
}
