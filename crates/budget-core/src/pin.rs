//! PIN setup and verification.
//!
//! Only a PBKDF2 digest of the PIN is stored, salted with a PIN-specific
//! salt that is never used for data keys.

use subtle::ConstantTimeEq;
use tracing::{debug, info};

use crate::crypto::{b64_decode, b64_encode, pbkdf2_sha256, PIN_DIGEST_ITERATIONS, SALT_LEN};
use crate::error::{SecurityError, StorageError};
use crate::salt::ensure_random_value;
use crate::storage::KeyValueStore;

pub const PIN_HASH_KEY: &str = "secure:pin_hash";
pub const PIN_SALT_KEY: &str = "secure:pin_salt";

pub const PIN_MIN_DIGITS: usize = 4;
pub const PIN_MAX_DIGITS: usize = 6;

/// `^[0-9]{4,6}$`
pub fn is_valid_pin(pin: &str) -> bool {
    (PIN_MIN_DIGITS..=PIN_MAX_DIGITS).contains(&pin.len())
        && pin.bytes().all(|b| b.is_ascii_digit())
}

pub struct PinAuthenticator<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> PinAuthenticator<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn set_pin(&self, pin: &str) -> Result<(), SecurityError> {
        if !is_valid_pin(pin) {
            return Err(SecurityError::InvalidPinFormat);
        }
        let salt = ensure_random_value::<SALT_LEN>(self.store, PIN_SALT_KEY)?;
        let digest = pbkdf2_sha256(pin.as_bytes(), &salt, PIN_DIGEST_ITERATIONS);
        self.store.set(PIN_HASH_KEY, &b64_encode(&digest[..]))?;
        info!("PIN verifier stored");
        Ok(())
    }

    pub fn has_pin(&self) -> Result<bool, StorageError> {
        self.store.contains(PIN_HASH_KEY)
    }

    /// Fails closed: a missing digest or salt, or an undecodable salt,
    /// verifies as `false`. Only storage unavailability is an error.
    pub fn verify_pin(&self, pin: &str) -> Result<bool, StorageError> {
        let Some(stored) = self.store.get(PIN_HASH_KEY)? else {
            return Ok(false);
        };
        let Some(salt_b64) = self.store.get(PIN_SALT_KEY)? else {
            return Ok(false);
        };
        let Ok(salt) = b64_decode(&salt_b64) else {
            debug!("PIN salt undecodable; verification fails closed");
            return Ok(false);
        };
        let digest = pbkdf2_sha256(pin.as_bytes(), &salt, PIN_DIGEST_ITERATIONS);
        let candidate = b64_encode(&digest[..]);
        Ok(bool::from(candidate.as_bytes().ct_eq(stored.as_bytes())))
    }

    pub fn clear_pin(&self) -> Result<(), StorageError> {
        self.store.remove(PIN_HASH_KEY)?;
        self.store.remove(PIN_SALT_KEY)?;
        info!("PIN verifier cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salt::MASTER_SALT_KEY;
    use crate::storage::MemoryStore;

    #[test]
    fn format_gate() {
        let store = MemoryStore::new();
        let pins = PinAuthenticator::new(&store);
        for bad in ["123", "1234567", "12a4", "", " 1234", "１２３４"] {
            assert!(
                matches!(pins.set_pin(bad), Err(SecurityError::InvalidPinFormat)),
                "{bad:?} should be rejected"
            );
        }
        assert!(!pins.has_pin().unwrap());
        assert!(store.keys().unwrap().is_empty());
        pins.set_pin("1234").unwrap();
        pins.set_pin("123456").unwrap();
        assert!(pins.has_pin().unwrap());
    }

    #[test]
    fn verification_correctness() {
        let store = MemoryStore::new();
        let pins = PinAuthenticator::new(&store);
        assert!(!pins.verify_pin("4242").unwrap());
        pins.set_pin("4242").unwrap();
        assert!(pins.verify_pin("4242").unwrap());
        assert!(!pins.verify_pin("0000").unwrap());
    }

    #[test]
    fn raw_pin_is_never_stored() {
        let store = MemoryStore::new();
        PinAuthenticator::new(&store).set_pin("987654").unwrap();
        for key in store.keys().unwrap() {
            let value = store.get(&key).unwrap().unwrap();
            assert!(!value.contains("987654"));
        }
        let digest = b64_decode(&store.get(PIN_HASH_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn pin_salt_is_separate_from_master_salt() {
        let store = MemoryStore::new();
        PinAuthenticator::new(&store).set_pin("1111").unwrap();
        assert!(store.get(PIN_SALT_KEY).unwrap().is_some());
        assert!(store.get(MASTER_SALT_KEY).unwrap().is_none());
    }

    #[test]
    fn reset_overwrites_digest_but_keeps_salt() {
        let store = MemoryStore::new();
        let pins = PinAuthenticator::new(&store);
        pins.set_pin("1111").unwrap();
        let salt = store.get(PIN_SALT_KEY).unwrap();
        pins.set_pin("2222").unwrap();
        assert_eq!(store.get(PIN_SALT_KEY).unwrap(), salt);
        assert!(!pins.verify_pin("1111").unwrap());
        assert!(pins.verify_pin("2222").unwrap());
    }

    #[test]
    fn clear_returns_to_first_run() {
        let store = MemoryStore::new();
        let pins = PinAuthenticator::new(&store);
        pins.set_pin("1234").unwrap();
        pins.clear_pin().unwrap();
        assert!(!pins.has_pin().unwrap());
        assert!(!pins.verify_pin("1234").unwrap());
        assert!(store.get(PIN_SALT_KEY).unwrap().is_none());
    }

    #[test]
    fn missing_salt_fails_closed() {
        let store = MemoryStore::new();
        let pins = PinAuthenticator::new(&store);
        pins.set_pin("1234").unwrap();
        store.remove(PIN_SALT_KEY).unwrap();
        assert!(!pins.verify_pin("1234").unwrap());
    }
}
