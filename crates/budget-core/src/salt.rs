//! Generate-once, persist-forever random values.
//!
//! Both the master salt (data keys) and the PIN salt (verifier digest) use
//! [`ensure_random_value`]; they only differ by storage key.

use tracing::{debug, info};

use crate::crypto::{b64_decode, b64_encode, random_bytes, SALT_LEN};
use crate::error::StorageError;
use crate::storage::KeyValueStore;

pub const MASTER_SALT_KEY: &str = "secure:master_salt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Return the `N` random bytes stored (base64) at `key`, generating and
/// persisting them first if absent. A stored value of the wrong shape is
/// reported as corrupt, never replaced.
pub fn ensure_random_value<const N: usize>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<[u8; N], StorageError> {
    if let Some(existing) = store.get(key)? {
        let decoded = b64_decode(&existing).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let len = decoded.len();
        return decoded.try_into().map_err(|_| StorageError::Corrupt {
            key: key.to_string(),
            reason: format!("expected {N} bytes, found {len}"),
        });
    }
    let value = random_bytes::<N>();
    store.set(key, &b64_encode(&value))?;
    info!(key, "generated new random value");
    Ok(value)
}

/// Master salt access for key derivation.
pub struct SaltStore<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> SaltStore<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn ensure_salt(&self) -> Result<Salt, StorageError> {
        let bytes = ensure_random_value::<SALT_LEN>(self.store, MASTER_SALT_KEY)?;
        debug!("master salt ready");
        Ok(Salt(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn salt_is_stable_across_calls() {
        let store = MemoryStore::new();
        let salts = SaltStore::new(&store);
        let first = salts.ensure_salt().unwrap();
        let second = salts.ensure_salt().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.get(MASTER_SALT_KEY).unwrap().unwrap(),
            b64_encode(first.as_bytes())
        );
    }

    #[test]
    fn wiped_storage_yields_new_salt() {
        let store = MemoryStore::new();
        let first = SaltStore::new(&store).ensure_salt().unwrap();
        store.wipe();
        let second = SaltStore::new(&store).ensure_salt().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_salt_is_not_regenerated() {
        let store = MemoryStore::new();
        store.set(MASTER_SALT_KEY, "c2hvcnQ=").unwrap();
        let err = SaltStore::new(&store).ensure_salt().unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
        assert_eq!(
            store.get(MASTER_SALT_KEY).unwrap().as_deref(),
            Some("c2hvcnQ=")
        );
    }
}
