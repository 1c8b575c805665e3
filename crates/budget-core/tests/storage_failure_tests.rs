//! A store that stops answering is fatal: every layer above it reports the
//! failure instead of mistaking it for a wrong PIN or an unreadable record.

use budget_core::kdf::derive_with_salt;
use budget_core::pin::PinAuthenticator;
use budget_core::salt::Salt;
use budget_core::secure_storage::SecureStorage;
use budget_core::{
    AppContext, FileStore, KeyValueStore, LedgerError, MemoryStore, SecurityError, StorageError,
};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// In-memory store that can be switched into failing every call.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyStore {
    fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk gone".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.check()?;
        self.inner.keys()
    }
}

fn unavailable() -> FlakyStore {
    let store = FlakyStore::default();
    store.go_down();
    store
}

#[test]
fn set_pin_reports_unavailable_store() {
    let store = unavailable();
    let err = PinAuthenticator::new(&store).set_pin("1234").unwrap_err();
    assert!(err.is_storage_unavailable(), "{err:?}");
}

#[test]
fn sealed_save_reports_unavailable_store() {
    let store = unavailable();
    let key = derive_with_salt("1234", &Salt([9u8; 16]));
    let err = SecureStorage::new(&store)
        .save_secure("notes", &"payday", &key)
        .unwrap_err();
    assert!(err.is_storage_unavailable(), "{err:?}");
}

#[test]
fn sealed_load_does_not_hide_unavailable_store() {
    let store = FlakyStore::default();
    let key = derive_with_salt("1234", &Salt([9u8; 16]));
    let secure = SecureStorage::new(&store);
    secure.save_secure("notes", &"payday", &key).unwrap();
    store.go_down();

    let err = secure.load_secure::<String>("notes", &key).unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)));
}

#[test]
fn context_open_and_unlock_report_unavailable_store() {
    assert!(matches!(
        AppContext::new(Arc::new(unavailable())),
        Err(StorageError::Unavailable(_))
    ));

    let store = Arc::new(FlakyStore::default());
    let mut ctx = AppContext::new(store.clone()).unwrap();
    ctx.setup_pin("2580").unwrap();
    store.go_down();

    let err = ctx.unlock("2580").unwrap_err();
    assert!(err.is_storage_unavailable(), "{err:?}");
    assert!(!matches!(err, SecurityError::VerificationFailed));
    assert!(ctx.is_locked());
    assert!(ctx.session_key().is_none());
}

#[test]
fn failed_pin_write_on_disk_leaves_no_pin_behind() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let store = Arc::new(FileStore::open(data.join("store.json")).unwrap());
    let mut ctx = AppContext::new(store.clone()).unwrap();

    fs::remove_dir_all(&data).unwrap();

    match ctx.setup_pin("2580").unwrap_err() {
        LedgerError::Security(err) => assert!(err.is_storage_unavailable(), "{err:?}"),
        other => panic!("expected a storage failure, got {other:?}"),
    }
    assert!(!ctx.has_pin().unwrap());
    assert!(!store.contains("secure:pin_salt").unwrap());
}
