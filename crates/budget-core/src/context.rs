//! Application context: owns the store handle, the lock controller and the
//! session key. Constructed once at startup and passed to every UI surface.

use std::sync::Arc;
use tracing::{info, warn};

use crate::backup;
use crate::crypto::EncryptionKey;
use crate::error::{SecurityError, StorageError};
use crate::kdf::derive_key_from_pin;
use crate::ledger::{self, BudgetStore, LedgerError, LedgerSnapshot};
use crate::lock::{LifecycleSignal, LockController, LockState};
use crate::pin::PinAuthenticator;
use crate::secure_storage::SecureStorage;
use crate::settings;
use crate::storage::KeyValueStore;

pub struct AppContext {
    store: Arc<dyn KeyValueStore>,
    lock: LockController,
}

impl AppContext {
    /// Starts `Locked` when a PIN is configured, `Unlocked` otherwise.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let has_pin = PinAuthenticator::new(store.as_ref()).has_pin()?;
        Ok(Self {
            store,
            lock: LockController::new(has_pin),
        })
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn pins(&self) -> PinAuthenticator<'_> {
        PinAuthenticator::new(self.store.as_ref())
    }

    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn has_pin(&self) -> Result<bool, StorageError> {
        self.pins().has_pin()
    }

    pub fn session_key(&self) -> Option<&EncryptionKey> {
        self.lock.session_key()
    }

    pub fn handle_signal(&mut self, signal: LifecycleSignal) -> LockState {
        self.lock.handle(signal)
    }

    pub fn lock(&mut self) {
        self.lock.lock();
    }

    /// Store a new PIN verifier and lock, so the next unlock derives the
    /// session key from it. Replacing an existing PIN needs an unlocked
    /// session; sealed collections are re-keyed under the new PIN.
    pub fn setup_pin(&mut self, pin: &str) -> Result<(), LedgerError> {
        if !crate::pin::is_valid_pin(pin) {
            return Err(SecurityError::InvalidPinFormat.into());
        }
        if self.has_pin()? {
            self.require_unlocked()?;
        }
        let sealed = settings::encrypt_at_rest(self.store())?;
        if sealed {
            let old_key = self.require_key()?;
            ledger::unseal_collections(self.store(), old_key)?;
        }
        self.pins().set_pin(pin)?;
        if sealed {
            let new_key = derive_key_from_pin(self.store(), pin, None)?;
            ledger::seal_collections(self.store(), &new_key)?;
        }
        self.lock.lock();
        Ok(())
    }

    /// Drop the PIN, unsealing any sealed collections first. Needs an
    /// unlocked session; afterwards the app behaves as on first run.
    pub fn remove_pin(&mut self) -> Result<(), LedgerError> {
        self.require_unlocked()?;
        if !self.has_pin()? {
            return Ok(());
        }
        if settings::encrypt_at_rest(self.store())? {
            ledger::unseal_collections(self.store(), self.require_key()?)?;
        }
        self.pins().clear_pin()?;
        self.lock.reset();
        Ok(())
    }

    /// Verify the PIN and, on success, derive and hold the session key.
    pub fn unlock(&mut self, pin: &str) -> Result<(), SecurityError> {
        if !crate::pin::is_valid_pin(pin) {
            return Err(SecurityError::InvalidPinFormat);
        }
        if !self.pins().verify_pin(pin)? {
            warn!("PIN verification failed");
            return Err(SecurityError::VerificationFailed);
        }
        let key = derive_key_from_pin(self.store(), pin, None)?;
        self.lock.unlock(key);
        Ok(())
    }

    /// Full local wipe: every `secure:` record, the PIN, the encryption flag.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        SecureStorage::new(self.store()).clear_secure()?;
        self.pins().clear_pin()?;
        settings::set_encrypt_at_rest(self.store(), false)?;
        self.store.remove(ledger::INITIALIZED_KEY)?;
        self.lock.reset();
        info!("local data wiped");
        Ok(())
    }

    fn require_key(&self) -> Result<&EncryptionKey, SecurityError> {
        self.lock.session_key().ok_or(SecurityError::Locked)
    }

    fn require_unlocked(&self) -> Result<(), SecurityError> {
        if self.lock.is_locked() {
            Err(SecurityError::Locked)
        } else {
            Ok(())
        }
    }

    /// Ledger handle for the current session. Refused while locked; sealed
    /// when encryption at rest is on.
    pub fn ledger(&self) -> Result<BudgetStore<'_>, LedgerError> {
        self.require_unlocked()?;
        let key = if settings::encrypt_at_rest(self.store())? {
            Some(self.require_key()?)
        } else {
            None
        };
        BudgetStore::open(self.store(), key)
    }

    pub fn enable_encryption(&self) -> Result<(), LedgerError> {
        let key = self.require_key()?;
        if settings::encrypt_at_rest(self.store())? {
            return Ok(());
        }
        // Seed before sealing so the sealed records start populated.
        BudgetStore::open(self.store(), None)?;
        ledger::seal_collections(self.store(), key)
    }

    pub fn disable_encryption(&self) -> Result<(), LedgerError> {
        let key = self.require_key()?;
        if !settings::encrypt_at_rest(self.store())? {
            return Ok(());
        }
        ledger::unseal_collections(self.store(), key)
    }

    pub fn export_ledger(&self, pin: &str) -> Result<String, LedgerError> {
        self.verify_for_export(pin)?;
        let snapshot = self.ledger()?.snapshot()?;
        Ok(backup::encrypt_export(self.store(), &snapshot, pin)?)
    }

    pub fn import_ledger(&self, blob: &str, pin: &str) -> Result<LedgerSnapshot, LedgerError> {
        self.verify_for_export(pin)?;
        let snapshot: LedgerSnapshot = backup::decrypt_import(self.store(), blob, pin)?;
        self.ledger()?.restore(&snapshot)?;
        Ok(snapshot)
    }

    fn verify_for_export(&self, pin: &str) -> Result<(), SecurityError> {
        self.require_unlocked()?;
        if !crate::pin::is_valid_pin(pin) {
            return Err(SecurityError::InvalidPinFormat);
        }
        if self.has_pin()? && !self.pins().verify_pin(pin)? {
            return Err(SecurityError::VerificationFailed);
        }
        Ok(())
    }
}
