//! budget-core: local budget ledger behind a PIN-derived encryption key
//!
//! # Module layout
//! - `storage`         key-value store trait, file and in-memory backends
//! - `crypto`          PBKDF2-HMAC-SHA256, AES-256-GCM, randomness helpers
//! - `salt`            generate-once random values, master salt
//! - `pin`             PIN verifier setup / verification
//! - `kdf`             PIN + master salt → session encryption key
//! - `secure_storage`  sealed `{iv, ciphertext}` records under `secure:`
//! - `lock`            lock state machine fed by lifecycle signals
//! - `context`         application context owning store, lock and session key
//! - `ledger`          categories, transactions, monthly budgets
//! - `insights`        monthly summaries and spending aggregations
//! - `settings`        currency and encryption-at-rest flag
//! - `backup`          encrypted export blobs, remote backup stubs
//! - `paths`           data directory resolution
//! - `error`           storage and security error types

pub mod backup;
pub mod context;
pub mod crypto;
pub mod error;
pub mod insights;
pub mod kdf;
pub mod ledger;
pub mod lock;
pub mod paths;
pub mod pin;
pub mod salt;
pub mod secure_storage;
pub mod settings;
pub mod storage;

pub use context::AppContext;
pub use error::{SecurityError, StorageError};
pub use ledger::LedgerError;
pub use lock::{LifecycleSignal, LockState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
