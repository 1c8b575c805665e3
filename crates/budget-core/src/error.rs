use thiserror::Error;

/// Failures of the underlying key-value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("PIN must be 4-6 digits")]
    InvalidPinFormat,

    #[error("Incorrect PIN")]
    VerificationFailed,

    #[error("Secure payload could not be decrypted (wrong key or tampered data)")]
    DecryptionFailed,

    #[error("AEAD encryption failed")]
    EncryptionFailed,

    #[error("Application is locked; unlock with PIN first")]
    Locked,

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl SecurityError {
    /// True for the `StorageUnavailable` class: the store itself failed and
    /// nothing above it can recover.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, SecurityError::Storage(StorageError::Unavailable(_)))
    }
}
