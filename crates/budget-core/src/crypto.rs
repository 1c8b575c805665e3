//! Primitive wrappers: PBKDF2-HMAC-SHA256, AES-256-GCM, randomness, base64.
//!
//! Nothing here touches storage. Callers decide which salt and which
//! iteration count apply; the two PBKDF2 pipelines (PIN verifier and data
//! key) share only this code, never their parameters.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

use crate::error::SecurityError;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const DERIVED_KEY_LEN: usize = 32;

/// Iterations for the PIN verifier digest.
pub const PIN_DIGEST_ITERATIONS: u32 = 200_000;
/// Iterations for the data-encryption key.
pub const KEY_DERIVATION_ITERATIONS: u32 = 150_000;

/// In-memory AES-256-GCM key. Not cloneable, not exportable, zeroized on drop.
pub struct EncryptionKey(Zeroizing<[u8; DERIVED_KEY_LEN]>);

impl EncryptionKey {
    pub(crate) fn from_bytes(bytes: Zeroizing<[u8; DERIVED_KEY_LEN]>) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.as_slice()))
    }

    pub fn encrypt(&self, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>, SecurityError> {
        self.cipher()
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|_| SecurityError::EncryptionFailed)
    }

    pub fn decrypt(
        &self,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, SecurityError> {
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| SecurityError::DecryptionFailed)?;
        Ok(Zeroizing::new(plaintext))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

pub fn pbkdf2_sha256(
    secret: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(secret, salt, iterations, out.as_mut_slice());
    out
}

pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

pub fn generate_iv() -> [u8; IV_LEN] {
    random_bytes::<IV_LEN>()
}

pub fn b64_encode(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn b64_decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(value)
}
