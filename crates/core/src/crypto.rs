//! Symmetric encryption for provider credentials stored at rest.
//!
//! Credentials are sealed with AES-256-GCM under a key derived from the
//! `ENCRYPTION_KEY` secret (SHA-256 of the secret). The stored form is
//! `"<nonce hex>:<ciphertext hex>"`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Errors from sealing or opening a credential.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption secret must not be empty")]
    EmptySecret,

    #[error("Malformed ciphertext: {0}")]
    Malformed(&'static str),

    #[error("Ciphertext could not be authenticated")]
    Authentication,

    #[error("Decrypted credential is not valid UTF-8")]
    Encoding,
}

/// Seals and opens credential strings.
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Derive the cipher key from a configured secret.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        let key = Sha256::digest(secret.as_bytes());
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Malformed("key length"))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::Authentication)?;
        Ok(format!("{}:{}", hex::encode(nonce_bytes), hex::encode(sealed)))
    }

    /// Decrypt a value produced by [`CredentialCipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let (nonce_hex, sealed_hex) = encoded
            .split_once(':')
            .ok_or(CryptoError::Malformed("missing separator"))?;
        let nonce_bytes = hex::decode(nonce_hex).ok_or(CryptoError::Malformed("nonce hex"))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Malformed("nonce length"));
        }
        let sealed = hex::decode(sealed_hex).ok_or(CryptoError::Malformed("ciphertext hex"))?;
        let opened = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_slice())
            .map_err(|_| CryptoError::Authentication)?;
        String::from_utf8(opened).map_err(|_| CryptoError::Encoding)
    }
}

// ---------------------------------------------------------------------------
// hex encoding helper (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string. Returns `None` on odd length or a non-hex digit.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
