//! Secret encryption module using AES-256-GCM
//!
//! Provider API keys and other operator secrets are stored as
//! `hex(iv):hex(tag):hex(ciphertext)` strings. The key is the SHA-256 digest
//! of `SESSION_SECRET`, so rotating the session secret invalidates every
//! stored value.

#![allow(deprecated)]

use aes_gcm::{
    Aes256Gcm, Nonce, Tag,
    aead::{AeadCore, AeadInPlace, KeyInit, OsRng},
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SEGMENT_SEPARATOR: char = ':';

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("invalid ciphertext format: {0}")]
    InvalidFormat(&'static str),
    #[error("empty secret")]
    EmptySecret,
}

/// Secure wrapper for encryption keys with zeroization
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CryptoKey([u8; 32]);

impl CryptoKey {
    /// Derive the 256-bit key from an arbitrary-length secret.
    pub fn derive(secret: &str) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        let digest = Sha256::digest(secret.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Ok(CryptoKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CryptoKey([REDACTED])")
    }
}

/// Encrypts and decrypts secrets at rest.
#[derive(Debug, Clone)]
pub struct SecretCodec {
    key: CryptoKey,
}

impl SecretCodec {
    pub fn new(key: CryptoKey) -> Self {
        Self { key }
    }

    /// Build a codec from `SESSION_SECRET`.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        CryptoKey::derive(secret).map(Self::new)
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(self.key.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Encrypt `plaintext` with a fresh random IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut buffer = Zeroizing::new(plaintext.as_bytes().to_vec());
        let tag = cipher
            .encrypt_in_place_detached(&nonce, b"", buffer.as_mut_slice())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(format!(
            "{}{sep}{}{sep}{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(buffer.as_slice()),
            sep = SEGMENT_SEPARATOR
        ))
    }

    /// Decrypt a value produced by [`SecretCodec::encrypt`].
    ///
    /// Any structural problem or authentication tag mismatch is an error;
    /// this never returns bytes that failed verification.
    pub fn decrypt(&self, value: &str) -> Result<String, CryptoError> {
        let mut segments = value.split(SEGMENT_SEPARATOR);
        let (Some(iv_hex), Some(tag_hex), Some(ct_hex), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(CryptoError::InvalidFormat("expected iv:tag:ciphertext"));
        };

        let iv = hex::decode(iv_hex).map_err(|_| CryptoError::InvalidFormat("iv is not hex"))?;
        if iv.len() != IV_LEN {
            return Err(CryptoError::InvalidFormat("iv must be 12 bytes"));
        }
        let tag = hex::decode(tag_hex).map_err(|_| CryptoError::InvalidFormat("tag is not hex"))?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::InvalidFormat("tag must be 16 bytes"));
        }
        let mut buffer = Zeroizing::new(
            hex::decode(ct_hex).map_err(|_| CryptoError::InvalidFormat("ciphertext is not hex"))?,
        );

        let cipher = self.cipher()?;
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&iv),
                b"",
                buffer.as_mut_slice(),
                Tag::from_slice(&tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed("authentication tag mismatch".to_string()))?;

        String::from_utf8(buffer.to_vec())
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Decrypt `value` when it is in the encrypted shape, otherwise return it
    /// unchanged as a legacy plaintext secret.
    pub fn reveal(&self, value: &str) -> Result<String, CryptoError> {
        if is_encrypted(value) {
            self.decrypt(value)
        } else {
            tracing::debug!("Stored secret is legacy plaintext");
            Ok(value.to_string())
        }
    }
}

/// Structural check for the `iv:tag:ciphertext` shape. Does not verify the tag.
pub fn is_encrypted(value: &str) -> bool {
    let segments: Vec<&str> = value.split(SEGMENT_SEPARATOR).collect();
    let [iv, tag, ciphertext] = segments[..] else {
        return false;
    };

    let is_hex = |s: &str| s.chars().all(|c| c.is_ascii_hexdigit());

    iv.len() == IV_LEN * 2
        && tag.len() == TAG_LEN * 2
        && ciphertext.len() % 2 == 0
        && is_hex(iv)
        && is_hex(tag)
        && is_hex(ciphertext)
}
