//! AES-256-GCM field encryption
//!
//! Every field is sealed independently as `base64(nonce[12] || ciphertext || tag[16])`
//! with a fresh random nonce, so equal plaintexts never share a ciphertext.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{StrongboxError, StrongboxResult};

use super::DerivedKey;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// A sealed field as stored on disk
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sealed(String);

impl Sealed {
    /// Wrap an already-encoded ciphertext string
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Ciphertext is opaque; don't dump it into logs
impl fmt::Debug for Sealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sealed({} chars)", self.0.len())
    }
}

fn cipher_for(key: &DerivedKey) -> StrongboxResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StrongboxError::Encryption(format!("Failed to create cipher: {}", e)))
}

/// Encrypt raw bytes into a sealed field
pub fn seal(plaintext: &[u8], key: &DerivedKey) -> StrongboxResult<Sealed> {
    let cipher = cipher_for(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| StrongboxError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(Sealed(STANDARD.encode(blob)))
}

/// Decrypt a sealed field back to bytes
///
/// Malformed encodings are treated the same as a failed tag check.
pub fn open(sealed: &Sealed, key: &DerivedKey) -> StrongboxResult<Vec<u8>> {
    let blob = STANDARD
        .decode(sealed.as_str())
        .map_err(|_| StrongboxError::AuthenticationFailure)?;

    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(StrongboxError::AuthenticationFailure);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = cipher_for(key)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| StrongboxError::AuthenticationFailure)
}

/// Encrypt a string
pub fn seal_string(plaintext: &str, key: &DerivedKey) -> StrongboxResult<Sealed> {
    seal(plaintext.as_bytes(), key)
}

/// Decrypt to a string
pub fn open_string(sealed: &Sealed, key: &DerivedKey) -> StrongboxResult<String> {
    let plaintext = open(sealed, key)?;
    String::from_utf8(plaintext)
        .map_err(|e| StrongboxError::Encryption(format!("Invalid UTF-8 in decrypted data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> DerivedKey {
        DerivedKey::from_bytes([fill; 32])
    }

    #[test]
    fn test_seal_open_string() {
        let key = test_key(7);
        let sealed = seal_string("STARBUCKS", &key).unwrap();
        assert_eq!(open_string(&sealed, &key).unwrap(), "STARBUCKS");
    }

    #[test]
    fn test_layout_is_nonce_ciphertext_tag() {
        let key = test_key(7);
        let sealed = seal_string("abc", &key).unwrap();
        let blob = STANDARD.decode(sealed.as_str()).unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn test_different_nonces() {
        let key = test_key(7);
        let a = seal_string("-4.50", &key).unwrap();
        let b = seal_string("-4.50", &key).unwrap();

        assert_ne!(a, b);
        assert_eq!(open_string(&a, &key).unwrap(), "-4.50");
        assert_eq!(open_string(&b, &key).unwrap(), "-4.50");
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let sealed = seal_string("secret", &test_key(1)).unwrap();
        let result = open_string(&sealed, &test_key(2));
        assert!(matches!(result, Err(StrongboxError::AuthenticationFailure)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = test_key(7);
        let sealed = seal_string("Hello, World!", &key).unwrap();

        let mut blob = STANDARD.decode(sealed.as_str()).unwrap();
        blob[NONCE_SIZE] ^= 0xFF;
        let tampered = Sealed::from_encoded(STANDARD.encode(blob));

        assert!(matches!(
            open(&tampered, &key),
            Err(StrongboxError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncated_or_garbage_input_fails() {
        let key = test_key(7);
        assert!(matches!(
            open(&Sealed::from_encoded("AAAA"), &key),
            Err(StrongboxError::AuthenticationFailure)
        ));
        assert!(matches!(
            open(&Sealed::from_encoded("%%%"), &key),
            Err(StrongboxError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = test_key(7);
        let sealed = seal_string("", &key).unwrap();
        assert_eq!(open_string(&sealed, &key).unwrap(), "");
    }

    #[test]
    fn test_debug_hides_ciphertext() {
        let sealed = Sealed::from_encoded("c2VjcmV0");
        assert_eq!(format!("{:?}", sealed), "Sealed(8 chars)");
    }
}
