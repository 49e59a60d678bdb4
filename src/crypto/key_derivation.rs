//! Password-based key derivation using PBKDF2-HMAC-SHA256
//!
//! One password and one random salt produce two independent outputs: the
//! verification digest that is persisted in settings, and the AES-256 field
//! key that only ever lives in memory. The two are domain-separated by a
//! context suffix on the salt so the persisted digest is never the key.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::settings::CredentialSettings;
use crate::error::{StrongboxError, StrongboxResult};

/// PBKDF2 iteration count used for new credentials
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Output length in bytes (256 bits)
pub const KEY_LEN: usize = 32;

const VERIFY_CONTEXT: &[u8] = b"strongbox/credential-digest";
const FIELD_KEY_CONTEXT: &[u8] = b"strongbox/field-key";

/// Parameters for key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Create params with a specific iteration count
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Params recorded alongside a stored credential
    pub fn for_credential(credential: &CredentialSettings) -> Self {
        Self {
            iterations: credential.iterations,
        }
    }
}

/// A derived AES-256 key, wiped from memory on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LEN],
}

impl DerivedKey {
    pub(crate) fn from_bytes(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], context: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut salted = Vec::with_capacity(salt.len() + context.len());
    salted.extend_from_slice(salt);
    salted.extend_from_slice(context);

    let mut out = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, &salted, iterations, &mut out);
    out
}

fn decode_b64(value: &str, what: &str) -> StrongboxResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| StrongboxError::Config(format!("Invalid {} encoding: {}", what, e)))
}

/// Generate a fresh random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Create the persisted credential for a new password
///
/// Called once, at first setup. The password itself is not retained.
pub fn create_credential(password: &str, params: &KdfParams) -> CredentialSettings {
    let salt = generate_salt();
    let mut digest = pbkdf2_sha256(password.as_bytes(), &salt, VERIFY_CONTEXT, params.iterations);

    let credential = CredentialSettings {
        password_hash: STANDARD.encode(digest),
        password_salt: STANDARD.encode(salt),
        iterations: params.iterations,
    };
    digest.zeroize();
    credential
}

/// Check a password against a stored credential
///
/// The digest comparison runs in constant time.
pub fn verify_credential(password: &str, credential: &CredentialSettings) -> StrongboxResult<bool> {
    let salt = decode_b64(&credential.password_salt, "password salt")?;
    let stored = decode_b64(&credential.password_hash, "password hash")?;

    let mut derived = pbkdf2_sha256(
        password.as_bytes(),
        &salt,
        VERIFY_CONTEXT,
        credential.iterations,
    );
    let matches = bool::from(derived[..].ct_eq(&stored[..]));
    derived.zeroize();

    Ok(matches)
}

/// Derive the in-memory field key from a password and the stored base64 salt
pub fn derive_key(password: &str, salt_b64: &str, params: &KdfParams) -> StrongboxResult<DerivedKey> {
    let salt = decode_b64(salt_b64, "password salt")?;
    if salt.is_empty() {
        return Err(StrongboxError::Config("Password salt is empty".into()));
    }

    Ok(DerivedKey::from_bytes(pbkdf2_sha256(
        password.as_bytes(),
        &salt,
        FIELD_KEY_CONTEXT,
        params.iterations,
    )))
}
