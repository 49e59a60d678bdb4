//! Cryptographic functions for Strongbox
//!
//! PBKDF2-HMAC-SHA256 password derivation, AES-256-GCM per-field
//! encryption, and the explicit `AuthSession` lock state.

pub mod encryption;
pub mod key_derivation;
pub mod secure_memory;
pub mod session;

pub use encryption::{open, open_string, seal, seal_string, Sealed};
pub use key_derivation::{
    create_credential, derive_key, verify_credential, DerivedKey, KdfParams, DEFAULT_ITERATIONS,
};
pub use secure_memory::SecureString;
pub use session::AuthSession;
