//! Authentication session
//!
//! `AuthSession` is the explicit lock/unlock state of the ledger. It is
//! passed to every service that encrypts or decrypts, instead of a key held
//! in shared global state.

use std::fmt;

use tracing::{debug, info};

use crate::config::settings::CredentialSettings;
use crate::error::{StrongboxError, StrongboxResult};

use super::encryption::{open_string, seal_string, Sealed};
use super::key_derivation::{derive_key, verify_credential, DerivedKey, KdfParams};

/// Locked (no key held) or unlocked (derived key held in memory only)
#[derive(Default)]
pub enum AuthSession {
    #[default]
    Locked,
    Unlocked(DerivedKey),
}

impl AuthSession {
    pub fn new() -> Self {
        Self::Locked
    }

    /// Derive the field key from the password and stored salt and hold it
    ///
    /// No verification happens here; a wrong password surfaces later as
    /// `AuthenticationFailure` on the first decrypt.
    pub fn unlock(&mut self, password: &str, salt_b64: &str, params: &KdfParams) -> StrongboxResult<()> {
        let key = derive_key(password, salt_b64, params)?;
        *self = Self::Unlocked(key);
        info!("Ledger unlocked");
        Ok(())
    }

    /// Verify the password against the stored credential, then unlock
    pub fn unlock_with_credential(
        &mut self,
        password: &str,
        credential: &CredentialSettings,
    ) -> StrongboxResult<()> {
        if !verify_credential(password, credential)? {
            debug!("Password verification failed");
            return Err(StrongboxError::AuthenticationFailure);
        }
        self.unlock(
            password,
            &credential.password_salt,
            &KdfParams::for_credential(credential),
        )
    }

    /// Discard the in-memory key
    pub fn lock(&mut self) {
        if self.is_unlocked() {
            info!("Ledger locked");
        }
        // Dropping the old key zeroizes it
        *self = Self::Locked;
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked(_))
    }

    fn key(&self) -> StrongboxResult<&DerivedKey> {
        match self {
            Self::Unlocked(key) => Ok(key),
            Self::Locked => Err(StrongboxError::KeyNotInitialized),
        }
    }

    /// Encrypt one field with a fresh nonce
    pub fn encrypt_field(&self, plaintext: &str) -> StrongboxResult<Sealed> {
        seal_string(plaintext, self.key()?)
    }

    /// Decrypt one field
    pub fn decrypt_field(&self, sealed: &Sealed) -> StrongboxResult<String> {
        open_string(sealed, self.key()?)
    }

    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> StrongboxResult<Option<Sealed>> {
        plaintext.map(|p| self.encrypt_field(p)).transpose()
    }

    pub fn decrypt_optional(&self, sealed: Option<&Sealed>) -> StrongboxResult<Option<String>> {
        sealed.map(|s| self.decrypt_field(s)).transpose()
    }

    /// Re-encrypt a field sealed under this session's key for `target`
    pub fn reseal(&self, sealed: &Sealed, target: &AuthSession) -> StrongboxResult<Sealed> {
        target.encrypt_field(&self.decrypt_field(sealed)?)
    }

    pub fn reseal_optional(
        &self,
        sealed: Option<&Sealed>,
        target: &AuthSession,
    ) -> StrongboxResult<Option<Sealed>> {
        sealed.map(|s| self.reseal(s, target)).transpose()
    }

    /// Seal any serializable value as JSON
    pub fn encrypt_json<T: serde::Serialize>(&self, value: &T) -> StrongboxResult<Sealed> {
        let json = serde_json::to_string(value)?;
        self.encrypt_field(&json)
    }

    /// Open a field sealed with `encrypt_json`
    pub fn decrypt_json<T: serde::de::DeserializeOwned>(&self, sealed: &Sealed) -> StrongboxResult<T> {
        let json = self.decrypt_field(sealed)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "AuthSession::Locked"),
            Self::Unlocked(_) => write!(f, "AuthSession::Unlocked([REDACTED])"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::crypto::key_derivation::create_credential;

    #[test]
    fn test_locked_session_refuses_crypto() {
        let session = AuthSession::new();
        assert!(matches!(
            session.encrypt_field("x"),
            Err(StrongboxError::KeyNotInitialized)
        ));
        let sealed = unlocked_session().encrypt_field("x").unwrap();
        assert!(matches!(
            session.decrypt_field(&sealed),
            Err(StrongboxError::KeyNotInitialized)
        ));
    }

    #[test]
    fn test_round_trip() {
        let session = unlocked_session();
        for s in ["", "STARBUCKS", "-4.50", "2024-01-05", "ünïcødé ☕"] {
            let sealed = session.encrypt_field(s).unwrap();
            assert_eq!(session.decrypt_field(&sealed).unwrap(), s);
        }
    }

    #[test]
    fn test_encrypt_is_non_deterministic() {
        let session = unlocked_session();
        let a = session.encrypt_field("same").unwrap();
        let b = session.encrypt_field("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(session.decrypt_field(&a).unwrap(), "same");
        assert_eq!(session.decrypt_field(&b).unwrap(), "same");
    }

    #[test]
    fn test_lock_discards_key() {
        let mut session = unlocked_session();
        let sealed = session.encrypt_field("x").unwrap();
        session.lock();
        assert!(!session.is_unlocked());
        assert!(matches!(
            session.decrypt_field(&sealed),
            Err(StrongboxError::KeyNotInitialized)
        ));
    }

    #[test]
    fn test_wrong_password_rejected_at_unlock() {
        let credential = create_credential(TEST_PASSWORD, &fast_params());
        let mut session = AuthSession::new();
        let result = session.unlock_with_credential("not it", &credential);
        assert!(matches!(result, Err(StrongboxError::AuthenticationFailure)));
        assert!(!session.is_unlocked());
    }

    #[test]
    fn test_unverified_wrong_password_fails_on_decrypt() {
        let credential = create_credential(TEST_PASSWORD, &fast_params());
        let mut good = AuthSession::new();
        good.unlock(TEST_PASSWORD, &credential.password_salt, &fast_params())
            .unwrap();
        let sealed = good.encrypt_field("payload").unwrap();

        let mut bad = AuthSession::new();
        bad.unlock("wrong", &credential.password_salt, &fast_params())
            .unwrap();
        assert!(matches!(
            bad.decrypt_field(&sealed),
            Err(StrongboxError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_json_and_optional_helpers() {
        let session = unlocked_session();
        let sealed = session.encrypt_json(&Some(42u64)).unwrap();
        let value: Option<u64> = session.decrypt_json(&sealed).unwrap();
        assert_eq!(value, Some(42));

        assert!(session.encrypt_optional(None).unwrap().is_none());
        let note = session.encrypt_optional(Some("memo")).unwrap();
        assert_eq!(
            session.decrypt_optional(note.as_ref()).unwrap().as_deref(),
            Some("memo")
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let session = unlocked_session();
        assert_eq!(format!("{:?}", session), "AuthSession::Unlocked([REDACTED])");
    }
}
