//! Credential lifecycle: first setup, unlock, and password change

use tracing::info;

use crate::audit::{AuditEntry, EntityType};
use crate::config::paths::StrongboxPaths;
use crate::config::settings::Settings;
use crate::crypto::key_derivation::{create_credential, KdfParams};
use crate::crypto::{AuthSession, SecureString};
use crate::error::{StrongboxError, StrongboxResult};
use crate::storage::{RecordStore, Storage, StoredRecord};

/// Shortest password accepted at setup or change
pub const MIN_PASSWORD_LEN: usize = 8;

/// Records re-encrypted by a password change, per store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResealCounts {
    pub transactions: usize,
    pub categories: usize,
    pub payees: usize,
    pub description_mappings: usize,
    pub account_mappings: usize,
}

impl ResealCounts {
    pub fn total(&self) -> usize {
        self.transactions
            + self.categories
            + self.payees
            + self.description_mappings
            + self.account_mappings
    }
}

/// Service for creating, checking and rotating the ledger password
pub struct CredentialService<'a> {
    paths: &'a StrongboxPaths,
    params: KdfParams,
}

impl<'a> CredentialService<'a> {
    pub fn new(paths: &'a StrongboxPaths) -> Self {
        Self {
            paths,
            params: KdfParams::default(),
        }
    }

    /// Use a custom iteration count for new credentials
    pub fn with_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    /// First-time setup: persist a credential and return an unlocked session
    ///
    /// Refuses to replace an existing credential.
    pub fn initialize(&self, settings: &mut Settings, password: &SecureString) -> StrongboxResult<AuthSession> {
        if settings.has_credential() {
            return Err(StrongboxError::Config(
                "A password is already set up for this ledger".into(),
            ));
        }
        validate_password(password)?;

        let credential = create_credential(password, &self.params);
        let mut session = AuthSession::new();
        session.unlock_with_credential(password, &credential)?;

        settings.credential = Some(credential);
        settings.save(self.paths)?;
        info!("Credential created");
        Ok(session)
    }

    /// Verify the password against the stored credential and unlock
    pub fn unlock(&self, settings: &Settings, password: &SecureString) -> StrongboxResult<AuthSession> {
        let credential = settings.require_credential()?;
        let mut session = AuthSession::new();
        session.unlock_with_credential(password, credential)?;
        Ok(session)
    }

    /// Replace the password and re-encrypt every stored record
    ///
    /// All records are re-encrypted in memory before anything is written,
    /// so a wrong old password or unreadable record changes nothing. Each
    /// store file is then replaced atomically and the new credential is
    /// saved last.
    pub fn change_password(
        &self,
        storage: &Storage,
        settings: &mut Settings,
        old: &SecureString,
        new: &SecureString,
    ) -> StrongboxResult<(AuthSession, ResealCounts)> {
        let old_session = self.unlock(settings, old)?;
        validate_password(new)?;

        let credential = create_credential(new, &self.params);
        let mut new_session = AuthSession::new();
        new_session.unlock_with_credential(new, &credential)?;

        let transactions = reseal_store(&storage.transactions, &old_session, &new_session)?;
        let categories = reseal_store(&storage.categories, &old_session, &new_session)?;
        let payees = reseal_store(&storage.payees, &old_session, &new_session)?;
        let descriptions = reseal_store(&storage.description_mappings, &old_session, &new_session)?;
        let accounts = reseal_store(&storage.account_mappings, &old_session, &new_session)?;

        let counts = ResealCounts {
            transactions: transactions.len(),
            categories: categories.len(),
            payees: payees.len(),
            description_mappings: descriptions.len(),
            account_mappings: accounts.len(),
        };

        storage.transactions.update_many(transactions)?;
        storage.categories.update_many(categories)?;
        storage.payees.update_many(payees)?;
        storage.description_mappings.update_many(descriptions)?;
        storage.account_mappings.update_many(accounts)?;

        settings.credential = Some(credential);
        settings.save(self.paths)?;
        storage.log(
            &AuditEntry::update(EntityType::Credential, "password")
                .with_summary(format!("re-encrypted {} records", counts.total())),
        )?;

        info!(records = counts.total(), "Password changed");
        Ok((new_session, counts))
    }
}

fn validate_password(password: &SecureString) -> StrongboxResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(StrongboxError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn reseal_store<R: StoredRecord>(
    store: &RecordStore<R>,
    from: &AuthSession,
    to: &AuthSession,
) -> StrongboxResult<Vec<R>> {
    store
        .all()?
        .iter()
        .map(|record| record.reseal(from, to))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::session::test_support::{fast_params, TEST_PASSWORD};
    use crate::models::CategoryType;
    use crate::services::category::CategoryService;
    use crate::services::mapping::MappingService;
    use crate::services::transaction::{CreateTransactionInput, TransactionFilter, TransactionService};
    use crate::models::Amount;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StrongboxPaths) {
        let temp_dir = TempDir::new().unwrap();
        let paths = StrongboxPaths::with_base_dir(temp_dir.path().to_path_buf());
        (temp_dir, paths)
    }

    #[test]
    fn test_initialize_once() {
        let (_temp, paths) = setup();
        let service = CredentialService::new(&paths).with_params(fast_params());
        let mut settings = Settings::default();

        let session = service
            .initialize(&mut settings, &SecureString::new(TEST_PASSWORD))
            .unwrap();
        assert!(session.is_unlocked());

        let reloaded = Settings::load_or_create(&paths).unwrap();
        assert!(reloaded.has_credential());
        let json = std::fs::read_to_string(paths.settings_file()).unwrap();
        assert!(!json.contains(TEST_PASSWORD));

        let mut reloaded = reloaded;
        let err = service
            .initialize(&mut reloaded, &SecureString::new("another-password"))
            .unwrap_err();
        assert!(matches!(err, StrongboxError::Config(_)));
    }

    #[test]
    fn test_short_password_rejected() {
        let (_temp, paths) = setup();
        let service = CredentialService::new(&paths).with_params(fast_params());
        let mut settings = Settings::default();
        let err = service
            .initialize(&mut settings, &SecureString::new("short"))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!settings.has_credential());
    }

    #[test]
    fn test_unlock_rejects_wrong_password() {
        let (_temp, paths) = setup();
        let service = CredentialService::new(&paths).with_params(fast_params());
        let mut settings = Settings::default();
        service
            .initialize(&mut settings, &SecureString::new(TEST_PASSWORD))
            .unwrap();

        assert!(service
            .unlock(&settings, &SecureString::new(TEST_PASSWORD))
            .unwrap()
            .is_unlocked());
        let err = service
            .unlock(&settings, &SecureString::new("wrong-password"))
            .unwrap_err();
        assert!(matches!(err, StrongboxError::AuthenticationFailure));
    }

    #[test]
    fn test_change_password_reencrypts_everything() {
        let (_temp, paths) = setup();
        let service = CredentialService::new(&paths).with_params(fast_params());
        let mut settings = Settings::default();
        let session = service
            .initialize(&mut settings, &SecureString::new(TEST_PASSWORD))
            .unwrap();
        let storage = Storage::open(paths.clone()).unwrap();

        let coffee = CategoryService::new(&storage, &session)
            .create("Coffee", None, CategoryType::Expense)
            .unwrap();
        TransactionService::new(&storage, &session)
            .create(CreateTransactionInput {
                date: "2024-01-05".into(),
                amount: Amount::parse("-4.50").unwrap(),
                description: "STARBUCKS".into(),
                account: "000123".into(),
                note: Some("latte".into()),
                category: Some(coffee.category_ref()),
                payee_name: Some("Starbucks".into()),
            })
            .unwrap();
        MappingService::new(&storage, &session)
            .upsert_description("STARBUCKS", Some("Coffee"), Some("Starbucks"), None)
            .unwrap();
        MappingService::new(&storage, &session)
            .upsert_account("000123", "Checking", None)
            .unwrap();

        let new_password = SecureString::new("correct horse battery");
        let (new_session, counts) = service
            .change_password(&storage, &mut settings, &SecureString::new(TEST_PASSWORD), &new_password)
            .unwrap();
        assert_eq!(counts.total(), 5);

        // Old key can no longer read, new key reads everything
        let reloaded = Storage::open(paths.clone()).unwrap();
        let old_read = TransactionService::new(&reloaded, &session).list(TransactionFilter::new());
        assert!(old_read.unwrap_err().is_key_error());

        let txns = TransactionService::new(&reloaded, &new_session)
            .list(TransactionFilter::new())
            .unwrap();
        assert_eq!(txns[0].description, "STARBUCKS");
        assert_eq!(txns[0].note.as_deref(), Some("latte"));
        let mappings = MappingService::new(&reloaded, &new_session)
            .list_accounts()
            .unwrap();
        assert_eq!(mappings[0].display_name, "Checking");

        let settings = Settings::load_or_create(&paths).unwrap();
        assert!(service.unlock(&settings, &new_password).is_ok());
        assert!(service
            .unlock(&settings, &SecureString::new(TEST_PASSWORD))
            .is_err());
    }

    #[test]
    fn test_change_password_with_wrong_old_password_changes_nothing() {
        let (_temp, paths) = setup();
        let service = CredentialService::new(&paths).with_params(fast_params());
        let mut settings = Settings::default();
        let session = service
            .initialize(&mut settings, &SecureString::new(TEST_PASSWORD))
            .unwrap();
        let storage = Storage::open(paths.clone()).unwrap();
        CategoryService::new(&storage, &session)
            .create("Coffee", None, CategoryType::Expense)
            .unwrap();

        let err = service
            .change_password(
                &storage,
                &mut settings,
                &SecureString::new("not-the-password"),
                &SecureString::new("new-password-123"),
            )
            .unwrap_err();
        assert!(matches!(err, StrongboxError::AuthenticationFailure));
        assert_eq!(
            CategoryService::new(&storage, &session).list().unwrap()[0].name,
            "Coffee"
        );
    }
}
