//! Mapping service and resolver
//!
//! Description mappings suggest a category and payee for a raw statement
//! description; account mappings give a raw account identifier a display
//! name. Lookups are exact string matches only.
//!
//! The `MappingResolver` is a decrypted snapshot of both tables taken once
//! per import, with a session overlay on top: what the user teaches it while
//! reviewing a batch is visible to later rows straight away, without being
//! persisted until commit.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditEntry, EntityType};
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{
    AccountMapping, AccountMappingRecord, DescriptionMapping, DescriptionMappingRecord, MappingId,
};
use crate::storage::Storage;

use super::category::CategoryService;

/// Category and payee names a description resolves to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestion {
    pub category: Option<String>,
    pub payee: Option<String>,
}

impl Suggestion {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.payee.is_none()
    }
}

/// Exact-match lookup over persisted mappings plus a session overlay
#[derive(Debug, Clone, Default)]
pub struct MappingResolver {
    descriptions: HashMap<String, Suggestion>,
    accounts: HashMap<String, String>,
    session: HashMap<String, Suggestion>,
}

impl MappingResolver {
    pub fn new(descriptions: Vec<DescriptionMapping>, accounts: Vec<AccountMapping>) -> Self {
        Self {
            descriptions: descriptions
                .into_iter()
                .map(|m| {
                    (
                        m.description,
                        Suggestion {
                            category: m.category,
                            payee: m.payee,
                        },
                    )
                })
                .collect(),
            accounts: accounts
                .into_iter()
                .map(|m| (m.account, m.display_name))
                .collect(),
            session: HashMap::new(),
        }
    }

    /// Suggested category and payee for a description
    ///
    /// Session-learned mappings win over persisted ones.
    pub fn resolve(&self, description: &str) -> Suggestion {
        self.session
            .get(description)
            .or_else(|| self.descriptions.get(description))
            .cloned()
            .unwrap_or_default()
    }

    /// Display name for a raw account identifier
    pub fn resolve_account(&self, account: &str) -> Option<&str> {
        self.accounts.get(account).map(String::as_str)
    }

    /// Remember a mapping for the rest of this session only
    pub fn learn(&mut self, description: &str, category: Option<String>, payee: Option<String>) {
        self.session
            .insert(description.to_string(), Suggestion { category, payee });
    }

    pub fn learn_account(&mut self, account: &str, display_name: &str) {
        self.accounts
            .insert(account.to_string(), display_name.to_string());
    }

    pub fn session_len(&self) -> usize {
        self.session.len()
    }
}

/// One row of a mapping CSV awaiting review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedMapping {
    pub description: String,
    pub category: String,
    /// Category currently mapped for this description, if any
    pub existing_category: Option<String>,
    pub skip: bool,
}

/// Result of committing reviewed mapping rows
#[derive(Debug, Clone, Default)]
pub struct MappingImportReport {
    pub saved: usize,
    pub skipped: usize,
    pub failed: Vec<(usize, String)>,
}

/// Service for learned mappings
pub struct MappingService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
}

impl<'a> MappingService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession) -> Self {
        Self { storage, session }
    }

    /// Decrypt both mapping tables into a resolver
    pub fn resolver(&self) -> StrongboxResult<MappingResolver> {
        Ok(MappingResolver::new(
            self.list_descriptions()?,
            self.list_accounts()?,
        ))
    }

    pub fn list_descriptions(&self) -> StrongboxResult<Vec<DescriptionMapping>> {
        self.storage
            .description_mappings
            .all()?
            .iter()
            .map(|record| record.open(self.session))
            .collect()
    }

    pub fn list_accounts(&self) -> StrongboxResult<Vec<AccountMapping>> {
        self.storage
            .account_mappings
            .all()?
            .iter()
            .map(|record| record.open(self.session))
            .collect()
    }

    pub fn find_description(&self, description: &str) -> StrongboxResult<Option<DescriptionMapping>> {
        Ok(self
            .list_descriptions()?
            .into_iter()
            .find(|m| m.description == description))
    }

    pub fn find_account(&self, account: &str) -> StrongboxResult<Option<AccountMapping>> {
        Ok(self.list_accounts()?.into_iter().find(|m| m.account == account))
    }

    /// Insert or overwrite the mapping for a description
    pub fn upsert_description(
        &self,
        description: &str,
        category: Option<&str>,
        payee: Option<&str>,
        batch_id: Option<Uuid>,
    ) -> StrongboxResult<DescriptionMapping> {
        if description.is_empty() {
            return Err(StrongboxError::Validation(
                "Mapping description cannot be empty".into(),
            ));
        }

        let mut record = DescriptionMappingRecord::seal(self.session, description, category, payee)?;
        let entry = match self.find_description(description)? {
            Some(existing) => {
                record.id = existing.id;
                self.storage.description_mappings.update(record.clone())?;
                AuditEntry::update(EntityType::DescriptionMapping, record.id.to_string())
            }
            None => {
                record = self.storage.description_mappings.insert(record)?;
                AuditEntry::create(EntityType::DescriptionMapping, record.id.to_string())
            }
        };
        self.storage.log(&entry.in_batch(batch_id))?;
        debug!(id = %record.id, "Saved description mapping");

        record.open(self.session)
    }

    /// Insert or overwrite the display name of an account
    pub fn upsert_account(
        &self,
        account: &str,
        display_name: &str,
        batch_id: Option<Uuid>,
    ) -> StrongboxResult<AccountMapping> {
        if account.is_empty() || display_name.trim().is_empty() {
            return Err(StrongboxError::Validation(
                "Account mapping needs an account and a display name".into(),
            ));
        }

        let mut record = AccountMappingRecord::seal(self.session, account, display_name.trim())?;
        let entry = match self.find_account(account)? {
            Some(existing) => {
                record.id = existing.id;
                self.storage.account_mappings.update(record.clone())?;
                AuditEntry::update(EntityType::AccountMapping, record.id.to_string())
            }
            None => {
                record = self.storage.account_mappings.insert(record)?;
                AuditEntry::create(EntityType::AccountMapping, record.id.to_string())
            }
        };
        self.storage.log(&entry.in_batch(batch_id))?;

        record.open(self.session)
    }

    pub fn delete_description(&self, id: MappingId) -> StrongboxResult<()> {
        self.storage.description_mappings.delete(id)?;
        self.storage.log_delete(EntityType::DescriptionMapping, id)
    }

    pub fn delete_account(&self, id: MappingId) -> StrongboxResult<()> {
        self.storage.account_mappings.delete(id)?;
        self.storage.log_delete(EntityType::AccountMapping, id)
    }

    /// Stage the rows of a mapping CSV file
    pub fn prepare_mappings_file(&self, path: &Path, delimiter: u8) -> StrongboxResult<Vec<StagedMapping>> {
        let source_name = path.display().to_string();
        let file = File::open(path).map_err(|e| StrongboxError::Parse {
            source_name: source_name.clone(),
            message: e.to_string(),
        })?;
        self.prepare_mappings(file, &source_name, delimiter)
    }

    /// Stage the rows of a mapping CSV
    ///
    /// The first row is the header. Columns literally named "Description"
    /// and "Category" are used when both are present; otherwise the first
    /// two columns are taken positionally.
    pub fn prepare_mappings<R: Read>(
        &self,
        reader: R,
        source_name: &str,
        delimiter: u8,
    ) -> StrongboxResult<Vec<StagedMapping>> {
        let parse_error = |e: csv::Error| StrongboxError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);
        let headers = reader.headers().map_err(parse_error)?.clone();

        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let (desc_col, cat_col) = match (position("Description"), position("Category")) {
            (Some(d), Some(c)) => (d, c),
            _ => (0, 1),
        };

        let existing = self.resolver()?;
        let mut staged = Vec::new();
        for record in reader.records() {
            let record = record.map_err(parse_error)?;
            let description = record.get(desc_col).map(str::trim).unwrap_or_default();
            let category = record.get(cat_col).map(str::trim).unwrap_or_default();
            if description.is_empty() || category.is_empty() {
                continue;
            }
            staged.push(StagedMapping {
                description: description.to_string(),
                category: category.to_string(),
                existing_category: existing.resolve(description).category,
                skip: false,
            });
        }

        debug!(source = source_name, rows = staged.len(), "Staged mapping rows");
        Ok(staged)
    }

    /// Persist reviewed mapping rows
    ///
    /// Rows naming an unknown category fail individually. An existing payee
    /// mapping for the description is kept.
    pub fn import_reviewed_mappings(&self, rows: &[StagedMapping]) -> StrongboxResult<MappingImportReport> {
        let categories = CategoryService::new(self.storage, self.session);
        let batch_id = Some(Uuid::new_v4());
        let mut report = MappingImportReport::default();

        for (index, row) in rows.iter().enumerate() {
            if row.skip {
                report.skipped += 1;
                continue;
            }
            if categories.resolve_ref(&row.category)?.is_none() {
                report
                    .failed
                    .push((index, format!("Unknown category '{}'", row.category)));
                continue;
            }

            let payee = self
                .find_description(&row.description)?
                .and_then(|m| m.payee);
            match self.upsert_description(&row.description, Some(&row.category), payee.as_deref(), batch_id) {
                Ok(_) => report.saved += 1,
                Err(e) if e.is_key_error() => return Err(e),
                Err(e) => report.failed.push((index, e.to_string())),
            }
        }

        info!(
            saved = report.saved,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Imported mappings"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::StrongboxPaths;
    use crate::crypto::session::test_support::unlocked_session;
    use crate::models::CategoryType;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = StrongboxPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_resolve_is_exact() {
        let resolver = MappingResolver::new(
            vec![DescriptionMapping {
                id: MappingId::from_raw(1),
                description: "STARBUCKS".into(),
                category: Some("Coffee".into()),
                payee: Some("Starbucks".into()),
            }],
            vec![],
        );

        assert_eq!(resolver.resolve("STARBUCKS").category.as_deref(), Some("Coffee"));
        assert!(resolver.resolve("starbucks").is_empty());
        assert!(resolver.resolve("STARBUCKS #123").is_empty());
    }

    #[test]
    fn test_session_overlay_wins() {
        let mut resolver = MappingResolver::default();
        assert!(resolver.resolve("AMAZON").is_empty());

        resolver.learn("AMAZON", Some("Shopping".into()), None);
        assert_eq!(resolver.resolve("AMAZON").category.as_deref(), Some("Shopping"));
        assert_eq!(resolver.session_len(), 1);

        resolver.learn_account("000123", "Checking");
        assert_eq!(resolver.resolve_account("000123"), Some("Checking"));
    }

    #[test]
    fn test_upsert_overwrites_same_key() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = MappingService::new(&storage, &session);

        let first = service
            .upsert_description("STARBUCKS", Some("Coffee"), None, None)
            .unwrap();
        let second = service
            .upsert_description("STARBUCKS", Some("Dining"), Some("Starbucks"), None)
            .unwrap();

        assert_eq!(first.id, second.id);
        let all = service.list_descriptions().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category.as_deref(), Some("Dining"));
        assert_eq!(all[0].payee.as_deref(), Some("Starbucks"));

        // Case differs: a separate key
        service.upsert_description("starbucks", Some("Coffee"), None, None).unwrap();
        assert_eq!(service.list_descriptions().unwrap().len(), 2);
    }

    #[test]
    fn test_account_mapping_and_delete() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = MappingService::new(&storage, &session);

        let mapping = service.upsert_account("000123", "Checking", None).unwrap();
        assert_eq!(
            service.resolver().unwrap().resolve_account("000123"),
            Some("Checking")
        );

        service.delete_account(mapping.id).unwrap();
        assert!(service.list_accounts().unwrap().is_empty());
        assert!(service.upsert_account("000123", "  ", None).unwrap_err().is_validation());
    }

    #[test]
    fn test_prepare_mappings_with_named_headers() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = MappingService::new(&storage, &session);
        service.upsert_description("NETFLIX", Some("Fun"), None, None).unwrap();

        let csv = "Notes,Category,Description\nx,Streaming,NETFLIX\ny,Coffee,STARBUCKS\nz,,EMPTY\n";
        let rows = service.prepare_mappings(csv.as_bytes(), "map.csv", b',').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "NETFLIX");
        assert_eq!(rows[0].category, "Streaming");
        assert_eq!(rows[0].existing_category.as_deref(), Some("Fun"));
        assert_eq!(rows[1].existing_category, None);
    }

    #[test]
    fn test_prepare_mappings_falls_back_to_positions() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = MappingService::new(&storage, &session);

        let csv = "desc,cat\nSTARBUCKS,Coffee\n";
        let rows = service.prepare_mappings(csv.as_bytes(), "map.csv", b',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "STARBUCKS");
        assert_eq!(rows[0].category, "Coffee");
    }

    #[test]
    fn test_import_reviewed_mappings() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        CategoryService::new(&storage, &session)
            .create("Coffee", None, CategoryType::Expense)
            .unwrap();
        let service = MappingService::new(&storage, &session);
        service
            .upsert_description("STARBUCKS", None, Some("Starbucks"), None)
            .unwrap();

        let rows = vec![
            StagedMapping {
                description: "STARBUCKS".into(),
                category: "Coffee".into(),
                existing_category: None,
                skip: false,
            },
            StagedMapping {
                description: "VENMO".into(),
                category: "Transfer".into(),
                existing_category: None,
                skip: false,
            },
            StagedMapping {
                description: "SHELL".into(),
                category: "Gas".into(),
                existing_category: None,
                skip: false,
            },
            StagedMapping {
                description: "IGNORED".into(),
                category: "Coffee".into(),
                existing_category: None,
                skip: true,
            },
        ];

        let report = service.import_reviewed_mappings(&rows).unwrap();
        assert_eq!(report.saved, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);

        let starbucks = service.find_description("STARBUCKS").unwrap().unwrap();
        assert_eq!(starbucks.category.as_deref(), Some("Coffee"));
        assert_eq!(starbucks.payee.as_deref(), Some("Starbucks"));
    }

    #[test]
    fn test_malformed_mapping_csv_is_parse_error() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = MappingService::new(&storage, &session);

        let bytes: &[u8] = b"Description,Category\n\xff\xfe,Coffee\n";
        let err = service.prepare_mappings(bytes, "bad.csv", b',').unwrap_err();
        assert!(matches!(err, StrongboxError::Parse { .. }));
    }
}
