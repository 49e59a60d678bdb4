//! Storage layer for Strongbox
//!
//! JSON file stores with atomic writes. Every store holds sealed records
//! only; plaintext exists solely in values opened with an `AuthSession`.

pub mod file_io;
pub mod locks;
pub mod records;

pub use file_io::{read_json, write_json_atomic};
pub use locks::{RecordGuard, RecordLocks};
pub use records::{RecordStore, StoredRecord};

use std::fmt::Display;

use crate::audit::{AuditEntry, AuditLogger, EntityType};
use crate::config::paths::StrongboxPaths;
use crate::error::StrongboxResult;
use crate::models::{
    AccountMappingRecord, CategoryRecord, DescriptionMappingRecord, PayeeRecord,
    TransactionRecord,
};

/// Main storage coordinator that provides access to all record stores
pub struct Storage {
    paths: StrongboxPaths,
    pub transactions: RecordStore<TransactionRecord>,
    pub categories: RecordStore<CategoryRecord>,
    pub payees: RecordStore<PayeeRecord>,
    pub description_mappings: RecordStore<DescriptionMappingRecord>,
    pub account_mappings: RecordStore<AccountMappingRecord>,
    audit: AuditLogger,
    locks: RecordLocks,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(paths: StrongboxPaths) -> StrongboxResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            transactions: RecordStore::new(paths.transactions_file()),
            categories: RecordStore::new(paths.categories_file()),
            payees: RecordStore::new(paths.payees_file()),
            description_mappings: RecordStore::new(paths.description_mappings_file()),
            account_mappings: RecordStore::new(paths.account_mappings_file()),
            audit: AuditLogger::new(paths.audit_log()),
            locks: RecordLocks::new(),
            paths,
        })
    }

    /// Create and load in one step
    pub fn open(paths: StrongboxPaths) -> StrongboxResult<Self> {
        let storage = Self::new(paths)?;
        storage.load_all()?;
        Ok(storage)
    }

    pub fn paths(&self) -> &StrongboxPaths {
        &self.paths
    }

    /// Load all data from disk
    pub fn load_all(&self) -> StrongboxResult<()> {
        self.transactions.load()?;
        self.categories.load()?;
        self.payees.load()?;
        self.description_mappings.load()?;
        self.account_mappings.load()?;
        Ok(())
    }

    pub fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    pub fn audit_log(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn log(&self, entry: &AuditEntry) -> StrongboxResult<()> {
        self.audit.log(entry)
    }

    pub fn log_batch(&self, entries: &[AuditEntry]) -> StrongboxResult<()> {
        self.audit.log_batch(entries)
    }

    pub fn log_create(&self, entity_type: EntityType, id: impl Display) -> StrongboxResult<()> {
        self.audit.log(&AuditEntry::create(entity_type, id.to_string()))
    }

    pub fn log_update(&self, entity_type: EntityType, id: impl Display) -> StrongboxResult<()> {
        self.audit.log(&AuditEntry::update(entity_type, id.to_string()))
    }

    pub fn log_delete(&self, entity_type: EntityType, id: impl Display) -> StrongboxResult<()> {
        self.audit.log(&AuditEntry::delete(entity_type, id.to_string()))
    }

    /// Check if storage has been initialized
    pub fn is_initialized(&self) -> bool {
        self.paths.is_initialized()
    }
}
