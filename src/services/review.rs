//! Review and commit of staged imports
//!
//! A `StagedBatch` is an immutable value: every user edit produces a new
//! batch. Category and payee edits are learned into the batch's session
//! mappings and refresh the suggestions of later rows with the same
//! description. Nothing is persisted until `ReviewService` commits the
//! final batch in one pass.
//!
//! Commit is not transactional across the batch. Rows written before a
//! failure stay written and the report says how far the run got.

use std::collections::HashMap;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, EntityType};
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::category::is_reserved_name;
use crate::models::{
    Category, CategoryRef, TransactionDraft, TransactionId, TransactionKind,
    TRANSFER_CATEGORY_NAME,
};
use crate::storage::Storage;

use super::category::CategoryService;
use super::import::{FileFailure, IngestSummary, ParsedRow};
use super::mapping::{MappingResolver, MappingService};
use super::payee::PayeeService;

/// A category assignment together with the name it was chosen by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChoice {
    pub category: CategoryRef,
    pub name: String,
}

/// Category names known when the batch was staged
#[derive(Debug, Clone, Default)]
pub struct CategoryDirectory {
    by_name: HashMap<String, CategoryChoice>,
}

impl CategoryDirectory {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            by_name: categories
                .into_iter()
                .map(|c| {
                    let choice = CategoryChoice {
                        category: c.category_ref(),
                        name: c.name.clone(),
                    };
                    (c.name, choice)
                })
                .collect(),
        }
    }

    pub fn load(storage: &Storage, session: &AuthSession) -> StrongboxResult<Self> {
        Ok(Self::new(CategoryService::new(storage, session).list()?))
    }

    /// Resolve a category name; the reserved transfer name yields the sentinel
    pub fn lookup(&self, name: &str) -> Option<CategoryChoice> {
        if is_reserved_name(name) {
            return Some(CategoryChoice {
                category: CategoryRef::Transfer,
                name: TRANSFER_CATEGORY_NAME.to_string(),
            });
        }
        self.by_name.get(name.trim()).cloned()
    }
}

/// One candidate row awaiting review
#[derive(Debug, Clone)]
pub struct StagedRow {
    pub index: usize,
    pub source_name: String,
    pub row: ParsedRow,
    pub is_duplicate: bool,
    pub skip: bool,
    pub suggested_category: Option<CategoryChoice>,
    pub suggested_payee: Option<String>,
    pub suggested_account_name: Option<String>,
    pub assigned_category: Option<CategoryChoice>,
    pub assigned_payee: Option<String>,
    pub assigned_account_name: Option<String>,
    pub note: Option<String>,
    pub save_mapping: bool,
}

impl StagedRow {
    pub fn new(
        index: usize,
        source_name: String,
        row: ParsedRow,
        is_duplicate: bool,
        skip: bool,
        resolver: &MappingResolver,
        directory: &CategoryDirectory,
    ) -> Self {
        let mut staged = Self {
            index,
            source_name,
            row,
            is_duplicate,
            skip,
            suggested_category: None,
            suggested_payee: None,
            suggested_account_name: None,
            assigned_category: None,
            assigned_payee: None,
            assigned_account_name: None,
            note: None,
            save_mapping: false,
        };
        staged.refresh_suggestions(resolver, directory);
        staged.refresh_account_name(resolver);
        staged
    }

    /// Re-read suggestions for fields the user has not assigned
    fn refresh_suggestions(&mut self, resolver: &MappingResolver, directory: &CategoryDirectory) {
        let suggestion = resolver.resolve(&self.row.description);
        if self.assigned_category.is_none() {
            self.suggested_category = suggestion
                .category
                .as_deref()
                .and_then(|name| directory.lookup(name));
        }
        if self.assigned_payee.is_none() {
            self.suggested_payee = suggestion.payee;
        }
    }

    fn refresh_account_name(&mut self, resolver: &MappingResolver) {
        if self.assigned_account_name.is_none() && !self.row.account_number.is_empty() {
            self.suggested_account_name = resolver
                .resolve_account(&self.row.account_number)
                .map(String::from);
        }
    }

    /// Assigned category, else the suggestion
    pub fn effective_category(&self) -> Option<&CategoryChoice> {
        self.assigned_category
            .as_ref()
            .or(self.suggested_category.as_ref())
    }

    pub fn effective_payee(&self) -> Option<&str> {
        self.assigned_payee
            .as_deref()
            .or(self.suggested_payee.as_deref())
    }

    pub fn effective_account_name(&self) -> Option<&str> {
        self.assigned_account_name
            .as_deref()
            .or(self.suggested_account_name.as_deref())
    }
}

/// A single user edit to a staged row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEdit {
    Skip(bool),
    /// Assign a category by name, or clear the assignment
    Category(Option<String>),
    Payee(Option<String>),
    AccountName(Option<String>),
    Note(Option<String>),
    SaveMapping(bool),
}

/// An import batch under review
#[derive(Debug, Clone)]
pub struct StagedBatch {
    id: Uuid,
    rows: Vec<StagedRow>,
    summary: IngestSummary,
    failures: Vec<FileFailure>,
    resolver: MappingResolver,
    directory: CategoryDirectory,
}

impl StagedBatch {
    pub fn new(
        rows: Vec<StagedRow>,
        summary: IngestSummary,
        failures: Vec<FileFailure>,
        resolver: MappingResolver,
        directory: CategoryDirectory,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rows,
            summary,
            failures,
            resolver,
            directory,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn rows(&self) -> &[StagedRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&StagedRow> {
        self.rows.get(index)
    }

    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }

    /// Files that could not be parsed at all
    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    pub fn resolver(&self) -> &MappingResolver {
        &self.resolver
    }

    /// Rows that commit would write
    pub fn pending_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.skip).count()
    }

    /// Apply one edit, returning the edited batch
    pub fn with_edit(&self, index: usize, edit: RowEdit) -> StrongboxResult<Self> {
        let mut next = self.clone();
        let directory = &next.directory;
        let row = next.rows.get_mut(index).ok_or_else(|| {
            StrongboxError::Validation(format!("No staged row at index {}", index))
        })?;

        let mut learn = false;
        let mut learn_account = false;
        match edit {
            RowEdit::Skip(skip) => row.skip = skip,
            RowEdit::Category(name) => {
                row.assigned_category = match name {
                    Some(name) => Some(
                        directory
                            .lookup(&name)
                            .ok_or_else(|| StrongboxError::category_not_found(name))?,
                    ),
                    None => None,
                };
                learn = true;
            }
            RowEdit::Payee(name) => {
                row.assigned_payee = name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty());
                learn = true;
            }
            RowEdit::AccountName(name) => {
                row.assigned_account_name = name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty());
                learn_account = row.assigned_account_name.is_some();
            }
            RowEdit::Note(note) => row.note = note.filter(|n| !n.trim().is_empty()),
            RowEdit::SaveMapping(save) => row.save_mapping = save,
        }

        if learn {
            next.learn_description(index);
        }
        if learn_account {
            next.learn_account(index);
        }
        Ok(next)
    }

    /// Apply several edits in order
    pub fn with_edits(&self, edits: impl IntoIterator<Item = (usize, RowEdit)>) -> StrongboxResult<Self> {
        let mut batch = self.clone();
        for (index, edit) in edits {
            batch = batch.with_edit(index, edit)?;
        }
        Ok(batch)
    }

    /// Teach the session what row `index` now says about its description
    fn learn_description(&mut self, index: usize) {
        let row = &self.rows[index];
        let description = row.row.description.clone();
        let category = row.effective_category().map(|c| c.name.clone());
        let payee = row.effective_payee().map(String::from);
        self.resolver.learn(&description, category, payee);

        for later in self
            .rows
            .iter_mut()
            .skip(index + 1)
            .filter(|r| r.row.description == description)
        {
            later.refresh_suggestions(&self.resolver, &self.directory);
        }
    }

    fn learn_account(&mut self, index: usize) {
        let row = &self.rows[index];
        let account = row.row.account_number.clone();
        let Some(name) = row.assigned_account_name.clone() else {
            return;
        };
        if account.is_empty() {
            return;
        }
        self.resolver.learn_account(&account, &name);

        for later in self
            .rows
            .iter_mut()
            .skip(index + 1)
            .filter(|r| r.row.account_number == account)
        {
            later.refresh_account_name(&self.resolver);
        }
    }
}

/// A row that failed to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub index: usize,
    pub message: String,
}

/// End-of-run counts of a commit
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    pub batch_id: Uuid,
    pub committed: Vec<TransactionId>,
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
    /// Rows that committed but whose mapping could not be saved
    pub mapping_failures: Vec<RowFailure>,
    pub description_mappings_saved: usize,
    pub account_mappings_saved: usize,
    /// Rows never attempted because the run halted
    pub not_attempted: usize,
    /// Key-manager error that stopped the run
    pub halted_by: Option<String>,
}

impl CommitReport {
    pub fn succeeded(&self) -> usize {
        self.committed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.halted_by.is_none() && self.failed.is_empty()
    }
}

/// Service that commits reviewed batches
pub struct ReviewService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
}

impl<'a> ReviewService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession) -> Self {
        Self { storage, session }
    }

    /// Write every non-skipped row of the batch
    ///
    /// Per-row failures are counted and the run continues. A key-manager
    /// failure stops the run; rows already written stay written.
    pub fn import_reviewed_transactions(&self, batch: &StagedBatch) -> StrongboxResult<CommitReport> {
        if !self.session.is_unlocked() {
            return Err(StrongboxError::KeyNotInitialized);
        }

        let mut report = CommitReport {
            batch_id: batch.id(),
            ..Default::default()
        };

        for (position, row) in batch.rows().iter().enumerate() {
            if row.skip {
                report.skipped += 1;
                continue;
            }

            match self.commit_row(batch.id(), row) {
                Ok(id) => report.committed.push(id),
                Err(e) if e.is_key_error() => {
                    error!(index = row.index, "Commit halted by key error");
                    report.halted_by = Some(e.to_string());
                    report.not_attempted = batch.rows()[position + 1..]
                        .iter()
                        .filter(|r| !r.skip)
                        .count();
                    break;
                }
                Err(e) => {
                    warn!(index = row.index, error = %e, "Row failed to commit");
                    report.failed.push(RowFailure {
                        index: row.index,
                        message: e.to_string(),
                    });
                    continue;
                }
            }

            if row.save_mapping {
                match self.save_mappings(batch.id(), row) {
                    Ok((descriptions, accounts)) => {
                        report.description_mappings_saved += descriptions;
                        report.account_mappings_saved += accounts;
                    }
                    Err(e) if e.is_key_error() => {
                        report.halted_by = Some(e.to_string());
                        report.not_attempted = batch.rows()[position + 1..]
                            .iter()
                            .filter(|r| !r.skip)
                            .count();
                        break;
                    }
                    Err(e) => report.mapping_failures.push(RowFailure {
                        index: row.index,
                        message: e.to_string(),
                    }),
                }
            }
        }

        info!(
            batch = %report.batch_id,
            committed = report.committed.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            halted = report.halted_by.is_some(),
            "Committed import batch"
        );
        Ok(report)
    }

    fn commit_row(&self, batch_id: Uuid, row: &StagedRow) -> StrongboxResult<TransactionId> {
        let category = row.effective_category().map(|c| c.category);
        let amount = match category {
            Some(CategoryRef::Real(id)) => self
                .storage
                .categories
                .require(id)?
                .category_type
                .apply_sign(&row.row.amount),
            _ => row.row.amount.clone(),
        };
        let payee_id = match row.effective_payee() {
            Some(name) => Some(
                PayeeService::new(self.storage, self.session)
                    .find_or_create(name, Some(batch_id))?
                    .id,
            ),
            None => None,
        };

        let draft = TransactionDraft {
            date: row.row.date.clone(),
            amount,
            description: row.row.description.clone(),
            account: row.row.account_number.clone(),
            note: row.note.clone(),
            kind: TransactionKind::from_category(category),
            payee_id,
        };
        let record = self.storage.transactions.insert(draft.seal(self.session)?)?;
        self.storage.log(
            &AuditEntry::create(EntityType::Transaction, record.id.to_string())
                .in_batch(Some(batch_id)),
        )?;
        Ok(record.id)
    }

    /// Upsert the row's description mapping and, if named, its account mapping
    fn save_mappings(&self, batch_id: Uuid, row: &StagedRow) -> StrongboxResult<(usize, usize)> {
        let mappings = MappingService::new(self.storage, self.session);
        let mut saved = (0, 0);

        let category = row.effective_category().map(|c| c.name.as_str());
        let payee = row.effective_payee();
        if category.is_some() || payee.is_some() {
            mappings.upsert_description(&row.row.description, category, payee, Some(batch_id))?;
            saved.0 += 1;
        }

        if let Some(name) = &row.assigned_account_name {
            if !row.row.account_number.is_empty() {
                mappings.upsert_account(&row.row.account_number, name, Some(batch_id))?;
                saved.1 += 1;
            }
        }
        Ok(saved)
    }
}
