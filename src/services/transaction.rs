//! Transaction service
//!
//! Manual entry, editing and deletion of transactions. Every write goes
//! through a sealed record; link changes are delegated to `TransferService`
//! so both legs of a transfer stay consistent.

use tracing::info;

use crate::audit::EntityType;
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{
    Amount, CategoryId, CategoryRef, KindTag, Transaction, TransactionDraft, TransactionId,
    TransactionKind,
};
use crate::storage::Storage;

use super::payee::PayeeService;
use super::transfer::TransferService;

/// Service for transaction management
pub struct TransactionService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
}

/// Options for filtering transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub kind: Option<KindTag>,
    pub category_id: Option<CategoryId>,
    /// Exact raw account identifier
    pub account: Option<String>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: KindTag) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Input for creating a new transaction
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    pub date: String,
    pub amount: Amount,
    pub description: String,
    pub account: String,
    pub note: Option<String>,
    pub category: Option<CategoryRef>,
    pub payee_name: Option<String>,
}

/// Field changes for an existing transaction; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub date: Option<String>,
    pub amount: Option<Amount>,
    pub description: Option<String>,
    pub account: Option<String>,
    pub note: Option<Option<String>>,
    pub category: Option<Option<CategoryRef>>,
}

impl<'a> TransactionService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession) -> Self {
        Self { storage, session }
    }

    /// Amount with the sign convention of the assigned category applied
    fn signed_amount(&self, amount: &Amount, category: Option<CategoryRef>) -> StrongboxResult<Amount> {
        match category {
            Some(CategoryRef::Real(id)) => {
                let record = self.storage.categories.require(id)?;
                Ok(record.category_type.apply_sign(amount))
            }
            _ => Ok(amount.clone()),
        }
    }

    /// Create a new transaction
    pub fn create(&self, input: CreateTransactionInput) -> StrongboxResult<Transaction> {
        let amount = self.signed_amount(&input.amount, input.category)?;
        let payee_id = match input.payee_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                Some(PayeeService::new(self.storage, self.session).find_or_create(name, None)?.id)
            }
            _ => None,
        };

        let draft = TransactionDraft {
            date: input.date.trim().to_string(),
            amount,
            description: input.description.trim().to_string(),
            account: input.account.trim().to_string(),
            note: input.note.filter(|n| !n.trim().is_empty()),
            kind: TransactionKind::from_category(input.category),
            payee_id,
        };

        let record = self.storage.transactions.insert(draft.seal(self.session)?)?;
        self.storage.log_create(EntityType::Transaction, record.id)?;
        info!(id = %record.id, kind = %record.kind, "Created transaction");

        record.open(self.session)
    }

    pub fn get(&self, id: TransactionId) -> StrongboxResult<Option<Transaction>> {
        self.storage
            .transactions
            .get(id)?
            .map(|record| record.open(self.session))
            .transpose()
    }

    /// List transactions, newest first
    ///
    /// Kind and category filters are applied on plaintext index fields
    /// before anything is decrypted.
    pub fn list(&self, filter: TransactionFilter) -> StrongboxResult<Vec<Transaction>> {
        let records = match filter.category_id {
            Some(category) => self
                .storage
                .transactions
                .ids_by_category(category)?
                .into_iter()
                .filter_map(|id| self.storage.transactions.get(id).transpose())
                .collect::<StrongboxResult<Vec<_>>>()?,
            None => self.storage.transactions.all()?,
        };

        let mut transactions = Vec::new();
        for record in records {
            if filter.kind.is_some_and(|kind| kind != record.kind) {
                continue;
            }
            let txn = record.open(self.session)?;
            if filter.account.as_ref().is_some_and(|account| *account != txn.account) {
                continue;
            }
            transactions.push(txn);
        }

        transactions.sort_by(|a, b| b.parsed_date().cmp(&a.parsed_date()).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            transactions.truncate(limit);
        }
        Ok(transactions)
    }

    /// Apply field changes
    ///
    /// Moving a linked transfer out of transfer handling unlinks it first.
    /// A transfer that stays a transfer keeps its link. The record and its
    /// partner stay locked from the first read to the final write, and the
    /// category sign convention is applied to the resulting amount.
    pub fn update(&self, id: TransactionId, update: TransactionUpdate) -> StrongboxResult<Transaction> {
        let transfers = TransferService::new(self.storage, self.session);
        let (_guard, record, partner) = transfers.lock_with_partner(id)?;
        let mut current = record.open(self.session)?;

        if let Some(Some(CategoryRef::Real(category))) = update.category {
            self.storage.categories.require(category)?;
        }

        let becomes_transfer = match update.category {
            Some(category) => category.is_some_and(|c| c.is_transfer()),
            None => current.is_transfer(),
        };
        if partner.is_some() && !becomes_transfer {
            transfers.unlink_locked(record)?;
            current = self.storage.transactions.require(id)?.open(self.session)?;
        }

        let mut draft = current.to_draft();
        if let Some(date) = update.date {
            draft.date = date.trim().to_string();
        }
        if let Some(amount) = update.amount {
            draft.amount = amount;
        }
        if let Some(description) = update.description {
            draft.description = description.trim().to_string();
        }
        if let Some(account) = update.account {
            draft.account = account.trim().to_string();
        }
        if let Some(note) = update.note {
            draft.note = note.filter(|n| !n.trim().is_empty());
        }
        if let Some(category) = update.category {
            draft.kind = match (TransactionKind::from_category(category), current.kind) {
                (TransactionKind::Transfer(_), TransactionKind::Transfer(status)) => {
                    TransactionKind::Transfer(status)
                }
                (kind, _) => kind,
            };
        }
        if let TransactionKind::Categorized(category) = draft.kind {
            draft.amount = self.signed_amount(&draft.amount, Some(CategoryRef::Real(category)))?;
        }

        let mut record = draft.seal(self.session)?;
        record.id = id;
        record.created_at = current.created_at;
        self.storage.transactions.update(record.clone())?;
        self.storage.log_update(EntityType::Transaction, id)?;

        record.open(self.session)
    }

    /// Change the partner of a transfer
    pub fn set_link_target(
        &self,
        id: TransactionId,
        target: Option<TransactionId>,
    ) -> StrongboxResult<()> {
        TransferService::new(self.storage, self.session).set_link_target(id, target)
    }

    /// Delete a transaction, unlinking its transfer partner first
    ///
    /// The record and its partner stay locked until the record is gone, so
    /// nothing can link to it in between.
    pub fn delete(&self, id: TransactionId) -> StrongboxResult<()> {
        let transfers = TransferService::new(self.storage, self.session);
        let (_guard, record, partner) = transfers.lock_with_partner(id)?;
        if partner.is_some() {
            transfers.unlink_locked(record)?;
        }

        self.storage.transactions.delete(id)?;
        self.storage.log_delete(EntityType::Transaction, id)?;
        info!(id = %id, "Deleted transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::StrongboxPaths;
    use crate::crypto::session::test_support::unlocked_session;
    use crate::models::CategoryType;
    use crate::services::category::CategoryService;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = StrongboxPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        (temp_dir, storage)
    }

    fn input(amount: &str, account: &str, category: Option<CategoryRef>) -> CreateTransactionInput {
        CreateTransactionInput {
            date: "2024-01-05".into(),
            amount: Amount::parse(amount).unwrap(),
            description: "STARBUCKS".into(),
            account: account.into(),
            note: None,
            category,
            payee_name: None,
        }
    }

    #[test]
    fn test_create_applies_sign_convention() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let categories = CategoryService::new(&storage, &session);
        let coffee = categories.create("Coffee", None, CategoryType::Expense).unwrap();
        let salary = categories.create("Salary", None, CategoryType::Income).unwrap();
        let service = TransactionService::new(&storage, &session);

        let expense = service
            .create(input("4.50", "1234", Some(coffee.category_ref())))
            .unwrap();
        assert_eq!(expense.amount.as_str(), "-4.50");
        assert_eq!(expense.kind, TransactionKind::Categorized(coffee.id));

        let income = service
            .create(input("-2000", "1234", Some(salary.category_ref())))
            .unwrap();
        assert_eq!(income.amount.as_str(), "2000");

        let transfer = service
            .create(input("-100", "1234", Some(CategoryRef::Transfer)))
            .unwrap();
        assert_eq!(transfer.amount.as_str(), "-100");
        assert!(transfer.is_unlinked_transfer());
    }

    #[test]
    fn test_create_with_payee_and_unknown_category() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransactionService::new(&storage, &session);

        let mut with_payee = input("-4.50", "1234", None);
        with_payee.payee_name = Some("Starbucks".into());
        let txn = service.create(with_payee).unwrap();
        assert!(txn.payee_id.is_some());
        assert_eq!(txn.kind, TransactionKind::Uncategorized);

        let bogus = input("-1", "1234", Some(CategoryRef::Real(CategoryId::from_raw(42))));
        assert!(service.create(bogus).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_filters() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let coffee = CategoryService::new(&storage, &session)
            .create("Coffee", None, CategoryType::Expense)
            .unwrap();
        let service = TransactionService::new(&storage, &session);

        service.create(input("-4.50", "1234", Some(coffee.category_ref()))).unwrap();
        service.create(input("-9.00", "5678", None)).unwrap();
        service.create(input("-100", "5678", Some(CategoryRef::Transfer))).unwrap();

        assert_eq!(service.list(TransactionFilter::new()).unwrap().len(), 3);
        assert_eq!(
            service.list(TransactionFilter::new().category(coffee.id)).unwrap().len(),
            1
        );
        assert_eq!(
            service.list(TransactionFilter::new().kind(KindTag::Transfer)).unwrap().len(),
            1
        );
        assert_eq!(
            service.list(TransactionFilter::new().account("5678")).unwrap().len(),
            2
        );
        assert_eq!(service.list(TransactionFilter::new().limit(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_cascades_unlink() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransactionService::new(&storage, &session);
        let a = service.create(input("-100", "checking", Some(CategoryRef::Transfer))).unwrap();
        let b = service.create(input("100", "savings", Some(CategoryRef::Transfer))).unwrap();
        service.set_link_target(a.id, Some(b.id)).unwrap();

        service.delete(a.id).unwrap();

        assert!(service.get(a.id).unwrap().is_none());
        let b = service.get(b.id).unwrap().unwrap();
        assert_eq!(b.link_partner(), None);
        assert!(b.is_unlinked_transfer());
    }

    #[test]
    fn test_update_keeps_or_drops_link() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransactionService::new(&storage, &session);
        let a = service.create(input("-100", "checking", Some(CategoryRef::Transfer))).unwrap();
        let b = service.create(input("100", "savings", Some(CategoryRef::Transfer))).unwrap();
        service.set_link_target(a.id, Some(b.id)).unwrap();

        let edited = service
            .update(
                a.id,
                TransactionUpdate {
                    note: Some(Some("rent buffer".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.link_partner(), Some(b.id));
        assert_eq!(edited.note.as_deref(), Some("rent buffer"));

        let edited = service
            .update(
                a.id,
                TransactionUpdate {
                    category: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.kind, TransactionKind::Uncategorized);
        assert_eq!(service.get(b.id).unwrap().unwrap().link_partner(), None);
    }

    #[test]
    fn test_update_keeps_sign_convention() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let categories = CategoryService::new(&storage, &session);
        let coffee = categories.create("Coffee", None, CategoryType::Expense).unwrap();
        let salary = categories.create("Salary", None, CategoryType::Income).unwrap();
        let service = TransactionService::new(&storage, &session);

        let txn = service
            .create(input("4.50", "1234", Some(coffee.category_ref())))
            .unwrap();
        assert_eq!(txn.amount.as_str(), "-4.50");

        // Amount edited, category untouched
        let edited = service
            .update(
                txn.id,
                TransactionUpdate {
                    amount: Some(Amount::parse("6.00").unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.amount.as_str(), "-6.00");
        assert_eq!(
            service.get(txn.id).unwrap().unwrap().amount.as_str(),
            "-6.00"
        );

        let moved = service
            .update(
                txn.id,
                TransactionUpdate {
                    category: Some(Some(salary.category_ref())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(moved.amount.as_str(), "6.00");

        // Uncategorized rows keep whatever sign they are given
        let plain = service.create(input("-9.00", "1234", None)).unwrap();
        let edited = service
            .update(
                plain.id,
                TransactionUpdate {
                    amount: Some(Amount::parse("9.00").unwrap()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.amount.as_str(), "9.00");
    }

    #[test]
    fn test_update_and_delete_wait_for_partner_lock() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransactionService::new(&storage, &session);
        let a = service.create(input("-100", "checking", Some(CategoryRef::Transfer))).unwrap();
        let b = service.create(input("100", "savings", Some(CategoryRef::Transfer))).unwrap();
        service.set_link_target(a.id, Some(b.id)).unwrap();

        // Another operation holds the partner leg
        let held = storage.locks().acquire(&[b.id]).unwrap();
        thread::scope(|scope| {
            let editing = scope.spawn(|| {
                service.update(
                    a.id,
                    TransactionUpdate {
                        note: Some(Some("waited".into())),
                        ..Default::default()
                    },
                )
            });
            thread::sleep(Duration::from_millis(100));
            assert!(!editing.is_finished());
            drop(held);
            let edited = editing.join().unwrap().unwrap();
            assert_eq!(edited.link_partner(), Some(b.id));
        });

        let held = storage.locks().acquire(&[b.id]).unwrap();
        thread::scope(|scope| {
            let deleting = scope.spawn(|| service.delete(a.id));
            thread::sleep(Duration::from_millis(100));
            assert!(!deleting.is_finished());
            assert!(service.get(a.id).unwrap().is_some());
            drop(held);
            deleting.join().unwrap().unwrap();
        });

        assert!(service.get(a.id).unwrap().is_none());
        assert!(service.get(b.id).unwrap().unwrap().is_unlinked_transfer());
        assert!(!storage.locks().is_held(a.id));
        assert!(!storage.locks().is_held(b.id));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let (_temp, storage) = create_test_storage();
        let session = unlocked_session();
        let service = TransactionService::new(&storage, &session);
        let err = service
            .update(TransactionId::from_raw(3), TransactionUpdate::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
