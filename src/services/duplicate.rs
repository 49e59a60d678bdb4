//! Duplicate detection
//!
//! A candidate row is a duplicate when an existing transaction has the same
//! date, amount text and description, compared as exact strings. There is
//! no fuzzy matching and no index: each check is a linear scan over the
//! decrypted keys.

use crate::crypto::AuthSession;
use crate::error::StrongboxResult;
use crate::models::Amount;
use crate::storage::Storage;

/// The three fields duplicate detection compares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub date: String,
    pub amount: String,
    pub description: String,
}

impl RecordKey {
    pub fn new(date: &str, amount: &Amount, description: &str) -> Self {
        Self {
            date: date.to_string(),
            amount: amount.as_str().to_string(),
            description: description.to_string(),
        }
    }
}

/// Decrypted keys of every existing transaction
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    existing: Vec<RecordKey>,
}

impl DuplicateDetector {
    pub fn new(existing: Vec<RecordKey>) -> Self {
        Self { existing }
    }

    /// Decrypt the date, amount and description of every stored transaction
    ///
    /// Only those three fields are opened.
    pub fn from_storage(storage: &Storage, session: &AuthSession) -> StrongboxResult<Self> {
        let existing = storage
            .transactions
            .all()?
            .iter()
            .map(|record| {
                Ok(RecordKey {
                    date: session.decrypt_field(&record.date)?,
                    amount: session.decrypt_field(&record.amount)?,
                    description: session.decrypt_field(&record.description)?,
                })
            })
            .collect::<StrongboxResult<Vec<_>>>()?;
        Ok(Self { existing })
    }

    pub fn is_duplicate(&self, date: &str, amount: &Amount, description: &str) -> bool {
        self.existing.iter().any(|key| {
            key.date == date && key.amount == amount.as_str() && key.description == description
        })
    }

    pub fn len(&self) -> usize {
        self.existing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.existing.is_empty()
    }
}
