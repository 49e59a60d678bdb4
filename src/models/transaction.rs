//! Transaction model
//!
//! A transaction is persisted as a `TransactionRecord`: plaintext ids and a
//! kind tag for querying, every other attribute sealed per field. Opening a
//! record with an unlocked session yields the plaintext `Transaction`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::CategoryRef;
use super::ids::{CategoryId, PayeeId, TransactionId};
use super::money::Amount;
use crate::crypto::{AuthSession, Sealed};
use crate::error::{StrongboxError, StrongboxResult};

/// Link state of a transfer leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    Unlinked,
    LinkedTo(TransactionId),
}

impl LinkStatus {
    pub fn partner(&self) -> Option<TransactionId> {
        match self {
            Self::Unlinked => None,
            Self::LinkedTo(id) => Some(*id),
        }
    }
}

impl From<Option<TransactionId>> for LinkStatus {
    fn from(value: Option<TransactionId>) -> Self {
        value.map_or(Self::Unlinked, Self::LinkedTo)
    }
}

/// What a transaction is, which decides how it is filed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Uncategorized,
    Transfer(LinkStatus),
    Categorized(CategoryId),
}

impl TransactionKind {
    /// Kind implied by a row's category assignment
    pub fn from_category(category: Option<CategoryRef>) -> Self {
        match category {
            None => Self::Uncategorized,
            Some(CategoryRef::Transfer) => Self::Transfer(LinkStatus::Unlinked),
            Some(CategoryRef::Real(id)) => Self::Categorized(id),
        }
    }

    pub fn tag(&self) -> KindTag {
        match self {
            Self::Uncategorized => KindTag::Uncategorized,
            Self::Transfer(_) => KindTag::Transfer,
            Self::Categorized(_) => KindTag::Categorized,
        }
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        match self {
            Self::Categorized(id) => Some(*id),
            _ => None,
        }
    }

    /// Partner of a linked transfer
    pub fn link_partner(&self) -> Option<TransactionId> {
        match self {
            Self::Transfer(status) => status.partner(),
            _ => None,
        }
    }
}

/// Plaintext discriminant stored next to the sealed fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    Uncategorized,
    Categorized,
    Transfer,
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uncategorized => write!(f, "Uncategorized"),
            Self::Categorized => write!(f, "Categorized"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

/// Persisted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub kind: KindTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee_id: Option<PayeeId>,
    pub date: Sealed,
    pub amount: Sealed,
    pub description: Sealed,
    pub account: Sealed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Sealed>,
    /// Transfers only: JSON of `Option<TransactionId>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Sealed>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: String,
    pub amount: Amount,
    pub description: String,
    pub account: String,
    pub note: Option<String>,
    pub kind: TransactionKind,
    pub payee_id: Option<PayeeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_transfer(&self) -> bool {
        matches!(self.kind, TransactionKind::Transfer(_))
    }

    pub fn is_unlinked_transfer(&self) -> bool {
        matches!(self.kind, TransactionKind::Transfer(LinkStatus::Unlinked))
    }

    /// The other leg, if this is a linked transfer
    pub fn link_partner(&self) -> Option<TransactionId> {
        self.kind.link_partner()
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_statement_date(&self.date)
    }

    /// Plaintext fields as a draft, for editing
    pub fn to_draft(&self) -> TransactionDraft {
        TransactionDraft {
            date: self.date.clone(),
            amount: self.amount.clone(),
            description: self.description.clone(),
            account: self.account.clone(),
            note: self.note.clone(),
            kind: self.kind,
            payee_id: self.payee_id,
        }
    }
}

/// Plaintext input for creating or replacing a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub date: String,
    pub amount: Amount,
    pub description: String,
    pub account: String,
    pub note: Option<String>,
    pub kind: TransactionKind,
    pub payee_id: Option<PayeeId>,
}

impl TransactionDraft {
    pub fn validate(&self) -> StrongboxResult<()> {
        if self.date.trim().is_empty() {
            return Err(StrongboxError::Validation("Transaction date is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(StrongboxError::Validation(
                "Transaction description is required".into(),
            ));
        }
        Ok(())
    }

    /// Encrypt every field; the store assigns the id on insert
    pub fn seal(&self, session: &AuthSession) -> StrongboxResult<TransactionRecord> {
        self.validate()?;
        let now = Utc::now();
        let mut record = TransactionRecord {
            id: TransactionId::from_raw(0),
            kind: self.kind.tag(),
            category_id: self.kind.category_id(),
            payee_id: self.payee_id,
            date: session.encrypt_field(&self.date)?,
            amount: session.encrypt_field(self.amount.as_str())?,
            description: session.encrypt_field(&self.description)?,
            account: session.encrypt_field(&self.account)?,
            note: session.encrypt_optional(self.note.as_deref())?,
            link: None,
            created_at: now,
            updated_at: now,
        };
        if let TransactionKind::Transfer(status) = self.kind {
            record.reseal_link(session, status)?;
        }
        Ok(record)
    }
}

impl TransactionRecord {
    pub fn open(&self, session: &AuthSession) -> StrongboxResult<Transaction> {
        let amount_text = session.decrypt_field(&self.amount)?;
        let amount = Amount::parse(&amount_text).map_err(|e| {
            StrongboxError::Storage(format!("Transaction {} has an unreadable amount: {}", self.id, e))
        })?;

        Ok(Transaction {
            id: self.id,
            date: session.decrypt_field(&self.date)?,
            amount,
            description: session.decrypt_field(&self.description)?,
            account: session.decrypt_field(&self.account)?,
            note: session.decrypt_optional(self.note.as_ref())?,
            kind: self.open_kind(session)?,
            payee_id: self.payee_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// Decrypt only what is needed to know the kind
    pub fn open_kind(&self, session: &AuthSession) -> StrongboxResult<TransactionKind> {
        match self.kind {
            KindTag::Uncategorized => Ok(TransactionKind::Uncategorized),
            KindTag::Categorized => self
                .category_id
                .map(TransactionKind::Categorized)
                .ok_or_else(|| {
                    StrongboxError::Storage(format!(
                        "Categorized transaction {} has no category",
                        self.id
                    ))
                }),
            KindTag::Transfer => {
                let partner: Option<TransactionId> = match &self.link {
                    Some(sealed) => session.decrypt_json(sealed)?,
                    None => None,
                };
                Ok(TransactionKind::Transfer(partner.into()))
            }
        }
    }

    /// Re-encrypt only the link field of a transfer
    pub fn reseal_link(&mut self, session: &AuthSession, status: LinkStatus) -> StrongboxResult<()> {
        if self.kind != KindTag::Transfer {
            return Err(StrongboxError::Validation(format!(
                "Transaction {} is not a transfer",
                self.id
            )));
        }
        self.link = Some(session.encrypt_json(&status.partner())?);
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Parse a statement date using the common export formats
pub fn parse_statement_date(s: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 8] = [
        "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%m-%d-%Y",
        "%d-%m-%Y",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}
