//! Category model
//!
//! Categories carry an encrypted name and spending limit plus a plaintext
//! type. "Transfer" is not a stored category: rows routed to transfer
//! handling reference `CategoryRef::Transfer` instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CategoryId;
use super::money::Amount;
use crate::crypto::{AuthSession, Sealed};
use crate::error::{StrongboxError, StrongboxResult};

/// The reserved category name that routes a row to transfer handling
pub const TRANSFER_CATEGORY_NAME: &str = "Transfer";

/// Whether a name collides with the reserved transfer sentinel
pub fn is_reserved_name(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(TRANSFER_CATEGORY_NAME)
}

/// Kind of category, which also fixes the sign of committed amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Income,
    Expense,
    Saving,
    /// Sentinel type of `CategoryRef::Transfer`; never stored
    Transfer,
}

impl CategoryType {
    /// Apply the sign convention: income positive, expense and saving negative
    ///
    /// Transfers keep the sign they arrived with.
    pub fn apply_sign(&self, amount: &Amount) -> Amount {
        match self {
            Self::Income => amount.with_sign(false),
            Self::Expense | Self::Saving => amount.with_sign(true),
            Self::Transfer => amount.clone(),
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Income => write!(f, "Income"),
            Self::Expense => write!(f, "Expense"),
            Self::Saving => write!(f, "Saving"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

impl std::str::FromStr for CategoryType {
    type Err = StrongboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "saving" | "savings" => Ok(Self::Saving),
            other => Err(StrongboxError::Validation(format!(
                "Unknown category type '{}': expected income, expense or saving",
                other
            ))),
        }
    }
}

/// A category assignment on a row: a real stored category, or the transfer sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum CategoryRef {
    Real(CategoryId),
    Transfer,
}

impl CategoryRef {
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer)
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        match self {
            Self::Real(id) => Some(*id),
            Self::Transfer => None,
        }
    }
}

/// Persisted category: everything but the id and type is ciphertext
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: Sealed,
    /// JSON of `Option<Amount>`
    pub limit: Sealed,
    pub category_type: CategoryType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub limit: Option<Amount>,
    pub category_type: CategoryType,
}

impl Category {
    pub fn category_ref(&self) -> CategoryRef {
        CategoryRef::Real(self.id)
    }
}

impl CategoryRecord {
    /// Encrypt a new category; the store assigns the id on insert
    pub fn seal(
        session: &AuthSession,
        name: &str,
        limit: Option<&Amount>,
        category_type: CategoryType,
    ) -> StrongboxResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: CategoryId::from_raw(0),
            name: session.encrypt_field(name)?,
            limit: session.encrypt_json(&limit)?,
            category_type,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn open(&self, session: &AuthSession) -> StrongboxResult<Category> {
        Ok(Category {
            id: self.id,
            name: session.decrypt_field(&self.name)?,
            limit: session.decrypt_json(&self.limit)?,
            category_type: self.category_type,
        })
    }

    /// Re-encrypt only the limit field
    pub fn reseal_limit(&mut self, session: &AuthSession, limit: Option<&Amount>) -> StrongboxResult<()> {
        self.limit = session.encrypt_json(&limit)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Validate a user-supplied category name
pub fn validate_name(name: &str) -> StrongboxResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StrongboxError::Validation("Category name cannot be empty".into()));
    }
    if is_reserved_name(trimmed) {
        return Err(StrongboxError::Validation(format!(
            "'{}' is reserved for transfers",
            TRANSFER_CATEGORY_NAME
        )));
    }
    Ok(())
}
