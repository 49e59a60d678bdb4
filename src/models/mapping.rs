//! Learned mappings
//!
//! A description mapping remembers which category and payee a raw statement
//! description should get; an account mapping remembers the display name of
//! a raw account identifier. Both are keyed by their exact raw string, and
//! the key itself is sealed like every other attribute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::MappingId;
use crate::crypto::{AuthSession, Sealed};
use crate::error::StrongboxResult;

/// Persisted description mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionMappingRecord {
    pub id: MappingId,
    pub description: Sealed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Sealed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee: Option<Sealed>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted description mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionMapping {
    pub id: MappingId,
    /// Exact raw description; case-sensitive
    pub description: String,
    /// Target category name ("Transfer" routes to transfer handling)
    pub category: Option<String>,
    /// Target payee name
    pub payee: Option<String>,
}

impl DescriptionMappingRecord {
    pub fn seal(
        session: &AuthSession,
        description: &str,
        category: Option<&str>,
        payee: Option<&str>,
    ) -> StrongboxResult<Self> {
        Ok(Self {
            id: MappingId::from_raw(0),
            description: session.encrypt_field(description)?,
            category: session.encrypt_optional(category)?,
            payee: session.encrypt_optional(payee)?,
            updated_at: Utc::now(),
        })
    }

    pub fn open(&self, session: &AuthSession) -> StrongboxResult<DescriptionMapping> {
        Ok(DescriptionMapping {
            id: self.id,
            description: session.decrypt_field(&self.description)?,
            category: session.decrypt_optional(self.category.as_ref())?,
            payee: session.decrypt_optional(self.payee.as_ref())?,
        })
    }
}

/// Persisted account mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountMappingRecord {
    pub id: MappingId,
    pub account: Sealed,
    pub display_name: Sealed,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted account mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMapping {
    pub id: MappingId,
    pub account: String,
    pub display_name: String,
}

impl AccountMappingRecord {
    pub fn seal(session: &AuthSession, account: &str, display_name: &str) -> StrongboxResult<Self> {
        Ok(Self {
            id: MappingId::from_raw(0),
            account: session.encrypt_field(account)?,
            display_name: session.encrypt_field(display_name)?,
            updated_at: Utc::now(),
        })
    }

    pub fn open(&self, session: &AuthSession) -> StrongboxResult<AccountMapping> {
        Ok(AccountMapping {
            id: self.id,
            account: session.decrypt_field(&self.account)?,
            display_name: session.decrypt_field(&self.display_name)?,
        })
    }
}
