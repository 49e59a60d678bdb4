//! Payee model
//!
//! Payees are referenced from transactions by plaintext id; the name is sealed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PayeeId;
use crate::crypto::{AuthSession, Sealed};
use crate::error::StrongboxResult;

/// Persisted payee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayeeRecord {
    pub id: PayeeId,
    pub name: Sealed,
    pub created_at: DateTime<Utc>,
}

/// Decrypted payee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payee {
    pub id: PayeeId,
    pub name: String,
}

impl PayeeRecord {
    pub fn seal(session: &AuthSession, name: &str) -> StrongboxResult<Self> {
        Ok(Self {
            id: PayeeId::from_raw(0),
            name: session.encrypt_field(name.trim())?,
            created_at: Utc::now(),
        })
    }

    pub fn open(&self, session: &AuthSession) -> StrongboxResult<Payee> {
        Ok(Payee {
            id: self.id,
            name: session.decrypt_field(&self.name)?,
        })
    }
}
