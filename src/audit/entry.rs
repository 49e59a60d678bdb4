//! Audit entry data structures
//!
//! Entries record what happened to which record, never the record's
//! contents: the ledger's field values only exist on disk as ciphertext and
//! the audit trail must not become a plaintext side channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// Types of entities that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Transaction,
    Category,
    Payee,
    DescriptionMapping,
    AccountMapping,
    Credential,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Transaction => write!(f, "Transaction"),
            EntityType::Category => write!(f, "Category"),
            EntityType::Payee => write!(f, "Payee"),
            EntityType::DescriptionMapping => write!(f, "DescriptionMapping"),
            EntityType::AccountMapping => write!(f, "AccountMapping"),
            EntityType::Credential => write!(f, "Credential"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,

    pub entity_type: EntityType,

    /// ID of the affected entity
    pub entity_id: String,

    /// Import batch that caused the write, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,

    /// Short plaintext-free note, e.g. "linked to txn-4"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl AuditEntry {
    fn new(operation: Operation, entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type,
            entity_id: entity_id.into(),
            batch_id: None,
            summary: None,
        }
    }

    pub fn create(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self::new(Operation::Create, entity_type, entity_id)
    }

    pub fn update(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self::new(Operation::Update, entity_type, entity_id)
    }

    pub fn delete(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self::new(Operation::Delete, entity_type, entity_id)
    }

    /// Attach the import batch id
    pub fn in_batch(mut self, batch_id: Option<Uuid>) -> Self {
        self.batch_id = batch_id;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}
