//! Core data models for Strongbox
//!
//! Each entity comes in two shapes: a `*Record` that is persisted with its
//! attributes sealed, and a plaintext view produced by opening the record
//! with an unlocked `AuthSession`.

pub mod category;
pub mod ids;
pub mod mapping;
pub mod money;
pub mod payee;
pub mod transaction;

pub use category::{Category, CategoryRecord, CategoryRef, CategoryType, TRANSFER_CATEGORY_NAME};
pub use ids::{CategoryId, MappingId, PayeeId, RecordId, TransactionId};
pub use mapping::{AccountMapping, AccountMappingRecord, DescriptionMapping, DescriptionMappingRecord};
pub use money::{Amount, AmountParseError};
pub use payee::{Payee, PayeeRecord};
pub use transaction::{
    parse_statement_date, KindTag, LinkStatus, Transaction, TransactionDraft, TransactionKind,
    TransactionRecord,
};
