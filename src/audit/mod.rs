//! Audit logging for Strongbox
//!
//! Records every create, update and delete against the ledger in an
//! append-only JSONL file. Entries carry entity ids and operation kinds only;
//! field values never appear in the log.
//!
//! - `AuditEntry`: a single log entry with timestamp, operation, entity
//!   reference and optional import batch id.
//! - `AuditLogger`: appends entries to the log file and reads them back.

mod entry;
mod logger;

pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;
