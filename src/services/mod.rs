//! Service layer for Strongbox
//!
//! Services sit on top of the storage layer and own everything that needs
//! plaintext: they open records with the caller's `AuthSession`, apply
//! validation and cross-record rules, and seal the results back.

pub mod category;
pub mod credential;
pub mod duplicate;
pub mod import;
pub mod mapping;
pub mod payee;
pub mod review;
pub mod transaction;
pub mod transfer;

pub use category::CategoryService;
pub use credential::{CredentialService, ResealCounts};
pub use duplicate::DuplicateDetector;
pub use import::{ImportService, IngestSummary, ParsedRow};
pub use mapping::{MappingResolver, MappingService};
pub use payee::PayeeService;
pub use review::{CommitReport, ReviewService, RowEdit, StagedBatch, StagedRow};
pub use transaction::{CreateTransactionInput, TransactionFilter, TransactionService, TransactionUpdate};
pub use transfer::{AutoLinkReport, TransferService};
