//! Display formatting for terminal output
//!
//! Plain-text tables for decrypted values. Nothing here touches storage or
//! the session; callers pass in already-opened records.

pub mod category;
pub mod import;
pub mod transaction;

pub use category::{format_category_details, format_category_list};
pub use import::{
    format_auto_link_report, format_commit_report, format_mapping_list, format_repair_findings,
    format_staged_batch,
};
pub use transaction::{
    format_transaction_details, format_transaction_register, CategoryNames,
};
