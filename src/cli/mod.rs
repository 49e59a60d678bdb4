//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod auth;
pub mod category;
pub mod import;
pub mod mappings;
pub mod transaction;
pub mod transfer;

pub use auth::{handle_init, handle_password_command, unlock_session, PasswordCommands};
pub use category::{handle_category_command, CategoryCommands};
pub use import::{handle_import_command, ImportArgs};
pub use mappings::{handle_mapping_command, MappingCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};
pub use transfer::{handle_transfer_command, TransferCommands};
