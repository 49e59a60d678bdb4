//! Strongbox - a local-first, encrypted personal finance ledger
//!
//! Every user-entered field is encrypted with a key derived from the user's
//! password before it reaches disk. Bank statement CSVs are staged, reviewed
//! and committed in two phases, with learned description mappings,
//! duplicate detection and transfer pairing along the way.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `crypto`: Key derivation, field encryption and the unlocked session
//! - `models`: Sealed records and their decrypted views
//! - `storage`: JSON file record stores with atomic writes
//! - `services`: Business logic layer (import, review, mappings, transfers)
//! - `audit`: Audit logging system
//! - `display`, `cli`: Terminal front end
//!
//! # Example
//!
//! ```rust,ignore
//! use strongbox::config::{paths::StrongboxPaths, settings::Settings};
//! use strongbox::crypto::SecureString;
//! use strongbox::services::CredentialService;
//!
//! let paths = StrongboxPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let session = CredentialService::new(&paths)
//!     .unlock(&settings, &SecureString::new("correct horse battery"))?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{StrongboxError, StrongboxResult};
