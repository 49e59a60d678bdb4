//! Configuration module for Strongbox
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - Persisted credential settings
//! - Import preferences

pub mod paths;
pub mod settings;

pub use paths::StrongboxPaths;
pub use settings::{CredentialSettings, ImportSettings, Settings};
