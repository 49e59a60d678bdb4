//! Custom error types for Strongbox
//!
//! This module defines the error hierarchy for the ledger core using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Strongbox operations
#[derive(Error, Debug)]
pub enum StrongboxError {
    /// Encrypt/decrypt attempted while the session is locked
    #[error("Encryption key not initialized: unlock the ledger first")]
    KeyNotInitialized,

    /// Ciphertext failed authentication (tampered data or wrong key)
    #[error("Authentication failure: ciphertext was tampered with or the key is wrong")]
    AuthenticationFailure,

    /// A whole input file could not be parsed
    #[error("Parse error in {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Entity is still referenced and cannot be removed
    #[error("{entity_type} {identifier} is still referenced by {references} record(s)")]
    InUse {
        entity_type: &'static str,
        identifier: String,
        references: usize,
    },

    /// Auto-link found zero or several candidates
    #[error("Ambiguous transfer match for {id}: {candidates} candidate(s)")]
    AmbiguousMatch { id: String, candidates: usize },

    /// Only one leg of a transfer link was written
    #[error("One-sided transfer link: {id} points at {partner} but not back")]
    PartialLink { id: String, partner: String },

    /// Encryption errors other than key state or authentication
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StrongboxError {
    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for categories
    pub fn category_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Category",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for payees
    pub fn payee_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Payee",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for mappings
    pub fn mapping_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Mapping",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Key-manager failures are not recoverable inside a batch
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::KeyNotInitialized | Self::AuthenticationFailure)
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for StrongboxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StrongboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<csv::Error> for StrongboxError {
    fn from(err: csv::Error) -> Self {
        Self::Parse {
            source_name: "csv".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for Strongbox operations
pub type StrongboxResult<T> = Result<T, StrongboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StrongboxError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = StrongboxError::transaction_not_found("txn-7");
        assert_eq!(err.to_string(), "Transaction not found: txn-7");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_key_errors_are_flagged() {
        assert!(StrongboxError::KeyNotInitialized.is_key_error());
        assert!(StrongboxError::AuthenticationFailure.is_key_error());
        assert!(!StrongboxError::Validation("x".into()).is_key_error());
    }

    #[test]
    fn test_in_use_error() {
        let err = StrongboxError::InUse {
            entity_type: "Category",
            identifier: "cat-3".into(),
            references: 2,
        };
        assert_eq!(
            err.to_string(),
            "Category cat-3 is still referenced by 2 record(s)"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StrongboxError = io_err.into();
        assert!(matches!(err, StrongboxError::Io(_)));
    }
}
