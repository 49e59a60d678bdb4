//! User settings for Strongbox
//!
//! Holds the persisted credential artifacts (digest and salt, never the
//! password) and import preferences.

use serde::{Deserialize, Serialize};

use super::paths::StrongboxPaths;
use crate::crypto::key_derivation::DEFAULT_ITERATIONS;
use crate::error::StrongboxError;
use crate::storage::file_io::write_json_atomic;

/// The only password-derived artifacts that are ever written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSettings {
    /// Base64 PBKDF2 digest used to verify the password
    pub password_hash: String,
    /// Base64 16-byte salt shared by verification and key derivation
    pub password_salt: String,
    /// PBKDF2 iteration count used when the credential was created
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

/// CSV import preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    /// Field delimiter for transaction and mapping CSV files
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Maximum distance in days between the two legs of an auto-linked transfer
    #[serde(default = "default_transfer_window")]
    pub transfer_match_window_days: i64,

    /// Whether rows flagged as duplicates start out skipped
    #[serde(default = "default_true")]
    pub skip_duplicates_by_default: bool,
}

fn default_delimiter() -> char {
    ','
}

fn default_transfer_window() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            transfer_match_window_days: default_transfer_window(),
            skip_duplicates_by_default: true,
        }
    }
}

impl ImportSettings {
    /// The delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8, StrongboxError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                StrongboxError::Config(format!(
                    "CSV delimiter must be a single ASCII character, got '{}'",
                    self.delimiter
                ))
            })
    }
}

/// User settings for Strongbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Password verification material, set once at first setup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialSettings>,

    #[serde(default)]
    pub import: ImportSettings,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            credential: None,
            import: ImportSettings::default(),
        }
    }
}

impl Settings {
    /// Check whether first-time password setup has happened
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Get the stored credential or fail with a configuration error
    pub fn require_credential(&self) -> Result<&CredentialSettings, StrongboxError> {
        self.credential.as_ref().ok_or_else(|| {
            StrongboxError::Config("No password has been set up; run 'strongbox init'".into())
        })
    }

    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &StrongboxPaths) -> Result<Self, StrongboxError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                StrongboxError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                StrongboxError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk, replacing the file atomically
    pub fn save(&self, paths: &StrongboxPaths) -> Result<(), StrongboxError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.has_credential());
        assert_eq!(settings.import.delimiter, ',');
        assert_eq!(settings.import.transfer_match_window_days, 10);
        assert!(settings.import.skip_duplicates_by_default);
        assert!(settings.require_credential().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = StrongboxPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.credential = Some(CredentialSettings {
            password_hash: "aGFzaA==".into(),
            password_salt: "c2FsdA==".into(),
            iterations: 1_000,
        });
        settings.import.transfer_match_window_days = 5;
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.credential, settings.credential);
        assert_eq!(loaded.import.transfer_match_window_days, 5);
    }

    #[test]
    fn test_credential_uses_camel_case_keys() {
        let credential = CredentialSettings {
            password_hash: "h".into(),
            password_salt: "s".into(),
            iterations: DEFAULT_ITERATIONS,
        };
        let json = serde_json::to_string(&credential).unwrap();
        assert!(json.contains("passwordHash"));
        assert!(json.contains("passwordSalt"));
    }

    #[test]
    fn test_delimiter_byte() {
        let mut import = ImportSettings::default();
        assert_eq!(import.delimiter_byte().unwrap(), b',');
        import.delimiter = ';';
        assert_eq!(import.delimiter_byte().unwrap(), b';');
        import.delimiter = '€';
        assert!(import.delimiter_byte().is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.import.transfer_match_window_days, 10);
    }

    #[test]
    fn test_settings_written_by_older_versions_still_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = StrongboxPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();
        std::fs::write(
            paths.settings_file(),
            r#"{"schema_version":1,"import":{"delimiter":";"},"currency_symbol":"$"}"#,
        )
        .unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.import.delimiter, ';');

        loaded.save(&paths).unwrap();
        let rewritten = std::fs::read_to_string(paths.settings_file()).unwrap();
        assert!(!rewritten.contains("currency"));
    }
}
