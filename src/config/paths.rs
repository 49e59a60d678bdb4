//! Path management for Strongbox
//!
//! Provides XDG-compliant path resolution for configuration, data, and the audit log.
//!
//! ## Path Resolution Order
//!
//! 1. `STRONGBOX_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/strongbox` or `~/.config/strongbox`
//! 3. Windows: `%APPDATA%\strongbox`

use std::path::PathBuf;

use crate::error::StrongboxError;

/// Manages all paths used by Strongbox
#[derive(Debug, Clone)]
pub struct StrongboxPaths {
    /// Base directory for all Strongbox data
    base_dir: PathBuf,
}

impl StrongboxPaths {
    /// Create a new StrongboxPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, StrongboxError> {
        let base_dir = if let Ok(custom) = std::env::var("STRONGBOX_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create StrongboxPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (~/.config/strongbox/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the audit log
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    pub fn transactions_file(&self) -> PathBuf {
        self.data_dir().join("transactions.json")
    }

    pub fn categories_file(&self) -> PathBuf {
        self.data_dir().join("categories.json")
    }

    pub fn payees_file(&self) -> PathBuf {
        self.data_dir().join("payees.json")
    }

    pub fn description_mappings_file(&self) -> PathBuf {
        self.data_dir().join("description_mappings.json")
    }

    pub fn account_mappings_file(&self) -> PathBuf {
        self.data_dir().join("account_mappings.json")
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), StrongboxError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| StrongboxError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| StrongboxError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Check if Strongbox has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, StrongboxError> {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(config_home).join("strongbox"));
    }
    let home = std::env::var("HOME")
        .map_err(|_| StrongboxError::Config("Could not determine HOME directory".into()))?;
    Ok(PathBuf::from(home).join(".config").join("strongbox"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, StrongboxError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| StrongboxError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("strongbox"))
}
