//! Password prompts, first-time setup and password change

use clap::Subcommand;

use crate::config::{paths::StrongboxPaths, settings::Settings};
use crate::crypto::{AuthSession, SecureString};
use crate::error::{StrongboxError, StrongboxResult};
use crate::services::CredentialService;
use crate::storage::Storage;

/// Environment variable consulted before prompting for the password
pub const PASSWORD_ENV: &str = "STRONGBOX_PASSWORD";

/// Environment variable consulted before prompting for a new password
pub const NEW_PASSWORD_ENV: &str = "STRONGBOX_NEW_PASSWORD";

/// Password management commands
#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Change the ledger password and re-encrypt all data
    Change,
}

/// Read a password from `env_var` if set, else prompt without echo
pub fn read_password(env_var: &str, prompt: &str) -> StrongboxResult<SecureString> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(SecureString::new(value));
    }
    rpassword::prompt_password(prompt)
        .map(SecureString::new)
        .map_err(|e| StrongboxError::Io(format!("Failed to read password: {}", e)))
}

/// Read a new password, asking twice when prompting interactively
fn read_new_password(env_var: &str) -> StrongboxResult<SecureString> {
    if let Ok(value) = std::env::var(env_var) {
        return Ok(SecureString::new(value));
    }
    let first = read_password(env_var, "New password: ")?;
    let second = read_password(env_var, "Confirm password: ")?;
    if first.as_str() != second.as_str() {
        return Err(StrongboxError::Validation("Passwords do not match".into()));
    }
    Ok(first)
}

/// Verify the password and return an unlocked session
pub fn unlock_session(paths: &StrongboxPaths, settings: &Settings) -> StrongboxResult<AuthSession> {
    settings.require_credential()?;
    let password = read_password(PASSWORD_ENV, "Password: ")?;
    CredentialService::new(paths).unlock(settings, &password)
}

/// Handle `strongbox init`
pub fn handle_init(paths: &StrongboxPaths, settings: &mut Settings) -> StrongboxResult<()> {
    if settings.has_credential() {
        println!("Strongbox is already initialized at {}", paths.base_dir().display());
        return Ok(());
    }

    println!("Initializing Strongbox at: {}", paths.base_dir().display());
    println!("There is no way to recover data if the password is lost.");

    let password = read_new_password(PASSWORD_ENV)?;
    CredentialService::new(paths).initialize(settings, &password)?;
    Storage::open(paths.clone())?;

    println!("Initialization complete!");
    println!("Run 'strongbox import <file.csv>' to stage your first statement.");
    Ok(())
}

/// Handle password commands
pub fn handle_password_command(
    paths: &StrongboxPaths,
    settings: &mut Settings,
    storage: &Storage,
    cmd: PasswordCommands,
) -> StrongboxResult<()> {
    match cmd {
        PasswordCommands::Change => {
            let current = read_password(PASSWORD_ENV, "Current password: ")?;
            let new = read_new_password(NEW_PASSWORD_ENV)?;
            let (_, counts) =
                CredentialService::new(paths).change_password(storage, settings, &current, &new)?;
            println!("Password changed; {} records re-encrypted.", counts.total());
        }
    }
    Ok(())
}
