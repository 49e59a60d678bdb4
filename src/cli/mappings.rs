//! Mapping CLI commands

use std::path::PathBuf;

use clap::Subcommand;

use crate::config::settings::ImportSettings;
use crate::crypto::AuthSession;
use crate::display::import::format_mapping_list;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::MappingId;
use crate::services::MappingService;
use crate::storage::Storage;

/// Mapping subcommands
#[derive(Subcommand)]
pub enum MappingCommands {
    /// Import description-to-category mappings from a CSV file
    Import {
        /// CSV file with Description and Category columns
        file: PathBuf,
        /// Print the staged rows without saving
        #[arg(long)]
        dry_run: bool,
    },
    /// List description mappings
    List,
    /// List account display names
    Accounts,
    /// Delete a description mapping
    Delete {
        /// Mapping ID
        id: String,
    },
}

/// Handle a mapping command
pub fn handle_mapping_command(
    storage: &Storage,
    session: &AuthSession,
    settings: &ImportSettings,
    cmd: MappingCommands,
) -> StrongboxResult<()> {
    let service = MappingService::new(storage, session);

    match cmd {
        MappingCommands::Import { file, dry_run } => {
            let staged = service.prepare_mappings_file(&file, settings.delimiter_byte()?)?;
            if staged.is_empty() {
                println!("No mapping rows found in {}", file.display());
                return Ok(());
            }

            for row in &staged {
                match &row.existing_category {
                    Some(existing) if existing != &row.category => println!(
                        "  {} -> {} (replaces {})",
                        row.description, row.category, existing
                    ),
                    _ => println!("  {} -> {}", row.description, row.category),
                }
            }
            if dry_run {
                println!("Dry run: {} rows staged, nothing saved.", staged.len());
                return Ok(());
            }

            let report = service.import_reviewed_mappings(&staged)?;
            println!("Saved {} mappings, skipped {}.", report.saved, report.skipped);
            for (index, message) in &report.failed {
                println!("  row {}: {}", index, message);
            }
        }

        MappingCommands::List => {
            print!("{}", format_mapping_list(&service.list_descriptions()?));
        }

        MappingCommands::Accounts => {
            let accounts = service.list_accounts()?;
            if accounts.is_empty() {
                println!("No account names saved.");
            }
            for mapping in accounts {
                println!("  {:8} {:16} {}", mapping.id.to_string(), mapping.account, mapping.display_name);
            }
        }

        MappingCommands::Delete { id } => {
            let id: MappingId = id
                .parse()
                .map_err(|_| StrongboxError::Validation(format!("Invalid mapping ID: '{}'", id)))?;
            service.delete_description(id)?;
            println!("Deleted mapping {}", id);
        }
    }

    Ok(())
}
