//! Category CLI commands

use clap::Subcommand;

use crate::crypto::AuthSession;
use crate::display::category::{format_category_details, format_category_list};
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{Amount, CategoryType};
use crate::services::CategoryService;
use crate::storage::Storage;

/// Category subcommands
#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List all categories
    List,

    /// Create a new category
    Add {
        /// Category name
        name: String,
        /// Category type: income, expense or saving
        #[arg(short = 't', long = "type", default_value = "expense")]
        category_type: String,
        /// Spending limit (e.g., "500" or "500.00")
        #[arg(short, long)]
        limit: Option<String>,
    },

    /// Show category details
    Show {
        /// Category name or ID
        category: String,
    },

    /// Set or clear a category's limit
    Limit {
        /// Category name or ID
        category: String,
        /// New limit; omit to clear
        amount: Option<String>,
    },

    /// Delete a category no transaction uses
    Delete {
        /// Category name or ID
        category: String,
    },
}

fn parse_limit(raw: &str) -> StrongboxResult<Amount> {
    Amount::parse(raw)
        .map_err(|e| StrongboxError::Validation(format!("Invalid limit amount: {}", e)))
}

/// Handle a category command
pub fn handle_category_command(
    storage: &Storage,
    session: &AuthSession,
    cmd: CategoryCommands,
) -> StrongboxResult<()> {
    let service = CategoryService::new(storage, session);

    match cmd {
        CategoryCommands::List => {
            print!("{}", format_category_list(&service.list()?));
        }

        CategoryCommands::Add {
            name,
            category_type,
            limit,
        } => {
            let category_type: CategoryType = category_type.parse()?;
            let limit = limit.as_deref().map(parse_limit).transpose()?;
            let category = service.create(&name, limit, category_type)?;

            println!("Created category: {}", category.name);
            println!("  Type: {}", category.category_type);
            println!("  ID:   {}", category.id);
        }

        CategoryCommands::Show { category } => {
            let found = service
                .find(&category)?
                .ok_or_else(|| StrongboxError::category_not_found(&category))?;
            let count = storage.transactions.ids_by_category(found.id)?.len();
            print!("{}", format_category_details(&found, count));
        }

        CategoryCommands::Limit { category, amount } => {
            let found = service
                .find(&category)?
                .ok_or_else(|| StrongboxError::category_not_found(&category))?;
            let limit = amount.as_deref().map(parse_limit).transpose()?;
            let updated = service.update_limit(found.id, limit)?;
            match updated.limit {
                Some(limit) => println!("Limit for {} set to {}", updated.name, limit),
                None => println!("Limit for {} cleared", updated.name),
            }
        }

        CategoryCommands::Delete { category } => {
            let found = service
                .find(&category)?
                .ok_or_else(|| StrongboxError::category_not_found(&category))?;
            service.delete(found.id)?;
            println!("Deleted category: {}", found.name);
        }
    }

    Ok(())
}
