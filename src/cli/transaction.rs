//! Transaction CLI commands

use clap::Subcommand;

use crate::crypto::AuthSession;
use crate::display::transaction::{
    format_transaction_details, format_transaction_register, CategoryNames,
};
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::{Amount, CategoryRef, KindTag, TransactionId};
use crate::services::{
    CategoryService, CreateTransactionInput, PayeeService, TransactionFilter, TransactionService,
    TransactionUpdate,
};
use crate::storage::Storage;

/// Transaction subcommands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Add a transaction by hand
    Add {
        /// Statement date (e.g., 2024-01-05)
        date: String,
        /// Amount (e.g., "-4.50" for outflow)
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Description as it appears on the statement
        description: String,
        /// Account identifier
        #[arg(short, long, default_value = "")]
        account: String,
        /// Category name, or "Transfer"
        #[arg(short, long)]
        category: Option<String>,
        /// Payee name
        #[arg(short, long)]
        payee: Option<String>,
        /// Free-text note
        #[arg(short, long)]
        note: Option<String>,
    },
    /// List transactions, newest first
    List {
        /// Filter by account identifier
        #[arg(short, long)]
        account: Option<String>,
        /// Filter by category name
        #[arg(short = 'C', long)]
        category: Option<String>,
        /// Filter by kind: uncategorized, categorized or transfer
        #[arg(short, long)]
        kind: Option<String>,
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show transaction details
    Show {
        /// Transaction ID
        id: String,
    },
    /// Edit a transaction
    Edit {
        /// Transaction ID
        id: String,
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long, allow_hyphen_values = true)]
        amount: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        account: Option<String>,
        /// New category name, or "Transfer"
        #[arg(short, long)]
        category: Option<String>,
        /// Remove the category
        #[arg(long, conflicts_with = "category")]
        uncategorize: bool,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: String,
    },
}

pub(crate) fn parse_transaction_id(raw: &str) -> StrongboxResult<TransactionId> {
    raw.parse()
        .map_err(|_| StrongboxError::Validation(format!("Invalid transaction ID: '{}'", raw)))
}

fn parse_amount(raw: &str) -> StrongboxResult<Amount> {
    Amount::parse(raw).map_err(|e| StrongboxError::Validation(format!("Invalid amount: {}", e)))
}

fn parse_kind(raw: &str) -> StrongboxResult<KindTag> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "uncategorized" => Ok(KindTag::Uncategorized),
        "categorized" => Ok(KindTag::Categorized),
        "transfer" => Ok(KindTag::Transfer),
        other => Err(StrongboxError::Validation(format!(
            "Unknown kind '{}': expected uncategorized, categorized or transfer",
            other
        ))),
    }
}

fn resolve_category(service: &CategoryService, name: &str) -> StrongboxResult<CategoryRef> {
    service
        .resolve_ref(name)?
        .ok_or_else(|| StrongboxError::category_not_found(name))
}

/// Category names by id, for labelling register rows
pub(crate) fn category_names(storage: &Storage, session: &AuthSession) -> StrongboxResult<CategoryNames> {
    Ok(CategoryService::new(storage, session)
        .list()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}

/// Handle a transaction command
pub fn handle_transaction_command(
    storage: &Storage,
    session: &AuthSession,
    cmd: TransactionCommands,
) -> StrongboxResult<()> {
    let service = TransactionService::new(storage, session);
    let categories = CategoryService::new(storage, session);

    match cmd {
        TransactionCommands::Add {
            date,
            amount,
            description,
            account,
            category,
            payee,
            note,
        } => {
            let category = category
                .as_deref()
                .map(|name| resolve_category(&categories, name))
                .transpose()?;
            let txn = service.create(CreateTransactionInput {
                date,
                amount: parse_amount(&amount)?,
                description,
                account,
                note,
                category,
                payee_name: payee,
            })?;
            println!("Created transaction {} ({})", txn.id, txn.amount);
        }

        TransactionCommands::List {
            account,
            category,
            kind,
            limit,
        } => {
            let mut filter = TransactionFilter::new().limit(limit);
            if let Some(account) = account {
                filter = filter.account(account);
            }
            if let Some(name) = category {
                let found = categories
                    .find(&name)?
                    .ok_or_else(|| StrongboxError::category_not_found(&name))?;
                filter = filter.category(found.id);
            }
            if let Some(kind) = kind {
                filter = filter.kind(parse_kind(&kind)?);
            }

            let transactions = service.list(filter)?;
            print!(
                "{}",
                format_transaction_register(&transactions, &category_names(storage, session)?)
            );
        }

        TransactionCommands::Show { id } => {
            let id = parse_transaction_id(&id)?;
            let txn = service
                .get(id)?
                .ok_or_else(|| StrongboxError::transaction_not_found(id.to_string()))?;
            let payee = match txn.payee_id {
                Some(payee_id) => PayeeService::new(storage, session).get(payee_id)?,
                None => None,
            };
            print!(
                "{}",
                format_transaction_details(
                    &txn,
                    &category_names(storage, session)?,
                    payee.as_ref().map(|p| p.name.as_str())
                )
            );
        }

        TransactionCommands::Edit {
            id,
            date,
            amount,
            description,
            account,
            category,
            uncategorize,
            note,
        } => {
            let id = parse_transaction_id(&id)?;
            let category = if uncategorize {
                Some(None)
            } else {
                category
                    .as_deref()
                    .map(|name| resolve_category(&categories, name).map(Some))
                    .transpose()?
            };
            let update = TransactionUpdate {
                date,
                amount: amount.as_deref().map(parse_amount).transpose()?,
                description,
                account,
                note: note.map(Some),
                category,
            };
            let txn = service.update(id, update)?;
            println!("Updated transaction {}", txn.id);
        }

        TransactionCommands::Delete { id } => {
            let id = parse_transaction_id(&id)?;
            service.delete(id)?;
            println!("Deleted transaction {}", id);
        }
    }

    Ok(())
}
