//! Transfer linking CLI commands

use clap::Subcommand;

use crate::crypto::AuthSession;
use crate::display::import::{format_auto_link_report, format_repair_findings};
use crate::display::transaction::format_transaction_register;
use crate::error::StrongboxResult;
use crate::services::TransferService;
use crate::storage::Storage;

use super::transaction::{category_names, parse_transaction_id};

/// Transfer subcommands
#[derive(Subcommand)]
pub enum TransferCommands {
    /// Link two transfer legs to each other
    Link { a: String, b: String },
    /// Remove a transfer's link on both sides
    Unlink { id: String },
    /// List transfers that have no partner yet
    List,
    /// Link selected transfers to their unique match
    Auto {
        /// Transfers to pair; all unlinked transfers when omitted
        ids: Vec<String>,
        /// Maximum days between the two legs
        #[arg(short, long)]
        window: Option<i64>,
    },
    /// Clear links whose partner does not point back
    Repair,
}

/// Handle a transfer command
pub fn handle_transfer_command(
    storage: &Storage,
    session: &AuthSession,
    default_window: i64,
    cmd: TransferCommands,
) -> StrongboxResult<()> {
    let service = TransferService::new(storage, session);

    match cmd {
        TransferCommands::Link { a, b } => {
            let (a, b) = (parse_transaction_id(&a)?, parse_transaction_id(&b)?);
            service.link(a, b)?;
            println!("Linked {} ⇄ {}", a, b);
        }

        TransferCommands::Unlink { id } => {
            let id = parse_transaction_id(&id)?;
            match service.unlink(id)? {
                Some(partner) => println!("Unlinked {} from {}", id, partner),
                None => println!("{} was not linked", id),
            }
        }

        TransferCommands::List => {
            let transfers = service.unlinked_transfers()?;
            print!(
                "{}",
                format_transaction_register(&transfers, &category_names(storage, session)?)
            );
        }

        TransferCommands::Auto { ids, window } => {
            let selected = if ids.is_empty() {
                service
                    .unlinked_transfers()?
                    .into_iter()
                    .map(|t| t.id)
                    .collect()
            } else {
                ids.iter()
                    .map(|id| parse_transaction_id(id))
                    .collect::<StrongboxResult<Vec<_>>>()?
            };
            let report = service.auto_link_selected(&selected, window.unwrap_or(default_window))?;
            print!("{}", format_auto_link_report(&report));
        }

        TransferCommands::Repair => {
            print!("{}", format_repair_findings(&service.repair_links()?));
        }
    }

    Ok(())
}
