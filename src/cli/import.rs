//! CLI command handler for CSV import
//!
//! Stages one or more statement files, applies the edits given on the
//! command line, prints the preview and commits.

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use crate::config::settings::ImportSettings;
use crate::crypto::AuthSession;
use crate::display::import::{format_commit_report, format_staged_batch};
use crate::error::{StrongboxError, StrongboxResult};
use crate::services::{ImportService, ReviewService, RowEdit};
use crate::storage::Storage;

/// Arguments of `strongbox import`
#[derive(Args)]
pub struct ImportArgs {
    /// CSV statement files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Commit rows flagged as duplicates instead of skipping them
    #[arg(long)]
    pub include_duplicates: bool,

    /// Assign a category to a staged row, as ROW=CATEGORY (repeatable)
    #[arg(long = "assign", value_name = "ROW=CATEGORY")]
    pub assignments: Vec<String>,

    /// Save a description mapping for every assigned row
    #[arg(long)]
    pub save_mappings: bool,

    /// Print the preview without committing
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_assignment(raw: &str) -> StrongboxResult<(usize, String)> {
    let (row, category) = raw.split_once('=').ok_or_else(|| {
        StrongboxError::Validation(format!("Invalid assignment '{}': expected ROW=CATEGORY", raw))
    })?;
    let row = row
        .trim()
        .parse()
        .map_err(|_| StrongboxError::Validation(format!("Invalid row number '{}'", row)))?;
    Ok((row, category.trim().to_string()))
}

/// Handle the import command
pub fn handle_import_command(
    storage: &Storage,
    session: &AuthSession,
    settings: &ImportSettings,
    args: ImportArgs,
) -> StrongboxResult<()> {
    let mut batch = ImportService::new(storage, session, settings).prepare_transactions(&args.files)?;

    if args.include_duplicates {
        let duplicates: Vec<usize> = batch
            .rows()
            .iter()
            .filter(|r| r.is_duplicate)
            .map(|r| r.index)
            .collect();
        batch = batch.with_edits(duplicates.into_iter().map(|i| (i, RowEdit::Skip(false))))?;
    }

    for raw in &args.assignments {
        let (row, category) = parse_assignment(raw)?;
        batch = batch.with_edit(row, RowEdit::Category(Some(category)))?;
        if args.save_mappings {
            batch = batch.with_edit(row, RowEdit::SaveMapping(true))?;
        }
    }

    print!("{}", format_staged_batch(&batch));

    if batch.rows().is_empty() {
        if let Some(failure) = batch.failures().first() {
            if batch.failures().len() == args.files.len() {
                return Err(failure.to_error());
            }
        }
        return Ok(());
    }

    if args.dry_run {
        println!("Dry run: nothing committed.");
        return Ok(());
    }
    if batch.pending_count() == 0 {
        println!("Nothing to commit.");
        return Ok(());
    }

    debug!(batch = %batch.id(), rows = batch.pending_count(), "Committing batch");
    let report = ReviewService::new(storage, session).import_reviewed_transactions(&batch)?;
    println!();
    print!("{}", format_commit_report(&report));

    match report.halted_by {
        Some(reason) => Err(StrongboxError::Storage(format!("Import stopped early: {}", reason))),
        None => Ok(()),
    }
}
