//! CSV import pipeline
//!
//! Bank statement exports go through a fixed sequence of pure stages:
//!
//! 1. parse the delimited text into header-keyed rows
//! 2. normalize header names through an alias table onto five logical fields
//! 3. resolve the amount's sign from the transaction-type column
//! 4. drop rows without a date or description (counted, not reported)
//!
//! `ImportService` then stages the surviving rows against the ledger:
//! duplicate flags, mapping suggestions and account display names.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::config::settings::ImportSettings;
use crate::crypto::AuthSession;
use crate::error::{StrongboxError, StrongboxResult};
use crate::models::Amount;
use crate::storage::Storage;

use super::duplicate::DuplicateDetector;
use super::mapping::MappingService;
use super::review::{CategoryDirectory, StagedBatch, StagedRow};

/// The columns the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Date,
    Description,
    Account,
    TransactionType,
    Amount,
}

/// Lowercased header names accepted for each logical field
const HEADER_ALIASES: &[(LogicalField, &[&str])] = &[
    (
        LogicalField::Date,
        &["date", "transaction date", "trans date", "posted date", "posting date"],
    ),
    (
        LogicalField::Description,
        &[
            "description",
            "transaction description",
            "desc",
            "payee",
            "merchant",
            "details",
            "narrative",
        ],
    ),
    (
        LogicalField::Account,
        &["account", "account number", "account #", "account no", "acct"],
    ),
    (
        LogicalField::TransactionType,
        &["transaction type", "type", "debit/credit", "dr/cr"],
    ),
    (
        LogicalField::Amount,
        &["amount", "transaction amount", "value"],
    ),
];

/// Map a raw header onto a logical field
pub fn logical_field(header: &str) -> Option<LogicalField> {
    let key = header.trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&key.as_str()))
        .map(|(field, _)| *field)
}

/// A row as read from the file: (original header, value) in column order
pub type RawRow = Vec<(String, String)>;

/// A row that survived validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub date: String,
    pub description: String,
    /// Signed amount after sign resolution
    pub amount: Amount,
    pub account_number: String,
    pub transaction_type: Option<String>,
    pub original_row: RawRow,
}

/// A row that could not be staged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub source_name: String,
    /// 1-based line in the source file
    pub line: u64,
    pub message: String,
}

/// A whole file that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub source_name: String,
    pub message: String,
}

impl FileFailure {
    pub fn to_error(&self) -> StrongboxError {
        StrongboxError::Parse {
            source_name: self.source_name.clone(),
            message: self.message.clone(),
        }
    }
}

/// Result of running one file through the pipeline
#[derive(Debug, Clone, Default)]
pub struct IngestOutput {
    pub source_name: String,
    pub rows: Vec<ParsedRow>,
    pub rows_read: usize,
    /// Rows dropped for a missing date or description
    pub skipped_invalid: usize,
    pub errors: Vec<RowError>,
}

/// Counts across every file of a staged import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files_read: usize,
    pub files_failed: usize,
    pub rows_read: usize,
    pub staged: usize,
    pub skipped_invalid: usize,
    pub duplicates: usize,
    pub row_errors: Vec<RowError>,
}

/// Outcome of validating one normalized row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted(ParsedRow),
    /// Missing date or description
    Skipped,
    Invalid(String),
}

/// Stage 1: read header-keyed rows, with their line numbers
pub fn parse_rows<R: Read>(
    reader: R,
    source_name: &str,
    delimiter: u8,
) -> StrongboxResult<Vec<(u64, RawRow)>> {
    let parse_error = |e: csv::Error| StrongboxError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers().map_err(parse_error)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.trim().is_empty())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push((line, row));
    }
    Ok(rows)
}

/// Stage 2: project a raw row onto the logical fields
///
/// When several columns alias the same field, the first non-empty one in
/// column order wins.
pub fn normalize_row(raw: &RawRow) -> HashMap<LogicalField, String> {
    let mut fields = HashMap::new();
    for (header, value) in raw {
        let Some(field) = logical_field(header) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        fields.entry(field).or_insert_with(|| value.to_string());
    }
    fields
}

/// Stage 3: sign from the transaction-type token, else the amount's own
pub fn resolve_sign(amount: &Amount, transaction_type: Option<&str>) -> Amount {
    let token = transaction_type.map(str::to_lowercase).unwrap_or_default();
    if token.contains("debit") {
        amount.with_sign(true)
    } else if token.contains("credit") {
        amount.with_sign(false)
    } else {
        amount.clone()
    }
}

/// Stage 4: validate a raw row into a staged-ready row
pub fn validate_row(raw: RawRow) -> RowOutcome {
    let mut fields = normalize_row(&raw);

    let (Some(date), Some(description)) = (
        fields.remove(&LogicalField::Date),
        fields.remove(&LogicalField::Description),
    ) else {
        return RowOutcome::Skipped;
    };

    let Some(amount_text) = fields.remove(&LogicalField::Amount) else {
        return RowOutcome::Invalid("Missing amount".into());
    };
    let amount = match Amount::parse(&amount_text) {
        Ok(amount) => amount,
        Err(e) => return RowOutcome::Invalid(e.to_string()),
    };

    let transaction_type = fields.remove(&LogicalField::TransactionType);
    let amount = resolve_sign(&amount, transaction_type.as_deref());

    RowOutcome::Accepted(ParsedRow {
        date,
        description,
        amount,
        account_number: fields.remove(&LogicalField::Account).unwrap_or_default(),
        transaction_type,
        original_row: raw,
    })
}

/// Run one file through every stage
///
/// A file whose header has no date or no description column is rejected
/// as a whole rather than silently skipping every row.
pub fn ingest<R: Read>(reader: R, source_name: &str, delimiter: u8) -> StrongboxResult<IngestOutput> {
    let rows = parse_rows(reader, source_name, delimiter)?;

    if let Some((_, first)) = rows.first() {
        let fields: Vec<LogicalField> = first.iter().filter_map(|(h, _)| logical_field(h)).collect();
        for (required, name) in [
            (LogicalField::Date, "date"),
            (LogicalField::Description, "description"),
        ] {
            if !fields.contains(&required) {
                return Err(StrongboxError::Parse {
                    source_name: source_name.to_string(),
                    message: format!("No {} column found in header", name),
                });
            }
        }
    }

    let mut output = IngestOutput {
        source_name: source_name.to_string(),
        rows_read: rows.len(),
        ..Default::default()
    };
    for (line, raw) in rows {
        match validate_row(raw) {
            RowOutcome::Accepted(row) => output.rows.push(row),
            RowOutcome::Skipped => output.skipped_invalid += 1,
            RowOutcome::Invalid(message) => output.errors.push(RowError {
                source_name: source_name.to_string(),
                line,
                message,
            }),
        }
    }

    debug!(
        source = source_name,
        read = output.rows_read,
        accepted = output.rows.len(),
        skipped = output.skipped_invalid,
        errors = output.errors.len(),
        "Parsed import file"
    );
    Ok(output)
}

/// Service that stages CSV files for review
pub struct ImportService<'a> {
    storage: &'a Storage,
    session: &'a AuthSession,
    settings: &'a ImportSettings,
}

impl<'a> ImportService<'a> {
    pub fn new(storage: &'a Storage, session: &'a AuthSession, settings: &'a ImportSettings) -> Self {
        Self {
            storage,
            session,
            settings,
        }
    }

    /// Stage every file; a file that fails to parse is reported on its own
    pub fn prepare_transactions(&self, files: &[PathBuf]) -> StrongboxResult<StagedBatch> {
        let delimiter = self.settings.delimiter_byte()?;
        let outputs = files
            .iter()
            .map(|path| {
                let source_name = display_name(path);
                File::open(path)
                    .map_err(|e| StrongboxError::Parse {
                        source_name: source_name.clone(),
                        message: e.to_string(),
                    })
                    .and_then(|file| ingest(file, &source_name, delimiter))
                    .map_err(|e| (source_name, e))
            })
            .collect();
        self.stage(outputs)
    }

    /// Stage in-memory sources, each given as (name, reader)
    pub fn prepare_sources<R: Read>(&self, sources: Vec<(String, R)>) -> StrongboxResult<StagedBatch> {
        let delimiter = self.settings.delimiter_byte()?;
        let outputs = sources
            .into_iter()
            .map(|(name, reader)| ingest(reader, &name, delimiter).map_err(|e| (name, e)))
            .collect();
        self.stage(outputs)
    }

    fn stage(
        &self,
        outputs: Vec<Result<IngestOutput, (String, StrongboxError)>>,
    ) -> StrongboxResult<StagedBatch> {
        let detector = DuplicateDetector::from_storage(self.storage, self.session)?;
        let resolver = MappingService::new(self.storage, self.session).resolver()?;
        let directory = CategoryDirectory::load(self.storage, self.session)?;

        let mut summary = IngestSummary::default();
        let mut failures = Vec::new();
        let mut rows = Vec::new();

        for output in outputs {
            let output = match output {
                Ok(output) => output,
                Err((source_name, StrongboxError::Parse { message, .. })) => {
                    warn!(source = %source_name, "Import file could not be parsed");
                    summary.files_failed += 1;
                    failures.push(FileFailure {
                        source_name,
                        message,
                    });
                    continue;
                }
                Err((_, e)) => return Err(e),
            };

            summary.files_read += 1;
            summary.rows_read += output.rows_read;
            summary.skipped_invalid += output.skipped_invalid;
            summary.row_errors.extend(output.errors);

            for parsed in output.rows {
                let is_duplicate =
                    detector.is_duplicate(&parsed.date, &parsed.amount, &parsed.description);
                if is_duplicate {
                    summary.duplicates += 1;
                }
                let row = StagedRow::new(
                    rows.len(),
                    output.source_name.clone(),
                    parsed,
                    is_duplicate,
                    is_duplicate && self.settings.skip_duplicates_by_default,
                    &resolver,
                    &directory,
                );
                rows.push(row);
            }
        }
        summary.staged = rows.len();

        info!(
            files = summary.files_read,
            failed_files = summary.files_failed,
            staged = summary.staged,
            duplicates = summary.duplicates,
            skipped = summary.skipped_invalid,
            "Prepared import batch"
        );
        Ok(StagedBatch::new(rows, summary, failures, resolver, directory))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
