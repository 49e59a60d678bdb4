//! Display formatting for import review, commit results and mappings

use crate::models::DescriptionMapping;
use crate::services::review::{CommitReport, StagedBatch, StagedRow};
use crate::services::transfer::{AutoLinkReport, PartialLinkFinding};

use super::transaction::truncate;

fn row_flags(row: &StagedRow) -> String {
    let mut flags = Vec::new();
    if row.is_duplicate {
        flags.push("dup");
    }
    if row.skip {
        flags.push("skip");
    }
    flags.join(",")
}

/// Preview of a staged batch: one line per row plus the ingest summary
pub fn format_staged_batch(batch: &StagedBatch) -> String {
    let mut output = String::new();

    for failure in batch.failures() {
        output.push_str(&format!(
            "Could not read {}: {}\n",
            failure.source_name, failure.message
        ));
    }
    for error in &batch.summary().row_errors {
        output.push_str(&format!(
            "{} line {}: {}\n",
            error.source_name, error.line, error.message
        ));
    }
    if !batch.failures().is_empty() || !batch.summary().row_errors.is_empty() {
        output.push('\n');
    }

    if batch.rows().is_empty() {
        output.push_str("No rows staged.\n");
    } else {
        output.push_str(&format!(
            "{:>4} {:10} {:28} {:>12} {:16} {}\n",
            "#", "Date", "Description", "Amount", "Category", "Flags"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for row in batch.rows() {
            let category = row
                .effective_category()
                .map(|c| c.name.as_str())
                .unwrap_or("-");
            output.push_str(&format!(
                "{:>4} {} {} {:>12} {} {}\n",
                row.index,
                truncate(&row.row.date, 10),
                truncate(&row.row.description, 28),
                row.row.amount,
                truncate(category, 16),
                row_flags(row)
            ));
        }
    }

    let summary = batch.summary();
    output.push('\n');
    output.push_str(&format!(
        "Files: {} read, {} failed. Rows: {} read, {} staged, {} skipped as incomplete, {} duplicates.\n",
        summary.files_read,
        summary.files_failed,
        summary.rows_read,
        summary.staged,
        summary.skipped_invalid,
        summary.duplicates
    ));

    output
}

/// End-of-run summary of a commit
pub fn format_commit_report(report: &CommitReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Batch {}\n", report.batch_id));
    output.push_str(&format!("  Committed: {}\n", report.committed.len()));
    output.push_str(&format!("  Skipped:   {}\n", report.skipped));
    output.push_str(&format!("  Failed:    {}\n", report.failed.len()));
    if report.description_mappings_saved + report.account_mappings_saved > 0 {
        output.push_str(&format!(
            "  Mappings saved: {} description, {} account\n",
            report.description_mappings_saved, report.account_mappings_saved
        ));
    }
    for failure in &report.failed {
        output.push_str(&format!("  row {}: {}\n", failure.index, failure.message));
    }
    for failure in &report.mapping_failures {
        output.push_str(&format!(
            "  row {} mapping not saved: {}\n",
            failure.index, failure.message
        ));
    }
    if let Some(reason) = &report.halted_by {
        output.push_str(&format!(
            "Stopped early: {} ({} rows not attempted)\n",
            reason, report.not_attempted
        ));
    }

    output
}

pub fn format_auto_link_report(report: &AutoLinkReport) -> String {
    let mut output = String::new();

    for (a, b) in &report.linked {
        output.push_str(&format!("Linked {} ⇄ {}\n", a, b));
    }
    for unresolved in &report.unresolved {
        output.push_str(&format!(
            "Left {} unlinked: {} candidate(s)\n",
            unresolved.id, unresolved.candidates
        ));
    }
    if !report.skipped.is_empty() {
        output.push_str(&format!(
            "Skipped {} already-linked or non-transfer row(s)\n",
            report.skipped.len()
        ));
    }
    if output.is_empty() {
        output.push_str("Nothing to link.\n");
    }

    output
}

pub fn format_repair_findings(findings: &[PartialLinkFinding]) -> String {
    if findings.is_empty() {
        return "All transfer links are consistent.\n".to_string();
    }

    findings
        .iter()
        .map(|f| format!("Cleared one-sided link {} -> {}\n", f.id, f.partner))
        .collect()
}

/// Format saved description mappings as a table
pub fn format_mapping_list(mappings: &[DescriptionMapping]) -> String {
    if mappings.is_empty() {
        return "No mappings saved.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!("{:8} {:32} {:20} {}\n", "ID", "Description", "Category", "Payee"));
    output.push_str(&"-".repeat(76));
    output.push('\n');

    for mapping in mappings {
        output.push_str(&format!(
            "{:8} {} {} {}\n",
            mapping.id.to_string(),
            truncate(&mapping.description, 32),
            truncate(mapping.category.as_deref().unwrap_or("-"), 20),
            mapping.payee.as_deref().unwrap_or("-")
        ));
    }

    output
}
