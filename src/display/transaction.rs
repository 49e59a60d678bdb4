//! Transaction display formatting
//!
//! Formats decrypted transactions as register rows and detail views.

use std::collections::HashMap;

use crate::models::{CategoryId, LinkStatus, Transaction, TransactionKind};

/// Category names by id, used to label categorized rows
pub type CategoryNames = HashMap<CategoryId, String>;

/// Short label for what a transaction is filed under
pub fn kind_label(txn: &Transaction, names: &CategoryNames) -> String {
    match txn.kind {
        TransactionKind::Uncategorized => "(uncategorized)".to_string(),
        TransactionKind::Transfer(LinkStatus::Unlinked) => "Transfer (unlinked)".to_string(),
        TransactionKind::Transfer(LinkStatus::LinkedTo(partner)) => format!("Transfer ⇄ {}", partner),
        TransactionKind::Categorized(id) => names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string()),
    }
}

/// Format a single transaction for display (register row)
pub fn format_transaction_row(txn: &Transaction, names: &CategoryNames) -> String {
    format!(
        "{:8} {:10} {:28} {:>12} {}",
        txn.id.to_string(),
        truncate(&txn.date, 10),
        truncate(&txn.description, 28),
        txn.amount,
        kind_label(txn, names)
    )
}

/// Format a list of transactions as a register
pub fn format_transaction_register(transactions: &[Transaction], names: &CategoryNames) -> String {
    if transactions.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:8} {:10} {:28} {:>12} {}\n",
        "ID", "Date", "Description", "Amount", "Category"
    ));
    output.push_str(&"-".repeat(72));
    output.push('\n');

    for txn in transactions {
        output.push_str(&format_transaction_row(txn, names));
        output.push('\n');
    }

    output
}

/// Format transaction details for display
pub fn format_transaction_details(
    txn: &Transaction,
    names: &CategoryNames,
    payee_name: Option<&str>,
) -> String {
    let mut output = String::new();

    output.push_str(&format!("Transaction: {}\n", txn.id));
    output.push_str(&format!("Date:        {}\n", txn.date));
    output.push_str(&format!("Amount:      {}\n", txn.amount));
    output.push_str(&format!("Description: {}\n", txn.description));
    if !txn.account.is_empty() {
        output.push_str(&format!("Account:     {}\n", txn.account));
    }
    if let Some(payee) = payee_name {
        output.push_str(&format!("Payee:       {}\n", payee));
    }
    output.push_str(&format!("Category:    {}\n", kind_label(txn, names)));
    if let Some(note) = &txn.note {
        output.push_str(&format!("Note:        {}\n", note));
    }

    output
}

/// Pad or cut a string to exactly `max_len` characters
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
