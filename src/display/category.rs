//! Category display formatting

use crate::models::Category;

/// Format categories as a table
pub fn format_category_list(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "No categories found.\n\nRun 'strongbox category add <name>' to create one.\n"
            .to_string();
    }

    let name_width = categories
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:8} {:width$} {:8} {:>12}\n",
        "ID",
        "Name",
        "Type",
        "Limit",
        width = name_width
    ));
    output.push_str(&"-".repeat(8 + 1 + name_width + 1 + 8 + 1 + 12));
    output.push('\n');

    for category in categories {
        let limit = category
            .limit
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:8} {:width$} {:8} {:>12}\n",
            category.id.to_string(),
            category.name,
            category.category_type.to_string(),
            limit,
            width = name_width
        ));
    }

    output
}

/// Format category details, including how many transactions use it
pub fn format_category_details(category: &Category, transaction_count: usize) -> String {
    let mut output = String::new();

    output.push_str(&format!("Category: {}\n", category.name));
    output.push_str(&format!("  ID:           {}\n", category.id));
    output.push_str(&format!("  Type:         {}\n", category.category_type));
    if let Some(limit) = &category.limit {
        output.push_str(&format!("  Limit:        {}\n", limit));
    }
    output.push_str(&format!("  Transactions: {}\n", transaction_count));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, CategoryId, CategoryType};

    fn category(name: &str, limit: Option<&str>) -> Category {
        Category {
            id: CategoryId::from_raw(3),
            name: name.into(),
            limit: limit.map(|l| Amount::parse(l).unwrap()),
            category_type: CategoryType::Expense,
        }
    }

    #[test]
    fn test_format_category_list() {
        let formatted = format_category_list(&[
            category("Groceries", Some("400.00")),
            category("Coffee", None),
        ]);
        assert!(formatted.contains("Groceries"));
        assert!(formatted.contains("400.00"));
        assert!(formatted.contains("Expense"));
        assert!(formatted.contains("cat-3"));
    }

    #[test]
    fn test_format_empty_list() {
        assert!(format_category_list(&[]).contains("No categories found"));
    }

    #[test]
    fn test_format_category_details() {
        let formatted = format_category_details(&category("Coffee", Some("25")), 4);
        assert!(formatted.contains("Coffee"));
        assert!(formatted.contains("Limit:        25"));
        assert!(formatted.contains("Transactions: 4"));
    }
}
