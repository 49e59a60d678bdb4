//! Monetary amounts
//!
//! `Amount` is the signed decimal string exactly as it is encrypted and
//! stored; two amounts are the same record value only if their text matches.
//! Numeric questions (is it zero, do two amounts have the same size) are
//! answered from the decimal digits themselves, never from a rounded value.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for amount parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),

    #[error("Amount out of range: {0}")]
    OutOfRange(String),
}

/// Largest whole-unit part an amount may have: its value in cents must fit an i64
fn within_range(magnitude: &str) -> bool {
    let whole = magnitude
        .split_once('.')
        .map_or(magnitude, |(whole, _)| whole)
        .trim_start_matches('0');
    whole.is_empty()
        || whole
            .parse::<i64>()
            .ok()
            .and_then(|w| w.checked_mul(100))
            .and_then(|c| c.checked_add(99))
            .is_some()
}

/// A signed decimal amount kept as text
///
/// The text is what gets encrypted and what duplicate detection compares,
/// so "-4.5" and "-4.50" are different amounts even though they have the
/// same size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    /// Parse an amount as written in a statement export
    ///
    /// Currency symbols, thousands separators and surrounding whitespace are
    /// removed; accounting parentheses mean negative; a leading '+' is
    /// dropped. The remaining digits are kept as written.
    pub fn parse(raw: &str) -> Result<Self, AmountParseError> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' '))
            .collect();

        let (negative, magnitude) = if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2 {
            (true, &cleaned[1..cleaned.len() - 1])
        } else if let Some(stripped) = cleaned.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = cleaned.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, cleaned.as_str())
        };

        let valid = !magnitude.is_empty()
            && magnitude.chars().all(|c| c.is_ascii_digit() || c == '.')
            && magnitude.chars().filter(|&c| c == '.').count() <= 1
            && magnitude.chars().any(|c| c.is_ascii_digit());
        if !valid {
            return Err(AmountParseError::InvalidFormat(raw.trim().to_string()));
        }
        if !within_range(magnitude) {
            return Err(AmountParseError::OutOfRange(raw.trim().to_string()));
        }

        Ok(Self::from_parts(negative, magnitude))
    }

    fn from_parts(negative: bool, magnitude: &str) -> Self {
        if negative {
            Self(format!("-{}", magnitude))
        } else {
            Self(magnitude.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unsigned digits of the amount
    pub fn magnitude(&self) -> &str {
        self.0.strip_prefix('-').unwrap_or(&self.0)
    }

    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }

    /// True when every digit is zero
    pub fn is_zero(&self) -> bool {
        self.magnitude().chars().all(|c| c == '0' || c == '.')
    }

    /// Same magnitude text with the given sign
    ///
    /// A zero amount never carries a minus sign.
    pub fn with_sign(&self, negative: bool) -> Self {
        let negative = negative && !self.is_zero();
        Self::from_parts(negative, self.magnitude())
    }

    /// Canonical unsigned form: no leading zeros, no trailing fractional zeros
    fn magnitude_key(&self) -> String {
        let (whole, frac) = self
            .magnitude()
            .split_once('.')
            .unwrap_or((self.magnitude(), ""));
        let whole = whole.trim_start_matches('0');
        let whole = if whole.is_empty() { "0" } else { whole };
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, frac)
        }
    }

    /// Whether the two amounts are equal in absolute value, digit for digit
    ///
    /// "50", "-50.00" and "050.0" have the same magnitude; "10.001" and
    /// "10.009" do not.
    pub fn same_magnitude(&self, other: &Amount) -> bool {
        self.magnitude_key() == other.magnitude_key()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_keeps_text() {
        assert_eq!(Amount::parse("-4.50").unwrap().as_str(), "-4.50");
        assert_eq!(Amount::parse("-4.5").unwrap().as_str(), "-4.5");
        assert_ne!(Amount::parse("-4.5").unwrap(), Amount::parse("-4.50").unwrap());
    }

    #[test]
    fn test_amount_cleans_symbols_and_parentheses() {
        assert_eq!(Amount::parse(" $1,234.50 ").unwrap().as_str(), "1234.50");
        assert_eq!(Amount::parse("(50.00)").unwrap().as_str(), "-50.00");
        assert_eq!(Amount::parse("+12").unwrap().as_str(), "12");
        assert_eq!(Amount::parse(".75").unwrap().as_str(), ".75");
    }

    #[test]
    fn test_amount_rejects_garbage() {
        assert!(Amount::parse("").is_err());
        assert!(Amount::parse("-").is_err());
        assert!(Amount::parse("12a").is_err());
        assert!(Amount::parse("1.2.3").is_err());
        assert!(Amount::parse("()").is_err());
    }

    #[test]
    fn test_amount_range() {
        assert!(matches!(
            Amount::parse("100000000000000000000"),
            Err(AmountParseError::OutOfRange(_))
        ));
        assert!(matches!(
            Amount::parse("-92233720368547758.00"),
            Err(AmountParseError::OutOfRange(_))
        ));
        assert!(Amount::parse("92233720368547757.99").is_ok());
        assert!(Amount::parse("000000000000000000000001.5").is_ok());
    }

    #[test]
    fn test_amount_with_sign() {
        let amount = Amount::parse("4.50").unwrap();
        assert_eq!(amount.with_sign(true).as_str(), "-4.50");
        assert_eq!(amount.with_sign(true).with_sign(false).as_str(), "4.50");
        assert_eq!(Amount::parse("0.00").unwrap().with_sign(true).as_str(), "0.00");
        assert_eq!(Amount::parse("0.001").unwrap().with_sign(true).as_str(), "-0.001");
    }

    #[test]
    fn test_amount_same_magnitude() {
        let fifty = Amount::parse("-50").unwrap();
        assert!(fifty.same_magnitude(&Amount::parse("50.00").unwrap()));
        assert!(fifty.same_magnitude(&Amount::parse("050.0").unwrap()));
        assert!(Amount::parse(".5").unwrap().same_magnitude(&Amount::parse("0.50").unwrap()));
        assert!(!Amount::parse("-10.001")
            .unwrap()
            .same_magnitude(&Amount::parse("10.009").unwrap()));
        assert!(!fifty.same_magnitude(&Amount::parse("5").unwrap()));
    }
}
