//! Amount type for handling monetary values as they appear in sheet cells.
//!
//! Cells may hold plain numbers (`2500`), numbers with thousands separators (`2,500.00`) or
//! numbers formatted with a currency symbol (`₹2,500.00`, `-$12.50`). All of these parse into the
//! same `Amount`. When written back to a sheet, an `Amount` is rendered as a plain number so that
//! the sheet's `SUM` formulas keep working.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Currency symbols that may prefix an amount in a sheet cell.
const SYMBOLS: &[char] = &['$', '₹', '€', '£'];

/// Represents a monetary amount.
///
/// # Examples
///
/// ```
/// # use sheetwise::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("₹2,500.00").unwrap();
/// let b = Amount::from_str("2500").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "2500");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Creates a new Amount from a Decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the amount is less than zero.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Parses a sheet cell. Empty and zero cells mean "no amount" and yield `None`, matching how
    /// the sheet leaves the expense or income column blank.
    pub fn from_cell(s: &str) -> Option<Self> {
        match Amount::from_str(s) {
            Ok(a) if !a.is_zero() => Some(a),
            _ => None,
        }
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // "-₹50.00" and "₹-50.00" are both seen in the wild
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let rest = rest.trim_start_matches(SYMBOLS).trim();
        let digits = rest.replace([',', ' '], "");

        let value = Decimal::from_str(&digits).map_err(AmountError)?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0.normalize(), f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        assert_eq!(Amount::from_str("2500").unwrap().value(), dec("2500"));
    }

    #[test]
    fn test_parse_rupee_with_commas() {
        let amount = Amount::from_str("₹1,23,456.50").unwrap();
        assert_eq!(amount.value(), dec("123456.50"));
    }

    #[test]
    fn test_parse_negative_with_dollar_sign() {
        let amount = Amount::from_str("-$50.00").unwrap();
        assert_eq!(amount.value(), dec("-50.00"));
        assert!(amount.is_negative());
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("   ").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_from_cell() {
        assert_eq!(Amount::from_cell(""), None);
        assert_eq!(Amount::from_cell("0"), None);
        assert_eq!(Amount::from_cell("abc"), None);
        assert_eq!(Amount::from_cell("12.5"), Some(Amount::new(dec("12.5"))));
    }

    #[test]
    fn test_display_is_plain_number() {
        assert_eq!(Amount::from_str("₹2,500.00").unwrap().to_string(), "2500");
        assert_eq!(Amount::from_str("12.50").unwrap().to_string(), "12.5");
    }

    #[test]
    fn test_zero_is_not_positive_or_negative() {
        let zero = Amount::from_str("0.00").unwrap();
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
    }

    #[test]
    fn test_serde() {
        let amount = Amount::new(dec("1200"));
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1200\"");
        let back: Amount = serde_json::from_str("\"₹1,200\"").unwrap();
        assert_eq!(back, amount);
    }
}
