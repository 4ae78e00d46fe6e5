//! Locale-aware currency formatting for amounts shown to the user.

use crate::model::Amount;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Rendered in place of a missing amount.
pub const MISSING: &str = "—";

/// The digit grouping conventions we know how to render.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    /// Indian grouping: `12,34,567`.
    #[default]
    #[serde(rename = "en-IN")]
    EnIn,
    /// Western grouping: `1,234,567`.
    #[serde(rename = "en-US")]
    EnUs,
}

serde_plain::derive_display_from_serialize!(Locale);
serde_plain::derive_fromstr_from_deserialize!(Locale);

impl Locale {
    fn group(&self, digits: &str) -> String {
        match self {
            Locale::EnIn => group_indian(digits),
            Locale::EnUs => group_western(digits),
        }
    }
}

/// Formats amounts with a currency symbol and the grouping of a locale.
///
/// Fraction digits are dropped when zero and capped at two: `1200` renders as `₹1,200` and
/// `1200.5` as `₹1,200.5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    locale: Locale,
    currency: String,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self::new(Locale::EnIn, "INR")
    }
}

impl CurrencyFormat {
    pub fn new(locale: Locale, currency: impl Into<String>) -> Self {
        Self {
            locale,
            currency: currency.into().to_uppercase(),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The prefix used for the configured currency.
    pub fn symbol(&self) -> String {
        match self.currency.as_str() {
            "INR" => "₹".to_string(),
            "USD" => "$".to_string(),
            "EUR" => "€".to_string(),
            "GBP" => "£".to_string(),
            "JPY" => "¥".to_string(),
            other => format!("{other} "),
        }
    }

    /// Formats an optional amount. `None` renders as an em-dash.
    pub fn format(&self, amount: Option<Amount>) -> String {
        match amount {
            Some(a) => self.format_decimal(a.value()),
            None => MISSING.to_string(),
        }
    }

    pub fn format_decimal(&self, value: Decimal) -> String {
        let rounded = value
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .normalize();
        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };
        let text = rounded.abs().to_string();
        let (int, frac) = match text.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (text.as_str(), None),
        };
        let grouped = self.locale.group(int);
        match frac {
            Some(frac) => format!("{sign}{}{grouped}.{frac}", self.symbol()),
            None => format!("{sign}{}{grouped}", self.symbol()),
        }
    }

    /// A short rendering for summaries, e.g. `₹1.5L` or `$2.3M`. The sign goes after the symbol,
    /// as in `₹-1.5K`.
    pub fn format_compact(&self, value: Decimal) -> String {
        let units: &[(i64, &str)] = match self.locale {
            Locale::EnIn => &[(10_000_000, "Cr"), (100_000, "L"), (1_000, "K")],
            Locale::EnUs => &[(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")],
        };
        for (size, suffix) in units {
            let size = Decimal::from(*size);
            if value.abs() >= size {
                let scaled = (value / size)
                    .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
                    .to_f64()
                    .unwrap_or_default();
                let scaled = format_num::format_num!(".1f", scaled);
                return format!("{}{scaled}{suffix}", self.symbol());
            }
        }
        self.format_decimal(value)
    }
}

/// Groups the integer digits in threes: `1,234,567`.
fn group_western(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Groups the integer digits the Indian way: the last three digits, then pairs.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut pairs: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        pairs.push(&head[start..end]);
        end = start;
    }
    pairs.reverse();
    format!("{},{tail}", pairs.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amount(s: &str) -> Option<Amount> {
        Some(Amount::from_str(s).unwrap())
    }

    #[test]
    fn test_missing_amount_is_em_dash() {
        let inr = CurrencyFormat::default();
        assert_eq!(inr.format(None), "—");
        let usd = CurrencyFormat::new(Locale::EnUs, "usd");
        assert_eq!(usd.format(None), "—");
    }

    #[test]
    fn test_indian_grouping() {
        let inr = CurrencyFormat::default();
        assert_eq!(inr.format(amount("2500")), "₹2,500");
        assert_eq!(inr.format(amount("123456")), "₹1,23,456");
        assert_eq!(inr.format(amount("12345678.5")), "₹1,23,45,678.5");
        assert_eq!(inr.format(amount("999")), "₹999");
    }

    #[test]
    fn test_western_grouping() {
        let usd = CurrencyFormat::new(Locale::EnUs, "USD");
        assert_eq!(usd.format(amount("1234567.891")), "$1,234,567.89");
        assert_eq!(usd.format(amount("1200")), "$1,200");
        assert_eq!(usd.format(amount("0.5")), "$0.5");
        assert_eq!(usd.format(amount("999")), "$999");
    }

    #[test]
    fn test_grouping_beyond_float_precision() {
        let usd = CurrencyFormat::new(Locale::EnUs, "USD");
        assert_eq!(
            usd.format(amount("12345678901234567.25")),
            "$12,345,678,901,234,567.25"
        );
        let inr = CurrencyFormat::default();
        assert_eq!(
            inr.format(amount("12345678901234567")),
            "₹12,34,56,78,90,12,34,567"
        );
    }

    #[test]
    fn test_fraction_digits_are_trimmed_and_rounded() {
        let inr = CurrencyFormat::default();
        assert_eq!(inr.format(amount("10.50")), "₹10.5");
        assert_eq!(inr.format(amount("10.005")), "₹10.01");
        assert_eq!(inr.format(amount("10.00")), "₹10");
    }

    #[test]
    fn test_negative() {
        let inr = CurrencyFormat::default();
        assert_eq!(inr.format(amount("-1500")), "-₹1,500");
    }

    #[test]
    fn test_unknown_currency_uses_code() {
        let chf = CurrencyFormat::new(Locale::EnUs, "CHF");
        assert_eq!(chf.format(amount("12")), "CHF 12");
    }

    #[test]
    fn test_compact() {
        let inr = CurrencyFormat::default();
        assert_eq!(inr.format_compact(Decimal::from(25_000_000)), "₹2.5Cr");
        assert_eq!(inr.format_compact(Decimal::from(150_000)), "₹1.5L");
        assert_eq!(inr.format_compact(Decimal::from(2_500)), "₹2.5K");
        assert_eq!(inr.format_compact(Decimal::from(950)), "₹950");

        let usd = CurrencyFormat::new(Locale::EnUs, "USD");
        assert_eq!(usd.format_compact(Decimal::from(2_300_000)), "$2.3M");
        assert_eq!(usd.format_compact(Decimal::from(1_000)), "$1.0K");
    }

    #[test]
    fn test_compact_negative() {
        let inr = CurrencyFormat::default();
        assert_eq!(inr.format_compact(Decimal::from(-1_500)), "₹-1.5K");
        assert_eq!(inr.format_compact(Decimal::from(-250_000)), "₹-2.5L");
        assert_eq!(inr.format_compact(Decimal::from(-950)), "-₹950");
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!(Locale::from_str("en-US").unwrap(), Locale::EnUs);
        assert_eq!(Locale::EnIn.to_string(), "en-IN");
        assert!(Locale::from_str("fr-FR").is_err());
    }
}
