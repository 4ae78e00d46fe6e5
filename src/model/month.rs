//! The `MonthTab` type: the name of the sheet tab that holds one month of transactions.

use anyhow::{bail, Context};
use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const TAB_FORMAT: &str = "%B %Y";

/// A month partition named like `May 2024`.
///
/// Internally this is the first day of the month, so ordering is chronological rather than
/// alphabetical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthTab(NaiveDate);

impl MonthTab {
    /// The month tab that `date` belongs to.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 always exists.
        Self(date.with_day(1).unwrap_or(date))
    }

    /// The month tab for today, in local time.
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    /// Parses a tab name. The name must round-trip exactly, so `Sheet1`, `may 2024` or `Jan 2024`
    /// are rejected.
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        let first = format!("1 {}", name.trim());
        let date = NaiveDate::parse_from_str(&first, &format!("%d {TAB_FORMAT}"))
            .with_context(|| format!("'{name}' is not a month tab name like 'May 2024'"))?;
        let tab = Self(date);
        if tab.name() != name {
            bail!("'{name}' is not a month tab name like 'May 2024'");
        }
        Ok(tab)
    }

    /// Returns true if `name` is a valid month tab name.
    pub fn is_valid(name: &str) -> bool {
        Self::parse(name).is_ok()
    }

    /// The tab name, e.g. `May 2024`.
    pub fn name(&self) -> String {
        self.0.format(TAB_FORMAT).to_string()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day().pred_opt().unwrap_or(self.0)
    }

    pub fn next(&self) -> Self {
        Self(self.0.checked_add_months(Months::new(1)).unwrap_or(self.0))
    }

    pub fn previous(&self) -> Self {
        Self(self.0.checked_sub_months(Months::new(1)).unwrap_or(self.0))
    }

    /// Returns true if `date` falls within this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.first_day()..=self.last_day()).contains(&date)
    }
}

impl Ord for MonthTab {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for MonthTab {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for MonthTab {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MonthTab {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MonthTab {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for MonthTab {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MonthTab::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_name_from_date() {
        assert_eq!(MonthTab::from_date(date(2024, 5, 17)).name(), "May 2024");
        assert_eq!(MonthTab::from_date(date(2023, 12, 31)).name(), "December 2023");
    }

    #[test]
    fn test_parse_round_trip() {
        let tab = MonthTab::parse("February 2024").unwrap();
        assert_eq!(tab.first_day(), date(2024, 2, 1));
        assert_eq!(tab.last_day(), date(2024, 2, 29));
        assert_eq!(tab.to_string(), "February 2024");
    }

    #[test]
    fn test_invalid_names() {
        assert!(!MonthTab::is_valid("Sheet1"));
        assert!(!MonthTab::is_valid("may 2024"));
        assert!(!MonthTab::is_valid("Jan 2024"));
        assert!(!MonthTab::is_valid("2024-05"));
        assert!(!MonthTab::is_valid(""));
        assert!(MonthTab::is_valid("January 2024"));
    }

    #[test]
    fn test_next_and_previous_cross_year() {
        let dec = MonthTab::parse("December 2023").unwrap();
        assert_eq!(dec.next().name(), "January 2024");
        assert_eq!(dec.next().previous(), dec);
        assert_eq!(MonthTab::parse("January 2024").unwrap().previous(), dec);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let mut tabs = vec![
            MonthTab::parse("April 2024").unwrap(),
            MonthTab::parse("December 2023").unwrap(),
            MonthTab::parse("August 2024").unwrap(),
        ];
        tabs.sort();
        let names: Vec<String> = tabs.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["December 2023", "April 2024", "August 2024"]);
    }

    #[test]
    fn test_contains() {
        let tab = MonthTab::parse("May 2024").unwrap();
        assert!(tab.contains(date(2024, 5, 1)));
        assert!(tab.contains(date(2024, 5, 31)));
        assert!(!tab.contains(date(2024, 6, 1)));
        assert!(!tab.contains(date(2023, 5, 10)));
    }

    #[test]
    fn test_serde_as_name() {
        let tab = MonthTab::parse("May 2024").unwrap();
        assert_eq!(serde_json::to_string(&tab).unwrap(), "\"May 2024\"");
        let back: MonthTab = serde_json::from_str("\"May 2024\"").unwrap();
        assert_eq!(back, tab);
    }
}
