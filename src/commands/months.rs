//! Read-only views: the list of month tabs and a single month grouped by day.

use crate::args::ListArgs;
use crate::commands::{load_config, open_tracker, Out};
use crate::model::{CurrencyFormat, DayGroup, MonthTab, Summary, Transaction};
use crate::{Mode, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::Path;

/// A month's totals and its transactions grouped by day, newest day first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthView {
    pub summary: Summary,
    pub days: Vec<DayGroup>,
}

/// Lists every month that has a tab, newest first.
pub async fn months(sheetwise_home: &Path, mode: Mode) -> Result<Out<Vec<MonthTab>>> {
    let config = load_config(sheetwise_home).await?;
    let tracker = open_tracker(&config, mode).await;
    let tabs = tracker.month_tabs();
    let names: Vec<String> = tabs.iter().map(|tab| tab.name()).collect();
    let message = if names.is_empty() {
        "There are no months yet".to_string()
    } else {
        names.join("\n")
    };
    Ok(Out::new(message, tabs))
}

/// Shows one month, the current month when `args` names none.
pub async fn list(sheetwise_home: &Path, mode: Mode, args: &ListArgs) -> Result<Out<MonthView>> {
    let config = load_config(sheetwise_home).await?;
    let format = config.currency_format();
    let mut tracker = open_tracker(&config, mode).await;
    if let Some(month) = args.month() {
        tracker.set_current_month(month).await;
    }
    let view = MonthView {
        summary: tracker.summary(),
        days: tracker.by_day(),
    };
    Ok(Out::new(render_month(&format, &view), view))
}

/// The summary line uses the compact form (`₹15.7K`), the day totals and rows the full amount.
fn render_month(format: &CurrencyFormat, view: &MonthView) -> String {
    let summary = &view.summary;
    let mut text = format!(
        "{}: {} spent over {} transactions",
        summary.month,
        format.format_compact(summary.total_expense),
        summary.count
    );
    if !summary.total_income.is_zero() {
        let _ = write!(
            text,
            ", {} received",
            format.format_compact(summary.total_income)
        );
    }
    for day in &view.days {
        let _ = write!(
            text,
            "\n\n{}  {}",
            day.date.format("%a, %-d %b %Y"),
            format.format_decimal(day.total)
        );
        for txn in &day.transactions {
            let _ = write!(text, "\n  {}", transaction_line(format, txn));
        }
    }
    text
}

/// One transaction on a single line, as shown by `list` and `search`.
pub(super) fn transaction_line(format: &CurrencyFormat, txn: &Transaction) -> String {
    let mut line = format!(
        "{}  {}  {} / {}",
        txn.id,
        format.format(txn.expense),
        txn.category,
        txn.account
    );
    if let Some(income) = txn.income {
        let _ = write!(line, "  +{}", format.format(Some(income)));
    }
    if !txn.notes.is_empty() {
        let _ = write!(line, "  {}", txn.notes);
    }
    if txn.image.is_some() {
        line.push_str("  [receipt]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_months_in_demo_mode() {
        let env = TestEnv::new().await;
        let out = months(env.config().root(), Mode::Demo).await.unwrap();
        let tabs = out.structure().unwrap();
        assert_eq!(tabs, &vec![MonthTab::current()]);
        assert_eq!(out.message(), MonthTab::current().name());
    }

    #[tokio::test]
    async fn test_list_current_month() {
        let env = TestEnv::new().await;
        let out = list(env.config().root(), Mode::Demo, &ListArgs::new(None))
            .await
            .unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.summary.month, MonthTab::current());
        assert_eq!(view.summary.count, 4);
        assert_eq!(view.days.len(), 4);
        assert!(out.message().contains("₹15.7K spent over 4 transactions"));
        assert!(out.message().contains("₹8,500"));
        assert!(out.message().contains("Uber rides this week"));
    }

    #[tokio::test]
    async fn test_list_empty_month() {
        let env = TestEnv::new().await;
        let month = MonthTab::parse("January 2001").unwrap();
        let out = list(env.config().root(), Mode::Demo, &ListArgs::new(Some(month)))
            .await
            .unwrap();
        let view = out.structure().unwrap();
        assert_eq!(view.summary.count, 0);
        assert!(view.days.is_empty());
        assert_eq!(out.message(), "January 2001: ₹0 spent over 0 transactions");
    }

    #[test]
    fn test_transaction_line() {
        let mut txn = crate::tracker::demo_transactions(MonthTab::current()).remove(0);
        txn.image = Some("https://drive.google.com/uc?id=abc".to_string());
        let line = transaction_line(&CurrencyFormat::default(), &txn);
        assert!(line.starts_with(&txn.id));
        assert!(line.contains("₹2,500  Food & Dining / Credit Card"));
        assert!(line.ends_with("[receipt]"));
    }
}
