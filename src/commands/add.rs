use crate::args::{AddArgs, BulkArgs};
use crate::commands::{load_config, open_tracker, read_receipt, warn_unknown_labels, Out};
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{parse_date, Amount, NewTransaction, Transaction};
use crate::tracker::{Bulk, Persisted, Written};
use crate::{utils, Mode, Result};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Adds one expense, uploading its receipt first when one is given.
pub async fn add(
    sheetwise_home: &Path,
    mode: Mode,
    args: &AddArgs,
) -> Result<Out<Written<Transaction>>> {
    let config = load_config(sheetwise_home).await?;
    warn_unknown_labels(Some(args.category()), Some(args.account()));
    let receipt = match args.receipt() {
        Some(path) => Some(read_receipt(path).await?),
        None => None,
    };
    let new = NewTransaction {
        date: args.date(),
        expense: Some(args.expense()),
        income: args.income(),
        category: args.category().to_string(),
        account: args.account().to_string(),
        notes: args.notes().to_string(),
        image: None,
    };
    let mut tracker = open_tracker(&config, mode).await;
    let written = tracker
        .add_transaction(new, receipt)
        .await
        .pub_result(ErrorType::Request)?;
    let message = format!(
        "Added {} to {}{}",
        written.value.id,
        written.value.month_tab(),
        local_note(written.persisted)
    );
    Ok(Out::new(message, written))
}

/// Adds every row of a CSV file, or of stdin when no file is given. Rows that cannot be parsed or
/// fail validation are skipped and listed in the output.
pub async fn bulk(sheetwise_home: &Path, mode: Mode, args: &BulkArgs) -> Result<Out<Bulk>> {
    let config = load_config(sheetwise_home).await?;
    let text = match args.file() {
        Some(path) => utils::read(path).await,
        None => read_stdin().await,
    }
    .pub_result(ErrorType::Request)?;
    let (rows, unreadable) = parse_bulk(&text).pub_result(ErrorType::Request)?;
    for row in &rows {
        warn_unknown_labels(Some(&row.category), Some(&row.account));
    }

    let mut tracker = open_tracker(&config, mode).await;
    let mut bulk = tracker.add_transactions(rows).await;
    bulk.skipped.splice(0..0, unreadable);

    let local = bulk
        .saved
        .iter()
        .filter(|w| w.persisted == Persisted::Local)
        .count();
    let mut message = format!("Added {} transactions", bulk.saved.len());
    if local > 0 {
        message.push_str(&format!(", {local} of them only locally"));
    }
    for skipped in &bulk.skipped {
        message.push_str(&format!("\nSkipped {skipped}"));
    }
    Ok(Out::new(message, bulk))
}

pub(super) fn local_note(persisted: Persisted) -> &'static str {
    match persisted {
        Persisted::Remote => "",
        Persisted::Local => " (saved locally only, Google Sheets is not connected)",
    }
}

async fn read_stdin() -> Res<String> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Unable to read CSV from stdin")?;
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct BulkRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Expense")]
    expense: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Notes", default)]
    notes: String,
}

impl BulkRow {
    fn into_new(self) -> Res<NewTransaction> {
        let date = parse_date(&self.date)?;
        let expense: Amount = self
            .expense
            .parse()
            .with_context(|| format!("Unable to parse the expense '{}'", self.expense))?;
        Ok(NewTransaction {
            date,
            expense: Some(expense),
            income: None,
            category: self.category,
            account: self.account,
            notes: self.notes,
            image: None,
        })
    }
}

/// Parses CSV with a `Date,Expense,Category,Account,Notes` header. Returns the parsed rows and a
/// description of each line that could not be parsed.
fn parse_bulk(text: &str) -> Res<(Vec<NewTransaction>, Vec<String>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .context("Unable to read the CSV header")?
        .clone();
    for required in ["Date", "Expense", "Category", "Account"] {
        if !headers.iter().any(|h| h == required) {
            anyhow::bail!("The CSV header is missing the '{required}' column");
        }
    }

    let mut rows = Vec::new();
    let mut unreadable = Vec::new();
    for (i, record) in reader.deserialize::<BulkRow>().enumerate() {
        // The header is line 1.
        let line = i + 2;
        match record.map_err(anyhow::Error::from).and_then(BulkRow::into_new) {
            Ok(new) => rows.push(new),
            Err(e) => unreadable.push(format!("line {line}: {e:#}")),
        }
    }
    Ok((rows, unreadable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonthTab;
    use crate::test::TestEnv;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_bulk() {
        let text = "Date,Expense,Category,Account,Notes\n\
                    2024-05-03, 250 ,Food & Dining,UPI,chai\n\
                    5/4/2024,\"1,200\",Transportation,Cash,\n\
                    yesterday,100,Other,Cash,bad date\n\
                    2024-05-05,lots,Other,Cash,bad amount\n";
        let (rows, unreadable) = parse_bulk(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
        assert_eq!(rows[0].expense.unwrap().to_string(), "250");
        assert_eq!(rows[0].notes, "chai");
        assert_eq!(rows[1].expense.unwrap().to_string(), "1200");
        assert_eq!(rows[1].notes, "");
        assert_eq!(unreadable.len(), 2);
        assert!(unreadable[0].starts_with("line 4:"));
        assert!(unreadable[1].starts_with("line 5:"));
    }

    #[test]
    fn test_parse_bulk_missing_column() {
        let err = parse_bulk("Date,Expense,Category\n2024-05-03,1,Food\n").unwrap_err();
        assert!(err.to_string().contains("Account"));
    }

    #[tokio::test]
    async fn test_add_in_demo_mode() {
        let env = TestEnv::new().await;
        let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let args = AddArgs::new(date, "499".parse().unwrap(), "Entertainment", "Wallet")
            .with_notes("movie");
        let out = add(env.config().root(), Mode::Demo, &args).await.unwrap();
        let written = out.structure().unwrap();
        assert_eq!(written.persisted, Persisted::Local);
        assert_eq!(written.value.month_tab(), MonthTab::parse("May 2024").unwrap());
        assert!(out.message().contains("May 2024"));
        assert!(out.message().contains("locally"));
    }

    #[tokio::test]
    async fn test_add_with_missing_receipt_file() {
        let env = TestEnv::new().await;
        let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let args = AddArgs::new(date, "10".parse().unwrap(), "Other", "Cash")
            .with_receipt(env.config().root().join("missing.jpg"));
        let err = add(env.config().root(), Mode::Demo, &args).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
    }

    #[tokio::test]
    async fn test_bulk_from_file() {
        let env = TestEnv::new().await;
        let path = env.config().root().join("expenses.csv");
        std::fs::write(
            &path,
            "Date,Expense,Category,Account,Notes\n\
             2024-05-03,250,Food & Dining,UPI,chai\n\
             2024-05-04,0,Food & Dining,UPI,free\n\
             2024-05-05,x,Food & Dining,UPI,nope\n",
        )
        .unwrap();
        let out = bulk(env.config().root(), Mode::Demo, &BulkArgs::new(Some(path)))
            .await
            .unwrap();
        let result = out.structure().unwrap();
        assert_eq!(result.saved.len(), 1);
        assert_eq!(result.skipped.len(), 2);
        assert!(result.skipped[0].starts_with("line 4:"));
        assert!(result.skipped[1].starts_with("row 2:"));
        assert!(out.message().starts_with("Added 1 transactions, 1 of them only locally"));
    }
}
