use crate::args::UpdateArgs;
use crate::commands::add::local_note;
use crate::commands::{load_config, open_tracker, read_receipt, warn_unknown_labels, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::{Transaction, TransactionUpdates};
use crate::tracker::Written;
use crate::{Mode, Result};
use anyhow::anyhow;
use std::path::Path;

/// Changes the fields given in `args`. A new date in another month moves the transaction to that
/// month's tab. A new receipt replaces the old image, and `--clear-receipt` removes it.
pub async fn update(
    sheetwise_home: &Path,
    mode: Mode,
    args: &UpdateArgs,
) -> Result<Out<Written<Transaction>>> {
    let config = load_config(sheetwise_home).await?;
    warn_unknown_labels(args.category(), args.account());
    let updates = TransactionUpdates {
        date: args.date(),
        expense: args.expense(),
        income: args.income(),
        category: args.category().map(str::to_string),
        account: args.account().map(str::to_string),
        notes: args.notes().map(str::to_string),
        image: args.clear_receipt().then_some(None),
    };
    let receipt = match args.receipt() {
        Some(path) => Some(read_receipt(path).await?),
        None => None,
    };
    if updates.is_empty() && receipt.is_none() {
        return Err(anyhow!("Nothing to update, pass at least one field to change"))
            .pub_result(ErrorType::Request);
    }

    let mut tracker = open_tracker(&config, mode).await;
    let written = tracker
        .update_transaction(args.id(), updates, receipt)
        .await
        .pub_result(ErrorType::Request)?;
    let tab = tracker
        .ledger()
        .find(&written.value.id)
        .map(|(tab, _)| tab)
        .unwrap_or_else(|| written.value.month_tab());
    let message = format!(
        "Updated {} in {tab}{}",
        written.value.id,
        local_note(written.persisted)
    );
    Ok(Out::new(message, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, MonthTab};
    use crate::test::TestEnv;
    use crate::tracker::Persisted;
    use chrono::NaiveDate;

    async fn first_demo_id(env: &TestEnv) -> String {
        let cache = env.cache().await;
        let tracker = crate::tracker::Tracker::demo(Some(cache)).await;
        tracker.current_transactions()[0].id.clone()
    }

    #[tokio::test]
    async fn test_update_moves_month_and_persists() {
        let env = TestEnv::new().await;
        let id = first_demo_id(&env).await;
        let date = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        let args = UpdateArgs::new(&id)
            .with_date(date)
            .with_expense("999".parse::<Amount>().unwrap())
            .with_notes("moved");

        let out = update(env.config().root(), Mode::Demo, &args).await.unwrap();
        let written = out.structure().unwrap();
        assert_eq!(written.persisted, Persisted::Local);
        assert_eq!(written.value.date, date);
        assert_eq!(written.value.notes, "moved");
        assert!(out.message().contains("December 2023"));

        // The next command sees the change through the saved demo ledger.
        let tracker = crate::tracker::Tracker::demo(Some(env.cache().await)).await;
        let (tab, txn) = tracker.ledger().find(&id).unwrap();
        assert_eq!(tab, MonthTab::parse("December 2023").unwrap());
        assert_eq!(txn.expense.unwrap().to_string(), "999");
        assert_eq!(tracker.ledger().all().filter(|t| t.id == id).count(), 1);
    }

    #[tokio::test]
    async fn test_update_nothing() {
        let env = TestEnv::new().await;
        let err = update(env.config().root(), Mode::Demo, &UpdateArgs::new("txn_1"))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
        assert!(err.to_string().contains("Nothing to update"));
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let env = TestEnv::new().await;
        let args = UpdateArgs::new("txn_nope").with_clear_receipt();
        let err = update(env.config().root(), Mode::Demo, &args)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
        assert!(err.to_string().contains("txn_nope"));
    }
}
