use crate::args::DeleteArgs;
use crate::commands::add::local_note;
use crate::commands::{load_config, open_tracker, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::Transaction;
use crate::tracker::Written;
use crate::{Mode, Result};
use std::path::Path;

/// Deletes a transaction from its month tab, along with its receipt image.
pub async fn delete(
    sheetwise_home: &Path,
    mode: Mode,
    args: &DeleteArgs,
) -> Result<Out<Written<Transaction>>> {
    let config = load_config(sheetwise_home).await?;
    let mut tracker = open_tracker(&config, mode).await;
    let written = tracker
        .delete_transaction(args.id())
        .await
        .pub_result(ErrorType::Request)?;
    let message = format!(
        "Deleted {} from {}{}",
        written.value.id,
        written.value.month_tab(),
        local_note(written.persisted)
    );
    Ok(Out::new(message, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use crate::tracker::Tracker;

    #[tokio::test]
    async fn test_delete_in_demo_mode() {
        let env = TestEnv::new().await;
        let before = Tracker::demo(Some(env.cache().await)).await;
        let id = before.current_transactions()[1].id.clone();
        let count = before.ledger().len();

        let out = delete(env.config().root(), Mode::Demo, &DeleteArgs::new(&id))
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().value.id, id);

        let after = Tracker::demo(Some(env.cache().await)).await;
        assert!(after.ledger().find(&id).is_none());
        assert_eq!(after.ledger().len(), count - 1);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let env = TestEnv::new().await;
        let id = Tracker::demo(Some(env.cache().await))
            .await
            .current_transactions()[0]
            .id
            .clone();
        delete(env.config().root(), Mode::Demo, &DeleteArgs::new(&id))
            .await
            .unwrap();
        let err = delete(env.config().root(), Mode::Demo, &DeleteArgs::new(&id))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
    }
}
