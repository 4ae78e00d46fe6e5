use crate::args::SearchArgs;
use crate::commands::months::transaction_line;
use crate::commands::{load_config, open_tracker, Out};
use crate::model::SearchHit;
use crate::{Mode, Result};
use std::fmt::Write;
use std::path::Path;

/// Finds transactions in every month whose category, notes, account, amount or date contains the
/// query.
pub async fn search(
    sheetwise_home: &Path,
    mode: Mode,
    args: &SearchArgs,
) -> Result<Out<Vec<SearchHit>>> {
    let config = load_config(sheetwise_home).await?;
    let format = config.currency_format();
    let mut tracker = open_tracker(&config, mode).await;
    let hits = tracker.search(args.query(), args.refresh()).await;

    let mut message = match hits.len() {
        0 => format!("No transactions match '{}'", args.query()),
        1 => "1 match".to_string(),
        n => format!("{n} matches"),
    };
    for hit in &hits {
        let _ = write!(
            message,
            "\n{}  {}",
            hit.transaction.date,
            transaction_line(&format, &hit.transaction)
        );
    }
    Ok(Out::new(message, hits))
}
