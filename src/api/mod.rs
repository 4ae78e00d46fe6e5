//! Remote storage: the spreadsheet that holds one tab per month, and Google Drive for receipt
//! images.
//!
//! Three traits split the work:
//! - `Sheet` is the low-level spreadsheet I/O (tabs and rows of strings).
//! - `ExpenseStore` knows about month tabs, the header and total rows, and finds rows by
//!   transaction ID. `SheetStore` implements it over any `Sheet`.
//! - `Receipts` uploads and deletes receipt images.

mod drive;
mod files;
mod google_sheet;
mod layout;
mod oauth;
mod store;
#[cfg(test)]
mod test_sheet;

use crate::error::Res;
use crate::model::{MonthTab, Transaction};
use crate::Config;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub(crate) use drive::GoogleDrive;
pub(crate) use google_sheet::GoogleSheet;
pub(crate) use oauth::TokenProvider;
pub(crate) use store::SheetStore;
#[cfg(test)]
pub(crate) use drive::TestDrive;
#[cfg(test)]
pub(crate) use test_sheet::{FailingSheet, TestSheet};

/// Spreadsheet read/write, Drive access for files this app creates, and the account email.
pub(crate) const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// The environment variable that forces demo mode when it is set and non-empty.
pub const DEMO_ENV: &str = "SHEETWISE_DEMO";

/// Whether to talk to Google or run entirely on local demo data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Google,
    Demo,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Demo` if `SHEETWISE_DEMO` is set to anything non-empty, otherwise `Mode::Google`.
    pub fn from_env() -> Self {
        match std::env::var(DEMO_ENV) {
            Ok(value) if !value.is_empty() => Mode::Demo,
            _ => Mode::Google,
        }
    }
}

/// A tab in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetTab {
    pub(crate) id: i64,
    pub(crate) title: String,
}

/// Low-level access to a single spreadsheet. Row numbers are 1-based, as they are in the sheet UI.
#[async_trait::async_trait]
pub(crate) trait Sheet {
    /// Lists the tabs of the spreadsheet.
    async fn tabs(&mut self) -> Res<Vec<SheetTab>>;

    /// Adds an empty tab and returns its sheet ID.
    async fn add_tab(&mut self, title: &str) -> Res<i64>;

    /// Gets all rows of a tab as formatted strings. A tab that does not exist has no rows.
    async fn get(&mut self, title: &str) -> Res<Vec<Vec<String>>>;

    /// Appends rows after the last non-empty row of the tab.
    async fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Res<()>;

    /// Overwrites one row, starting at column A.
    async fn update_row(&mut self, title: &str, row_number: usize, row: &[String]) -> Res<()>;

    /// Removes one physical row. Rows below it move up.
    async fn delete_row(&mut self, title: &str, row_number: usize) -> Res<()>;
}

/// Month-tab and row synchronization on top of a `Sheet`.
#[async_trait::async_trait]
pub(crate) trait ExpenseStore {
    /// Every tab whose name is a valid month, newest first.
    async fn month_tabs(&mut self) -> Res<Vec<MonthTab>>;

    async fn tab_exists(&mut self, tab: MonthTab) -> Res<bool>;

    /// Adds the tab with its header and total rows.
    async fn create_month_tab(&mut self, tab: MonthTab) -> Res<()>;

    /// Reads the transactions of a month. Rows without an ID are skipped.
    async fn read_month(&mut self, tab: MonthTab) -> Res<Vec<Transaction>>;

    /// The 1-based row number of the transaction with `id`.
    async fn find_row_by_id(&mut self, tab: MonthTab, id: &str) -> Res<Option<usize>>;

    /// Appends `txn` to the tab, creating the tab first if it does not exist.
    async fn add_transaction(&mut self, tab: MonthTab, txn: &Transaction) -> Res<()>;

    /// Overwrites the row holding `txn.id`. It is an error if there is no such row.
    async fn update_row_by_id(&mut self, tab: MonthTab, txn: &Transaction) -> Res<()>;

    /// Deletes the row holding `id`. It is an error if there is no such row.
    async fn delete_row_by_id(&mut self, tab: MonthTab, id: &str) -> Res<()>;
}

/// Storage for receipt images.
#[async_trait::async_trait]
pub(crate) trait Receipts {
    /// Uploads an image and returns a URL that anyone can view.
    async fn upload(&mut self, file_name: &str, bytes: Vec<u8>) -> Res<String>;

    /// Deletes the image behind `url`. URLs that do not name a file are ignored.
    async fn delete(&mut self, url: &str) -> Res<()>;
}

/// The remote half of the tracker: the month store and the receipt store.
pub(crate) struct Remote {
    pub(crate) store: Box<dyn ExpenseStore + Send>,
    pub(crate) receipts: Box<dyn Receipts + Send>,
}

impl Remote {
    pub(crate) fn new(
        store: Box<dyn ExpenseStore + Send>,
        receipts: Box<dyn Receipts + Send>,
    ) -> Self {
        Self { store, receipts }
    }
}

/// Connects to Google when the mode, the config and the stored credentials allow it. Anything
/// missing or broken means demo mode, so this returns `None` instead of an error.
pub(crate) async fn remote(config: &Config, mode: Mode) -> Option<Remote> {
    if mode == Mode::Demo {
        debug!("{DEMO_ENV} is set, using demo data");
        return None;
    }
    if config.spreadsheet_id().is_empty() {
        warn!("No sheet URL is configured, using demo data");
        return None;
    }
    let token_provider =
        match TokenProvider::load(&config.client_secret_path(), &config.token_path()).await {
            Ok(token_provider) => token_provider,
            Err(e) => {
                warn!("Google credentials are unavailable, using demo data: {e:#}");
                return None;
            }
        };
    let sheet = GoogleSheet::new(config.spreadsheet_id(), token_provider.clone());
    let drive = GoogleDrive::new(token_provider);
    Some(Remote::new(
        Box::new(SheetStore::new(Box::new(sheet))),
        Box::new(drive),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Demo.to_string(), "demo");
        assert_eq!("google".parse::<Mode>().unwrap(), Mode::Google);
    }

    #[tokio::test]
    async fn test_remote_is_none_in_demo_mode() {
        let env = TestEnv::new().await;
        assert!(remote(&env.config(), Mode::Demo).await.is_none());
    }

    #[tokio::test]
    async fn test_remote_is_none_without_token() {
        let env = TestEnv::new().await;
        assert!(remote(&env.config(), Mode::Google).await.is_none());
    }
}
