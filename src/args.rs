//! These structs provide the CLI interface for the sheetwise CLI.

use crate::model::{parse_date, Amount, Locale, MonthTab};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// sheetwise: track your monthly expenses in a Google Sheet.
///
/// Every month gets its own tab in the spreadsheet, named like "May 2024". Receipt images are
/// uploaded to a "Monthly Expenses/Images" folder in your Google Drive.
///
/// Until a Google account is connected (see `sheetwise init` and `sheetwise auth`), or whenever
/// SHEETWISE_DEMO is set, sheetwise works on demo data that is kept in its local cache.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and the configuration file.
    ///
    /// This is the first command to run. To use a Google Sheet you need:
    ///
    /// - The URL of the spreadsheet, passed as --sheet-url. Without it sheetwise runs on demo
    ///   data.
    ///
    /// - OAuth client credentials for a Desktop app from Google Cloud Console, with the Sheets
    ///   and Drive APIs enabled and `http://localhost` as a redirect URI. Pass the downloaded
    ///   JSON file as --client-secret. It is moved into $SHEETWISE_HOME/.secrets.
    Init(InitArgs),
    /// Connect your Google account via OAuth.
    Auth(AuthArgs),
    /// List the months that have transactions.
    Months,
    /// Show the transactions of a month grouped by day, with totals.
    List(ListArgs),
    /// Add an expense.
    Add(Box<AddArgs>),
    /// Add many expenses from CSV with the columns Date,Expense,Category,Account,Notes.
    Bulk(BulkArgs),
    /// Change an expense.
    Update(Box<UpdateArgs>),
    /// Delete an expense and its receipt image.
    Delete(DeleteArgs),
    /// Search every month by category, notes, account, amount or date.
    Search(SearchArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where sheetwise configuration and cache are held. Defaults to ~/sheetwise
    #[arg(long, env = "SHEETWISE_HOME", default_value_t = default_sheetwise_home())]
    sheetwise_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, sheetwise_home: PathBuf) -> Self {
        Self {
            log_level,
            sheetwise_home: sheetwise_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn sheetwise_home(&self) -> &DisplayPath {
        &self.sheetwise_home
    }
}

/// (Not shown): Args for the `sheetwise init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of your expenses Google Sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long, default_value = "")]
    sheet_url: String,

    /// The path to your downloaded OAuth client credentials.
    #[arg(long)]
    client_secret: Option<PathBuf>,

    /// How amounts are grouped: en-IN (12,34,567) or en-US (1,234,567).
    #[arg(long, default_value_t = Locale::EnIn)]
    locale: Locale,

    /// ISO 4217 currency code, e.g. INR or USD.
    #[arg(long, default_value = "INR")]
    currency: String,
}

impl InitArgs {
    pub fn new(
        sheet_url: impl Into<String>,
        client_secret: Option<PathBuf>,
        locale: Locale,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            client_secret,
            locale,
            currency: currency.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn client_secret(&self) -> Option<&Path> {
        self.client_secret.as_deref()
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

/// (Not shown): Args for the `sheetwise auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh the saved tokens instead of starting a new consent flow.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `sheetwise list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    /// The month to show, like "May 2024". Defaults to the current month.
    #[arg(long)]
    month: Option<MonthTab>,
}

impl ListArgs {
    pub fn new(month: Option<MonthTab>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<MonthTab> {
        self.month
    }
}

/// (Not shown): Args for the `sheetwise add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The date of the expense: 2024-05-03 or 5/3/2024.
    #[arg(long, value_parser = date_arg)]
    date: NaiveDate,

    /// The amount spent.
    #[arg(long)]
    expense: Amount,

    #[arg(long)]
    income: Option<Amount>,

    /// For example "Food & Dining" or "Transportation". Other values are accepted with a warning.
    #[arg(long)]
    category: String,

    /// For example "Cash", "UPI" or "Credit Card". Other values are accepted with a warning.
    #[arg(long)]
    account: String,

    #[arg(long, default_value = "")]
    notes: String,

    /// An image of the receipt to upload to Google Drive.
    #[arg(long)]
    receipt: Option<PathBuf>,
}

impl AddArgs {
    pub fn new(
        date: NaiveDate,
        expense: Amount,
        category: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            date,
            expense,
            income: None,
            category: category.into(),
            account: account.into(),
            notes: String::new(),
            receipt: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_receipt(mut self, receipt: impl Into<PathBuf>) -> Self {
        self.receipt = Some(receipt.into());
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn expense(&self) -> Amount {
        self.expense
    }

    pub fn income(&self) -> Option<Amount> {
        self.income
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn receipt(&self) -> Option<&Path> {
        self.receipt.as_deref()
    }
}

/// (Not shown): Args for the `sheetwise bulk` command.
#[derive(Debug, Parser, Clone)]
pub struct BulkArgs {
    /// The CSV file to read. Reads stdin when omitted.
    #[arg(long)]
    file: Option<PathBuf>,
}

impl BulkArgs {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

/// (Not shown): Args for the `sheetwise update` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct UpdateArgs {
    /// The ID of the transaction, e.g. txn_1714713600000_k3j9x2m1q
    id: String,

    /// A new date. Moving it to another month moves it to that month's tab.
    #[arg(long, value_parser = date_arg)]
    date: Option<NaiveDate>,

    #[arg(long)]
    expense: Option<Amount>,

    #[arg(long)]
    income: Option<Amount>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    account: Option<String>,

    #[arg(long)]
    notes: Option<String>,

    /// A new receipt image. The old one is deleted from Google Drive.
    #[arg(long, conflicts_with = "clear_receipt")]
    receipt: Option<PathBuf>,

    /// Remove the receipt image.
    #[arg(long)]
    clear_receipt: bool,
}

impl UpdateArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_expense(mut self, expense: Amount) -> Self {
        self.expense = Some(expense);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_clear_receipt(mut self) -> Self {
        self.clear_receipt = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn expense(&self) -> Option<Amount> {
        self.expense
    }

    pub fn income(&self) -> Option<Amount> {
        self.income
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn receipt(&self) -> Option<&Path> {
        self.receipt.as_deref()
    }

    pub fn clear_receipt(&self) -> bool {
        self.clear_receipt
    }
}

/// (Not shown): Args for the `sheetwise delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The ID of the transaction to delete.
    id: String,
}

impl DeleteArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// (Not shown): Args for the `sheetwise search` command.
#[derive(Debug, Parser, Clone)]
pub struct SearchArgs {
    /// Text to look for. Case does not matter.
    query: String,

    /// Reload every month from the sheet instead of using the cache.
    #[arg(long)]
    refresh: bool,
}

impl SearchArgs {
    pub fn new(query: impl Into<String>, refresh: bool) -> Self {
        Self {
            query: query.into(),
            refresh,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn refresh(&self) -> bool {
        self.refresh
    }
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn default_sheetwise_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("sheetwise"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --sheetwise-home or SHEETWISE_HOME instead of relying on the \
                default sheetwise home directory.",
            );
            PathBuf::from("sheetwise")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let args = Args::try_parse_from([
            "sheetwise",
            "--sheetwise-home",
            "/tmp/sw",
            "add",
            "--date",
            "5/3/2024",
            "--expense",
            "₹2,500",
            "--category",
            "Food & Dining",
            "--account",
            "UPI",
        ])
        .unwrap();
        assert_eq!(args.common().sheetwise_home().path(), Path::new("/tmp/sw"));
        let Command::Add(add) = args.command() else {
            panic!("expected add, got {:?}", args.command());
        };
        assert_eq!(add.date(), NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
        assert_eq!(add.expense().to_string(), "2500");
        assert_eq!(add.notes(), "");
        assert!(add.receipt().is_none());
    }

    #[test]
    fn test_parse_list_month() {
        let args = Args::try_parse_from(["sheetwise", "list", "--month", "May 2024"]).unwrap();
        let Command::List(list) = args.command() else {
            panic!("expected list");
        };
        assert_eq!(list.month().unwrap().name(), "May 2024");
        assert!(Args::try_parse_from(["sheetwise", "list", "--month", "may 2024"]).is_err());
    }

    #[test]
    fn test_update_receipt_conflict() {
        let result = Args::try_parse_from([
            "sheetwise",
            "update",
            "txn_1",
            "--receipt",
            "r.jpg",
            "--clear-receipt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level() {
        let args =
            Args::try_parse_from(["sheetwise", "--log-level", "debug", "months"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
    }

    #[test]
    fn test_init_defaults() {
        let args = Args::try_parse_from(["sheetwise", "init"]).unwrap();
        let Command::Init(init) = args.command() else {
            panic!("expected init");
        };
        assert_eq!(init.sheet_url(), "");
        assert_eq!(init.locale(), Locale::EnIn);
        assert_eq!(init.currency(), "INR");
        assert!(init.client_secret().is_none());
    }
}
