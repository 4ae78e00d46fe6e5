use crate::model::{Amount, MonthTab};
use crate::utils::generate_transaction_id;
use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Categories offered for new expenses.
pub const CATEGORIES: &[&str] = &[
    "Food & Dining",
    "Transportation",
    "Shopping",
    "Entertainment",
    "Bills & Utilities",
    "Healthcare",
    "Education",
    "Travel",
    "Groceries",
    "Personal Care",
    "Salary",
    "Freelance",
    "Investment",
    "Gift",
    "Other",
];

/// Accounts offered for new expenses.
pub const ACCOUNTS: &[&str] = &[
    "Cash",
    "Bank Account",
    "Credit Card",
    "Savings",
    "UPI",
    "Wallet",
    "Other",
];

/// A single expense (or income) entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub expense: Option<Amount>,
    pub income: Option<Amount>,
    pub category: String,
    pub account: String,
    pub notes: String,
    /// URL of a receipt image stored in Google Drive.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Legacy soft-delete marker. Deletion is a hard delete now, but rows that still carry the
    /// flag are hidden from every view.
    #[serde(default)]
    pub deleted: bool,
}

impl Transaction {
    /// Creates a transaction from user input with a freshly generated ID and timestamps.
    pub fn create(new: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: generate_transaction_id(),
            date: new.date,
            expense: new.expense,
            income: new.income,
            category: new.category,
            account: new.account,
            notes: new.notes,
            image: new.image,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// The month tab this transaction belongs to.
    pub fn month_tab(&self) -> MonthTab {
        MonthTab::from_date(self.date)
    }

    /// Applies `updates`, refreshing `updated_at`.
    pub fn apply(&mut self, updates: &TransactionUpdates) {
        if let Some(date) = updates.date {
            self.date = date;
        }
        if let Some(expense) = updates.expense {
            self.expense = Some(expense);
        }
        if let Some(income) = updates.income {
            self.income = Some(income);
        }
        if let Some(category) = &updates.category {
            self.category = category.clone();
        }
        if let Some(account) = &updates.account {
            self.account = account.clone();
        }
        if let Some(notes) = &updates.notes {
            self.notes = notes.clone();
        }
        if let Some(image) = &updates.image {
            self.image = image.clone();
        }
        self.updated_at = Utc::now();
    }

    /// The expense amount, treating a missing value as zero.
    pub fn expense_value(&self) -> rust_decimal::Decimal {
        self.expense.map(|a| a.value()).unwrap_or_default()
    }
}

/// The user-supplied fields of a new transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub expense: Option<Amount>,
    #[serde(default)]
    pub income: Option<Amount>,
    pub category: String,
    pub account: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewTransaction {
    /// An expense needs a positive amount, a category and an account.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.expense {
            Some(amount) if amount.is_positive() => {}
            Some(amount) => bail!("The expense amount must be positive, got {amount}"),
            None => bail!("The expense amount is required"),
        }
        if self.category.trim().is_empty() {
            bail!("A category is required");
        }
        if self.account.trim().is_empty() {
            bail!("An account is required");
        }
        Ok(())
    }

    pub fn month_tab(&self) -> MonthTab {
        MonthTab::from_date(self.date)
    }
}

/// A partial update to a transaction. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransactionUpdates {
    pub date: Option<NaiveDate>,
    pub expense: Option<Amount>,
    pub income: Option<Amount>,
    pub category: Option<String>,
    pub account: Option<String>,
    pub notes: Option<String>,
    /// `Some(None)` removes the receipt image.
    pub image: Option<Option<String>>,
}

impl TransactionUpdates {
    pub fn is_empty(&self) -> bool {
        self == &TransactionUpdates::default()
    }

    /// The same rules as `NewTransaction::validate`, for the fields that are being changed.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(amount) = self.expense {
            if !amount.is_positive() {
                bail!("The expense amount must be positive, got {amount}");
            }
        }
        if matches!(&self.category, Some(c) if c.trim().is_empty()) {
            bail!("The category cannot be empty");
        }
        if matches!(&self.account, Some(a) if a.trim().is_empty()) {
            bail!("The account cannot be empty");
        }
        Ok(())
    }
}

/// Describes a category or account that is not one of `CATEGORIES` or `ACCOUNTS`. Such values are
/// accepted, they just won't match the choices offered elsewhere.
pub fn unknown_labels(category: Option<&str>, account: Option<&str>) -> Vec<String> {
    let mut unknown = Vec::new();
    if let Some(category) = category.filter(|c| !CATEGORIES.contains(&c.trim())) {
        unknown.push(format!(
            "'{category}' is not a known category ({})",
            CATEGORIES.join(", ")
        ));
    }
    if let Some(account) = account.filter(|a| !ACCOUNTS.contains(&a.trim())) {
        unknown.push(format!(
            "'{account}' is not a known account ({})",
            ACCOUNTS.join(", ")
        ));
    }
    unknown
}

/// Parses a date as found in a sheet cell or on the command line.
///
/// Accepts `2024-05-03`, RFC 3339 timestamps such as `2024-04-30T18:30:00.000Z`, and the US sheet
/// display format `5/3/2024`. Timestamps are read in local time, so a date picked at local
/// midnight and stored in UTC comes back as the day that was picked.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Local).date_naive());
    }
    NaiveDate::parse_from_str(s, "%m/%d/%Y").with_context(|| format!("Unable to parse date '{s}'"))
}
