//! The layout of a month tab.
//!
//! ```text
//! row 1: ID | Date | Expense | Income | Category | Account | Notes | Image | CreatedAt | UpdatedAt
//! row 2: TOTAL |   | =SUM(C3:C) | =SUM(D3:D) | ...
//! row 3+: one transaction per row
//! ```
//!
//! Reading goes through the header so that reordered or renamed columns (e.g. `Expense ₹`) still
//! work, and so that tabs created before the total row existed can be read.

use crate::model::{parse_date, Amount, Transaction};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

pub(super) const TOTAL_LABEL: &str = "TOTAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Column {
    Id,
    Date,
    Expense,
    Income,
    Category,
    Account,
    Notes,
    Image,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    pub(super) const ALL: [Column; 10] = [
        Column::Id,
        Column::Date,
        Column::Expense,
        Column::Income,
        Column::Category,
        Column::Account,
        Column::Notes,
        Column::Image,
        Column::CreatedAt,
        Column::UpdatedAt,
    ];

    pub(super) fn header(&self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Date => "Date",
            Column::Expense => "Expense",
            Column::Income => "Income",
            Column::Category => "Category",
            Column::Account => "Account",
            Column::Notes => "Notes",
            Column::Image => "Image",
            Column::CreatedAt => "CreatedAt",
            Column::UpdatedAt => "UpdatedAt",
        }
    }

    /// Header cells match case-insensitively, ignoring spaces and underscores, and may carry a
    /// suffix such as a currency symbol.
    fn matches(&self, cell: &str) -> bool {
        normalize(cell).starts_with(&normalize(self.header()))
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect::<String>()
        .to_lowercase()
}

/// Maps physical column positions to `Column`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Layout {
    columns: Vec<Option<Column>>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            columns: Column::ALL.iter().copied().map(Some).collect(),
        }
    }
}

impl Layout {
    /// Builds the layout from a header row. A row without an ID column is not a header, and the
    /// standard layout is used instead.
    pub(super) fn from_header(header: &[String]) -> Self {
        let mut columns: Vec<Option<Column>> = Vec::with_capacity(header.len());
        for cell in header {
            let found = Column::ALL
                .iter()
                .copied()
                .filter(|c| !columns.contains(&Some(*c)))
                .find(|c| c.matches(cell));
            columns.push(found);
        }
        let layout = Self { columns };
        if layout.position(Column::Id).is_none() {
            return Self::default();
        }
        layout
    }

    /// The layout of a tab given all its rows.
    pub(super) fn from_rows(rows: &[Vec<String>]) -> Self {
        rows.first()
            .map(|header| Self::from_header(header))
            .unwrap_or_default()
    }

    pub(super) fn position(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == Some(column))
    }

    fn cell<'a>(&self, row: &'a [String], column: Column) -> &'a str {
        self.position(column)
            .and_then(|i| row.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// The transaction ID held by `row`, if any.
    pub(super) fn id<'a>(&self, row: &'a [String]) -> Option<&'a str> {
        let id = self.cell(row, Column::Id);
        if id.is_empty() || is_label(id) {
            None
        } else {
            Some(id)
        }
    }

    /// Parses a data row. Returns `None` for the header, the total row, rows without an ID and
    /// rows whose date cannot be read.
    pub(super) fn parse_row(&self, row: &[String]) -> Option<Transaction> {
        let id = self.id(row)?;
        let date = match parse_date(self.cell(row, Column::Date)) {
            Ok(date) => date,
            Err(e) => {
                warn!("Skipping row {id}: {e:#}");
                return None;
            }
        };
        let fallback = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()).unwrap_or_default();
        let created_at = parse_timestamp(self.cell(row, Column::CreatedAt)).unwrap_or(fallback);
        let updated_at = parse_timestamp(self.cell(row, Column::UpdatedAt)).unwrap_or(created_at);
        let image = self.cell(row, Column::Image);
        Some(Transaction {
            id: id.to_string(),
            date,
            expense: Amount::from_cell(self.cell(row, Column::Expense)),
            income: Amount::from_cell(self.cell(row, Column::Income)),
            category: self.cell(row, Column::Category).to_string(),
            account: self.cell(row, Column::Account).to_string(),
            notes: self.cell(row, Column::Notes).to_string(),
            image: (!image.is_empty()).then(|| image.to_string()),
            created_at,
            updated_at,
            deleted: false,
        })
    }

    /// Renders `txn` into the physical column order of this layout.
    pub(super) fn to_row(&self, txn: &Transaction) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column {
                Some(column) => value(txn, *column),
                None => String::new(),
            })
            .collect()
    }
}

fn value(txn: &Transaction, column: Column) -> String {
    match column {
        Column::Id => txn.id.clone(),
        Column::Date => txn.date.format("%Y-%m-%d").to_string(),
        Column::Expense => txn.expense.map(|a| a.to_string()).unwrap_or_default(),
        Column::Income => txn.income.map(|a| a.to_string()).unwrap_or_default(),
        Column::Category => txn.category.clone(),
        Column::Account => txn.account.clone(),
        Column::Notes => txn.notes.clone(),
        Column::Image => txn.image.clone().unwrap_or_default(),
        Column::CreatedAt => timestamp(txn.created_at),
        Column::UpdatedAt => timestamp(txn.updated_at),
    }
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn is_label(cell: &str) -> bool {
    cell.eq_ignore_ascii_case(TOTAL_LABEL) || cell.eq_ignore_ascii_case(Column::Id.header())
}

/// The header row of a new month tab.
pub(super) fn header_row() -> Vec<String> {
    Column::ALL.iter().map(|c| c.header().to_string()).collect()
}

/// The total row of a new month tab.
pub(super) fn total_row() -> Vec<String> {
    let layout = Layout::default();
    let sum = |column: Column| match layout.position(column) {
        Some(i) => {
            let letter = column_letter(i);
            format!("=SUM({letter}3:{letter})")
        }
        None => String::new(),
    };
    Column::ALL
        .iter()
        .map(|c| match c {
            Column::Id => TOTAL_LABEL.to_string(),
            Column::Expense | Column::Income => sum(*c),
            _ => String::new(),
        })
        .collect()
}

/// `0` -> `A`, `25` -> `Z`, `26` -> `AA`.
pub(super) fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
