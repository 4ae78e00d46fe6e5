//! Types that represent the core data model, such as `Transaction`, `MonthTab` and `Ledger`.
mod amount;
mod currency;
mod ledger;
mod month;
mod transaction;

pub use amount::{Amount, AmountError};
pub use currency::{CurrencyFormat, Locale, MISSING};
pub use ledger::{DayGroup, Ledger, SearchHit, Summary};
pub use month::MonthTab;
pub use transaction::{
    parse_date, unknown_labels, NewTransaction, Transaction, TransactionUpdates, ACCOUNTS,
    CATEGORIES,
};
