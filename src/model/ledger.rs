use crate::model::{MonthTab, Transaction, TransactionUpdates};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transactions partitioned by month tab.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger(BTreeMap<MonthTab, Vec<Transaction>>);

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `txn` in the month collection derived from its date.
    pub fn insert(&mut self, txn: Transaction) -> MonthTab {
        let tab = txn.month_tab();
        self.0.entry(tab).or_default().push(txn);
        tab
    }

    /// Finds a transaction by id in any month.
    pub fn find(&self, id: &str) -> Option<(MonthTab, &Transaction)> {
        self.0.iter().find_map(|(tab, txns)| {
            txns.iter()
                .find(|t| t.id == id)
                .map(|t| (*tab, t))
        })
    }

    /// Removes a transaction from every month collection. Returns the removed transaction, if any
    /// month held it.
    pub fn remove(&mut self, id: &str) -> Option<Transaction> {
        let mut removed = None;
        for txns in self.0.values_mut() {
            if let Some(pos) = txns.iter().position(|t| t.id == id) {
                removed = Some(txns.remove(pos));
                txns.retain(|t| t.id != id);
            }
        }
        removed
    }

    /// Applies `updates` to the transaction with `id`. It only changes month when `updates`
    /// carries a date in another month: then it is taken out of the old collection and appended
    /// to the new one. Returns the months it moved between and the updated transaction.
    pub fn update(
        &mut self,
        id: &str,
        updates: &TransactionUpdates,
    ) -> Option<(MonthTab, MonthTab, Transaction)> {
        let (old_tab, _) = self.find(id)?;
        let txns = self.0.get_mut(&old_tab)?;
        let pos = txns.iter().position(|t| t.id == id)?;
        let mut txn = txns[pos].clone();
        txn.apply(updates);
        let new_tab = updates.date.map(MonthTab::from_date).unwrap_or(old_tab);
        if new_tab == old_tab {
            txns[pos] = txn.clone();
        } else {
            self.remove(id);
            self.0.entry(new_tab).or_default().push(txn.clone());
        }
        Some((old_tab, new_tab, txn))
    }

    /// Makes sure a (possibly empty) collection exists for `tab`.
    pub fn ensure_month(&mut self, tab: MonthTab) {
        self.0.entry(tab).or_default();
    }

    pub fn replace_month(&mut self, tab: MonthTab, txns: Vec<Transaction>) {
        self.0.insert(tab, txns);
    }

    /// Replaces each month of `self` that `other` also holds, and adds the rest.
    pub fn merge(&mut self, other: Ledger) {
        self.0.extend(other.0);
    }

    /// All known month tabs, newest first.
    pub fn month_tabs(&self) -> Vec<MonthTab> {
        self.0.keys().rev().copied().collect()
    }

    /// The visible transactions of a month.
    pub fn transactions(&self, tab: MonthTab) -> Vec<&Transaction> {
        self.0
            .get(&tab)
            .map(|txns| txns.iter().filter(|t| !t.deleted).collect())
            .unwrap_or_default()
    }

    /// Every visible transaction across all months.
    pub fn all(&self) -> impl Iterator<Item = &Transaction> {
        self.0.values().flatten().filter(|t| !t.deleted)
    }

    pub fn len(&self) -> usize {
        self.all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self, tab: MonthTab) -> Summary {
        let txns = self.transactions(tab);
        Summary {
            month: tab,
            total_expense: txns.iter().map(|t| t.expense_value()).sum(),
            total_income: txns
                .iter()
                .filter_map(|t| t.income.map(|a| a.value()))
                .sum(),
            count: txns.len(),
        }
    }

    /// Transactions of a month grouped by day, newest day first. Within a day the most recently
    /// created entry comes first.
    pub fn by_day(&self, tab: MonthTab) -> Vec<DayGroup> {
        let mut days: BTreeMap<NaiveDate, Vec<Transaction>> = BTreeMap::new();
        for txn in self.transactions(tab) {
            days.entry(txn.date).or_default().push(txn.clone());
        }
        days.into_iter()
            .rev()
            .map(|(date, mut transactions)| {
                transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                DayGroup {
                    date,
                    total: transactions.iter().map(|t| t.expense_value()).sum(),
                    transactions,
                }
            })
            .collect()
    }

    /// Case-insensitive search over every month. An empty query matches nothing.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<SearchHit> = self
            .0
            .iter()
            .flat_map(|(tab, txns)| txns.iter().map(move |t| (tab, t)))
            .filter(|(_, t)| !t.deleted && matches(t, &query))
            .map(|(tab, t)| SearchHit {
                month: *tab,
                transaction: t.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.transaction.date.cmp(&a.transaction.date));
        hits
    }
}

fn matches(txn: &Transaction, query: &str) -> bool {
    let expense = txn.expense.map(|a| a.to_string()).unwrap_or_default();
    let date = txn.date.format("%d %b %Y").to_string();
    [
        txn.category.as_str(),
        txn.notes.as_str(),
        txn.account.as_str(),
        expense.as_str(),
        date.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(query))
}

/// Totals for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub month: MonthTab,
    pub total_expense: Decimal,
    pub total_income: Decimal,
    pub count: usize,
}

/// The transactions of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub total: Decimal,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub month: MonthTab,
    pub transaction: Transaction,
}
