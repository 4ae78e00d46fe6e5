//! The `Tracker` holds the transactions of every loaded month and keeps them in step with the
//! spreadsheet. When there is no spreadsheet, or when it cannot be reached, the tracker keeps
//! working on its in-memory ledger.

use crate::api::Remote;
use crate::cache::{Cache, ALL_MONTHS_KEY, LOCAL_LEDGER_KEY};
use crate::error::Res;
use crate::model::{
    Amount, DayGroup, Ledger, MonthTab, NewTransaction, SearchHit, Summary, Transaction,
    TransactionUpdates,
};
use anyhow::{bail, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Where a write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persisted {
    /// Written to the spreadsheet.
    Remote,
    /// Only applied to the in-memory (or demo) data.
    Local,
}

serde_plain::derive_display_from_serialize!(Persisted);

/// The result of a write and where it was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Written<T> {
    pub value: T,
    pub persisted: Persisted,
}

/// A receipt image to upload with a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The outcome of a bulk add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bulk {
    pub saved: Vec<Written<Transaction>>,
    /// Rows that failed validation, with the reason.
    pub skipped: Vec<String>,
}

pub struct Tracker {
    ledger: Ledger,
    current: MonthTab,
    remote: Option<Remote>,
    /// Set when the remote is missing or failed to load, so writes stay local.
    use_local: bool,
    cache: Option<Cache>,
}

impl Tracker {
    /// A tracker with no remote. The demo ledger is restored from the cache if it was saved
    /// there, otherwise it is seeded with demo transactions.
    pub(crate) async fn demo(cache: Option<Cache>) -> Self {
        let current = MonthTab::current();
        let mut tracker = Self {
            ledger: demo_ledger(current),
            current,
            remote: None,
            use_local: true,
            cache,
        };
        match tracker.cache_get::<Ledger>(LOCAL_LEDGER_KEY).await {
            Some(saved) => tracker.ledger = saved,
            None => tracker.save_local_ledger().await,
        }
        tracker.ledger.ensure_month(current);
        tracker
    }

    /// A tracker backed by a remote store. It starts from the demo data, like a tracker that
    /// never connected, and then loads the month tabs and the current month from the remote.
    pub(crate) async fn connected(remote: Remote, cache: Option<Cache>) -> Self {
        let current = MonthTab::current();
        let mut tracker = Self {
            ledger: demo_ledger(current),
            current,
            remote: Some(remote),
            use_local: true,
            cache,
        };
        tracker.connect().await;
        tracker
    }

    pub(crate) async fn open(remote: Option<Remote>, cache: Option<Cache>) -> Self {
        match remote {
            Some(remote) => Self::connected(remote, cache).await,
            None => Self::demo(cache).await,
        }
    }

    async fn connect(&mut self) {
        let Some(remote) = self.remote.as_mut() else {
            return;
        };
        match remote.store.month_tabs().await {
            Ok(tabs) => {
                for tab in tabs {
                    self.ledger.ensure_month(tab);
                }
            }
            Err(e) => warn!("Unable to list the month tabs: {e:#}"),
        }
        self.set_current_month(self.current).await;
        if self.use_local {
            if let Some(saved) = self.cache_get::<Ledger>(LOCAL_LEDGER_KEY).await {
                debug!("Restored the local data saved while Google Sheets was unreachable");
                self.ledger = saved;
                self.ledger.ensure_month(self.current);
            }
        }
    }

    /// Makes `tab` the current month and loads it from the remote. A month without a tab gets a
    /// new, empty tab. If the remote fails, the tracker switches to local data.
    pub async fn set_current_month(&mut self, tab: MonthTab) {
        self.current = tab;
        let Some(remote) = self.remote.as_mut() else {
            self.ledger.ensure_month(tab);
            return;
        };
        match load_month(remote, tab).await {
            Ok(txns) => {
                debug!("Loaded {} transactions for {tab}", txns.len());
                self.ledger.replace_month(tab, txns);
                self.use_local = false;
            }
            Err(e) => {
                warn!("Failed to load {tab} from Google Sheets, using local data: {e:#}");
                self.ledger.ensure_month(tab);
                self.use_local = true;
            }
        }
    }

    pub fn current_month(&self) -> MonthTab {
        self.current
    }

    /// The visible transactions of the current month.
    pub fn current_transactions(&self) -> Vec<&Transaction> {
        self.ledger.transactions(self.current)
    }

    /// Every known month, newest first.
    pub fn month_tabs(&self) -> Vec<MonthTab> {
        self.ledger.month_tabs()
    }

    pub fn summary(&self) -> Summary {
        self.ledger.summary(self.current)
    }

    pub fn by_day(&self) -> Vec<DayGroup> {
        self.ledger.by_day(self.current)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// True when writes go to the spreadsheet.
    pub fn is_connected(&self) -> bool {
        self.remote.is_some() && !self.use_local
    }

    pub async fn add_transaction(
        &mut self,
        mut new: NewTransaction,
        receipt: Option<Receipt>,
    ) -> Res<Written<Transaction>> {
        new.validate()?;
        if let Some(receipt) = receipt {
            if let Some(url) = self.upload(receipt).await {
                new.image = Some(url);
            }
        }
        let txn = Transaction::create(new);
        let tab = txn.month_tab();

        let persisted = match self.connected_remote() {
            Some(remote) => match remote.store.add_transaction(tab, &txn).await {
                Ok(()) => Persisted::Remote,
                Err(e) => {
                    warn!("Failed to save to Google Sheets, keeping it locally: {e:#}");
                    Persisted::Local
                }
            },
            None => Persisted::Local,
        };

        self.ledger.insert(txn.clone());
        self.after_write(persisted).await;
        info!("Added {} to {tab} ({persisted})", txn.id);
        Ok(Written {
            value: txn,
            persisted,
        })
    }

    /// Adds every valid row. Invalid rows are skipped and reported, they do not stop the rest.
    pub async fn add_transactions(&mut self, rows: Vec<NewTransaction>) -> Bulk {
        let mut bulk = Bulk {
            saved: Vec::new(),
            skipped: Vec::new(),
        };
        for (i, row) in rows.into_iter().enumerate() {
            match self.add_transaction(row, None).await {
                Ok(written) => bulk.saved.push(written),
                Err(e) => {
                    debug!("Skipping row {}: {e:#}", i + 1);
                    bulk.skipped.push(format!("row {}: {e:#}", i + 1));
                }
            }
        }
        bulk
    }

    /// Updates a transaction. When a new date moves it to another month, the row is deleted from
    /// the old tab and appended to the new one, keeping its ID and creation time. Without a new
    /// date the transaction stays in its tab.
    pub async fn update_transaction(
        &mut self,
        id: &str,
        mut updates: TransactionUpdates,
        receipt: Option<Receipt>,
    ) -> Res<Written<Transaction>> {
        updates.validate()?;
        let (_, existing) = self.locate(id).await?;
        if let Some(receipt) = receipt {
            if let Some(url) = self.upload(receipt).await {
                updates.image = Some(Some(url));
            }
        }
        let (old_tab, new_tab, txn) = self
            .ledger
            .update(id, &updates)
            .with_context(|| format!("There is no transaction with ID '{id}'"))?;

        let persisted = match self.connected_remote() {
            Some(remote) => {
                let result = if old_tab == new_tab {
                    remote.store.update_row_by_id(old_tab, &txn).await
                } else {
                    move_row(remote, old_tab, new_tab, &txn).await
                };
                match result {
                    Ok(()) => Persisted::Remote,
                    Err(e) => {
                        warn!("Failed to update Google Sheets, keeping it locally: {e:#}");
                        Persisted::Local
                    }
                }
            }
            None => Persisted::Local,
        };

        if persisted == Persisted::Remote && existing.image != txn.image {
            if let Some(old_image) = &existing.image {
                self.delete_image(old_image).await;
            }
        }

        self.after_write(persisted).await;
        info!("Updated {id} in {new_tab} ({persisted})");
        Ok(Written {
            value: txn,
            persisted,
        })
    }

    /// Deletes a transaction and its receipt image, then removes it from every month.
    pub async fn delete_transaction(&mut self, id: &str) -> Res<Written<Transaction>> {
        let (tab, existing) = self.locate(id).await?;

        if let Some(image) = &existing.image {
            self.delete_image(image).await;
        }

        let persisted = match self.connected_remote() {
            Some(remote) => match remote.store.delete_row_by_id(tab, id).await {
                Ok(()) => Persisted::Remote,
                Err(e) => {
                    warn!("Failed to delete from Google Sheets, removing it locally: {e:#}");
                    Persisted::Local
                }
            },
            None => Persisted::Local,
        };

        let removed = self.ledger.remove(id).unwrap_or(existing);
        self.after_write(persisted).await;
        info!("Deleted {id} ({persisted})");
        Ok(Written {
            value: removed,
            persisted,
        })
    }

    /// The month and current version of the transaction with `id`. A process only loads the
    /// current month, so when connected the other month tabs are read until the ID turns up.
    /// Each tab read replaces that month in the ledger.
    async fn locate(&mut self, id: &str) -> Res<(MonthTab, Transaction)> {
        if let Some((tab, txn)) = self.ledger.find(id) {
            return Ok((tab, txn.clone()));
        }
        if let (false, Some(remote)) = (self.use_local, self.remote.as_mut()) {
            let tabs = remote
                .store
                .month_tabs()
                .await
                .with_context(|| format!("Unable to look for '{id}' in Google Sheets"))?;
            for tab in tabs.into_iter().filter(|tab| *tab != self.current) {
                let txns = remote.store.read_month(tab).await?;
                let found = txns.iter().find(|t| t.id == id).cloned();
                self.ledger.replace_month(tab, txns);
                if let Some(txn) = found {
                    debug!("Found {id} in {tab}");
                    return Ok((tab, txn));
                }
            }
        }
        bail!("There is no transaction with ID '{id}'")
    }

    /// Searches every month. When connected, all month tabs are loaded first, from the cache
    /// unless `refresh` is set or there is nothing cached.
    pub async fn search(&mut self, query: &str, refresh: bool) -> Vec<SearchHit> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        if self.is_connected() {
            match self.load_all_months(refresh).await {
                Ok(all) => self.ledger.merge(all),
                Err(e) => warn!("Unable to load every month, searching loaded months: {e:#}"),
            }
        }
        self.ledger.search(query)
    }

    async fn load_all_months(&mut self, refresh: bool) -> Res<Ledger> {
        if !refresh {
            if let Some(cached) = self.cache_get_entry::<Ledger>(ALL_MONTHS_KEY).await {
                debug!("Using months cached at {}", cached.saved_at);
                return Ok(cached.value);
            }
        }
        let Some(remote) = self.remote.as_mut() else {
            bail!("There is no remote to load from");
        };
        let mut all = Ledger::new();
        for tab in remote.store.month_tabs().await? {
            let txns = remote.store.read_month(tab).await?;
            all.replace_month(tab, txns);
        }
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(ALL_MONTHS_KEY, &all).await {
                warn!("Unable to cache the months: {e:#}");
            }
        }
        Ok(all)
    }

    fn connected_remote(&mut self) -> Option<&mut Remote> {
        if self.use_local {
            return None;
        }
        self.remote.as_mut()
    }

    /// Uploads a receipt. Failure is logged and yields no image.
    async fn upload(&mut self, receipt: Receipt) -> Option<String> {
        let Some(remote) = self.connected_remote() else {
            warn!(
                "Receipt '{}' was not saved because Google Drive is not connected",
                receipt.file_name
            );
            return None;
        };
        match remote
            .receipts
            .upload(&receipt.file_name, receipt.bytes)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Failed to upload receipt '{}': {e:#}", receipt.file_name);
                None
            }
        }
    }

    /// Deletes a receipt image. Failure is logged and ignored.
    async fn delete_image(&mut self, url: &str) {
        let Some(remote) = self.connected_remote() else {
            return;
        };
        if let Err(e) = remote.receipts.delete(url).await {
            warn!("Failed to delete the receipt image {url}: {e:#}");
        }
    }

    /// Invalidates the months cache. Writes that only reached the local ledger are kept by
    /// saving the ledger, so demo mode and a later unreachable remote start from it.
    async fn after_write(&mut self, persisted: Persisted) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(ALL_MONTHS_KEY).await {
                warn!("Unable to invalidate the months cache: {e:#}");
            }
        }
        if self.remote.is_none() || persisted == Persisted::Local {
            self.save_local_ledger().await;
        }
    }

    async fn save_local_ledger(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(LOCAL_LEDGER_KEY, &self.ledger).await {
                warn!("Unable to save the local data: {e:#}");
            }
        }
    }

    async fn cache_get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache_get_entry(key).await.map(|cached| cached.value)
    }

    /// Reads a cache entry. Errors are logged and treated as a miss.
    async fn cache_get_entry<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<crate::cache::Cached<T>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring the cache entry '{key}': {e:#}");
                None
            }
        }
    }
}

async fn load_month(remote: &mut Remote, tab: MonthTab) -> Res<Vec<Transaction>> {
    if !remote.store.tab_exists(tab).await? {
        remote.store.create_month_tab(tab).await?;
        return Ok(Vec::new());
    }
    remote.store.read_month(tab).await
}

async fn move_row(
    remote: &mut Remote,
    old_tab: MonthTab,
    new_tab: MonthTab,
    txn: &Transaction,
) -> Res<()> {
    remote.store.delete_row_by_id(old_tab, &txn.id).await?;
    remote.store.add_transaction(new_tab, txn).await
}

/// Sample expenses on the 3rd, 5th, 10th and 15th of `month`.
pub(crate) fn demo_transactions(month: MonthTab) -> Vec<Transaction> {
    [
        (3, 2500, "Food & Dining", "Credit Card", "Grocery shopping at Big Bazaar"),
        (5, 1200, "Transportation", "UPI", "Uber rides this week"),
        (10, 3500, "Bills & Utilities", "Bank Account", "Electricity and internet bill"),
        (15, 8500, "Shopping", "Credit Card", "New clothes from Myntra"),
    ]
    .into_iter()
    .map(|(day, expense, category, account, notes)| {
        Transaction::create(NewTransaction {
            date: month.first_day() + chrono::Duration::days(day - 1),
            expense: Some(Amount::from(Decimal::from(expense))),
            income: None,
            category: category.to_string(),
            account: account.to_string(),
            notes: notes.to_string(),
            image: None,
        })
    })
    .collect()
}

fn demo_ledger(month: MonthTab) -> Ledger {
    let mut ledger = Ledger::new();
    ledger.ensure_month(month);
    for txn in demo_transactions(month) {
        ledger.insert(txn);
    }
    ledger
}
