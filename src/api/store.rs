//! Implements `ExpenseStore` over any `Sheet`.

use crate::api::layout::{header_row, total_row, Layout};
use crate::api::{ExpenseStore, Sheet};
use crate::error::Res;
use crate::model::{MonthTab, Transaction};
use anyhow::{bail, Context};
use tracing::{debug, trace};

/// Keeps month tabs in the shape described in `layout` and finds transactions by their ID.
pub(crate) struct SheetStore {
    sheet: Box<dyn Sheet + Send>,
}

impl SheetStore {
    pub(crate) fn new(sheet: Box<dyn Sheet + Send>) -> Self {
        Self { sheet }
    }

    /// Reads a tab and returns its layout and the 1-based number of the row with `id`.
    async fn locate(&mut self, tab: MonthTab, id: &str) -> Res<(Layout, Option<usize>)> {
        let rows = self.sheet.get(&tab.name()).await?;
        let layout = Layout::from_rows(&rows);
        let found = rows
            .iter()
            .position(|row| layout.id(row) == Some(id))
            .map(|index| index + 1);
        Ok((layout, found))
    }
}

#[async_trait::async_trait]
impl ExpenseStore for SheetStore {
    async fn month_tabs(&mut self) -> Res<Vec<MonthTab>> {
        let mut tabs: Vec<MonthTab> = self
            .sheet
            .tabs()
            .await
            .context("Unable to list the tabs of the spreadsheet")?
            .iter()
            .filter_map(|t| MonthTab::parse(&t.title).ok())
            .collect();
        tabs.sort();
        tabs.reverse();
        trace!("Found month tabs {tabs:?}");
        Ok(tabs)
    }

    async fn tab_exists(&mut self, tab: MonthTab) -> Res<bool> {
        let name = tab.name();
        Ok(self.sheet.tabs().await?.iter().any(|t| t.title == name))
    }

    async fn create_month_tab(&mut self, tab: MonthTab) -> Res<()> {
        let name = tab.name();
        debug!("Creating the tab '{name}'");
        self.sheet
            .add_tab(&name)
            .await
            .with_context(|| format!("Unable to create the tab '{name}'"))?;
        self.sheet
            .append_rows(&name, &[header_row(), total_row()])
            .await
            .with_context(|| format!("Unable to write the header of '{name}'"))
    }

    async fn read_month(&mut self, tab: MonthTab) -> Res<Vec<Transaction>> {
        let name = tab.name();
        let rows = self
            .sheet
            .get(&name)
            .await
            .with_context(|| format!("Unable to read the tab '{name}'"))?;
        let layout = Layout::from_rows(&rows);
        Ok(rows.iter().filter_map(|row| layout.parse_row(row)).collect())
    }

    async fn find_row_by_id(&mut self, tab: MonthTab, id: &str) -> Res<Option<usize>> {
        let (_, found) = self.locate(tab, id).await?;
        Ok(found)
    }

    async fn add_transaction(&mut self, tab: MonthTab, txn: &Transaction) -> Res<()> {
        if !self.tab_exists(tab).await? {
            self.create_month_tab(tab).await?;
        }
        let name = tab.name();
        let rows = self.sheet.get(&name).await?;
        let layout = Layout::from_rows(&rows);
        self.sheet
            .append_rows(&name, &[layout.to_row(txn)])
            .await
            .with_context(|| format!("Unable to add {} to '{name}'", txn.id))
    }

    async fn update_row_by_id(&mut self, tab: MonthTab, txn: &Transaction) -> Res<()> {
        let name = tab.name();
        let (layout, found) = self.locate(tab, &txn.id).await?;
        let Some(row_number) = found else {
            bail!("Transaction {} was not found in '{name}'", txn.id);
        };
        self.sheet
            .update_row(&name, row_number, &layout.to_row(txn))
            .await
            .with_context(|| format!("Unable to update row {row_number} of '{name}'"))
    }

    async fn delete_row_by_id(&mut self, tab: MonthTab, id: &str) -> Res<()> {
        let name = tab.name();
        let (_, found) = self.locate(tab, id).await?;
        let Some(row_number) = found else {
            bail!("Transaction {id} was not found in '{name}'");
        };
        self.sheet
            .delete_row(&name, row_number)
            .await
            .with_context(|| format!("Unable to delete row {row_number} of '{name}'"))
    }
}
