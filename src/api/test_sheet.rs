//! Implements the `Sheet` trait using in-memory data, plus a `Sheet` that always fails, for
//! exercising the tracker without Google.

use crate::api::{Sheet, SheetTab};
use crate::error::Res;
use anyhow::bail;
use std::sync::{Arc, Mutex, MutexGuard};

/// The contents of an in-memory spreadsheet: tabs in order, each with its rows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct TestSheetState {
    tabs: Vec<(SheetTab, Vec<Vec<String>>)>,
    next_id: i64,
}

impl TestSheetState {
    fn tab_mut(&mut self, title: &str) -> Option<&mut Vec<Vec<String>>> {
        self.tabs
            .iter_mut()
            .find(|(tab, _)| tab.title == title)
            .map(|(_, rows)| rows)
    }

    fn add(&mut self, title: &str, rows: Vec<Vec<String>>) -> i64 {
        self.next_id += 1;
        let tab = SheetTab {
            id: self.next_id,
            title: title.to_string(),
        };
        self.tabs.push((tab, rows));
        self.next_id
    }
}

/// An implementation of `Sheet` that holds its data in memory. Clones share the same data, so a
/// test can hand one clone to a store and inspect the other.
#[derive(Debug, Default, Clone)]
pub(crate) struct TestSheet {
    state: Arc<Mutex<TestSheetState>>,
}

impl TestSheet {
    fn lock(&self) -> MutexGuard<'_, TestSheetState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a tab with arbitrary content, bypassing the month tab layout.
    pub(crate) fn add_raw_tab(&self, title: &str, rows: Vec<Vec<String>>) {
        self.lock().add(title, rows);
    }

    /// The rows of a tab, or nothing if there is no such tab.
    pub(crate) fn rows(&self, title: &str) -> Vec<Vec<String>> {
        self.lock().tab_mut(title).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn tabs(&mut self) -> Res<Vec<SheetTab>> {
        Ok(self.lock().tabs.iter().map(|(tab, _)| tab.clone()).collect())
    }

    async fn add_tab(&mut self, title: &str) -> Res<i64> {
        let mut state = self.lock();
        if state.tab_mut(title).is_some() {
            bail!("A sheet with the name \"{title}\" already exists");
        }
        Ok(state.add(title, Vec::new()))
    }

    async fn get(&mut self, title: &str) -> Res<Vec<Vec<String>>> {
        Ok(self.rows(title))
    }

    async fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Res<()> {
        let mut state = self.lock();
        let Some(tab) = state.tab_mut(title) else {
            bail!("Unable to parse range: {title}");
        };
        tab.extend(rows.iter().cloned());
        Ok(())
    }

    async fn update_row(&mut self, title: &str, row_number: usize, row: &[String]) -> Res<()> {
        let mut state = self.lock();
        let Some(tab) = state.tab_mut(title) else {
            bail!("Unable to parse range: {title}");
        };
        if row_number == 0 {
            bail!("Row numbers start at 1");
        }
        if tab.len() < row_number {
            tab.resize(row_number, Vec::new());
        }
        tab[row_number - 1] = row.to_vec();
        Ok(())
    }

    async fn delete_row(&mut self, title: &str, row_number: usize) -> Res<()> {
        let mut state = self.lock();
        let Some(tab) = state.tab_mut(title) else {
            bail!("No grid with id for {title}");
        };
        if row_number == 0 || row_number > tab.len() {
            bail!("Row {row_number} is out of range for {title}");
        }
        tab.remove(row_number - 1);
        Ok(())
    }
}

/// A `Sheet` that is never reachable, like a sheet behind an expired token.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FailingSheet;

#[async_trait::async_trait]
impl Sheet for FailingSheet {
    async fn tabs(&mut self) -> Res<Vec<SheetTab>> {
        bail!("401 Unauthorized")
    }

    async fn add_tab(&mut self, _title: &str) -> Res<i64> {
        bail!("401 Unauthorized")
    }

    async fn get(&mut self, _title: &str) -> Res<Vec<Vec<String>>> {
        bail!("401 Unauthorized")
    }

    async fn append_rows(&mut self, _title: &str, _rows: &[Vec<String>]) -> Res<()> {
        bail!("401 Unauthorized")
    }

    async fn update_row(&mut self, _title: &str, _row_number: usize, _row: &[String]) -> Res<()> {
        bail!("401 Unauthorized")
    }

    async fn delete_row(&mut self, _title: &str, _row_number: usize) -> Res<()> {
        bail!("401 Unauthorized")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let sheet = TestSheet::default();
        let mut other = sheet.clone();
        other.add_tab("May 2024").await.unwrap();
        other.append_rows("May 2024", &[row(&["a"]), row(&["b"])]).await.unwrap();
        assert_eq!(sheet.rows("May 2024").len(), 2);
        let tabs = sheet.clone().tabs().await.unwrap();
        assert_eq!(tabs[0].id, 1);
        assert_eq!(tabs[0].title, "May 2024");
    }

    #[tokio::test]
    async fn test_row_operations() {
        let mut sheet = TestSheet::default();
        sheet.add_tab("T").await.unwrap();
        sheet
            .append_rows("T", &[row(&["1"]), row(&["2"]), row(&["3"])])
            .await
            .unwrap();
        sheet.update_row("T", 2, &row(&["two"])).await.unwrap();
        sheet.delete_row("T", 1).await.unwrap();
        assert_eq!(sheet.get("T").await.unwrap(), vec![row(&["two"]), row(&["3"])]);
        assert!(sheet.delete_row("T", 5).await.is_err());
        assert!(sheet.add_tab("T").await.is_err());
        assert!(sheet.get("missing").await.unwrap().is_empty());
    }
}
