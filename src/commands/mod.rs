//! Command handlers for the sheetwise CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod add;
mod auth;
mod delete;
mod init;
mod months;
mod search;
mod update;

use crate::error::{ErrorType, IntoResult};
use crate::tracker::{Receipt, Tracker};
use crate::{api, model, utils, Config, Mode, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use tracing::{debug, info, warn};

pub use add::{add, bulk};
pub use auth::{auth, auth_verify, Account};
pub use delete::delete;
pub use init::init;
pub use months::{list, months, MonthView};
pub use search::search;
pub use update::update;

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

async fn load_config(home: &Path) -> Result<Config> {
    Config::load(home).await.pub_result(ErrorType::Config)
}

/// Opens the cache and, when possible, the Google remote. Neither is required: without a remote
/// the tracker runs on demo data, and without a cache nothing is cached.
async fn open_tracker(config: &Config, mode: Mode) -> Tracker {
    let cache = match config.cache().await {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("The cache is unavailable, continuing without it: {e:#}");
            None
        }
    };
    let remote = api::remote(config, mode).await;
    Tracker::open(remote, cache).await
}

/// Categories and accounts are free text, but values outside the known ones get a warning.
fn warn_unknown_labels(category: Option<&str>, account: Option<&str>) {
    for unknown in model::unknown_labels(category, account) {
        warn!("{unknown}");
    }
}

async fn read_receipt(path: &Path) -> Result<Receipt> {
    let bytes = utils::read_bytes(path).await.pub_result(ErrorType::Request)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "receipt".to_string());
    Ok(Receipt { file_name, bytes })
}
