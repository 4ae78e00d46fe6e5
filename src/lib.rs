//! sheetwise keeps a personal expense log in a Google Sheet, one tab per month, with receipt
//! images in Google Drive. Without a connected Google account it runs on demo data kept in a
//! local cache.

mod api;
pub mod args;
mod cache;
pub mod commands;
mod config;
mod error;
pub mod model;
mod tracker;
mod utils;


pub use api::{Mode, DEMO_ENV};
pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use tracker::{Bulk, Persisted, Receipt, Tracker, Written};
