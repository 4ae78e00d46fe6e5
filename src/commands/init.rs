use crate::args::InitArgs;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::CurrencyFormat;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using the sheet URL, locale and currency
/// - Moves the client secret, if one is given, into its default location in the data dir.
///
/// # Arguments
/// - `sheetwise_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/sheetwise`
/// - `args` - The `init` arguments. An empty sheet URL sets sheetwise up for demo data only.
///
/// # Errors
/// - Returns an error if the sheet URL is invalid, the directory is already set up, or any file
///   operation fails.
pub async fn init(sheetwise_home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let currency = CurrencyFormat::new(args.locale(), args.currency());
    let config = Config::create(
        sheetwise_home,
        args.client_secret(),
        args.sheet_url(),
        currency,
    )
    .await
    .context("Unable to create the data directory and configs")
    .pub_result(ErrorType::Config)?;

    let next = if config.spreadsheet_id().is_empty() {
        "No sheet URL was given, so sheetwise will use demo data"
    } else if args.client_secret().is_none() {
        "Copy your OAuth client secret into the .secrets directory, then run 'sheetwise auth'"
    } else {
        "Run 'sheetwise auth' to connect your Google account"
    };
    Ok(format!(
        "Successfully created the sheetwise directory at {}. {next}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Locale;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_demo_only() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("sheetwise");
        let args = InitArgs::new("", None, Locale::EnUs, "usd");
        let out = init(&home, &args).await.unwrap();
        assert!(out.message().contains("demo data"));

        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.spreadsheet_id(), "");
        assert_eq!(config.currency_format().currency(), "USD");
        assert_eq!(config.currency_format().locale(), Locale::EnUs);
    }

    #[tokio::test]
    async fn test_init_twice_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("sheetwise");
        let args = InitArgs::new("", None, Locale::EnIn, "INR");
        init(&home, &args).await.unwrap();
        let err = init(&home, &args).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
