//! Configuration file handling for sheetwise.
//!
//! The configuration file is stored at `$SHEETWISE_HOME/config.json`. It holds the URL of the
//! expenses spreadsheet, how amounts are formatted, and optionally where the OAuth files live.

use crate::cache::Cache;
use crate::error::Res;
use crate::model::{CurrencyFormat, Locale};
use crate::utils;
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "sheetwise";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const CACHE_SQLITE: &str = "cache.sqlite";

/// The configuration of the app. You load it from the path to `$SHEETWISE_HOME`, and it provides
/// the paths of everything else that lives in that directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    cache_path: PathBuf,
}

impl Config {
    /// Creates the data directory with:
    /// - a `.secrets` directory, into which `secret_file` (the OAuth client credentials downloaded
    ///   from Google Cloud Console) is moved when it is given
    /// - `config.json`, holding `sheet_url` and `currency`
    /// - the cache database
    ///
    /// `sheet_url` may be empty, in which case sheetwise runs on demo data until one is set.
    pub(crate) async fn create(
        dir: impl Into<PathBuf>,
        secret_file: Option<&Path>,
        sheet_url: &str,
        currency: CurrencyFormat,
    ) -> Res<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)?.to_string();

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the sheetwise home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "sheetwise is already set up in '{}', remove it first to start over",
                root.display()
            );
        }

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;
        if let Some(secret_file) = secret_file {
            utils::rename(secret_file, secrets.join(CLIENT_SECRET_JSON)).await?;
        }

        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            locale: currency.locale(),
            currency: currency.currency().to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        let cache_path = root.join(CACHE_SQLITE);
        Cache::init(&cache_path)
            .await
            .context("Unable to create the cache database")?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
            cache_path,
        })
    }

    /// Validates that `sheetwise_home` and its config file exist, then loads the config.
    pub(crate) async fn load(sheetwise_home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = sheetwise_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The sheetwise home directory is missing, run 'sheetwise init' first")?;
        let _ = utils::read_dir(&root).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)?.to_string();

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }

        Ok(Self {
            cache_path: root.join(CACHE_SQLITE),
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    /// The ID of the spreadsheet, or an empty string when no sheet URL is configured.
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub(crate) async fn cache(&self) -> Res<Cache> {
        Cache::load(&self.cache_path).await
    }

    pub fn currency_format(&self) -> CurrencyFormat {
        CurrencyFormat::new(self.config_file.locale, &self.config_file.currency)
    }

    /// The configured `client_secret_path`, resolved against the home directory if relative.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve(self.config_file.client_secret_path())
    }

    /// The configured `token_path`, resolved against the home directory if relative.
    pub fn token_path(&self) -> PathBuf {
        self.resolve(self.config_file.token_path())
    }

    fn resolve(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// The serialization format of the configuration file.
///
/// ```json
/// {
///   "app_name": "sheetwise",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "locale": "en-IN",
///   "currency": "INR",
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Always "sheetwise".
    app_name: String,

    config_version: u8,

    /// URL of the expenses spreadsheet. Empty means demo mode.
    #[serde(default)]
    sheet_url: String,

    #[serde(default)]
    locale: Locale,

    /// ISO 4217 currency code.
    #[serde(default = "default_currency")]
    currency: String,

    /// Defaults to `.secrets/client_secret.json`. Relative paths resolve against the home dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Defaults to `.secrets/token.json`. Relative paths resolve against the home dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_currency() -> String {
    CurrencyFormat::default().currency().to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            locale: Locale::default(),
            currency: default_currency(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: &Path) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path).await?;
        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{APP_NAME}', got '{}'",
            config.app_name
        );
        Ok(config)
    }

    async fn save(&self, path: &Path) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }

    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL such as
/// `https://docs.google.com/spreadsheets/d/<ID>/edit#gid=0`. An empty URL yields an empty ID.
pub(crate) fn extract_spreadsheet_id(url: &str) -> Res<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(url);
    }
    let mut parts = url.split('/').skip_while(|part| *part != "d");
    let id = parts
        .nth(1)
        .map(|part| part.split(['?', '#']).next().unwrap_or(part))
        .filter(|id| !id.is_empty());
    match id {
        Some(id) => Ok(id),
        None => bail!(
            "Invalid Google Sheets URL '{url}'. \
            Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
        ),
    }
}
