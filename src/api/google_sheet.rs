//! Implements the `Sheet` trait with the Google Sheets v4 REST API.

use crate::api::{Sheet, SheetTab, TokenProvider};
use crate::error::Res;
use anyhow::{anyhow, bail, Context};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::trace;
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Talks to one spreadsheet. It takes a `TokenProvider`, on which it calls refresh before each
/// request to keep the token up-to-date.
pub(crate) struct GoogleSheet {
    spreadsheet_id: String,
    token_provider: TokenProvider,
    client: reqwest::Client,
}

impl GoogleSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>, token_provider: TokenProvider) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            token_provider,
            client: reqwest::Client::new(),
        }
    }

    /// `https://sheets.googleapis.com/v4/spreadsheets/<id><id_suffix>/<segments...>`
    fn url(&self, id_suffix: &str, segments: &[&str]) -> Res<Url> {
        let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API URL")?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("The Sheets API URL cannot be a base"))?;
            path.pop_if_empty();
            path.push(&format!("{}{id_suffix}", self.spreadsheet_id));
            path.extend(segments);
        }
        Ok(url)
    }

    /// Sends a request with a fresh bearer token. Non-success responses become errors that carry
    /// the response body.
    async fn send(
        &mut self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Res<reqwest::Response> {
        let token = self.token_provider.token_with_refresh().await?;
        trace!("{method} {url}");
        let mut request = self.client.request(method.clone(), url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {method} request to the Sheets API"))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Sheets API request failed with status {status}: {text}");
        }
        Ok(response)
    }

    async fn batch_update(&mut self, requests: Value) -> Res<Value> {
        let url = self.url(":batchUpdate", &[])?;
        self.send(Method::POST, url, Some(json!({ "requests": requests })))
            .await?
            .json()
            .await
            .context("Failed to parse the batchUpdate response")
    }

    async fn sheet_id(&mut self, title: &str) -> Res<i64> {
        self.tabs()
            .await?
            .into_iter()
            .find(|t| t.title == title)
            .map(|t| t.id)
            .with_context(|| format!("There is no tab named '{title}'"))
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn tabs(&mut self) -> Res<Vec<SheetTab>> {
        let mut url = self.url("", &[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let response: SpreadsheetResponse = self
            .send(Method::GET, url, None)
            .await?
            .json()
            .await
            .context("Failed to parse the spreadsheet properties")?;
        Ok(response
            .sheets
            .into_iter()
            .map(|s| SheetTab {
                id: s.properties.sheet_id,
                title: s.properties.title,
            })
            .collect())
    }

    async fn add_tab(&mut self, title: &str) -> Res<i64> {
        let response = self
            .batch_update(json!([{ "addSheet": { "properties": { "title": title } } }]))
            .await
            .with_context(|| format!("Failed to add the tab '{title}'"))?;
        response["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .context("The addSheet reply is missing 'sheetId'")
    }

    async fn get(&mut self, title: &str) -> Res<Vec<Vec<String>>> {
        trace!("get for {title}");
        let mut url = self.url("", &["values", &quote(title)])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");
        let token = self.token_provider.token_with_refresh().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {title} sheet data"))?;
        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
            // A tab that does not exist is an unparseable range.
            trace!("The tab '{title}' does not exist ({status})");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Failed to fetch {title} sheet data, status {status}: {text}");
        }
        let range: ValueRange = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {title} sheet data"))?;
        Ok(range.into_strings())
    }

    async fn append_rows(&mut self, title: &str, rows: &[Vec<String>]) -> Res<()> {
        let range = format!("{}!A1", quote(title));
        let mut url = self.url("", &["values", &format!("{range}:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        self.send(Method::POST, url, Some(json!({ "values": rows })))
            .await
            .with_context(|| format!("Failed to append rows to '{title}'"))?;
        Ok(())
    }

    async fn update_row(&mut self, title: &str, row_number: usize, row: &[String]) -> Res<()> {
        let range = format!("{}!A{row_number}", quote(title));
        let mut url = self.url("", &["values", &range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        self.send(Method::PUT, url, Some(json!({ "range": range, "values": [row] })))
            .await
            .with_context(|| format!("Failed to write row {row_number} of '{title}'"))?;
        Ok(())
    }

    async fn delete_row(&mut self, title: &str, row_number: usize) -> Res<()> {
        if row_number == 0 {
            bail!("Row numbers start at 1");
        }
        let sheet_id = self.sheet_id(title).await?;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": row_number - 1,
                    "endIndex": row_number
                }
            }
        }]))
        .await
        .with_context(|| format!("Failed to delete row {row_number} of '{title}'"))?;
        Ok(())
    }
}

/// Quotes a tab name for A1 notation: `May 2024` -> `'May 2024'`.
fn quote(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetResponse>,
}

#[derive(Debug, Deserialize)]
struct SheetResponse {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueRange {
    fn into_strings(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }
}
