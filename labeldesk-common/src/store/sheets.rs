//! Google Sheets table store
//!
//! Each table is a worksheet of one spreadsheet. The first row is the header;
//! the remaining rows are records. Requests carry a bearer token obtained by
//! the deployment's credential provider (service account exchange is not
//! done here). There are no retries: a failed call surfaces as
//! [`Error::Store`].

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{rows_from_grid, TabularStore};
use crate::models::{cell_to_string, StoreRow};
use crate::{Error, Result};

/// Public Sheets API endpoint
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

const USER_AGENT: &str = concat!("labeldesk/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Store backed by one Google spreadsheet
pub struct SheetsStore {
    http_client: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    token: String,
}

impl SheetsStore {
    pub fn new(base_url: &str, spreadsheet_id: &str, token: &str) -> Result<Self> {
        if spreadsheet_id.trim().is_empty() {
            return Err(Error::Config("Sheets spreadsheet_id is empty".to_string()));
        }
        if token.trim().is_empty() {
            return Err(Error::Config("Sheets access token is empty".to_string()));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid Sheets base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Invalid Sheets base URL '{}'", base_url)));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        })
    }

    /// `{base}/v4/spreadsheets/{id}` followed by `extra` path segments
    fn endpoint(&self, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v4", "spreadsheets"])
                .push(&self.spreadsheet_id);
            for segment in extra {
                segments.push(segment);
            }
        }
        url
    }

    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.endpoint(&[]);
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = check_status(response, None).await?;
        let meta: SpreadsheetMeta = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("Malformed spreadsheet metadata: {}", e)))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Append rows as stored values; `RAW` keeps Sheets from parsing text
    /// into formulas, numbers or booleans
    async fn append_values(&self, table: &str, values: Vec<Vec<Value>>) -> Result<()> {
        let mut url = self.endpoint(&["values", &format!("{}:append", a1_range(table))]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": values }))
            .send()
            .await?;
        check_status(response, Some(table)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for SheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsStore")
            .field("base_url", &self.base_url.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read_all(&self, table: &str) -> Result<Vec<StoreRow>> {
        let mut url = self.endpoint(&["values", &a1_range(table)]);
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");

        debug!(table = table, "Reading worksheet");
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = check_status(response, Some(table)).await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("Malformed values response: {}", e)))?;

        let mut grid = range.values.into_iter();
        let header: Vec<String> = match grid.next() {
            Some(header) => header.iter().map(cell_to_string).collect(),
            None => return Ok(Vec::new()),
        };
        Ok(rows_from_grid(&header, grid.collect()))
    }

    async fn append(&self, table: &str, cells: Vec<Value>) -> Result<()> {
        self.append_values(table, vec![cells]).await
    }

    async fn ensure_table(&self, table: &str, columns: &[&str]) -> Result<()> {
        if self.sheet_titles().await?.iter().any(|t| t == table) {
            return Ok(());
        }

        info!(table = table, "Creating worksheet");
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v4", "spreadsheets"])
                .push(&format!("{}:batchUpdate", self.spreadsheet_id));
        }
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": table } } }]
            }))
            .send()
            .await?;
        check_status(response, None).await?;

        let header = columns.iter().map(|c| Value::String(c.to_string())).collect();
        self.append_values(table, vec![header]).await
    }

    fn backend(&self) -> &'static str {
        "sheets"
    }
}

/// Map HTTP failures to store errors
///
/// The values API answers 400 "Unable to parse range" for a worksheet that
/// does not exist.
async fn check_status(response: reqwest::Response, table: Option<&str>) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match (status, table) {
        (StatusCode::BAD_REQUEST, Some(table)) if body.contains("Unable to parse range") => {
            Err(Error::TableNotFound(table.to_string()))
        }
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => Err(Error::Store(format!(
            "Sheets API rejected credentials ({})",
            status.as_u16()
        ))),
        _ => Err(Error::Store(format!(
            "Sheets API error {}: {}",
            status.as_u16(),
            body
        ))),
    }
}

/// Worksheet name in A1 notation, quoted unless it is a plain identifier
fn a1_range(table: &str) -> String {
    if !table.is_empty() && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        table.to_string()
    } else {
        format!("'{}'", table.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a1_range_quoting() {
        assert_eq!(a1_range("sampled_50"), "sampled_50");
        assert_eq!(a1_range("my sheet"), "'my sheet'");
        assert_eq!(a1_range("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_endpoint_layout() {
        let store = SheetsStore::new("http://localhost:9999", "sheet-id", "tok").unwrap();
        let url = store.endpoint(&["values", "sampled_50"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:9999/v4/spreadsheets/sheet-id/values/sampled_50"
        );
    }

    #[test]
    fn test_new_rejects_missing_token() {
        assert!(SheetsStore::new(DEFAULT_SHEETS_BASE_URL, "id", "").is_err());
        assert!(SheetsStore::new(DEFAULT_SHEETS_BASE_URL, "", "tok").is_err());
        assert!(SheetsStore::new("not a url", "id", "tok").is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let store = SheetsStore::new(DEFAULT_SHEETS_BASE_URL, "id", "very-secret").unwrap();
        assert!(!format!("{:?}", store).contains("very-secret"));
    }
}
