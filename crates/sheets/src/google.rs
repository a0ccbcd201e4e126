//! Google Sheets v4 values API.

use anyhow::{Context, Result};
use lab_grader_core::{UpstreamError, retry::RetryPolicy};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::data::Sheet;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const USER_AGENT: &str = concat!("lab-grader/", env!("CARGO_PKG_VERSION"));

pub struct GoogleSheets {
    http: Client,
    token: String,
    spreadsheet: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
pub struct SpreadsheetInfo {
    #[serde(default)]
    pub sheets: Vec<SheetInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SheetInfo {
    pub properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
pub struct SheetProperties {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetResponse {
    #[serde(default)]
    pub value_ranges: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
pub struct ValueRange {
    pub range: String,
    /// Missing for a sheet without any values.
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

/// A staged single-cell write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub range: String,
    pub value: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest<'a> {
    value_input_option: &'static str,
    data: Vec<UpdateRange<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [[&'a str; 1]; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    #[serde(default)]
    pub total_updated_cells: usize,
}

impl GoogleSheets {
    pub fn new(token: String, spreadsheet: String, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http, token, spreadsheet, retry })
    }

    async fn send<F>(&self, operation: &str, request: F) -> Result<Response>
    where F: Fn() -> RequestBuilder {
        let request = &request;
        let target = self.spreadsheet.as_str();
        self.retry
            .run(operation, || async move {
                let response = request()
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .with_context(|| format!("{} failed for '{}'", operation, target))?;
                UpstreamError::check(response.status(), operation, target)?;
                Ok(response)
            })
            .await
    }

    async fn json<T, F>(&self, operation: &str, request: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        self.send(operation, request).await?.json().await.with_context(|| {
            format!("Failed to parse {} response for '{}'", operation, self.spreadsheet)
        })
    }

    pub async fn sheet_titles(&self) -> Result<Vec<String>> {
        let url = format!("{}/{}", SHEETS_API, self.spreadsheet);
        let info: SpreadsheetInfo = self
            .json("Fetch spreadsheet", || {
                self.http.get(&url).query(&[("fields", "sheets.properties.title")])
            })
            .await?;
        Ok(info.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Every sheet in full, column-major.
    pub async fn load_sheets(&self) -> Result<Vec<Sheet>> {
        let titles = self.sheet_titles().await?;
        let url = format!("{}/{}/values:batchGet", SHEETS_API, self.spreadsheet);
        let mut query: Vec<(&str, String)> =
            titles.iter().map(|title| ("ranges", quote_title(title))).collect();
        query.push(("majorDimension", "COLUMNS".to_string()));
        let response: BatchGetResponse =
            self.json("Fetch spreadsheet values", || self.http.get(&url).query(&query)).await?;
        if response.value_ranges.len() != titles.len() {
            anyhow::bail!(
                "Expected {} value ranges from '{}', got {}",
                titles.len(),
                self.spreadsheet,
                response.value_ranges.len()
            );
        }
        Ok(titles
            .into_iter()
            .zip(response.value_ranges)
            .map(|(title, range)| Sheet::new(title, range.values))
            .collect())
    }

    /// Write raw values, returning the number of cells the API reports as updated.
    pub async fn batch_update(&self, updates: &[CellUpdate]) -> Result<usize> {
        let url = format!("{}/{}/values:batchUpdate", SHEETS_API, self.spreadsheet);
        let body = update_request(updates);
        let response: BatchUpdateResponse = self
            .json("Update spreadsheet values", || self.http.post(&url).json(&body))
            .await?;
        Ok(response.total_updated_cells)
    }
}

fn update_request(updates: &[CellUpdate]) -> BatchUpdateRequest<'_> {
    BatchUpdateRequest {
        value_input_option: "RAW",
        data: updates
            .iter()
            .map(|u| UpdateRange {
                range: &u.range,
                major_dimension: "ROWS",
                values: [[u.value.as_str()]],
            })
            .collect(),
    }
}

fn quote_title(title: &str) -> String { format!("'{}'", title.replace('\'', "''")) }
