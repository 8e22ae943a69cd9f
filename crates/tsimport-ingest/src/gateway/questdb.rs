//! HTTP client for QuestDB
//!
//! Uses the `/exec` endpoint for metadata and DDL and `/imp` for bulk CSV
//! inserts. Record content only ever travels inside the CSV body.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use tsimport_common::{IngestError, Result};

use super::{endpoints, StoreGateway, TimestampRange};
use crate::table::TableName;

/// Default timeout for store requests in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct ExecColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ExecResponse {
    #[serde(default)]
    columns: Vec<ExecColumn>,
    #[serde(default)]
    dataset: Vec<Vec<serde_json::Value>>,
}

impl ExecResponse {
    fn column_index(&self, names: &[&str]) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| names.contains(&c.name.as_str()))
    }

    /// String values of the first matching column, or of `fallback`.
    fn strings(&self, names: &[&str], fallback: usize) -> Vec<String> {
        let idx = self.column_index(names).unwrap_or(fallback);
        self.dataset
            .iter()
            .filter_map(|row| row.get(idx).and_then(|v| v.as_str()).map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportResponse {
    status: String,
    #[serde(default)]
    rows_rejected: u64,
    #[serde(default)]
    rows_imported: u64,
}

/// QuestDB gateway
pub struct QuestDbGateway {
    client: Client,
    base_url: String,
}

impl QuestDbGateway {
    /// Create a gateway for `base_url` (e.g. `http://localhost:9000`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn exec(&self, sql: &str) -> Result<ExecResponse> {
        debug!(sql, "Executing store query");
        let response = self
            .client
            .get(endpoints::exec_url(&self.base_url))
            .query(&[("query", sql), ("count", "true")])
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        response
            .json::<ExecResponse>()
            .await
            .map_err(network_error)
    }
}

fn network_error(e: reqwest::Error) -> IngestError {
    IngestError::network(e.to_string())
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IngestError::Store {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl StoreGateway for QuestDbGateway {
    async fn table_names(&self) -> Result<Vec<String>> {
        let response = self.exec(endpoints::LIST_TABLES).await?;
        // Newer servers call the column table_name, older ones name
        Ok(response.strings(&["table_name", "name"], 1))
    }

    async fn create_table(&self, table: &TableName) -> Result<()> {
        self.exec(&endpoints::create_table_sql(table)).await?;
        Ok(())
    }

    async fn insert_csv(&self, table: &TableName, payload: &[u8]) -> Result<u64> {
        let part = multipart::Part::bytes(payload.to_vec())
            .file_name(format!("{}.csv", table))
            .mime_str("text/csv")
            .map_err(network_error)?;
        let form = multipart::Form::new().part("data", part);

        let response = self
            .client
            .post(endpoints::import_url(&self.base_url))
            .query(&[
                ("name", table.as_str()),
                ("timestamp", "timestamp"),
                ("partitionBy", "DAY"),
                ("fmt", "json"),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        let summary: ImportResponse = response.json().await.map_err(network_error)?;

        if summary.status != "OK" {
            return Err(IngestError::DeliveryFailure {
                table: table.to_string(),
                reason: format!("store reported status '{}'", summary.status),
            });
        }
        if summary.rows_rejected > 0 {
            return Err(IngestError::DeliveryFailure {
                table: table.to_string(),
                reason: format!(
                    "{} rows rejected, {} imported",
                    summary.rows_rejected, summary.rows_imported
                ),
            });
        }

        Ok(summary.rows_imported)
    }

    async fn table_columns(&self, table: &TableName) -> Result<Vec<String>> {
        let response = self.exec(&endpoints::table_columns_sql(table)).await?;
        Ok(response.strings(&["column"], 0))
    }

    async fn timestamp_range(&self, table: &TableName) -> Result<TimestampRange> {
        let response = self.exec(&endpoints::timestamp_range_sql(table)).await?;
        let row = response.dataset.first();
        let cell = |i: usize| {
            row.and_then(|r| r.get(i))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        Ok(TimestampRange {
            min: cell(0),
            max: cell(1),
        })
    }
}
