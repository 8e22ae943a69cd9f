//! Tabular records and their CSV payload

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tsimport_common::{IngestError, Result};

/// Column order shared by the table schema and the CSV payload.
pub const COLUMNS: [&str; 5] = ["id", "provider", "timestamp", "format", "content"];

/// File content format, taken from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    Json,
    Xml,
    Csv,
    Unknown,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Self::Json,
            Some("xml") => Self::Xml,
            Some("csv") => Self::Csv,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Csv => "csv",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row destined for a prefix table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Source filename
    pub id: String,
    /// Filename prefix
    pub provider: String,
    /// UTC instant, `YYYY-MM-DDTHH:MM:SS.ffffffZ`
    pub timestamp: String,
    pub format: RecordFormat,
    /// Full file contents
    pub content: String,
}

impl Record {
    pub fn new<Tz: chrono::TimeZone>(
        id: impl Into<String>,
        provider: impl Into<String>,
        timestamp: &DateTime<Tz>,
        format: RecordFormat,
        content: String,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            timestamp: format_timestamp(timestamp),
            format,
            content,
        }
    }
}

/// ISO-8601 in UTC with microsecond precision and a `Z` suffix
pub fn format_timestamp<Tz: chrono::TimeZone>(ts: &DateTime<Tz>) -> String {
    ts.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serialize `records` as CSV with a header row, quoting as needed.
pub fn to_csv(records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for record in records {
        writer
            .serialize(record)
            .map_err(|e| IngestError::DeliveryFailure {
                table: record.provider.clone(),
                reason: format!("failed to serialize record {}: {}", record.id, e),
            })?;
    }

    // An empty batch still carries the header
    if records.is_empty() {
        writer
            .write_record(COLUMNS)
            .map_err(|e| IngestError::Io(e.into()))?;
    }

    writer
        .into_inner()
        .map_err(|e| IngestError::Io(e.into_error()))
}
