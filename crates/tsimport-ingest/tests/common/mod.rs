//! Shared helpers for tsimport integration tests
//!
//! [`MemoryStore`] is an in-process [`StoreGateway`] that records every
//! submission and can be told to reject inserts into chosen tables, table
//! creation for chosen tables, or the table listing.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use tsimport_common::{IngestError, Result};
use tsimport_ingest::config::IngestConfig;
use tsimport_ingest::gateway::{StoreGateway, TimestampRange};
use tsimport_ingest::table::TableName;

/// One accepted row as the store saw it
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub id: String,
    pub provider: String,
    pub timestamp: String,
    pub format: String,
    pub content: String,
}

#[derive(Default)]
struct Inner {
    tables: HashSet<String>,
    rows: BTreeMap<String, Vec<StoredRow>>,
    attempts: BTreeMap<String, u32>,
    failing: HashSet<String>,
    failing_create: HashSet<String>,
    failing_listing: bool,
    created: Vec<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every insert into `table`
    pub fn fail_table(&self, table: &str) {
        self.inner.lock().unwrap().failing.insert(table.to_string());
    }

    pub fn heal_table(&self, table: &str) {
        self.inner.lock().unwrap().failing.remove(table);
    }

    /// Make `table_names` return an error
    pub fn fail_listing(&self) {
        self.inner.lock().unwrap().failing_listing = true;
    }

    /// Reject `create_table` for `table`
    pub fn fail_create(&self, table: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_create
            .insert(table.to_string());
    }

    /// Every `create_table` call, in order, including rejected ones
    pub fn created(&self) -> Vec<String> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.inner
            .lock()
            .unwrap()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_rows(&self) -> usize {
        self.inner.lock().unwrap().rows.values().map(Vec::len).sum()
    }

    pub fn attempts(&self, table: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .attempts
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.inner.lock().unwrap().tables.contains(table)
    }
}

#[async_trait]
impl StoreGateway for MemoryStore {
    async fn table_names(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        if inner.failing_listing {
            return Err(IngestError::network("connection refused"));
        }
        Ok(inner.tables.iter().cloned().collect())
    }

    async fn create_table(&self, table: &TableName) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.created.push(table.to_string());
        if inner.failing_create.contains(table.as_str()) {
            return Err(IngestError::Store {
                status: 400,
                body: "cannot create table".to_string(),
            });
        }
        inner.tables.insert(table.to_string());
        Ok(())
    }

    async fn insert_csv(&self, table: &TableName, payload: &[u8]) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        *inner.attempts.entry(table.to_string()).or_default() += 1;

        if inner.failing.contains(table.as_str()) {
            return Err(IngestError::Store {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        let mut reader = csv::Reader::from_reader(payload);
        let mut count = 0;
        for row in reader.records() {
            let row = row.unwrap();
            inner
                .rows
                .entry(table.to_string())
                .or_default()
                .push(StoredRow {
                    id: row[0].to_string(),
                    provider: row[1].to_string(),
                    timestamp: row[2].to_string(),
                    format: row[3].to_string(),
                    content: row[4].to_string(),
                });
            count += 1;
        }
        Ok(count)
    }

    async fn table_columns(&self, _table: &TableName) -> Result<Vec<String>> {
        Ok(["id", "provider", "format", "timestamp", "content"]
            .iter()
            .map(|s| s.to_string())
            .collect())
    }

    async fn timestamp_range(&self, _table: &TableName) -> Result<TimestampRange> {
        Ok(TimestampRange::default())
    }
}

/// A data directory plus a state file outside it
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("data")).unwrap();
        Self { root }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.path().join("state.json")
    }

    /// Write `content` at `rel` under the data directory
    pub fn add_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.data_dir().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> IngestConfig {
        IngestConfig {
            base_dir: self.data_dir(),
            state_file: self.state_file(),
            batch_size: 100,
            max_retries: 3,
            retry_delay_secs: 0,
            ..Default::default()
        }
    }
}
