//! Store gateway
//!
//! The time-series store is reached only through [`StoreGateway`]. The
//! pipeline and delivery engine are written against the trait;
//! [`QuestDbGateway`] is the HTTP implementation.

pub mod endpoints;
pub mod questdb;

pub use questdb::QuestDbGateway;

use async_trait::async_trait;
use tsimport_common::Result;

use crate::table::TableName;

/// Oldest and newest timestamps stored in a table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimestampRange {
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Operations the ingestion core needs from the store
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Names of all existing tables
    async fn table_names(&self) -> Result<Vec<String>>;

    /// Create the five-column record table, day-partitioned on `timestamp`,
    /// unless it already exists
    async fn create_table(&self, table: &TableName) -> Result<()>;

    /// Bulk-insert a CSV payload (header row included) into `table`.
    /// Returns the number of rows the store accepted.
    async fn insert_csv(&self, table: &TableName, payload: &[u8]) -> Result<u64>;

    /// Column names of `table`
    async fn table_columns(&self, table: &TableName) -> Result<Vec<String>>;

    /// Min and max of the designated timestamp column
    async fn timestamp_range(&self, table: &TableName) -> Result<TimestampRange>;
}
