//! QuestDB endpoint URLs and statements

use crate::table::TableName;

/// Build the SQL execution endpoint URL
pub fn exec_url(base_url: &str) -> String {
    format!("{}/exec", base_url.trim_end_matches('/'))
}

/// Build the bulk import endpoint URL
pub fn import_url(base_url: &str) -> String {
    format!("{}/imp", base_url.trim_end_matches('/'))
}

pub const LIST_TABLES: &str = "tables();";

/// DDL for a record table. `table` is validated, so quoting it is enough.
pub fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\
         id STRING, provider STRING, format STRING, timestamp TIMESTAMP, content STRING\
         ) TIMESTAMP(timestamp) PARTITION BY DAY",
        table
    )
}

pub fn table_columns_sql(table: &TableName) -> String {
    format!("table_columns('{}');", table)
}

pub fn timestamp_range_sql(table: &TableName) -> String {
    format!("SELECT min(timestamp), max(timestamp) FROM \"{}\";", table)
}
