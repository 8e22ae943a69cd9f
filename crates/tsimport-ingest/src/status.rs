//! Store status report
//!
//! Lists the tables holding imported records with their time coverage.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use tracing::warn;
use tsimport_common::Result;

use crate::gateway::{StoreGateway, TimestampRange};
use crate::record::COLUMNS;
use crate::table::TableName;

/// Coverage of one record table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub table: String,
    pub range: TimestampRange,
}

/// Whether `columns` is exactly the record schema, in any order
pub fn is_record_table(columns: &[String]) -> bool {
    columns.len() == COLUMNS.len() && COLUMNS.iter().all(|c| columns.iter().any(|col| col == c))
}

/// Collect min/max timestamps for every record table in the store.
///
/// Failing to list tables is an error; a table that cannot be inspected is
/// logged and left out.
pub async fn collect<G: StoreGateway + ?Sized>(gateway: &G) -> Result<Vec<TableStatus>> {
    let mut names = gateway.table_names().await?;
    names.sort();

    let mut statuses = Vec::new();
    for name in names {
        let Ok(table) = TableName::from_prefix(&name) else {
            continue;
        };

        match gateway.table_columns(&table).await {
            Ok(columns) if is_record_table(&columns) => {},
            Ok(_) => continue,
            Err(e) => {
                warn!(table = %table, error = %e, "Cannot read table columns");
                continue;
            },
        }

        match gateway.timestamp_range(&table).await {
            Ok(range) => statuses.push(TableStatus { table: name, range }),
            Err(e) => warn!(table = %table, error = %e, "Cannot read timestamp range"),
        }
    }
    Ok(statuses)
}

/// Render statuses as a table
pub fn render(statuses: &[TableStatus]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Table name", "Min timestamp", "Max timestamp"]);

    for status in statuses {
        table.add_row(vec![
            status.table.clone(),
            status.range.min.clone().unwrap_or_else(|| "-".to_string()),
            status.range.max.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    format!("{}\n", table)
}
