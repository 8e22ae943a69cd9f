//! Import run orchestration
//!
//! scan -> prepare tables -> load state -> per batch: build, deliver each prefix.
//! Batches and prefixes run one after another; the import state has a single
//! owner for the whole run.

use std::collections::BTreeMap;
use tracing::{error, info, info_span, warn, Instrument};
use tsimport_common::Result;

use crate::batch::{self, SkipCounts};
use crate::catalog::{self, DateRange, FileHandle};
use crate::config::IngestConfig;
use crate::delivery::{DeliveryEngine, DeliveryOutcome};
use crate::gateway::StoreGateway;
use crate::state::ImportState;
use crate::table::TableName;

/// Totals for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub files_scanned: usize,
    pub batches: usize,
    pub skipped: SkipCounts,
    /// Files left out because their prefix is not a valid table name
    pub invalid_table_files: usize,
    pub records_submitted: usize,
    pub records_committed: usize,
    pub prefixes_committed: usize,
    pub prefixes_failed: usize,
    pub files_deleted: usize,
    pub deletion_failures: usize,
}

impl RunReport {
    /// Deliveries were attempted and none of them went through
    pub fn is_catastrophic(&self) -> bool {
        self.prefixes_failed > 0 && self.prefixes_committed == 0
    }

    pub fn has_failures(&self) -> bool {
        self.prefixes_failed > 0
    }
}

/// One import run over a directory tree
pub struct Pipeline<'a, G: StoreGateway + ?Sized> {
    config: &'a IngestConfig,
    gateway: &'a G,
    range: DateRange,
}

impl<'a, G: StoreGateway + ?Sized> Pipeline<'a, G> {
    pub fn new(config: &'a IngestConfig, gateway: &'a G, range: DateRange) -> Self {
        Self {
            config,
            gateway,
            range,
        }
    }

    /// Run the import.
    ///
    /// Errors only for an unreadable base directory or state file problems;
    /// delivery failures are counted in the report.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            base_dir = %self.config.base_dir.display(),
            start = ?self.range.start,
            end = ?self.range.end,
            delete_after_import = self.config.delete_after_import,
            "Starting import"
        );

        let catalog = catalog::scan(&self.config.base_dir, &self.range)?;
        let mut report = RunReport {
            files_scanned: catalog.files.len(),
            ..Default::default()
        };

        if catalog.files.is_empty() {
            warn!("No new files to import");
            return Ok(report);
        }

        let tables = self.prepare_tables(catalog.prefixes.iter()).await;

        let (files, invalid): (Vec<FileHandle>, Vec<FileHandle>) = catalog
            .files
            .into_iter()
            .partition(|f| tables.contains_key(&f.prefix));
        report.invalid_table_files = invalid.len();
        if !invalid.is_empty() {
            error!(files = invalid.len(), "Skipping files whose prefix is not a valid table name");
        }

        let mut state = ImportState::load(&self.config.state_file)?;
        info!(files = state.len(), "Read import state");

        let engine = DeliveryEngine::new(
            self.gateway,
            self.config.retry_policy(),
            &self.config.state_file,
        )
        .with_delete_after_import(self.config.delete_after_import);

        let batch_size = self.config.batch_size.max(1);
        let total_batches = files.len().div_ceil(batch_size);

        for (index, chunk) in files.chunks(batch_size).enumerate() {
            let span = info_span!("batch", number = index + 1, of = total_batches);
            self.run_batch(chunk, &tables, &engine, &mut state, &mut report)
                .instrument(span)
                .await?;
            report.batches += 1;
            info!("Imported batch {} of {}", index + 1, total_batches);
        }

        info!(
            committed = report.records_committed,
            failed_prefixes = report.prefixes_failed,
            skipped = report.skipped.total(),
            "Import finished"
        );
        Ok(report)
    }

    async fn run_batch(
        &self,
        chunk: &[FileHandle],
        tables: &BTreeMap<String, TableName>,
        engine: &DeliveryEngine<'_, G>,
        state: &mut ImportState,
        report: &mut RunReport,
    ) -> Result<()> {
        let prepared = batch::build(chunk, state);
        info!(
            records = prepared.record_count(),
            files = chunk.len(),
            "Built batch"
        );
        report.skipped.add(&prepared.skipped);

        for (prefix, prefix_batch) in prepared.prefixes {
            let Some(table) = tables.get(&prefix) else {
                continue;
            };
            let records = prefix_batch.len();
            report.records_submitted += records;

            let outcome = engine
                .deliver(&prefix, table, prefix_batch, state)
                .instrument(info_span!("prefix", prefix = %prefix))
                .await?;

            match outcome {
                DeliveryOutcome::Committed {
                    records,
                    deleted,
                    deletion_failures,
                    ..
                } => {
                    report.records_committed += records;
                    report.prefixes_committed += 1;
                    report.files_deleted += deleted;
                    report.deletion_failures += deletion_failures;
                },
                DeliveryOutcome::Failed { .. } => {
                    error!(prefix = %prefix, records, "Failed to insert files, will retry next run");
                    report.prefixes_failed += 1;
                },
            }
        }

        Ok(())
    }

    /// Map every observed prefix to a table and make sure the table exists.
    /// Prefixes with no valid table name are left out of the result.
    async fn prepare_tables<'p>(
        &self,
        prefixes: impl Iterator<Item = &'p String>,
    ) -> BTreeMap<String, TableName> {
        let existing = match self.gateway.table_names().await {
            Ok(names) => Some(names),
            Err(e) => {
                error!(error = %e, "Cannot list store tables, creating all");
                None
            },
        };

        let mut tables = BTreeMap::new();
        for prefix in prefixes {
            let table = match TableName::from_prefix(prefix) {
                Ok(table) => table,
                Err(e) => {
                    error!("{}", e);
                    continue;
                },
            };

            let exists = existing
                .as_ref()
                .is_some_and(|names| names.iter().any(|n| n == table.as_str()));
            if exists {
                info!(table = %table, "Table already exists");
            } else {
                match self.gateway.create_table(&table).await {
                    Ok(()) => info!(table = %table, "Table created"),
                    Err(e) => error!(table = %table, error = %e, "Cannot create table"),
                }
            }
            tables.insert(prefix.clone(), table);
        }
        tables
    }
}
