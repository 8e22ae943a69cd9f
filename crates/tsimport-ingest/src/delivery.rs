//! Delivery of prefix batches to the store
//!
//! Each prefix batch moves `Pending -> Sending -> Committed | Failed`. Sending
//! repeats up to [`RetryPolicy::max_attempts`] times with a fixed delay. A
//! batch is committed as a whole: its filenames go into the import state, the
//! state file is rewritten, and only then are source files deleted.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tsimport_common::{IngestError, Result};

use crate::batch::PrefixBatch;
use crate::gateway::StoreGateway;
use crate::record::to_csv;
use crate::state::ImportState;
use crate::table::TableName;

/// Default number of submission attempts per prefix batch.
pub const DEFAULT_MAX_RETRIES: u32 = 50;

/// Default delay between attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total submission attempts, including the first
    pub max_attempts: u32,
    /// Pause after a failed attempt, before the next one
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// How one prefix batch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Committed {
        records: usize,
        attempts: u32,
        deleted: usize,
        deletion_failures: usize,
    },
    Failed {
        attempts: u32,
        reason: String,
    },
}

impl DeliveryOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Sends prefix batches and commits them to the import state
pub struct DeliveryEngine<'a, G: StoreGateway + ?Sized> {
    gateway: &'a G,
    policy: RetryPolicy,
    state_path: PathBuf,
    delete_after_import: bool,
}

impl<'a, G: StoreGateway + ?Sized> DeliveryEngine<'a, G> {
    pub fn new(gateway: &'a G, policy: RetryPolicy, state_path: impl Into<PathBuf>) -> Self {
        Self {
            gateway,
            policy,
            state_path: state_path.into(),
            delete_after_import: false,
        }
    }

    /// Remove source files after their batch is committed
    pub fn with_delete_after_import(mut self, delete: bool) -> Self {
        self.delete_after_import = delete;
        self
    }

    /// Deliver one prefix batch.
    ///
    /// Exhausted retries come back as [`DeliveryOutcome::Failed`]. The only
    /// error is [`IngestError::StatePersist`]: the store has the rows but the
    /// state file does not, and the caller must stop.
    pub async fn deliver(
        &self,
        prefix: &str,
        table: &TableName,
        batch: PrefixBatch,
        state: &mut ImportState,
    ) -> Result<DeliveryOutcome> {
        if batch.is_empty() {
            return Ok(DeliveryOutcome::Committed {
                records: 0,
                attempts: 0,
                deleted: 0,
                deletion_failures: 0,
            });
        }

        let payload = match to_csv(&batch.records) {
            Ok(payload) => payload,
            Err(e) => {
                error!(prefix, error = %e, "Cannot serialize batch");
                return Ok(DeliveryOutcome::Failed {
                    attempts: 0,
                    reason: e.to_string(),
                });
            },
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < max_attempts {
            attempts += 1;
            match self.gateway.insert_csv(table, &payload).await {
                Ok(rows) => {
                    info!(prefix, table = %table, rows, attempt = attempts, "Batch accepted by store");
                    last_error = None;
                    break;
                },
                Err(e) => {
                    warn!(
                        prefix,
                        table = %table,
                        attempt = attempts,
                        max_attempts,
                        error = %e,
                        "Submission failed"
                    );
                    last_error = Some(e);
                    if attempts < max_attempts {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                },
            }
        }

        if let Some(e) = last_error {
            let failed = IngestError::BatchFailed {
                prefix: prefix.to_string(),
                attempts,
                reason: e.to_string(),
            };
            error!(prefix, files = batch.len(), "{}", failed);
            return Ok(DeliveryOutcome::Failed {
                attempts,
                reason: e.to_string(),
            });
        }

        state.record(prefix, batch.filenames.iter().cloned());
        if let Err(e) = state.save(&self.state_path) {
            error!(
                prefix,
                files = batch.len(),
                error = %e,
                "Import state NOT persisted; these files will be sent again on the next run"
            );
            return Err(e);
        }

        let (deleted, deletion_failures) = if self.delete_after_import {
            delete_sources(&batch.paths)
        } else {
            (0, 0)
        };

        info!(prefix, records = batch.len(), deleted, "Committed batch");
        Ok(DeliveryOutcome::Committed {
            records: batch.len(),
            attempts,
            deleted,
            deletion_failures,
        })
    }
}

/// Best-effort removal; failures are logged and counted.
fn delete_sources(paths: &[PathBuf]) -> (usize, usize) {
    let mut deleted = 0;
    let mut failures = 0;
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => deleted += 1,
            Err(e) => {
                let err = deletion_error(path, &e);
                warn!("{}", err);
                failures += 1;
            },
        }
    }
    (deleted, failures)
}

fn deletion_error(path: &Path, e: &std::io::Error) -> IngestError {
    IngestError::Deletion {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
