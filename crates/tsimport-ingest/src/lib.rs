//! tsimport Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental, idempotent import of timestamped files into a time-series store.
//!
//! # Pipeline
//!
//! - **timestamp**: derive an instant from a filename
//! - **catalog**: walk a directory tree and filter by date range
//! - **state**: durable record of already imported files per prefix
//! - **batch**: group unimported files into per-prefix records
//! - **delivery**: submit with fixed-delay retries, then commit and optionally delete
//! - **pipeline**: one run, end to end
//!
//! # Example
//!
//! ```no_run
//! use tsimport_ingest::{catalog::DateRange, config::IngestConfig, gateway::QuestDbGateway, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load(None)?;
//!     let gateway = QuestDbGateway::new(config.store_url.clone(), config.request_timeout())?;
//!     let range = DateRange::parse(Some("2024-01-01"), None)?;
//!
//!     let report = Pipeline::new(&config, &gateway, range).run().await?;
//!     println!("committed {} records", report.records_committed);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod catalog;
pub mod config;
pub mod delivery;
pub mod gateway;
pub mod pipeline;
pub mod record;
pub mod state;
pub mod status;
pub mod table;
pub mod timestamp;
