//! tsimport Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the tsimport workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the ingestion error taxonomy ([`IngestError`]) and result alias
//! - **Logging**: one-shot `tracing` subscriber setup for binaries ([`logging`])
//!
//! # Example
//!
//! ```no_run
//! use tsimport_common::{IngestError, Result};
//!
//! fn require_dir(path: &std::path::Path) -> Result<()> {
//!     if !path.is_dir() {
//!         return Err(IngestError::BaseDirUnreadable {
//!             path: path.display().to_string(),
//!             reason: "not a directory".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{IngestError, Result};
