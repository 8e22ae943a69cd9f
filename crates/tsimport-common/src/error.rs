//! Error types for tsimport
//!
//! Per-file and per-batch variants are recoverable: callers log them and move on.
//! `BaseDirUnreadable`, `StateLoad` and `StatePersist` end a run.

use thiserror::Error;

/// Result type alias for tsimport operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Main error type for tsimport
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Timestamp not found or invalid in filename: {0}")]
    TimestampNotFound(String),

    #[error("Unsupported format for file: {0}")]
    UnsupportedFormat(String),

    #[error("File {filename} has already been imported for {prefix}")]
    AlreadyImported { prefix: String, filename: String },

    #[error("Delivery to table {table} failed: {reason}")]
    DeliveryFailure { table: String, reason: String },

    #[error("Batch for {prefix} failed after {attempts} attempts: {reason}")]
    BatchFailed {
        prefix: String,
        attempts: u32,
        reason: String,
    },

    #[error("Failed to persist import state to {path}: {reason}")]
    StatePersist { path: String, reason: String },

    #[error("Failed to load import state from {path}: {reason}")]
    StateLoad { path: String, reason: String },

    #[error("Failed to delete {path}: {reason}")]
    Deletion { path: String, reason: String },

    #[error("Cannot read base directory {path}: {reason}")]
    BaseDirUnreadable { path: String, reason: String },

    #[error("Invalid table name '{name}': {reason}")]
    InvalidTableName { name: String, reason: String },

    #[error("Store responded with status {status}: {body}")]
    Store { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// True for errors that must stop the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BaseDirUnreadable { .. } | Self::StateLoad { .. } | Self::StatePersist { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let persist = IngestError::StatePersist {
            path: "state.json".to_string(),
            reason: "disk full".to_string(),
        };
        assert!(persist.is_fatal());

        let delivery = IngestError::DeliveryFailure {
            table: "sensorA".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(!delivery.is_fatal());
        assert!(!IngestError::UnsupportedFormat("a_20240101-000000.bin".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = IngestError::AlreadyImported {
            prefix: "sensorA".to_string(),
            filename: "sensorA_20240101-090000.xml".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sensorA_20240101-090000.xml"));
        assert!(msg.contains("sensorA"));
    }
}
