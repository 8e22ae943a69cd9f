//! Import configuration
//!
//! Layered lowest to highest: defaults, optional TOML file, `.env` and
//! `TSIMPORT_*` environment variables, then CLI flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tsimport_common::{IngestError, Result};

use crate::delivery::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};
use crate::gateway::questdb::DEFAULT_REQUEST_TIMEOUT_SECS;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default store HTTP endpoint.
pub const DEFAULT_STORE_URL: &str = "http://localhost:9000";

/// Default state file location.
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// Default files per batch. Larger batches have overflowed the store's
/// receive buffer.
pub const DEFAULT_BATCH_SIZE: usize = 300;

/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Import configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Root of the directory tree to import
    pub base_dir: PathBuf,
    pub state_file: PathBuf,
    pub store_url: String,
    pub batch_size: usize,
    /// Submission attempts per prefix batch
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub delete_after_import: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            store_url: DEFAULT_STORE_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            delete_after_import: false,
        }
    }
}

impl IngestConfig {
    /// Defaults, then `file` if given, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = match file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| IngestError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IngestError::config(e.to_string()))
    }

    /// Apply `TSIMPORT_*` environment variables
    ///
    /// - `TSIMPORT_BASE_DIR`, `TSIMPORT_STATE_FILE`, `TSIMPORT_STORE_URL`
    /// - `TSIMPORT_BATCH_SIZE`, `TSIMPORT_MAX_RETRIES`, `TSIMPORT_RETRY_DELAY_SECS`
    /// - `TSIMPORT_REQUEST_TIMEOUT_SECS`, `TSIMPORT_DELETE_AFTER_IMPORT`
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(dir) = std::env::var("TSIMPORT_BASE_DIR") {
            self.base_dir = PathBuf::from(dir);
        }
        if let Ok(file) = std::env::var("TSIMPORT_STATE_FILE") {
            self.state_file = PathBuf::from(file);
        }
        if let Ok(url) = std::env::var("TSIMPORT_STORE_URL") {
            self.store_url = url;
        }
        if let Some(v) = env_parse("TSIMPORT_BATCH_SIZE")? {
            self.batch_size = v;
        }
        if let Some(v) = env_parse("TSIMPORT_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_parse("TSIMPORT_RETRY_DELAY_SECS")? {
            self.retry_delay_secs = v;
        }
        if let Some(v) = env_parse("TSIMPORT_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("TSIMPORT_DELETE_AFTER_IMPORT")? {
            self.delete_after_import = v;
        }
        Ok(self)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::config(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.max_retries == 0 {
            return Err(IngestError::config("max_retries must be at least 1"));
        }
        if self.request_timeout_secs < self.retry_delay_secs {
            return Err(IngestError::config(format!(
                "request_timeout_secs ({}) must not be shorter than retry_delay_secs ({})",
                self.request_timeout_secs, self.retry_delay_secs
            )));
        }
        if self.store_url.trim().is_empty() {
            return Err(IngestError::config("store_url is empty"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| IngestError::config(format!("{}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 300);
        assert_eq!(config.retry_policy().max_attempts, 50);
        assert_eq!(config.retry_policy().delay, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = IngestConfig::from_toml_str(
            r#"
            base_dir = "/data/incoming"
            batch_size = 100
            delete_after_import = true
            "#,
        )
        .unwrap();

        assert_eq!(config.base_dir, PathBuf::from("/data/incoming"));
        assert_eq!(config.batch_size, 100);
        assert!(config.delete_after_import);
        assert_eq!(config.store_url, DEFAULT_STORE_URL);
    }

    #[test]
    fn test_unknown_types_rejected() {
        assert!(IngestConfig::from_toml_str("batch_size = \"lots\"").is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = IngestConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.batch_size = 100;
        config.max_retries = 0;
        assert!(config.validate().is_err());

        config.max_retries = 3;
        config.request_timeout_secs = 5;
        config.retry_delay_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("TSIMPORT_BATCH_SIZE", "42");
        std::env::set_var("TSIMPORT_STORE_URL", "http://questdb:9000");

        let config = IngestConfig::default().with_env_overrides().unwrap();
        assert_eq!(config.batch_size, 42);
        assert_eq!(config.store_url, "http://questdb:9000");

        std::env::set_var("TSIMPORT_BATCH_SIZE", "many");
        assert!(IngestConfig::default().with_env_overrides().is_err());

        std::env::remove_var("TSIMPORT_BATCH_SIZE");
        std::env::remove_var("TSIMPORT_STORE_URL");
    }
}
