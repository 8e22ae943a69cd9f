//! Import progress state (state.json)
//!
//! Records, per prefix, which filenames have been delivered. It is the only
//! data that outlives a run and the sole source of truth for deduplication.
//!
//! On disk:
//!
//! ```json
//! { "version": 1, "imported": { "sensorA": ["sensorA_20240101-090000.xml"] } }
//! ```
//!
//! The unversioned `{ "sensorA": [...] }` shape written by older tools is read
//! as well and upgraded on the next save.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tsimport_common::{IngestError, Result};

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

#[derive(Serialize)]
struct StateFileRef<'a> {
    version: u32,
    imported: &'a BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StateFile {
    Versioned {
        version: u32,
        imported: BTreeMap<String, Vec<String>>,
    },
    Legacy(BTreeMap<String, Vec<String>>),
}

/// In-memory import state; a single owner mutates it and calls [`ImportState::save`].
#[derive(Debug, Clone, Default)]
pub struct ImportState {
    imported: BTreeMap<String, Vec<String>>,
    index: HashMap<String, HashSet<String>>,
}

impl ImportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from `path`; a missing file is a fresh, empty state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_err = |reason: String| IngestError::StateLoad {
            path: path.display().to_string(),
            reason,
        };

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No state file, starting fresh");
                return Ok(Self::new());
            },
            Err(e) => return Err(load_err(e.to_string())),
        };

        let imported = match serde_json::from_str::<StateFile>(&content) {
            Ok(StateFile::Versioned { version, imported }) if version == STATE_VERSION => imported,
            Ok(StateFile::Versioned { version, .. }) => {
                return Err(load_err(format!("unsupported state version {}", version)));
            },
            Ok(StateFile::Legacy(imported)) => {
                info!(path = %path.display(), "Upgrading unversioned state file");
                imported
            },
            Err(e) => return Err(load_err(e.to_string())),
        };

        let state = Self::from_map(imported);
        debug!(
            path = %path.display(),
            prefixes = state.imported.len(),
            files = state.len(),
            "Loaded import state"
        );
        Ok(state)
    }

    fn from_map(imported: BTreeMap<String, Vec<String>>) -> Self {
        let index = imported
            .iter()
            .map(|(prefix, files)| (prefix.clone(), files.iter().cloned().collect()))
            .collect();
        Self { imported, index }
    }

    /// Write the whole state to `path` through a temp file and rename, so an
    /// interrupted save leaves the previous file intact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let persist_err = |reason: String| IngestError::StatePersist {
            path: path.display().to_string(),
            reason,
        };

        let body = serde_json::to_vec_pretty(&StateFileRef {
            version: STATE_VERSION,
            imported: &self.imported,
        })
        .map_err(|e| persist_err(e.to_string()))?;

        let temp_path = temp_path_for(path);
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&body)?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        };

        if let Err(e) = write() {
            let _ = fs::remove_file(&temp_path);
            return Err(persist_err(e.to_string()));
        }

        debug!(path = %path.display(), files = self.len(), "Persisted import state");
        Ok(())
    }

    /// Whether `filename` was already imported for `prefix`.
    pub fn contains(&self, prefix: &str, filename: &str) -> bool {
        self.index
            .get(prefix)
            .is_some_and(|files| files.contains(filename))
    }

    /// Append `filenames` to `prefix`, ignoring ones already present.
    /// Durable only after the next [`ImportState::save`].
    pub fn record<I, S>(&mut self, prefix: &str, filenames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = self.imported.entry(prefix.to_string()).or_default();
        let seen = self.index.entry(prefix.to_string()).or_default();
        for filename in filenames {
            let filename = filename.into();
            if seen.insert(filename.clone()) {
                list.push(filename);
            }
        }
    }

    /// Imported filenames for `prefix`, in commit order.
    pub fn files(&self, prefix: &str) -> &[String] {
        self.imported.get(prefix).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of recorded files
    pub fn len(&self) -> usize {
        self.imported.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = ImportState::load(dir.path().join("state.json")).unwrap();
        assert!(state.is_empty());
        assert!(!state.contains("sensorA", "anything"));
    }

    #[test]
    fn test_record_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ImportState::new();
        state.record("sensorA", ["b.xml", "a.xml"]);
        state.record("sensorA", ["a.xml", "c.xml"]);
        state.save(&path).unwrap();

        let loaded = ImportState::load(&path).unwrap();
        assert_eq!(loaded.files("sensorA"), ["b.xml", "a.xml", "c.xml"]);
        assert!(loaded.contains("sensorA", "c.xml"));
        assert!(!loaded.contains("sensorB", "c.xml"));
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn test_saved_file_is_versioned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ImportState::new();
        state.record("p", ["f"]);
        state.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["imported"]["p"][0], "f");
    }

    #[test]
    fn test_legacy_mapping_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"sensorA": ["x.xml"], "sensorB": []}"#).unwrap();

        let state = ImportState::load(&path).unwrap();
        assert!(state.contains("sensorA", "x.xml"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_unknown_version_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"version": 7, "imported": {}}"#).unwrap();

        assert!(matches!(
            ImportState::load(&path),
            Err(IngestError::StateLoad { .. })
        ));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let err = ImportState::load(&path).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_failed_save_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let mut state = ImportState::new();
        state.record("p", ["first"]);
        state.save(&path).unwrap();

        // Make the temp file path unusable
        fs::create_dir(dir.path().join("state.json.tmp")).unwrap();
        state.record("p", ["second"]);
        let err = state.save(&path).unwrap_err();
        assert!(matches!(err, IngestError::StatePersist { .. }));

        let on_disk = ImportState::load(&path).unwrap();
        assert_eq!(on_disk.files("p"), ["first"]);
    }
}
