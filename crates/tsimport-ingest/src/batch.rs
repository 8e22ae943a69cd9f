//! Batch building
//!
//! Turns a slice of scanned files into per-prefix record sets, skipping files
//! the import state already lists and files the store cannot take.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{error, warn};
use tsimport_common::IngestError;

use crate::catalog::FileHandle;
use crate::record::{Record, RecordFormat};
use crate::state::ImportState;
use crate::timestamp;

/// Records pending for one prefix, with what is needed to commit them
#[derive(Debug, Default, Clone)]
pub struct PrefixBatch {
    pub records: Vec<Record>,
    /// Source paths, for deletion after a commit
    pub paths: Vec<PathBuf>,
    /// Filenames, for the state commit
    pub filenames: Vec<String>,
}

impl PrefixBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Why a file was left out of a batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SkipCounts {
    pub already_imported: usize,
    pub unsupported: usize,
    pub unreadable: usize,
    pub timestamp_lost: usize,
    pub duplicate: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.already_imported + self.unsupported + self.unreadable + self.timestamp_lost + self.duplicate
    }

    pub fn add(&mut self, other: &SkipCounts) {
        self.already_imported += other.already_imported;
        self.unsupported += other.unsupported;
        self.unreadable += other.unreadable;
        self.timestamp_lost += other.timestamp_lost;
        self.duplicate += other.duplicate;
    }
}

/// Output of [`build`]
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub prefixes: BTreeMap<String, PrefixBatch>,
    pub skipped: SkipCounts,
}

impl PreparedBatch {
    pub fn record_count(&self) -> usize {
        self.prefixes.values().map(PrefixBatch::len).sum()
    }
}

/// Build per-prefix record sets for `files`.
///
/// Every per-file problem is logged and the file dropped; nothing here fails
/// the batch.
pub fn build(files: &[FileHandle], state: &ImportState) -> PreparedBatch {
    let mut prepared = PreparedBatch::default();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for file in files {
        if state.contains(&file.prefix, &file.filename) {
            let skip = IngestError::AlreadyImported {
                prefix: file.prefix.clone(),
                filename: file.filename.clone(),
            };
            warn!("{}, skipping", skip);
            prepared.skipped.already_imported += 1;
            continue;
        }

        if !seen.insert((file.prefix.as_str(), file.filename.as_str())) {
            warn!(
                filename = %file.filename,
                path = %file.path.display(),
                "Same filename found twice for one prefix, skipping the later copy"
            );
            prepared.skipped.duplicate += 1;
            continue;
        }

        let content = match std::fs::read_to_string(&file.path) {
            Ok(content) => content,
            Err(e) => {
                error!(
                    filename = %file.filename,
                    path = %file.path.display(),
                    error = %e,
                    "Cannot read file, skipping"
                );
                prepared.skipped.unreadable += 1;
                continue;
            },
        };

        let ts = match timestamp::extract(&file.filename) {
            Ok(ts) => ts,
            Err(e) => {
                // It passed the scanner, so the file changed underneath us
                error!(filename = %file.filename, error = %e, "Cannot import file, timestamp lost");
                prepared.skipped.timestamp_lost += 1;
                continue;
            },
        };

        let format = RecordFormat::from_path(&file.path);
        if format == RecordFormat::Unknown {
            warn!("{}, skipping", IngestError::UnsupportedFormat(file.filename.clone()));
            prepared.skipped.unsupported += 1;
            continue;
        }

        let entry = prepared.prefixes.entry(file.prefix.clone()).or_default();
        entry.records.push(Record::new(
            file.filename.clone(),
            file.prefix.clone(),
            &ts,
            format,
            content,
        ));
        entry.paths.push(file.path.clone());
        entry.filenames.push(file.filename.clone());
    }

    prepared
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn handle(dir: &Path, name: &str, content: &str) -> FileHandle {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        FileHandle {
            filename: name.to_string(),
            path,
            prefix: crate::table::prefix_of(name).to_string(),
        }
    }

    #[test]
    fn test_groups_by_prefix() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            handle(dir.path(), "sensorA_20240101-090000.xml", "<a/>"),
            handle(dir.path(), "sensorB_133742000000000.xml", "<b/>"),
            handle(dir.path(), "sensorA_20240101-100000.json", "{}"),
        ];

        let prepared = build(&files, &ImportState::new());

        assert_eq!(prepared.record_count(), 3);
        let a = &prepared.prefixes["sensorA"];
        assert_eq!(a.filenames, ["sensorA_20240101-090000.xml", "sensorA_20240101-100000.json"]);
        assert_eq!(a.records[1].format, RecordFormat::Json);
        assert_eq!(a.records[0].content, "<a/>");
        assert_eq!(prepared.prefixes["sensorB"].len(), 1);
    }

    #[test]
    fn test_skips_already_imported() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            handle(dir.path(), "sensorA_20240101-090000.xml", "<a/>"),
            handle(dir.path(), "sensorA_20240101-100000.xml", "<a/>"),
        ];
        let mut state = ImportState::new();
        state.record("sensorA", ["sensorA_20240101-090000.xml"]);

        let prepared = build(&files, &state);

        assert_eq!(prepared.skipped.already_imported, 1);
        assert_eq!(prepared.prefixes["sensorA"].filenames, ["sensorA_20240101-100000.xml"]);
    }

    #[test]
    fn test_same_filename_other_prefix_is_not_skipped() {
        let dir = TempDir::new().unwrap();
        let files = vec![handle(dir.path(), "sensorA_20240101-090000.xml", "<a/>")];
        let mut state = ImportState::new();
        state.record("sensorB", ["sensorA_20240101-090000.xml"]);

        assert_eq!(build(&files, &state).record_count(), 1);
    }

    #[test]
    fn test_unknown_format_never_batched() {
        let dir = TempDir::new().unwrap();
        let files = vec![handle(dir.path(), "sensorA_20240101-090000.bin", "raw")];

        let prepared = build(&files, &ImportState::new());

        assert_eq!(prepared.skipped.unsupported, 1);
        assert!(prepared.prefixes.is_empty());
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut vanished = handle(dir.path(), "sensorA_20240101-090000.xml", "<a/>");
        std::fs::remove_file(&vanished.path).unwrap();
        vanished.path = dir.path().join("sensorA_20240101-090000.xml");
        let kept = handle(dir.path(), "sensorA_20240101-100000.xml", "<a/>");

        let prepared = build(&[vanished, kept], &ImportState::new());

        assert_eq!(prepared.skipped.unreadable, 1);
        assert_eq!(prepared.record_count(), 1);
    }

    #[test]
    fn test_duplicate_filename_in_batch() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("copy")).unwrap();
        let first = handle(dir.path(), "sensorA_20240101-090000.xml", "<a/>");
        let second = handle(&dir.path().join("copy"), "sensorA_20240101-090000.xml", "<a/>");

        let prepared = build(&[first, second], &ImportState::new());

        assert_eq!(prepared.skipped.duplicate, 1);
        assert_eq!(prepared.record_count(), 1);
        assert_eq!(prepared.skipped.total(), 1);
    }
}
