//! File catalog scanning
//!
//! Walks the base directory, keeps the files whose names carry a timestamp,
//! and applies the optional date range.

use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tsimport_common::{IngestError, Result};
use walkdir::WalkDir;

use crate::table::prefix_of;
use crate::timestamp::{self, start_of_day};

/// A scanned candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub filename: String,
    pub path: PathBuf,
    pub prefix: String,
}

/// Inclusive calendar-date range in the fixed zone.
///
/// The start bound begins at midnight of `start`; the end bound covers the whole
/// of `end`, up to but excluding midnight of the following day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(IngestError::config(format!(
                    "start date {} is after end date {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        Self::new(
            start.map(parse_date).transpose()?,
            end.map(parse_date).transpose()?,
        )
    }

    /// Whether `ts` falls inside the range.
    pub fn contains(&self, ts: &DateTime<Tz>) -> bool {
        let after_start = self.start.is_none_or(|d| *ts >= start_of_day(d));
        let before_end = self.end.is_none_or(|d| match d.checked_add_signed(Duration::days(1)) {
            Some(next) => *ts < start_of_day(next),
            None => true,
        });
        after_start && before_end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| IngestError::config(format!("invalid date '{}', expected YYYY-MM-DD", s)))
}

/// Result of a scan
#[derive(Debug, Default)]
pub struct Catalog {
    /// In-range candidate files, in walk order.
    pub files: Vec<FileHandle>,
    /// Every prefix seen on a timestamped file, in range or not.
    pub prefixes: BTreeSet<String>,
}

/// Scan `base_dir` recursively for timestamped files inside `range`.
///
/// Only an unreadable `base_dir` is an error; unreadable entries below it and
/// files without a recognisable timestamp are skipped.
pub fn scan(base_dir: &Path, range: &DateRange) -> Result<Catalog> {
    let meta = std::fs::metadata(base_dir).map_err(|e| IngestError::BaseDirUnreadable {
        path: base_dir.display().to_string(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(IngestError::BaseDirUnreadable {
            path: base_dir.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut catalog = Catalog::default();
    let mut out_of_range = 0usize;

    for entry in WalkDir::new(base_dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    return Err(IngestError::BaseDirUnreadable {
                        path: base_dir.display().to_string(),
                        reason: e.to_string(),
                    });
                }
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            },
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(filename) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "Skipping non UTF-8 filename");
            continue;
        };

        let ts = match timestamp::extract(filename) {
            Ok(ts) => ts,
            Err(_) => continue,
        };

        let prefix = prefix_of(filename).to_string();
        catalog.prefixes.insert(prefix.clone());

        if !range.contains(&ts) {
            out_of_range += 1;
            continue;
        }

        catalog.files.push(FileHandle {
            filename: filename.to_string(),
            path: entry.path().to_path_buf(),
            prefix,
        });
    }

    info!(
        base_dir = %base_dir.display(),
        files = catalog.files.len(),
        prefixes = catalog.prefixes.len(),
        out_of_range,
        "Scanned file catalog"
    );

    Ok(catalog)
}
