//! Prefix to table-name mapping

use std::fmt;
use tsimport_common::{IngestError, Result};

/// Separator between the grouping prefix and the rest of a filename.
pub const PREFIX_SEPARATOR: char = '_';

/// Characters the store refuses in table names.
const FORBIDDEN_CHARS: &[char] = &[
    '.', '?', ',', '\'', '"', '\\', '/', ':', '(', ')', '+', '*', '%', '~',
];

/// Names owned by the store itself.
const RESERVED_NAMES: &[&str] = &["telemetry", "telemetry_config", "sys"];

/// Grouping prefix of `filename`: everything before the first separator,
/// or the whole name when there is none.
pub fn prefix_of(filename: &str) -> &str {
    filename
        .split_once(PREFIX_SEPARATOR)
        .map_or(filename, |(prefix, _)| prefix)
}

/// A validated destination table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    /// Map a filename prefix to its table. The mapping is the identity for
    /// every prefix the store accepts; anything else is rejected.
    pub fn from_prefix(prefix: &str) -> Result<Self> {
        let invalid = |reason: &str| IngestError::InvalidTableName {
            name: prefix.to_string(),
            reason: reason.to_string(),
        };

        if prefix.is_empty() {
            return Err(invalid("empty name"));
        }
        if prefix.trim() != prefix {
            return Err(invalid("leading or trailing whitespace"));
        }
        if let Some(c) = prefix
            .chars()
            .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
        {
            return Err(invalid(&format!("forbidden character {:?}", c)));
        }

        let lower = prefix.to_lowercase();
        if RESERVED_NAMES.contains(&lower.as_str()) || lower.starts_with("sys.") {
            return Err(invalid("reserved by the store"));
        }

        Ok(Self(prefix.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
