use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a catalog entry as reported by a directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Metadata attached to a listed file.
///
/// `modify` is timezone-naive: the server reports local wall-clock time
/// without an offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Size in bytes (0 for directories)
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub modify: NaiveDateTime,
}

impl FileInfo {
    pub fn new(size: u64, kind: EntryKind, modify: NaiveDateTime) -> Self {
        Self { size, kind, modify }
    }

    pub fn file(size: u64, modify: NaiveDateTime) -> Self {
        Self::new(size, EntryKind::File, modify)
    }

    pub fn format_size_human(&self) -> String {
        format_bytes_human(self.size)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileInfo {{ type: {:?}, size: {}, modified: {} }}",
            self.kind,
            self.size,
            self.modify.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Format bytes as human-readable string
pub fn format_bytes_human(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
