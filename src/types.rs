//! Core data types shared across the index, command-set table, and diff engine.

use std::path::Path;
use std::time::UNIX_EPOCH;

/// Identity of a file's on-disk state: modification time and size. No content
/// hashing is performed — two files with equal `Stat` are considered unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    /// Modification time in whole milliseconds since the Unix epoch.
    pub mtime_ms: u64,
    /// File size in bytes.
    pub size: u64,
}

/// Reads `path`'s modification time and size. A stat failure is fatal to
/// whichever diff-engine stage triggered it.
pub fn stat_path(path: &Path) -> std::io::Result<Stat> {
    let meta = std::fs::metadata(path)?;
    let mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Ok(Stat {
        mtime_ms,
        size: meta.len(),
    })
}

/// A single path's indexed identity. `path` is immutable for the record's
/// lifetime; `stat` may be refreshed in place after a NEW/MOD command runs,
/// or silently during the diff engine's post pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub path: String,
    pub stat: Stat,
}

impl Record {
    pub fn new(path: impl Into<String>, stat: Stat) -> Self {
        Record {
            path: path.into(),
            stat,
        }
    }
}
