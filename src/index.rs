//! File index: a fixed-bucket hash table of [`Record`]s, keyed by path.
//!
//! Ports `index.c`/`index.h` from the original `fsautoproc`: bucket count is
//! a compile-time constant, hashing uses the same polynomial rolling hash
//! (`h = (h<<5) - h + c`), and the on-disk format is sorted ascending by path
//! on write for deterministic output.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

use crate::types::{Record, Stat};

/// Fixed bucket count. Not a contract — a tuning parameter. The `§8` hash
/// invariant (`hash(path) mod B == bucket_id`) holds for any value.
pub const BUCKETS: usize = 64;

/// Maximum serialized line length (`path,mtime_ms,size\n`), matching the
/// original's `INDEXMAXFP`.
pub const MAX_LINE_LEN: usize = 512;

/// Computes the bucket index for `path` using the original's polynomial
/// rolling hash: `h := (h << 5) - h + c` over each byte, absolute value, mod
/// [`BUCKETS`]. Must be deterministic within a process; cross-process/run
/// stability is not required since buckets are never persisted.
pub fn bucket_of(path: &str) -> usize {
    let mut h: i64 = 0;
    for &c in path.as_bytes() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i64);
    }
    (h.unsigned_abs() as usize) % BUCKETS
}

/// A fixed-bucket hash table of [`Record`]s. Invariants (checked by tests,
/// not at runtime on every call): every record lives in `bucket_of(path)`;
/// no two records share a path; `size` equals the sum of chain lengths.
#[derive(Default)]
pub struct Index {
    buckets: Vec<Vec<Record>>,
    size: usize,
}

impl Index {
    pub fn new() -> Self {
        Index {
            buckets: (0..BUCKETS).map(|_| Vec::new()).collect(),
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn find(&self, path: &str) -> Option<&Record> {
        self.buckets[bucket_of(path)]
            .iter()
            .find(|r| r.path == path)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Record> {
        self.buckets[bucket_of(path)]
            .iter_mut()
            .find(|r| r.path == path)
    }

    /// Inserts `record`. Callers must test [`Index::find`] first — behavior
    /// when a path already exists is unspecified but safe: this
    /// implementation always appends, which is only safe when the caller has
    /// verified absence (the contract spec.md §4.C asks for).
    pub fn put(&mut self, record: Record) {
        let b = bucket_of(&record.path);
        self.buckets[b].push(record);
        self.size += 1;
    }

    /// Flattens all buckets into a single vector of references. Order is
    /// unspecified (bucket-major); callers needing a stable order should sort.
    pub fn list(&self) -> Vec<&Record> {
        let list: Vec<&Record> = self.buckets.iter().flatten().collect();
        debug_assert_eq!(list.len(), self.size);
        list
    }

    /// Writes every record as `path,mtime_ms,size\n`, sorted ascending by
    /// path. Refuses paths containing a comma or newline (open question in
    /// the spec, resolved here as a hard write-time error) and refuses lines
    /// that would exceed [`MAX_LINE_LEN`] bytes.
    pub fn write<W: Write>(&self, mut sink: W) -> Result<()> {
        let mut records = self.list();
        records.sort_by(|a, b| a.path.cmp(&b.path));

        for record in records {
            if record.path.contains(',') || record.path.contains('\n') {
                bail!(
                    "cannot serialize path containing a comma or newline: {:?}",
                    record.path
                );
            }
            let line = format!(
                "{},{},{}\n",
                record.path, record.stat.mtime_ms, record.stat.size
            );
            if line.len() > MAX_LINE_LEN {
                bail!(
                    "index line for {:?} exceeds {} bytes",
                    record.path,
                    MAX_LINE_LEN
                );
            }
            sink.write_all(line.as_bytes())
                .with_context(|| format!("writing index line for {:?}", record.path))?;
        }
        Ok(())
    }

    /// Reads `path,mtime_ms,size` lines. The first line that does not match
    /// the grammar stops parsing; records parsed so far are retained (the
    /// safer of the two behaviors attested in the original sources).
    pub fn read<R: BufRead>(source: R) -> Result<Self> {
        let mut idx = Index::new();
        for line in source.lines() {
            let line = line.context("reading index line")?;
            match parse_line(&line) {
                Some((path, stat)) => idx.put(Record::new(path, stat)),
                None => break,
            }
        }
        Ok(idx)
    }
}

fn parse_line(line: &str) -> Option<(String, Stat)> {
    let mut parts = line.splitn(3, ',');
    let path = parts.next()?;
    let mtime_ms: u64 = parts.next()?.parse().ok()?;
    let size: u64 = parts.next()?.parse().ok()?;
    if path.is_empty() || path.contains(',') {
        return None;
    }
    Some((path.to_string(), Stat { mtime_ms, size }))
}
