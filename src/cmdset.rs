//! Command-set table: pattern → command mappings keyed on lifecycle events.
//!
//! Ports `lcmd.c`/`lcmd.h`'s JSON config parsing and `match_any` semantics.
//! Configuration is a top-level JSON array of objects with `on`, `patterns`,
//! `commands`, and an optional `description`.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;

bitflags::bitflags! {
    /// Trigger bit set over {NEW, MOD, DEL, NOP}, matching `LCTRIG_*`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TriggerFlags: u8 {
        const NEW = 1 << 0;
        const MOD = 1 << 1;
        const DEL = 1 << 2;
        const NOP = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Execution option bit set, matching `LCTOPT_*`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ExecFlags: u8 {
        const VERBOSE = 1 << 0;
        const TRACE = 1 << 1;
    }
}

/// One parsed, compiled rule: which trigger flags it responds to, which
/// paths it matches, and which shell commands to run.
pub struct CommandSet {
    pub name: String,
    pub on_flags: TriggerFlags,
    pub patterns: Vec<Regex>,
    pub commands: Vec<String>,
    /// Cumulative wall-clock milliseconds spent executing this set's
    /// commands. Updated by workers with `fetch_add`, since a `CommandSet`
    /// reference may be shared and executed concurrently across threads.
    pub elapsed_ms: AtomicU64,
}

impl CommandSet {
    /// True if `path` matches any of this set's patterns. No anchoring: a
    /// substring match (in the `regex` crate's default unanchored sense) is
    /// the semantic, mirroring the original's `REG_EXTENDED | REG_NOSUB`.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(path))
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::Relaxed)
    }

    pub fn add_elapsed_ms(&self, ms: u64) {
        self.elapsed_ms.fetch_add(ms, Ordering::Relaxed);
    }
}

#[derive(Deserialize)]
struct RawCommandSet {
    on: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    commands: Vec<String>,
    description: Option<String>,
}

/// Parses `path` as a JSON array of command-set entries. An entry whose `on`
/// tags resolve to no flags, or whose patterns fail to compile, fails the
/// whole parse (fail-fast at startup, matching `lcmdparse`'s `goto err`).
pub fn parse(path: &Path) -> Result<Vec<CommandSet>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config file {path:?}"))?;
    let raw: Vec<RawCommandSet> =
        serde_json::from_str(&text).with_context(|| format!("parsing config file {path:?}"))?;

    raw.into_iter()
        .enumerate()
        .map(|(i, entry)| compile_one(entry, i))
        .collect()
}

fn compile_one(entry: RawCommandSet, index: usize) -> Result<CommandSet> {
    let on_flags = parse_flags(&entry.on);
    if on_flags.is_empty() {
        bail!("command set {index} has no recognized `on` trigger flags");
    }
    if entry.commands.is_empty() {
        bail!("command set {index} has no commands");
    }

    let patterns = entry
        .patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("compiling pattern `{p}` in command set {index}")))
        .collect::<Result<Vec<_>>>()?;

    let name = entry.description.unwrap_or_else(|| format!("cmdset {index}"));

    Ok(CommandSet {
        name,
        on_flags,
        patterns,
        commands: entry.commands,
        elapsed_ms: AtomicU64::new(0),
    })
}

fn parse_flags(tags: &[String]) -> TriggerFlags {
    let mut flags = TriggerFlags::empty();
    for tag in tags {
        match tag.as_str() {
            "new" => flags |= TriggerFlags::NEW,
            "mod" => flags |= TriggerFlags::MOD,
            "del" => flags |= TriggerFlags::DEL,
            "nop" => flags |= TriggerFlags::NOP,
            other => log::warn!("unknown trigger flag name `{other}`"),
        }
    }
    flags
}

/// True iff any entry's patterns match `path` — used by the filter callback
/// that excludes "junk" files (no command-set interest) from the walk.
pub fn match_any(sets: &[CommandSet], path: &str) -> bool {
    sets.iter().any(|s| s.matches(path))
}
