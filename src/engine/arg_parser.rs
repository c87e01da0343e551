//! Command-line surface, ported 1:1 from the original `getopt` flags
//! (`main.c:parseinitargs`) with both long and short forms via `clap` derive
//! — the original only had short flags; long ones are an idiomatic addition
//! that doesn't change defaults or semantics.

use std::path::PathBuf;

use clap::Parser;

use crate::utils::config::{
    DEFAULT_CONFIG_FILENAME, DEFAULT_INDEX_FILENAME, DEFAULT_LOCKFILE_FILENAME, DEFAULT_THREADS,
};

/// Directory-tree change detector and reactive command runner.
#[derive(Clone, Parser)]
#[command(name = "fsautoproc")]
#[command(about = "Diff a directory tree against a saved index and run configured commands for new/modified/deleted files.")]
pub struct Cli {
    /// Path to the command-set JSON config.
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Path to the index file. Default: `<search-dir>/index.dat`.
    #[arg(long, short = 'i')]
    pub index: Option<PathBuf>,

    /// Directory to walk and index.
    #[arg(long, short = 's', default_value = ".")]
    pub search_dir: PathBuf,

    /// Number of worker threads.
    #[arg(long, short = 't', default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Track every file, not just ones matched by a command set.
    #[arg(long, short = 'j')]
    pub include_junk: bool,

    /// Print a per-command-set elapsed-time summary after the run.
    #[arg(long, short = 'l')]
    pub list_spent: bool,

    /// Redirect each worker's command stdout/stderr to per-worker log files
    /// in the search directory instead of inheriting the process's own.
    #[arg(long, short = 'p')]
    pub pipe_files: bool,

    /// Print which command sets match FILE, then exit without touching the
    /// index or running anything.
    #[arg(long, short = 'r', value_name = "FILE")]
    pub trace: Option<String>,

    /// Refresh the index without executing any commands.
    #[arg(long, short = 'u')]
    pub update_only: bool,

    /// Verbose logging (echoes each command before running it).
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Path to the lockfile. Default: `<search-dir>/fsautoproc.lock`.
    #[arg(long, short = 'x')]
    pub lockfile: Option<PathBuf>,
}

impl Cli {
    pub fn index_path(&self) -> PathBuf {
        self.index
            .clone()
            .unwrap_or_else(|| self.search_dir.join(DEFAULT_INDEX_FILENAME))
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.lockfile
            .clone()
            .unwrap_or_else(|| self.search_dir.join(DEFAULT_LOCKFILE_FILENAME))
    }
}
