//! CLI-facing orchestrator.
//!
//! Ports `main.c`: acquires the lock, loads the prior index, parses the
//! command-set table, starts the worker pool, runs the diff engine with
//! hooks that dispatch into the pool (`trigfileevent`/`onnew`/`onmod`/
//! `ondel`/`onnop`), waits at the stage barrier, writes the updated index,
//! and optionally prints the per-command-set elapsed-time summary.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cmdset::{self, CommandSet, ExecFlags, TriggerFlags};
use crate::engine::diff::{DiffEngine, DiffStats, Hooks, NoopHooks};
use crate::engine::pool::{WorkItem, WorkerPool};
use crate::engine::progress::ProgressBar;
use crate::index::Index;
use crate::lock::FileLock;
use crate::types::Record;

use super::arg_parser::Cli;

/// Fully-resolved run configuration (CLI defaults already applied).
pub struct RunOptions {
    pub config_path: std::path::PathBuf,
    pub index_path: std::path::PathBuf,
    pub search_dir: std::path::PathBuf,
    pub lockfile_path: std::path::PathBuf,
    pub threads: usize,
    pub include_junk: bool,
    pub list_spent: bool,
    pub pipe_files: bool,
    pub trace: Option<String>,
    pub update_only: bool,
    pub verbose: bool,
}

impl From<&Cli> for RunOptions {
    fn from(cli: &Cli) -> Self {
        RunOptions {
            config_path: cli.config.clone(),
            index_path: cli.index_path(),
            search_dir: cli.search_dir.clone(),
            lockfile_path: cli.lockfile_path(),
            threads: cli.threads.max(1),
            include_junk: cli.include_junk,
            list_spent: cli.list_spent,
            pipe_files: cli.pipe_files,
            trace: cli.trace.clone(),
            update_only: cli.update_only,
            verbose: cli.verbose,
        }
    }
}

/// Hooks implementation that dispatches every classified file into a
/// [`WorkerPool`] as a [`WorkItem`], matching the original's
/// `trigfileevent` dispatch table.
struct DispatchHooks<'a> {
    pool: &'a WorkerPool,
    cmdsets: Arc<Vec<CommandSet>>,
    opts: ExecFlags,
}

impl DispatchHooks<'_> {
    fn dispatch(&self, trig: TriggerFlags, record: &Record) {
        self.pool.queue(WorkItem {
            cmdsets: self.cmdsets.clone(),
            record: record.clone(),
            trig,
            opts: self.opts,
        });
    }
}

impl Hooks for DispatchHooks<'_> {
    fn on_new(&mut self, record: &Record) {
        self.dispatch(TriggerFlags::NEW, record);
    }
    fn on_mod(&mut self, record: &Record) {
        self.dispatch(TriggerFlags::MOD, record);
    }
    fn on_del(&mut self, record: &Record) {
        self.dispatch(TriggerFlags::DEL, record);
    }
    fn on_nop(&mut self, record: &Record) {
        self.dispatch(TriggerFlags::NOP, record);
    }
}

/// Runs the whole program once, per the resolved `opts`.
pub fn run(opts: &RunOptions) -> Result<()> {
    if let Some(file) = &opts.trace {
        return run_trace(opts, file);
    }

    let _lock = FileLock::acquire(&opts.lockfile_path)?;

    let cmdsets = Arc::new(
        cmdset::parse(&opts.config_path)
            .with_context(|| format!("parsing config {:?}", opts.config_path))?,
    );
    let lastmap = load_prior_index(&opts.index_path)?;
    let filter = make_filter(cmdsets.clone(), opts.include_junk);
    let total = count_files(&opts.search_dir, &filter)?;
    let mut progress = ProgressBar::new(total);

    let (index, stats) = if opts.update_only {
        log::info!("update-only: refreshing index without running commands");
        let engine = DiffEngine::new(lastmap, filter, NoopHooks, Some(&mut progress));
        engine.run(&opts.search_dir)?
    } else {
        let exec_opts = if opts.verbose {
            ExecFlags::VERBOSE
        } else {
            ExecFlags::empty()
        };
        let log_dir = opts.pipe_files.then(|| opts.search_dir.clone());
        let pool = WorkerPool::start(opts.threads, log_dir)?;
        let hooks = DispatchHooks {
            pool: &pool,
            cmdsets: cmdsets.clone(),
            opts: exec_opts,
        };

        let mut engine = DiffEngine::new(lastmap, filter, hooks, Some(&mut progress));
        let mut stats = engine.run_until_barrier(&opts.search_dir)?;
        let updates: Vec<_> = pool
            .wait()
            .into_iter()
            .map(|u| (u.path, u.stat))
            .collect();
        let index = engine.finish(&opts.search_dir, &updates, &mut stats)?;
        pool.shutdown()?;
        (index, stats)
    };

    write_index(&index, &opts.index_path)?;
    log_summary(&stats);

    if opts.list_spent {
        print_elapsed(&cmdsets);
    }

    Ok(())
}

fn run_trace(opts: &RunOptions, file: &str) -> Result<()> {
    let cmdsets = cmdset::parse(&opts.config_path)
        .with_context(|| format!("parsing config {:?}", opts.config_path))?;
    let mut matched = 0;
    for (i, set) in cmdsets.iter().enumerate() {
        if set.matches(file) {
            matched += 1;
            println!("cmdset {i} ({}) matches {file}", set.name);
        }
    }
    if matched == 0 {
        println!("no command set matches {file}");
    }
    Ok(())
}

fn make_filter(cmdsets: Arc<Vec<CommandSet>>, include_junk: bool) -> impl Fn(&str) -> bool {
    move |path: &str| include_junk || cmdset::match_any(&cmdsets, path)
}

/// Reads the index at `path`, treating a missing file as an empty prior
/// index (first run) rather than an error.
fn load_prior_index(path: &Path) -> Result<Index> {
    match File::open(path) {
        Ok(f) => Index::read(BufReader::new(f)).with_context(|| format!("reading index {path:?}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Index::new()),
        Err(e) => Err(e).with_context(|| format!("opening index {path:?}")),
    }
}

fn write_index(index: &Index, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating index {path:?}"))?;
    index
        .write(std::io::BufWriter::new(file))
        .with_context(|| format!("writing index {path:?}"))
}

/// Pre-walks the tree once, using the same interest filter as the real diff
/// pass, to give the progress bar a known total up front.
fn count_files(root: &Path, filter: &impl Fn(&str) -> bool) -> Result<u64> {
    let mut queue = crate::dirqueue::DirQueue::new();
    queue.reset(root.to_string_lossy().into_owned());
    let mut count = 0u64;
    while let Some(dir) = queue.pop_front() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("reading directory {dir:?} while counting"))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                queue.push(path.to_string_lossy().into_owned());
            } else if filter(&path.to_string_lossy()) {
                count += 1;
            }
        }
    }
    Ok(count)
}

fn log_summary(stats: &DiffStats) {
    log::info!(
        "{} {} {} {}",
        format!("[+] new: {}", stats.new).green(),
        format!("[*] mod: {}", stats.modified).yellow(),
        format!("[-] del: {}", stats.deleted).red(),
        format!("[n] nop: {}", stats.nop),
    );
}

fn print_elapsed(cmdsets: &[CommandSet]) {
    for set in cmdsets {
        println!("{}: {} ms", set.name, set.elapsed_ms());
    }
}
