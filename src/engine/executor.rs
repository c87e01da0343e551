//! Command executor: match-and-invoke shell commands for a file event.
//!
//! Ports `lcmd.c`'s `lcmdexec`/`lcmdinvoke`: walks the command-set table in
//! order, skips entries whose trigger flags or patterns don't match, and
//! (unless tracing) runs each matching entry's commands in sequence via a
//! POSIX shell, stopping at the first non-zero exit.

use std::fs::File;
use std::io;
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::cmdset::{CommandSet, ExecFlags, TriggerFlags};
use crate::types::Record;

/// Output redirection target for a child command's stdout/stderr.
pub enum OutputSink {
    /// Inherit the current process's stdout/stderr (the default).
    Inherit,
    /// Redirect to a dedicated, already-open file (per-worker log file).
    File(File),
}

impl OutputSink {
    fn to_stdio(&self) -> io::Result<Stdio> {
        match self {
            OutputSink::Inherit => Ok(Stdio::inherit()),
            OutputSink::File(f) => Ok(Stdio::from(f.try_clone()?)),
        }
    }
}

/// The pair of output sinks a worker thread owns for the lifetime of the
/// pool, matching `struct fdset_s` in `fd.h`.
pub struct FdSet {
    pub out: OutputSink,
    pub err: OutputSink,
}

impl FdSet {
    pub fn inherit() -> Self {
        FdSet {
            out: OutputSink::Inherit,
            err: OutputSink::Inherit,
        }
    }
}

/// Runs every command-set entry matching `trig` and `record.path`, in order.
/// Returns the first non-zero exit status encountered (which also halts
/// processing of that entry and all subsequent entries for this record), or
/// `Ok(0)` if every matching entry's commands succeeded.
///
/// When `opts` contains [`ExecFlags::TRACE`], no commands are executed —
/// each entry just logs whether it matched.
pub fn exec(
    cmdsets: &[CommandSet],
    record: &Record,
    fds: &FdSet,
    trig: TriggerFlags,
    opts: ExecFlags,
) -> Result<i32> {
    for (i, set) in cmdsets.iter().enumerate() {
        if !set.on_flags.intersects(trig) {
            if opts.contains(ExecFlags::TRACE) {
                log::info!("cmdset {i} ({}) ignored flags: {trig:?}", set.name);
            }
            continue;
        }
        if !set.matches(&record.path) {
            if opts.contains(ExecFlags::TRACE) {
                log::info!("cmdset {i} ({}) ignored path: {}", set.name, record.path);
            }
            continue;
        }
        if opts.contains(ExecFlags::TRACE) {
            log::info!(
                "cmdset {i} ({}) matched: {} (flags {:?})",
                set.name,
                record.path,
                set.on_flags
            );
            continue; // trace never executes
        }

        let start = Instant::now();
        for cmd in &set.commands {
            let status = invoke_one(cmd, record, fds, opts)
                .with_context(|| format!("executing command `{cmd}` for `{}`", record.path))?;
            if status != 0 {
                set.add_elapsed_ms(start.elapsed().as_millis() as u64);
                return Ok(status);
            }
        }
        set.add_elapsed_ms(start.elapsed().as_millis() as u64);
    }
    Ok(0)
}

/// Runs a single shell command via `sh -c`, with `FILEPATH` set to the
/// record's path and stdout/stderr redirected through `fds`. Never
/// tokenizes `cmd` itself — the shell does that.
fn invoke_one(cmd: &str, record: &Record, fds: &FdSet, opts: ExecFlags) -> Result<i32> {
    if opts.contains(ExecFlags::VERBOSE) {
        log::info!("[x] {cmd}");
    }

    let status = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .env("FILEPATH", &record.path)
        .stdout(fds.out.to_stdio().context("redirecting stdout")?)
        .stderr(fds.err.to_stdio().context("redirecting stderr")?)
        .status()
        .with_context(|| format!("spawning shell for `{cmd}`"))?;

    let code = status.code().unwrap_or(-1);
    if code != 0 {
        log::error!("command `{cmd}` returned {code}");
    }
    Ok(code)
}
