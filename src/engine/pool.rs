//! Fixed-size worker pool with a stage barrier.
//!
//! Ports `tp.c`'s thread pool contract — N workers pull [`WorkItem`]s off a
//! shared queue and run them through [`executor::exec`] — but trades the
//! original's atomic-spin-lock reservation scheme for a bounded
//! `crossbeam_channel` plus an `Arc<(Mutex<usize>, Condvar)>` in-flight
//! counter. spec.md §9 explicitly allows this: the externally observable
//! contract (`queue` never blocks the producer forever, `wait` returns only
//! once every queued item has finished) is preserved; the literal spin-lock
//! is not.
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded};

use crate::cmdset::{CommandSet, ExecFlags, TriggerFlags};
use crate::engine::executor::{self, FdSet, OutputSink};
use crate::types::{Record, Stat, stat_path};

/// One unit of dispatchable work: a record snapshot plus the flags it was
/// scheduled under.
pub struct WorkItem {
    pub cmdsets: Arc<Vec<CommandSet>>,
    pub record: Record,
    pub trig: TriggerFlags,
    pub opts: ExecFlags,
}

/// A (path, new-stat) pair sent back from a worker after running NEW/MOD
/// commands, so the producer thread can fold the post-command stat back into
/// its owned index without sharing mutable state across threads.
pub struct StatUpdate {
    pub path: String,
    pub stat: Stat,
}

struct InFlight {
    mutex: Mutex<usize>,
    condvar: Condvar,
}

impl InFlight {
    fn new() -> Self {
        InFlight {
            mutex: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    fn inc(&self) {
        let mut n = self.mutex.lock().unwrap();
        *n += 1;
    }

    fn dec_and_notify(&self) {
        let mut n = self.mutex.lock().unwrap();
        *n -= 1;
        if *n == 0 {
            self.condvar.notify_all();
        }
    }

    fn wait_for_zero(&self) {
        let mut n = self.mutex.lock().unwrap();
        while *n != 0 {
            n = self.condvar.wait(n).unwrap();
        }
    }
}

/// A fixed-size pool of worker threads executing [`WorkItem`]s, with a log
/// file per worker when `log_dir` is set (matching the original's per-worker
/// `stdout.N.log`/`stderr.N.log` convention).
pub struct WorkerPool {
    tx: Sender<WorkItem>,
    update_rx: Receiver<StatUpdate>,
    in_flight: Arc<InFlight>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `n` worker threads. `log_dir` being `Some` redirects each
    /// worker's command stdout/stderr to `log_dir/stdout.<id>.log` and
    /// `stderr.<id>.log` (truncated at startup); `None` inherits the
    /// process's own stdout/stderr.
    pub fn start(n: usize, log_dir: Option<PathBuf>) -> Result<Self> {
        assert!(n > 0, "worker pool must have at least one thread");
        let (tx, rx) = bounded::<WorkItem>(n * 4);
        let (update_tx, update_rx) = crossbeam_channel::unbounded::<StatUpdate>();
        let in_flight = Arc::new(InFlight::new());

        let mut handles = Vec::with_capacity(n);
        for id in 0..n {
            let rx = rx.clone();
            let update_tx = update_tx.clone();
            let in_flight = in_flight.clone();
            let fds = open_fds(id, log_dir.as_deref())?;
            handles.push(
                std::thread::Builder::new()
                    .name(format!("fsautoproc-worker-{id}"))
                    .spawn(move || worker_loop(id, rx, update_tx, in_flight, fds))?,
            );
        }

        Ok(WorkerPool {
            tx,
            update_rx,
            in_flight,
            handles,
        })
    }

    /// Queues `item`. Blocks (applying back-pressure to the producer) if
    /// every worker is currently busy and the channel is at capacity.
    pub fn queue(&self, item: WorkItem) {
        self.in_flight.inc();
        // tx.send only fails if every worker thread has exited, which only
        // happens after shutdown(); queue() must not be called afterward.
        self.tx.send(item).expect("worker pool is shut down");
    }

    /// Blocks until every queued item so far has completed, then drains and
    /// returns the accumulated stat updates. This is the stage barrier the
    /// diff engine calls between its pre-pass and post-pass.
    pub fn wait(&self) -> Vec<StatUpdate> {
        self.in_flight.wait_for_zero();
        self.update_rx.try_iter().collect()
    }

    /// Waits for outstanding work, then joins every worker thread. No more
    /// `queue` calls are valid afterward.
    pub fn shutdown(mut self) -> Result<()> {
        self.in_flight.wait_for_zero();
        let (tx, handles) = (self.tx, std::mem::take(&mut self.handles));
        drop(tx);
        for h in handles {
            h.join().expect("worker thread panicked");
        }
        Ok(())
    }
}

fn open_log_file(path: &std::path::Path) -> Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
        .with_context(|| format!("creating log file {path:?}"))
}

fn open_fds(id: usize, log_dir: Option<&std::path::Path>) -> Result<FdSet> {
    let Some(dir) = log_dir else {
        return Ok(FdSet::inherit());
    };
    let out = open_log_file(&dir.join(format!("stdout.{id}.log")))?;
    let err = open_log_file(&dir.join(format!("stderr.{id}.log")))?;
    Ok(FdSet {
        out: OutputSink::File(out),
        err: OutputSink::File(err),
    })
}

fn worker_loop(
    id: usize,
    rx: Receiver<WorkItem>,
    update_tx: Sender<StatUpdate>,
    in_flight: Arc<InFlight>,
    fds: FdSet,
) {
    while let Ok(item) = rx.recv() {
        match executor::exec(&item.cmdsets, &item.record, &fds, item.trig, item.opts) {
            Ok(status) if status != 0 => {
                log::warn!(
                    "worker {id}: command set for {} exited {status}",
                    item.record.path
                );
            }
            Ok(_) => {}
            Err(e) => log::error!("worker {id}: {e:#}"),
        }

        if item.trig.intersects(TriggerFlags::NEW | TriggerFlags::MOD) {
            match stat_path(std::path::Path::new(&item.record.path)) {
                Ok(stat) => {
                    let _ = update_tx.send(StatUpdate {
                        path: item.record.path.clone(),
                        stat,
                    });
                }
                Err(e) => log::error!(
                    "worker {id}: re-stat of {} failed after commands: {e}",
                    item.record.path
                ),
            }
        }

        in_flight.dec_and_notify();
    }
}
