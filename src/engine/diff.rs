//! Directory diff engine: the three-stage walk that drives the whole run.
//!
//! Ports `deng.c`'s `fswalk` contract. Each stage is a breadth-first walk
//! over [`DirQueue`], hand-rolled rather than delegated to a crate like
//! `walkdir`/`jwalk`/`ignore`: the directory-queue-driven,
//! stage-barrier-synchronized structure *is* the behavior this module
//! specifies, not an implementation detail a generic walker could stand in
//! for.
//!
//! - **pre-pass**: walk the tree, diff every file against the prior index
//!   (`lastmap`), classify NEW/MOD/NOP, and fire the matching hook.
//! - **removal sweep**: anything in `lastmap` absent from the freshly built
//!   index (`thismap`) is DEL.
//! - **post-pass**: after the caller's barrier, re-walk once more. A path
//!   already in `thismap` gets its stat silently corrected (no hook fires —
//!   the NEW/MOD hook for it already fired in the pre-pass). A path a
//!   just-run command created is genuinely new to this run, so it fires
//!   `on_new` and is tallied, same as the pre-pass.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::dirqueue::DirQueue;
use crate::engine::progress::ProgressBar;
use crate::index::Index;
use crate::types::{Record, stat_path};

/// Callbacks the diff engine fires as it classifies each path. Every method
/// has a no-op default, mirroring the original's "any hook pointer may be
/// NULL" contract — implement only the ones you need.
pub trait Hooks {
    fn on_new(&mut self, _record: &Record) {}
    fn on_mod(&mut self, _record: &Record) {}
    fn on_del(&mut self, _record: &Record) {}
    fn on_nop(&mut self, _record: &Record) {}
    /// Called once a popped directory's entries have all been processed.
    fn on_dir_done(&mut self, _dir: &str) {}
    /// Called once an entire stage's queue has drained.
    fn on_stage_done(&mut self) {}
}

/// A [`Hooks`] implementation that does nothing; useful for tests that only
/// care about the returned index/stats.
#[derive(Default)]
pub struct NoopHooks;
impl Hooks for NoopHooks {}

/// Tally of events dispatched during a run, surfaced in the end-of-run
/// summary the driver prints.
#[derive(Default, Debug, Clone, Copy)]
pub struct DiffStats {
    pub new: u64,
    pub modified: u64,
    pub nop: u64,
    pub deleted: u64,
}

pub struct DiffEngine<'a, H: Hooks> {
    queue: DirQueue,
    lastmap: Index,
    thismap: Index,
    filter: Box<dyn Fn(&str) -> bool + 'a>,
    hooks: H,
    progress: Option<&'a mut ProgressBar>,
}

impl<'a, H: Hooks> DiffEngine<'a, H> {
    pub fn new(
        lastmap: Index,
        filter: impl Fn(&str) -> bool + 'a,
        hooks: H,
        progress: Option<&'a mut ProgressBar>,
    ) -> Self {
        DiffEngine {
            queue: DirQueue::new(),
            lastmap,
            thismap: Index::new(),
            filter: Box::new(filter),
            hooks,
            progress,
        }
    }

    /// Runs stage 1 (pre-pass) and stage 2 (removal sweep), then hands back
    /// control to the caller so it can block on its own stage barrier (e.g.
    /// a worker pool's `wait()`) before [`DiffEngine::finish`] runs stage 3.
    pub fn run_until_barrier(&mut self, root: &Path) -> Result<DiffStats> {
        let mut stats = DiffStats::default();
        self.stage_pre(root, &mut stats)?;
        self.stage_checkremoved(&mut stats);
        Ok(stats)
    }

    /// Applies any post-barrier stat corrections (e.g. from a worker pool
    /// that re-stats a file after running NEW/MOD commands on it), runs
    /// stage 3, and returns the finished index. `stats` is the same tally
    /// [`DiffEngine::run_until_barrier`] returned — stage 3 folds its own
    /// NEW events into it.
    pub fn finish(
        mut self,
        root: &Path,
        stat_updates: &[(String, crate::types::Stat)],
        stats: &mut DiffStats,
    ) -> Result<Index> {
        for (path, stat) in stat_updates {
            if let Some(r) = self.thismap.find_mut(path) {
                r.stat = *stat;
            }
        }
        self.stage_post(root, stats)?;
        if let Some(pb) = &self.progress {
            pb.finish();
        }
        Ok(self.thismap)
    }

    /// Convenience for callers with no stage barrier of their own (e.g.
    /// `--update-only`, or tests): runs all three stages back to back.
    pub fn run(mut self, root: &Path) -> Result<(Index, DiffStats)> {
        let mut stats = self.run_until_barrier(root)?;
        let index = self.finish(root, &[], &mut stats)?;
        Ok((index, stats))
    }

    fn interesting(&self, path: &str) -> bool {
        (self.filter)(path)
    }

    fn stage_pre(&mut self, root: &Path, stats: &mut DiffStats) -> Result<()> {
        self.queue.reset(root.to_string_lossy().into_owned());
        while let Some(dir) = self.queue.pop_front() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("reading directory {dir:?} during pre-pass"))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("reading entry in {dir:?}"))?;
                let path = entry.path();
                let path_str = path.to_string_lossy().into_owned();

                if path.is_dir() {
                    self.queue.push(path_str);
                    continue;
                }
                if !self.interesting(&path_str) {
                    continue;
                }

                let stat = stat_path(&path)
                    .with_context(|| format!("stat {path_str} during pre-pass"))?;

                let record = Record::new(path_str.clone(), stat);
                match self.lastmap.find(&path_str) {
                    None => {
                        stats.new += 1;
                        self.hooks.on_new(&record);
                    }
                    Some(prev) if prev.stat == stat => {
                        stats.nop += 1;
                        self.hooks.on_nop(&record);
                    }
                    Some(_) => {
                        stats.modified += 1;
                        self.hooks.on_mod(&record);
                    }
                }
                self.thismap.put(record);

                if let Some(pb) = &mut self.progress {
                    pb.tick();
                }
            }
            self.hooks.on_dir_done(&dir);
        }
        self.hooks.on_stage_done();
        Ok(())
    }

    fn stage_checkremoved(&mut self, stats: &mut DiffStats) {
        if self.lastmap.is_empty() {
            self.hooks.on_stage_done();
            return;
        }
        let missing: Vec<Record> = self
            .lastmap
            .list()
            .into_iter()
            .filter(|r| self.thismap.find(&r.path).is_none())
            .cloned()
            .collect();
        for record in missing {
            stats.deleted += 1;
            self.hooks.on_del(&record);
        }
        self.hooks.on_stage_done();
    }

    /// Re-walk after the barrier: a path already in `thismap` gets its stat
    /// corrected silently (no hook — its NEW/MOD hook already fired in the
    /// pre-pass). A path not yet in `thismap` is one a just-run command
    /// created, so it's genuinely new to this run: fires `on_new` and is
    /// tallied, matching `deng.c:stagepost`'s `invokehook(mach, new, curr)`.
    fn stage_post(&mut self, root: &Path, stats: &mut DiffStats) -> Result<()> {
        self.queue.reset(root.to_string_lossy().into_owned());
        while let Some(dir) = self.queue.pop_front() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("reading directory {dir:?} during post-pass"))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("reading entry in {dir:?}"))?;
                let path = entry.path();
                let path_str = path.to_string_lossy().into_owned();

                if path.is_dir() {
                    self.queue.push(path_str);
                    continue;
                }
                if !self.interesting(&path_str) {
                    continue;
                }

                let stat = stat_path(&path)
                    .with_context(|| format!("stat {path_str} during post-pass"))?;

                match self.thismap.find_mut(&path_str) {
                    Some(r) => r.stat = stat,
                    None => {
                        let record = Record::new(path_str, stat);
                        stats.new += 1;
                        self.hooks.on_new(&record);
                        self.thismap.put(record);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stat;

    #[derive(Default)]
    struct CountingHooks {
        new: u64,
        modified: u64,
        del: u64,
        nop: u64,
    }
    impl Hooks for CountingHooks {
        fn on_new(&mut self, _r: &Record) {
            self.new += 1;
        }
        fn on_mod(&mut self, _r: &Record) {
            self.modified += 1;
        }
        fn on_del(&mut self, _r: &Record) {
            self.del += 1;
        }
        fn on_nop(&mut self, _r: &Record) {
            self.nop += 1;
        }
    }

    #[test]
    fn classifies_new_mod_nop_del() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unchanged.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("changed.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("new.txt"), b"a").unwrap();

        let mut lastmap = Index::new();
        lastmap.put(Record::new(
            dir.path().join("unchanged.txt").to_str().unwrap(),
            stat_path(&dir.path().join("unchanged.txt")).unwrap(),
        ));
        lastmap.put(Record::new(
            dir.path().join("changed.txt").to_str().unwrap(),
            Stat { mtime_ms: 1, size: 999 },
        ));
        lastmap.put(Record::new(
            dir.path().join("deleted.txt").to_str().unwrap(),
            Stat::default(),
        ));

        let engine = DiffEngine::new(lastmap, |_| true, CountingHooks::default(), None);
        let (thismap, stats) = engine.run(dir.path()).unwrap();

        assert_eq!(stats.new, 1, "new.txt never existed in lastmap");
        assert_eq!(stats.modified, 1, "changed.txt's size differs from lastmap");
        assert_eq!(stats.nop, 1, "unchanged.txt matches lastmap exactly");
        assert_eq!(stats.deleted, 1, "deleted.txt is gone from disk");
        assert!(
            thismap
                .find(dir.path().join("deleted.txt").to_str().unwrap())
                .is_none()
        );
    }

    #[test]
    fn hooks_receive_matching_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();

        let engine = DiffEngine::new(Index::new(), |_| true, CountingHooks::default(), None);
        let (_idx, stats) = engine.run(dir.path()).unwrap();
        assert_eq!(stats.new, 2);
    }

    #[test]
    fn filter_excludes_junk_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), b"fn main() {}").unwrap();
        std::fs::write(dir.path().join("a.tmp"), b"junk").unwrap();

        let engine = DiffEngine::new(
            Index::new(),
            |p: &str| p.ends_with(".rs"),
            NoopHooks,
            None,
        );
        let (thismap, stats) = engine.run(dir.path()).unwrap();
        assert_eq!(stats.new, 1);
        assert_eq!(thismap.len(), 1);
    }

    #[test]
    fn stage_post_fires_on_new_for_command_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("src.txt"), b"trigger").unwrap();

        let mut engine = DiffEngine::new(Index::new(), |_| true, CountingHooks::default(), None);
        let mut stats = engine.run_until_barrier(dir.path()).unwrap();
        assert_eq!(stats.new, 1);

        // Simulate a command creating a file between the barrier and stage 3.
        std::fs::write(dir.path().join("generated.txt"), b"out").unwrap();

        let thismap = engine.finish(dir.path(), &[], &mut stats).unwrap();
        assert!(
            thismap
                .find(dir.path().join("generated.txt").to_str().unwrap())
                .is_some()
        );
        assert_eq!(thismap.len(), 2);
        assert_eq!(stats.new, 2, "the command-generated file counts as new too");
    }

    #[test]
    fn stage_post_silently_corrects_stat_for_already_indexed_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("src.txt");
        std::fs::write(&file, b"trigger").unwrap();

        let mut engine = DiffEngine::new(Index::new(), |_| true, CountingHooks::default(), None);
        let mut stats = engine.run_until_barrier(dir.path()).unwrap();
        assert_eq!(stats.new, 1);

        // Simulate a command rewriting the same file between the barrier and stage 3.
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(&file, b"rewritten by command").unwrap();
        let rewritten_stat = stat_path(&file).unwrap();

        let thismap = engine.finish(dir.path(), &[], &mut stats).unwrap();
        assert_eq!(stats.new, 1, "a re-stat of an already-indexed path fires no hook");
        assert_eq!(thismap.find(file.to_str().unwrap()).unwrap().stat, rewritten_stat);
    }

    #[test]
    fn checkremoved_is_skipped_when_lastmap_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let engine = DiffEngine::new(Index::new(), |_| true, CountingHooks::default(), None);
        let (_idx, stats) = engine.run(dir.path()).unwrap();
        assert_eq!(stats.deleted, 0);
    }
}
