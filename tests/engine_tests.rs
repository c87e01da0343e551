//! End-to-end scenarios against a real directory tree.

use std::fs;
use std::io::BufReader;

use fsautoproc::cmdset::{ExecFlags, TriggerFlags};
use fsautoproc::engine::diff::{DiffEngine, NoopHooks};
use fsautoproc::engine::pool::{WorkItem, WorkerPool};
use fsautoproc::index::Index;
use fsautoproc::types::Record;
use std::sync::Arc;

fn cmdset_always(on: TriggerFlags, commands: &[&str]) -> Arc<Vec<fsautoproc::cmdset::CommandSet>> {
    Arc::new(vec![fsautoproc::cmdset::CommandSet {
        name: "t".into(),
        on_flags: on,
        patterns: vec![regex::Regex::new(".*").unwrap()],
        commands: commands.iter().map(|s| s.to_string()).collect(),
        elapsed_ms: std::sync::atomic::AtomicU64::new(0),
    }])
}

#[test]
fn fresh_directory_is_all_new() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    fs::write(dir.path().join("b.txt"), b"b").unwrap();

    let engine = DiffEngine::new(Index::new(), |_| true, NoopHooks, None);
    let (index, stats) = engine.run(dir.path()).unwrap();

    assert_eq!(stats.new, 2);
    assert_eq!(stats.modified, 0);
    assert_eq!(stats.deleted, 0);
    assert_eq!(index.len(), 2);
}

#[test]
fn modified_files_are_detected_against_prior_index() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    fs::write(&file, b"one").unwrap();

    let engine = DiffEngine::new(Index::new(), |_| true, NoopHooks, None);
    let (first, _) = engine.run(dir.path()).unwrap();

    // Ensure mtime actually advances on filesystems with coarse resolution.
    std::thread::sleep(std::time::Duration::from_millis(20));
    fs::write(&file, b"one-but-longer").unwrap();

    let engine2 = DiffEngine::new(first, |_| true, NoopHooks, None);
    let (_second, stats) = engine2.run(dir.path()).unwrap();
    assert_eq!(stats.modified, 1);
    assert_eq!(stats.new, 0);
}

#[test]
fn deleted_files_are_detected_against_prior_index() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("gone.txt");
    fs::write(&file, b"x").unwrap();

    let engine = DiffEngine::new(Index::new(), |_| true, NoopHooks, None);
    let (first, _) = engine.run(dir.path()).unwrap();

    fs::remove_file(&file).unwrap();

    let engine2 = DiffEngine::new(first, |_| true, NoopHooks, None);
    let (second, stats) = engine2.run(dir.path()).unwrap();
    assert_eq!(stats.deleted, 1);
    assert!(second.find(file.to_str().unwrap()).is_none());
}

#[test]
fn mixed_changes_are_all_classified_independently() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stays.txt"), b"x").unwrap();
    fs::write(dir.path().join("changes.txt"), b"x").unwrap();
    fs::write(dir.path().join("leaves.txt"), b"x").unwrap();

    let engine = DiffEngine::new(Index::new(), |_| true, NoopHooks, None);
    let (first, _) = engine.run(dir.path()).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    fs::write(dir.path().join("changes.txt"), b"different content").unwrap();
    fs::remove_file(dir.path().join("leaves.txt")).unwrap();
    fs::write(dir.path().join("arrives.txt"), b"new").unwrap();

    let engine2 = DiffEngine::new(first, |_| true, NoopHooks, None);
    let (_second, stats) = engine2.run(dir.path()).unwrap();
    assert_eq!(stats.nop, 1, "stays.txt is untouched");
    assert_eq!(stats.modified, 1, "changes.txt's content changed");
    assert_eq!(stats.deleted, 1, "leaves.txt was removed");
    assert_eq!(stats.new, 1, "arrives.txt is brand new");
}

#[test]
fn commands_create_files_discovered_silently_in_the_same_run() {
    let dir = tempfile::tempdir().unwrap();
    let generated = dir.path().join("generated.txt");
    fs::write(dir.path().join("trigger.txt"), b"go").unwrap();

    let cmdsets = cmdset_always(TriggerFlags::NEW, &[&format!("touch {}", generated.display())]);
    let pool = WorkerPool::start(1, None).unwrap();

    struct DispatchAll<'a> {
        pool: &'a WorkerPool,
        cmdsets: Arc<Vec<fsautoproc::cmdset::CommandSet>>,
    }
    impl fsautoproc::engine::diff::Hooks for DispatchAll<'_> {
        fn on_new(&mut self, r: &Record) {
            self.pool.queue(WorkItem {
                cmdsets: self.cmdsets.clone(),
                record: r.clone(),
                trig: TriggerFlags::NEW,
                opts: ExecFlags::empty(),
            });
        }
    }

    let hooks = DispatchAll {
        pool: &pool,
        cmdsets,
    };
    let mut engine = DiffEngine::new(Index::new(), |_| true, hooks, None);
    let mut stats = engine.run_until_barrier(dir.path()).unwrap();
    let updates: Vec<_> = pool.wait().into_iter().map(|u| (u.path, u.stat)).collect();
    let index = engine.finish(dir.path(), &updates, &mut stats).unwrap();
    pool.shutdown().unwrap();

    assert!(index.find(generated.to_str().unwrap()).is_some());
}

#[test]
fn rewriting_the_index_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"a").unwrap();
    fs::write(dir.path().join("sub_b.txt"), b"b").unwrap();

    let engine = DiffEngine::new(Index::new(), |_| true, NoopHooks, None);
    let (index, _) = engine.run(dir.path()).unwrap();

    let mut buf1 = Vec::new();
    index.write(&mut buf1).unwrap();

    let reloaded = Index::read(BufReader::new(std::io::Cursor::new(buf1.clone()))).unwrap();
    let mut buf2 = Vec::new();
    reloaded.write(&mut buf2).unwrap();

    assert_eq!(buf1, buf2, "writing an index read straight back is byte-identical");
}
