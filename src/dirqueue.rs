//! Directory path queue driving one diff-engine stage's breadth-first walk.
//!
//! Single-threaded, owned by whichever stage is currently walking — no
//! synchronization needed, since the producer never hands the queue to a
//! worker thread.

use std::collections::VecDeque;

#[derive(Default)]
pub struct DirQueue {
    inner: VecDeque<String>,
}

impl DirQueue {
    pub fn new() -> Self {
        DirQueue::default()
    }

    /// Resets the queue to contain only `root`.
    pub fn reset(&mut self, root: impl Into<String>) {
        self.inner.clear();
        self.inner.push_back(root.into());
    }

    pub fn push(&mut self, dir: impl Into<String>) {
        self.inner.push_back(dir.into());
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.inner.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = DirQueue::new();
        q.reset("root");
        q.push("a");
        q.push("b");
        assert_eq!(q.pop_front().as_deref(), Some("root"));
        assert_eq!(q.pop_front().as_deref(), Some("a"));
        assert_eq!(q.pop_front().as_deref(), Some("b"));
        assert!(q.pop_front().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn reset_clears_prior_contents() {
        let mut q = DirQueue::new();
        q.push("stale");
        q.reset("root");
        assert_eq!(q.pop_front().as_deref(), Some("root"));
        assert!(q.is_empty());
    }
}
