//! Mutex-guarded max-heap of [`Chunk`]s, shared by every worker (§4.4).
//!
//! The heap itself needs a real mutex (insertion/removal touches more than
//! one word), but the *priority comparison* workers do before deciding
//! whether it's worth taking that mutex — "is the global top better than my
//! local top?" (§4.7) — is exposed as a plain atomic so it never blocks.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicI32, AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::task::Chunk;

/// Sentinel meaning "queue empty", chosen below any real Task priority
/// (priorities are built from eval scores and small integer boosts, §3, §4.7).
const EMPTY_TOP: i32 = i32::MIN;

pub struct GlobalChunkQueue {
    heap: Mutex<BinaryHeap<Chunk>>,
    top_priority: AtomicI32,
    condvar: Condvar,
    shutdown: AtomicBool,
}

impl GlobalChunkQueue {
    pub fn new() -> GlobalChunkQueue {
        GlobalChunkQueue {
            heap: Mutex::new(BinaryHeap::new()),
            top_priority: AtomicI32::new(EMPTY_TOP),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Lock-free peek, safe to call from the hot acquisition path (§4.7
    /// step 2: "if GlobalChunkQueue.top_priority > LocalHeap.top").
    #[inline]
    pub fn top_priority(&self) -> Option<i32> {
        match self.top_priority.load(Ordering::Relaxed) {
            EMPTY_TOP => None,
            p => Some(p),
        }
    }

    pub fn push(&self, chunk: Chunk) {
        let mut heap = self.heap.lock().unwrap();
        heap.push(chunk);
        self.refresh_top(&heap);
        self.condvar.notify_all();
    }

    /// Pops the single highest-priority chunk.
    pub fn pop(&self) -> Option<Chunk> {
        let mut heap = self.heap.lock().unwrap();
        let chunk = heap.pop();
        self.refresh_top(&heap);
        chunk
    }

    /// Blocks on the condvar until a chunk is pushed, shutdown fires, or
    /// `timeout` elapses (§4.7 step 3, §5's 5 ms suspension point), then
    /// returns whatever is at the top (possibly still nothing).
    pub fn pop_wait(&self, timeout: Duration) -> Option<Chunk> {
        let mut heap = self.heap.lock().unwrap();
        if heap.is_empty() && !self.shutdown.load(Ordering::Relaxed) {
            let (guard, _) = self.condvar.wait_timeout(heap, timeout).unwrap();
            heap = guard;
        }
        let chunk = heap.pop();
        self.refresh_top(&heap);
        chunk
    }

    fn refresh_top(&self, heap: &BinaryHeap<Chunk>) {
        let top = heap.peek().map(|c| c.top_priority).unwrap_or(EMPTY_TOP);
        self.top_priority.store(top, Ordering::Relaxed);
    }

    /// Wakes every worker blocked in [`Self::pop_wait`] so they observe the
    /// shutdown flag promptly (§4.9).
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _heap = self.heap.lock().unwrap();
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GlobalChunkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use crate::types::NodeKind;

    fn chunk(priorities: &[i32]) -> Chunk {
        let tasks = priorities
            .iter()
            .map(|&p| Task::new(0, 0, 0, p, 0, false, NodeKind::Or, 10, 0))
            .collect();
        Chunk::new(tasks)
    }

    #[test]
    fn top_priority_tracks_the_heap() {
        let q = GlobalChunkQueue::new();
        assert_eq!(q.top_priority(), None);
        q.push(chunk(&[5, 2]));
        assert_eq!(q.top_priority(), Some(5));
        q.push(chunk(&[20]));
        assert_eq!(q.top_priority(), Some(20));
        q.pop();
        assert_eq!(q.top_priority(), Some(5));
    }

    #[test]
    fn pop_wait_returns_immediately_when_nonempty() {
        let q = GlobalChunkQueue::new();
        q.push(chunk(&[1]));
        let c = q.pop_wait(Duration::from_millis(5)).unwrap();
        assert_eq!(c.top_priority, 1);
    }

    #[test]
    fn pop_wait_times_out_on_empty_queue() {
        let q = GlobalChunkQueue::new();
        let start = std::time::Instant::now();
        assert!(q.pop_wait(Duration::from_millis(5)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn shutdown_wakes_waiters() {
        let q = std::sync::Arc::new(GlobalChunkQueue::new());
        let q2 = q.clone();
        let handle = std::thread::spawn(move || q2.pop_wait(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(20));
        q.shutdown();
        assert!(handle.join().unwrap().is_none());
    }
}
