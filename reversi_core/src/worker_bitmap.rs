//! O(1) idle-worker detection, shared by every worker thread.
//!
//! One bit per worker across up to 1024 workers (§4.4). Each worker only
//! ever flips its own bit, so no CAS loop is needed for `set_busy`/`set_idle`
//! — a plain atomic OR/AND suffices — while `idle_count` is read by any
//! worker deciding whether to spawn subtasks (§4.7).

use std::sync::atomic::{AtomicU64, Ordering};

/// Number of 64-bit words, giving room for up to 1024 workers.
const WORDS: usize = 16;

pub struct WorkerBitmap {
    words: [AtomicU64; WORDS],
    worker_count: usize,
}

impl WorkerBitmap {
    /// All workers start idle (bit set); a worker clears its bit when it
    /// picks up a Task and sets it again when the task completes.
    pub fn new(worker_count: usize) -> WorkerBitmap {
        assert!(worker_count <= WORDS * 64, "worker_count exceeds bitmap capacity");
        let bitmap = WorkerBitmap {
            words: std::array::from_fn(|_| AtomicU64::new(0)),
            worker_count,
        };
        for id in 0..worker_count {
            bitmap.set_idle(id);
        }
        bitmap
    }

    #[inline]
    fn word_bit(id: usize) -> (usize, u64) {
        (id / 64, 1u64 << (id % 64))
    }

    /// Clears this worker's idle bit. Only ever called by the owning worker.
    #[inline]
    pub fn set_busy(&self, id: usize) {
        let (word, bit) = Self::word_bit(id);
        self.words[word].fetch_and(!bit, Ordering::Relaxed);
    }

    /// Sets this worker's idle bit. Only ever called by the owning worker.
    #[inline]
    pub fn set_idle(&self, id: usize) {
        let (word, bit) = Self::word_bit(id);
        self.words[word].fetch_or(bit, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_idle(&self, id: usize) -> bool {
        let (word, bit) = Self::word_bit(id);
        self.words[word].load(Ordering::Relaxed) & bit != 0
    }

    /// Number of workers currently marked idle. A relaxed snapshot: by the
    /// time a caller acts on it, the real count may already have moved —
    /// acceptable, since it only ever feeds heuristic spawn decisions
    /// (§4.7), never a correctness-bearing choice.
    pub fn idle_count(&self) -> usize {
        self.words.iter().map(|w| w.load(Ordering::Relaxed).count_ones() as usize).sum()
    }

    #[inline]
    pub fn has_idle(&self) -> bool {
        self.idle_count() > 0
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Fraction of workers idle, in the `0..=100` range used by the spawn
    /// relaxation ladder (§4.7).
    pub fn idle_percent(&self) -> u32 {
        if self.worker_count == 0 {
            return 0;
        }
        (self.idle_count() * 100 / self.worker_count) as u32
    }
}
