//! Hybrid task acquisition policy (§4.7) tying the three queues together.
//!
//! Everything here is called from [`crate::worker::worker_loop`] between
//! searches; it never touches [`crate::engine`]'s recursion directly.

use std::time::Duration;

use crate::engine::WorkerContext;
use crate::root::SharedState;
use crate::task::{Chunk, Task, CHUNK_SIZE};

/// §4.7's "fast-sharing... active when any worker is idle or when
/// busy-count is below a configured fraction of the pool". We use "any
/// worker idle" directly since [`crate::worker_bitmap::WorkerBitmap`]
/// already tracks exactly that at O(1).
fn fast_sharing_mode(shared: &SharedState) -> bool {
    shared.worker_bitmap.has_idle()
}

/// Moves the next 16 top-priority tasks out of the LocalHeap and into a
/// GlobalChunkQueue chunk, per §4.7's "chunked export" rule. Keeps
/// exporting while the heap still holds at least `CHUNK_SIZE+1` tasks *and*
/// the global queue is either empty or no better than the local top, so a
/// worker doesn't strip itself down only to immediately need to import the
/// very chunk it just gave away.
pub fn export_if_needed(ctx: &mut WorkerContext, shared: &SharedState) {
    loop {
        if ctx.local_heap.len() < CHUNK_SIZE + 4 {
            return;
        }
        let local_top = ctx.local_heap.top_priority();
        let global_top = shared.global_queue.top_priority();
        if let (Some(local_top), Some(global_top)) = (local_top, global_top) {
            if global_top > local_top {
                return;
            }
        }
        let exported = ctx.local_heap.pop_top(CHUNK_SIZE);
        if exported.is_empty() {
            return;
        }
        shared.global_queue.push(Chunk::new(exported));
    }
}

/// One acquisition attempt, non-blocking (§4.7's acquisition order, steps 1
/// and 2). Returns `None` if every tier came up empty.
fn try_acquire(ctx: &mut WorkerContext, shared: &SharedState) -> Option<Task> {
    if fast_sharing_mode(shared) {
        if let Some(t) = ctx.local_heap.pop() {
            return Some(t);
        }
        return shared.shared_array.pop();
    }

    let local_top = ctx.local_heap.top_priority();
    let global_top = shared.global_queue.top_priority();
    if let Some(global_top) = global_top {
        if local_top.is_none_or(|local_top| global_top > local_top) {
            if let Some(chunk) = shared.global_queue.pop() {
                let mut tasks = chunk.into_tasks();
                let first = tasks.remove(0);
                for t in tasks {
                    let _ = ctx.local_heap.push(t);
                }
                return Some(first);
            }
        }
    }
    if let Some(t) = ctx.local_heap.pop() {
        return Some(t);
    }
    if let Some(chunk) = shared.global_queue.pop() {
        let mut tasks = chunk.into_tasks();
        let first = tasks.remove(0);
        for t in tasks {
            let _ = ctx.local_heap.push(t);
        }
        return Some(first);
    }
    shared.shared_array.pop()
}

/// Timeout for the blocking wait in §4.7 step 3 / §5's "suspension points".
const BLOCK_TIMEOUT: Duration = Duration::from_millis(5);

/// Acquires the next [`Task`] for this worker to run, blocking (with a 5 ms
/// timeout) only once every tier has come up empty. Returns `None` exactly
/// when shutdown has fired and there is still nothing to do.
pub fn acquire_task(ctx: &mut WorkerContext, shared: &SharedState) -> Option<Task> {
    loop {
        if let Some(task) = try_acquire(ctx, shared) {
            return Some(task);
        }
        if shared.is_shutdown() {
            return None;
        }
        // Parks on the GlobalChunkQueue's condvar; a push, a shutdown, or
        // the timeout all wake us to retry every tier again.
        if let Some(chunk) = shared.global_queue.pop_wait(BLOCK_TIMEOUT) {
            let mut tasks = chunk.into_tasks();
            let first = tasks.remove(0);
            for t in tasks {
                let _ = ctx.local_heap.push(t);
            }
            return Some(first);
        }
        if shared.is_shutdown() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_chunk_queue::GlobalChunkQueue;
    use crate::shared_task_array::SharedTaskArray;
    use crate::transposition_table::TranspositionTable;
    use crate::types::NodeKind;
    use crate::worker_bitmap::WorkerBitmap;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;

    fn task(priority: i32) -> Task {
        Task::new(0, 0, 0, priority, 0, false, NodeKind::Or, 10, 0)
    }

    fn shared_with(worker_count: usize) -> SharedState {
        SharedState {
            tt: TranspositionTable::new(1),
            global_queue: GlobalChunkQueue::new(),
            shared_array: SharedTaskArray::new(64),
            worker_bitmap: WorkerBitmap::new(worker_count),
            root_moves: crate::root::RootMoveTable::new(&[]),
            shutdown: AtomicBool::new(false),
            found_win: AtomicBool::new(false),
            winning_move: AtomicUsize::new(usize::MAX),
            start_time: Instant::now(),
            time_limit: None,
            options: crate::options::SolverOptions::default(),
        }
    }

    #[test]
    fn fast_sharing_drains_local_before_shared_array() {
        let shared = shared_with(2); // worker_count 2, both start idle
        let mut ctx = WorkerContext::new(0);
        ctx.local_heap.push(task(5));
        shared.shared_array.push(task(9));
        let acquired = acquire_task(&mut ctx, &shared).unwrap();
        assert_eq!(acquired.priority, 5);
    }

    #[test]
    fn contention_mode_prefers_global_chunk_when_better() {
        let shared = shared_with(1);
        shared.worker_bitmap.set_busy(0); // no idle workers -> contention mode
        let mut ctx = WorkerContext::new(0);
        ctx.local_heap.push(task(3));
        shared.global_queue.push(Chunk::new(vec![task(20), task(10)]));
        let acquired = acquire_task(&mut ctx, &shared).unwrap();
        assert_eq!(acquired.priority, 20);
        // The chunk's remaining task landed in the local heap.
        assert_eq!(ctx.local_heap.len(), 2);
    }

    #[test]
    fn acquire_returns_none_on_shutdown_with_nothing_queued() {
        let shared = shared_with(1);
        shared.request_shutdown();
        let mut ctx = WorkerContext::new(0);
        assert!(acquire_task(&mut ctx, &shared).is_none());
    }

    #[test]
    fn export_moves_a_chunks_worth_once_past_threshold() {
        let shared = shared_with(1);
        let mut ctx = WorkerContext::new(0);
        for p in 0..(CHUNK_SIZE as i32 + 5) {
            ctx.local_heap.push(task(p));
        }
        export_if_needed(&mut ctx, &shared);
        assert_eq!(shared.global_queue.len(), 1);
        assert!(ctx.local_heap.len() < CHUNK_SIZE + 5);
    }
}
