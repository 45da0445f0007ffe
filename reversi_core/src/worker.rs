//! The per-thread main loop (§2's "Control flow", §4.9, §5).
//!
//! Mirrors `threading.rs`'s worker-thread shape in the alpha-beta engine
//! this repository grew out of: one OS thread per [`WorkerContext`],
//! looping acquire → solve → report until [`SharedState`] says to stop.

use std::sync::atomic::Ordering;

use log::{debug, info};

use crate::engine::{self, WorkerContext};
use crate::node::INFINITY;
use crate::root::SharedState;
use crate::scheduler;
use crate::task::Task;
use crate::types::SolveResult;

/// Reports one completed root-move subtree to the shared root-move table
/// (§4.9): CAS the result in exactly once, fold this task's node count into
/// the running total, and latch `found_win` the first time any move proves
/// a Win.
fn report_root_move(shared: &SharedState, root_move: usize, pn: u32, dn: u32, result: SolveResult, nodes_delta: u64) {
    let entry = shared.root_moves.get(root_move);
    entry.nodes_searched.fetch_add(nodes_delta, Ordering::Relaxed);
    if pn == 0 || dn == 0 || (pn >= INFINITY && dn >= INFINITY) {
        entry.try_set_result(result);
        if result == SolveResult::Win {
            shared.try_set_found_win(root_move);
            debug!("root move {root_move} proved Win, signalling early shutdown");
        }
    }
}

/// Runs one [`Task`] to completion (or to preemption/shutdown) and folds
/// its outcome into the shared state. Generation-0 tasks get the full
/// root-task split (§4.7); spawned subtasks are solved directly, each
/// restarting with an unconstrained threshold exactly like a fresh
/// sub-root (§4.5's "Boundary details") since a Task carries no saved
/// threshold state of its own (§3).
fn run_task(ctx: &mut WorkerContext, shared: &SharedState, task: Task) {
    let before = ctx.nodes_visited;

    let (pn, dn, result) = if task.generation == 0 {
        let (pn, dn, result, _eval) = engine::solve_root_task(ctx, shared, &task);
        (pn, dn, result)
    } else {
        let node_ref = ctx.pool.alloc(task.player, task.opponent, task.kind, task.depth);
        {
            let n = ctx.pool.get_mut(node_ref);
            n.eval_score = task.eval_score;
            n.threshold_pn = INFINITY + 1;
            n.threshold_dn = INFINITY + 1;
        }
        engine::solve_node(ctx, shared, node_ref, task.priority, task.root_move, task.generation);
        let n = ctx.pool.get(node_ref);
        (n.pn, n.dn, n.result)
    };

    let nodes_delta = ctx.nodes_visited - before;
    ctx.pool.reset();

    if ctx.should_abort_task {
        // §4.8: preempted mid-search, not proven. Push the whole subtree
        // back in as a fresh Task; TT entries already written for its
        // descendants let the retry skip re-proving what's already settled.
        ctx.should_abort_task = false;
        debug!("worker {} preempted task (root_move={})", ctx.id, task.root_move);
        if !ctx.local_heap.push(task) {
            scheduler::export_if_needed(ctx, shared);
            let _ = ctx.local_heap.push(task);
        }
        return;
    }

    if pn == 0 || dn == 0 || (pn >= INFINITY && dn >= INFINITY) {
        report_root_move(shared, task.root_move, pn, dn, result, nodes_delta);
    } else {
        // Didn't finish (shutdown or found_win fired mid-search): the node
        // counter still needs to land somewhere, the move stays Unknown.
        shared.root_moves.get(task.root_move).nodes_searched.fetch_add(nodes_delta, Ordering::Relaxed);
    }
}

/// One worker's entire lifetime for a solve: acquire, run, repeat until
/// [`scheduler::acquire_task`] returns `None` (shutdown with nothing left).
pub fn worker_loop(ctx: &mut WorkerContext, shared: &SharedState) {
    info!("worker {} started", ctx.id);
    loop {
        shared.worker_bitmap.set_idle(ctx.id);
        let Some(task) = scheduler::acquire_task(ctx, shared) else {
            break;
        };
        shared.worker_bitmap.set_busy(ctx.id);
        run_task(ctx, shared, task);
        scheduler::export_if_needed(ctx, shared);
    }
    shared.worker_bitmap.set_idle(ctx.id);
    info!("worker {} exiting, {} nodes visited", ctx.id, ctx.nodes_visited);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_chunk_queue::GlobalChunkQueue;
    use crate::options::SolverOptions;
    use crate::shared_task_array::SharedTaskArray;
    use crate::square::Square;
    use crate::transposition_table::TranspositionTable;
    use crate::types::NodeKind;
    use crate::worker_bitmap::WorkerBitmap;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;

    fn shared_for_one_root_move(shutdown: bool) -> SharedState {
        SharedState {
            tt: TranspositionTable::new(1),
            global_queue: GlobalChunkQueue::new(),
            shared_array: SharedTaskArray::new(16),
            worker_bitmap: WorkerBitmap::new(1),
            root_moves: crate::root::RootMoveTable::new(&[(Square::A1, 0)]),
            shutdown: AtomicBool::new(shutdown),
            found_win: AtomicBool::new(false),
            winning_move: AtomicUsize::new(usize::MAX),
            start_time: Instant::now(),
            time_limit: None,
            options: SolverOptions::default(),
        }
    }

    #[test]
    fn run_task_reports_a_proven_terminal_root_task() {
        // A full board, mover ahead by 2: an immediate Win with 0 empties.
        let player: u64 = (1u64 << 33) - 1;
        let opponent: u64 = !player;
        let shared = shared_for_one_root_move(false);
        let mut ctx = WorkerContext::new(0);
        let task = Task::new(player, opponent, 0, 0, 0, true, NodeKind::Or, 0, 0);
        run_task(&mut ctx, &shared, task);
        assert_eq!(shared.root_moves.get(0).result(), SolveResult::Win);
    }

    #[test]
    fn worker_loop_exits_once_shutdown_and_queues_empty() {
        let shared = shared_for_one_root_move(true);
        let mut ctx = WorkerContext::new(0);
        // shutdown already set and every queue empty: loop must return immediately.
        worker_loop(&mut ctx, &shared);
    }
}
