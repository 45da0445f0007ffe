//! The df-pn+ search kernel (§4.5, §4.6) and subtask spawning policy (§4.7).
//!
//! One call to [`solve_node`] proves or disproves exactly one search-tree
//! node, recursing into children and occasionally handing some of them off
//! as Tasks for other workers. Everything here runs inside a single
//! worker thread against that worker's own [`NodePool`]/[`LocalHeap`]; the
//! only cross-thread contact is through `shared` (the TT, queues, bitmap,
//! and root-move table).

use crate::bitboard;
use crate::eval;
use crate::board::Board;
use crate::global_chunk_queue::GlobalChunkQueue;
use crate::local_heap::LocalHeap;
use crate::node::{INFINITY, NodePool, NodeRef};
use crate::root::SharedState;
use crate::square::Square;
use crate::task::Task;
use crate::types::{Generation, NodeKind, Pn, Score, SolveResult};
use crate::zobrist;

/// Per-worker mutable state threaded through the whole recursion. Owned
/// entirely by the worker thread that created it — no field here is shared.
pub struct WorkerContext {
    pub id: usize,
    pub pool: NodePool,
    pub local_heap: LocalHeap,
    nodes_since_time_check: u32,
    /// Total node visits this worker has made across every task it has run,
    /// never reset; the root orchestrator reads the delta per task to feed
    /// `RootMoveEntry::nodes_searched` (§3, §4.9).
    pub nodes_visited: u64,
    /// Set by a TT hit that observes a higher-priority chunk waiting
    /// globally (§4.8); cleared once the current task finishes unwinding.
    pub should_abort_task: bool,
}

impl WorkerContext {
    pub fn new(id: usize) -> WorkerContext {
        WorkerContext {
            id,
            pool: NodePool::new(),
            local_heap: LocalHeap::new(),
            nodes_since_time_check: 0,
            nodes_visited: 0,
            should_abort_task: false,
        }
    }

    /// Every 1024 nodes, samples the wall clock and the shutdown flag
    /// (§4.5 step 2, §5's "Timeouts").
    fn poll_shutdown(&mut self, shared: &SharedState) -> bool {
        self.nodes_since_time_check += 1;
        if self.nodes_since_time_check >= 1024 {
            self.nodes_since_time_check = 0;
            if shared.is_time_up() {
                shared.request_shutdown();
            }
        }
        shared.is_shutdown() || self.should_abort_task
    }
}

/// From the mover's own perspective at a terminal node: attributes all
/// empty squares to whichever side is ahead, zero if tied (§9's resolved
/// "Terminal-score empty-square attribution").
pub(crate) fn signed_terminal_score(player_count: i32, opponent_count: i32, empty_count: i32) -> Score {
    let diff = player_count - opponent_count;
    if diff == 0 {
        0
    } else if diff > 0 {
        diff + empty_count
    } else {
        diff
    }
}

/// Maps a terminal mover-perspective score to this node's own (pn, dn,
/// result), inverting for AND-nodes since their "mover" is the opponent
/// relative to the root (§4.5 step 4).
pub(crate) fn terminal_pn_dn(kind: NodeKind, score: Score) -> (Pn, Pn, SolveResult) {
    let effective = match kind {
        NodeKind::Or => score,
        NodeKind::And => -score,
    };
    match effective.cmp(&0) {
        std::cmp::Ordering::Greater => (0, INFINITY, SolveResult::Win),
        std::cmp::Ordering::Less => (INFINITY, 0, SolveResult::Lose),
        std::cmp::Ordering::Equal => (INFINITY, INFINITY, SolveResult::Draw),
    }
}

/// Expands a childless node in place: either marks it terminal or allocates
/// and attaches its children in descending priority order (§4.5 step 4).
/// Returns `true` if the node became a terminal leaf (no children attached).
fn expand(pool: &mut NodePool, node_ref: NodeRef) -> bool {
    let (player, opponent, kind, depth) = {
        let n = pool.get(node_ref);
        (n.player, n.opponent, n.kind, n.depth)
    };

    let own_moves = bitboard::get_moves(player, opponent);
    if own_moves == 0 {
        let opponent_moves = bitboard::get_moves(opponent, player);
        if opponent_moves == 0 {
            let score = signed_terminal_score(
                player.count_ones() as i32,
                opponent.count_ones() as i32,
                depth as i32,
            );
            let (pn, dn, result) = terminal_pn_dn(kind, score);
            let n = pool.get_mut(node_ref);
            n.pn = pn;
            n.dn = dn;
            n.result = result;
            n.is_proven = true;
            return true;
        }
        // Pass: the position is unchanged, only the mover swaps (§4.5 step 4).
        let pass = pool.alloc(opponent, player, kind.flip(), depth);
        pool.get_mut(node_ref).children.push(pass);
        return false;
    }

    let mut moves: Vec<(Square, Board, Score)> = Vec::new();
    let mut bits = own_moves;
    while bits != 0 {
        let sq_idx = bits.trailing_zeros() as usize;
        let sq = Square::from_usize_unchecked(sq_idx);
        let board = Board::from_bitboards(player, opponent).make_move(sq);
        // `evaluate` is from the new mover's (this node's child's) own
        // perspective; negating it gives the value from *this* node's
        // mover's perspective, so every sibling is comparable on the same
        // scale (§4.5 step 4's "negated opponent-perspective sign").
        let child_eval = -eval::evaluate(board.player, board.opponent);
        moves.push((sq, board, child_eval));
        bits = crate::bit::clear_lsb_u64(bits);
    }

    // A child's priority is "good for this node's own mover"; OR wants a
    // high child eval (this node's mover is the root player), AND wants a
    // low one (§4.5 step 4's "identical formula with sign flipped").
    match kind {
        NodeKind::Or => moves.sort_by(|a, b| b.2.cmp(&a.2)),
        NodeKind::And => moves.sort_by(|a, b| a.2.cmp(&b.2)),
    }

    let child_depth = depth.saturating_sub(1);
    for (_, board, child_eval) in &moves {
        let child = pool.alloc(board.player, board.opponent, kind.flip(), child_depth);
        pool.get_mut(child).eval_score = *child_eval;
        pool.get_mut(node_ref).children.push(child);
    }
    false
}

/// Recomputes `node.pn`/`node.dn`/`result`/`is_proven` from its children's
/// current values (§4.6). Never claims `is_proven` except by the explicit
/// rules below — a node never trusts an unproven TT hint to propagate.
fn update_from_children(pool: &mut NodePool, node_ref: NodeRef) {
    let kind = pool.get(node_ref).kind;
    let children = pool.get(node_ref).children.clone();

    let (min_pn, sum_pn, min_dn, sum_dn, any_pn_zero, all_pn_zero, any_dn_zero, all_dn_zero, all_proven, any_proven_draw) = {
        let mut min_pn = INFINITY;
        let mut sum_pn: u64 = 0;
        let mut min_dn = INFINITY;
        let mut sum_dn: u64 = 0;
        let mut any_pn_zero = false;
        let mut all_pn_zero = true;
        let mut any_dn_zero = false;
        let mut all_dn_zero = true;
        let mut all_proven = true;
        let mut any_proven_draw = false;
        for &c in &children {
            let child = pool.get(c);
            min_pn = min_pn.min(child.pn);
            sum_pn = (sum_pn + child.pn as u64).min(INFINITY as u64);
            min_dn = min_dn.min(child.dn);
            sum_dn = (sum_dn + child.dn as u64).min(INFINITY as u64);
            if child.pn == 0 {
                any_pn_zero = true;
            } else {
                all_pn_zero = false;
            }
            if child.dn == 0 {
                any_dn_zero = true;
            } else {
                all_dn_zero = false;
            }
            if !child.is_proven {
                all_proven = false;
            } else if child.result == SolveResult::Draw {
                any_proven_draw = true;
            }
        }
        (min_pn, sum_pn as Pn, min_dn, sum_dn as Pn, any_pn_zero, all_pn_zero, any_dn_zero, all_dn_zero, all_proven, any_proven_draw)
    };

    // OR-node update; AND mirrors by swapping the roles of pn/dn and Win/Lose.
    let (pn, dn, own_win, own_lose) = match kind {
        NodeKind::Or => (min_pn, sum_dn, any_pn_zero, all_dn_zero),
        NodeKind::And => (sum_pn, min_dn, all_pn_zero, any_dn_zero),
    };

    let n = pool.get_mut(node_ref);
    n.pn = pn;
    n.dn = dn;
    if own_win {
        n.pn = 0;
        n.dn = INFINITY;
        n.result = SolveResult::Win;
        n.is_proven = true;
    } else if own_lose {
        n.pn = INFINITY;
        n.dn = 0;
        n.result = SolveResult::Lose;
        n.is_proven = true;
    } else if all_proven && any_proven_draw {
        n.pn = INFINITY;
        n.dn = INFINITY;
        n.result = SolveResult::Draw;
        n.is_proven = true;
    }
}

/// Selects the child df-pn+ should recurse into next (§4.5 step 6): OR
/// prefers the lowest `pn` (tiebreak by eval, since that's the move most
/// likely to prove a Win); AND prefers the lowest `dn`.
fn select_best_child(pool: &NodePool, node_ref: NodeRef) -> Option<NodeRef> {
    let node = pool.get(node_ref);
    let children = &node.children;
    match node.kind {
        NodeKind::Or => children
            .iter()
            .copied()
            .min_by_key(|&c| {
                let child = pool.get(c);
                (child.pn, std::cmp::Reverse(child.eval_score))
            }),
        NodeKind::And => children
            .iter()
            .copied()
            .min_by_key(|&c| {
                let child = pool.get(c);
                (child.dn, child.eval_score)
            }),
    }
}

/// `children` is already stored in eval-sorted order (`expand` sorts it
/// that way), so a child's position in that `Vec` is its eval-ordering
/// rank; 0 means "the static evaluator's own top pick" (§10.5).
fn child_eval_rank(pool: &NodePool, node_ref: NodeRef, child_ref: NodeRef) -> usize {
    pool.get(node_ref).children.iter().position(|&c| c == child_ref).unwrap_or(0)
}

/// df-pn widening rule (§4.5 step 6): the child inherits a threshold budget
/// carved out of the parent's remaining slack.
fn child_thresholds(pool: &NodePool, node_ref: NodeRef, child_ref: NodeRef) -> (Pn, Pn) {
    let node = pool.get(node_ref);
    let child = pool.get(child_ref);
    match node.kind {
        NodeKind::Or => {
            let tpn = (node.threshold_dn - node.dn).saturating_add(child.dn).min(INFINITY);
            let tdn = node.threshold_pn;
            (tpn, tdn)
        }
        NodeKind::And => {
            let tdn = (node.threshold_pn - node.pn).saturating_add(child.pn).min(INFINITY);
            let tpn = node.threshold_dn;
            (tpn, tdn)
        }
    }
}

/// A relaxation tier of the spawn-policy ladder (§4.7); later tiers loosen
/// the defaults further as more workers sit idle.
struct SpawnBudget {
    max_generation: u32,
    min_depth_for_spawn: u32,
    spawn_limit_per_node: usize,
}

fn spawn_budget(ctx: &WorkerContext, shared: &SharedState) -> SpawnBudget {
    let opts = &shared.options;
    let base = SpawnBudget {
        max_generation: opts.max_generation,
        min_depth_for_spawn: opts.min_depth_for_spawn,
        spawn_limit_per_node: opts.spawn_limit_per_node,
    };

    let local_below_chunk = ctx.local_heap.len() < crate::task::CHUNK_SIZE;
    let array_has_room = shared.shared_array.percent_full() < 70;
    let idle_percent = shared.worker_bitmap.idle_percent();

    if local_below_chunk && array_has_room {
        return SpawnBudget {
            max_generation: base.max_generation + 20,
            min_depth_for_spawn: base.min_depth_for_spawn / 2,
            spawn_limit_per_node: 50,
        };
    }
    if idle_percent >= 90 {
        SpawnBudget {
            max_generation: base.max_generation + 10,
            min_depth_for_spawn: base.min_depth_for_spawn / 2,
            spawn_limit_per_node: base.spawn_limit_per_node.saturating_mul(5),
        }
    } else if idle_percent >= 70 {
        SpawnBudget {
            max_generation: base.max_generation + 5,
            min_depth_for_spawn: base.min_depth_for_spawn * 2 / 3,
            spawn_limit_per_node: base.spawn_limit_per_node.saturating_mul(3),
        }
    } else if idle_percent >= 50 {
        SpawnBudget {
            max_generation: base.max_generation + 2,
            min_depth_for_spawn: base.min_depth_for_spawn,
            spawn_limit_per_node: base.spawn_limit_per_node.saturating_mul(2),
        }
    } else {
        base
    }
}

/// Offers a freshly built Task to the scheduler: in fast-sharing mode the
/// caller keeps the very first spawn in its own LocalHeap, the rest go to
/// the SharedTaskArray; in contention mode everything goes to LocalHeap and
/// the worker loop's export rule (§4.7) takes it from there.
fn dispatch_spawn(ctx: &mut WorkerContext, shared: &SharedState, task: Task, keep_first_locally: &mut bool) {
    if *keep_first_locally {
        *keep_first_locally = false;
        if ctx.local_heap.push(task) {
            return;
        }
    }
    if shared.shared_array.push(task) {
        return;
    }
    // Both outlets are saturated; fall back to the local heap so the task
    // is never silently dropped (§4.10's "no recovery path" is reserved
    // for allocation failure, not scheduling backpressure).
    let _ = ctx.local_heap.push(task);
}

/// Pushes spawnable children as subtasks, per §4.7's "priority within 80%
/// of the best child, capped at spawn_limit, skip proven children". Returns
/// the set of child indices (into `node.children`) that were *not* spawned
/// away, i.e. still this worker's direct responsibility.
fn spawn_children(
    ctx: &mut WorkerContext,
    shared: &SharedState,
    node_ref: NodeRef,
    root_move: usize,
    generation: Generation,
) {
    let budget = spawn_budget(ctx, shared);
    if generation >= budget.max_generation {
        return;
    }

    let node = ctx.pool.get(node_ref);
    if node.depth < budget.min_depth_for_spawn {
        return;
    }
    let kind = node.kind;
    let best_priority = node
        .children
        .iter()
        .filter(|&&c| !ctx.pool.get(c).is_proven)
        .map(|&c| ctx.pool.get(c).eval_score)
        .max();
    let Some(best_priority) = best_priority else { return };

    // `eval_score` is signed (and AND-nodes pick by minimum, so "best" may be
    // the most negative child), so the 80% band has to be computed on an
    // offset, always-non-negative scale — the same `+5_000` offset
    // `Task::child`'s priority formula uses — rather than on the raw score,
    // where a negative `best_priority` would make the band stricter than
    // `best_priority` itself and exclude the best child from its own filter.
    const SPAWN_PRIORITY_OFFSET: i64 = 5_000;
    let best_offset = best_priority as i64 + SPAWN_PRIORITY_OFFSET;

    let candidates: Vec<NodeRef> = node
        .children
        .iter()
        .copied()
        .filter(|&c| {
            let child = ctx.pool.get(c);
            !child.is_proven && (child.eval_score as i64 + SPAWN_PRIORITY_OFFSET) * 100 >= best_offset * 80
        })
        .take(budget.spawn_limit_per_node)
        .collect();

    let mut keep_first_locally = shared.worker_bitmap.has_idle();
    for child_ref in candidates {
        let child = ctx.pool.get(child_ref);
        let task = Task::child(root_move, generation, kind, child.player, child.opponent, child.eval_score, child.depth);
        dispatch_spawn(ctx, shared, task, &mut keep_first_locally);
    }
}

/// Compares the executing task's priority against the global queue's top
/// and flags preemption if the global queue holds strictly better work
/// (§4.8).
fn check_preemption(ctx: &mut WorkerContext, global_queue: &GlobalChunkQueue, task_priority: i32) {
    if let Some(top) = global_queue.top_priority() {
        if top > task_priority {
            ctx.should_abort_task = true;
        }
    }
}

/// Proves or disproves `node_ref`, recursing into children and spawning
/// subtasks along the way (§4.5). `task_priority` is the priority of the
/// Task this recursion ultimately serves, used for TT-hit preemption
/// comparisons (§4.8); `root_move`/`generation` are threaded down from the
/// Task so spawned children can be labelled correctly.
pub fn solve_node(
    ctx: &mut WorkerContext,
    shared: &SharedState,
    node_ref: NodeRef,
    task_priority: i32,
    root_move: usize,
    generation: Generation,
) {
    let (player, opponent, depth) = {
        let n = ctx.pool.get(node_ref);
        (n.player, n.opponent, n.depth)
    };
    ctx.nodes_visited += 1;
    let key = zobrist::hash(player, opponent);
    shared.tt.prefetch(key);

    if ctx.poll_shutdown(shared) || shared.has_found_win() {
        return;
    }

    if let Some(probe) = shared.tt.probe(key, depth) {
        if probe.is_proven() {
            let n = ctx.pool.get_mut(node_ref);
            n.pn = probe.pn;
            n.dn = probe.dn;
            n.result = probe.result;
            n.is_proven = true;
            return;
        }
        check_preemption(ctx, &shared.global_queue, task_priority);
        if ctx.should_abort_task {
            return;
        }
    }

    if ctx.pool.get(node_ref).children.is_empty() {
        let became_terminal = expand(&mut ctx.pool, node_ref);
        if became_terminal {
            let n = ctx.pool.get(node_ref);
            shared.tt.store(key, depth, n.pn, n.dn, n.result, n.eval_score);
            return;
        }
        spawn_children(ctx, shared, node_ref, root_move, generation);
    }

    update_from_children(&mut ctx.pool, node_ref);

    let mut iterations: u32 = 0;
    loop {
        let (pn, dn, tpn, tdn) = {
            let n = ctx.pool.get(node_ref);
            (n.pn, n.dn, n.threshold_pn, n.threshold_dn)
        };
        if !(pn > 0 && dn > 0 && pn < tpn && dn < tdn) {
            break;
        }
        if ctx.poll_shutdown(shared) || shared.has_found_win() {
            break;
        }

        iterations += 1;
        if iterations % 50 == 0 {
            spawn_children(ctx, shared, node_ref, root_move, generation);
        }

        let Some(child_ref) = select_best_child(&ctx.pool, node_ref) else { break };
        if shared.options.trace_eval_impact && !shared.root_moves.is_empty() {
            let rank = child_eval_rank(&ctx.pool, node_ref, child_ref);
            shared.root_moves.get(root_move).eval_impact.record(true, rank);
        }
        if ctx.pool.get(child_ref).is_proven {
            // Already resolved by a previous iteration or a TT hit; the
            // remaining unresolved siblings still need a turn.
            update_from_children(&mut ctx.pool, node_ref);
            if ctx.pool.get(node_ref).is_proven {
                break;
            }
            continue;
        }

        let (child_tpn, child_tdn) = child_thresholds(&ctx.pool, node_ref, child_ref);
        {
            let child = ctx.pool.get_mut(child_ref);
            child.threshold_pn = child_tpn;
            child.threshold_dn = child_tdn;
        }

        solve_node(ctx, shared, child_ref, task_priority, root_move, generation);
        update_from_children(&mut ctx.pool, node_ref);

        if ctx.should_abort_task || shared.is_shutdown() || shared.has_found_win() {
            break;
        }
    }

    let n = ctx.pool.get(node_ref);
    shared.tt.store(key, depth, n.pn, n.dn, n.result, n.eval_score);
}

/// Runs the complete root-task split (§4.7's "Root-task split"): expands
/// the root Task's own position, spawns every child but the best one as a
/// generation-1 subtask, then solves the best child locally with this
/// node's own thresholds set to "no threshold" (the root call's widening
/// base, §4.5's "Boundary details").
pub fn solve_root_task(ctx: &mut WorkerContext, shared: &SharedState, task: &Task) -> (Pn, Pn, SolveResult, Score) {
    let node_ref = ctx.pool.alloc(task.player, task.opponent, task.kind, task.depth);
    {
        let n = ctx.pool.get_mut(node_ref);
        n.eval_score = task.eval_score;
        n.threshold_pn = INFINITY + 1;
        n.threshold_dn = INFINITY + 1;
    }

    let became_terminal = expand(&mut ctx.pool, node_ref);
    if !became_terminal {
        // `expand` already sorted children best-first by the node's own
        // preference, so the first child is the one to keep locally.
        let kind = ctx.pool.get(node_ref).kind;
        let children = ctx.pool.get(node_ref).children.clone();
        for &child_ref in children.iter().skip(1) {
            let child = ctx.pool.get(child_ref);
            let spawned = Task::root_split_child(task.root_move, child.player, child.opponent, child.eval_score, child.depth, kind);
            shared.shared_array.push(spawned);
        }
    }

    solve_node(ctx, shared, node_ref, task.priority, task.root_move, task.generation);
    let n = ctx.pool.get(node_ref);
    (n.pn, n.dn, n.result, n.eval_score)
}
