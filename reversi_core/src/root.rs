//! Global root-move table and the resources every worker shares for one
//! solve (§3, §4.9).
//!
//! Mirrors the shape of `reversi_core::search::root_move::RootMove` plus
//! `search::SearchTask`'s practice of bundling the TT/Eval/stop-flag trio
//! into one struct threaded by `Arc` into every worker thread — here that
//! trio grows to match the three-tier scheduler (§4.4).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::global_chunk_queue::GlobalChunkQueue;
use crate::options::SolverOptions;
use crate::shared_task_array::SharedTaskArray;
use crate::square::Square;
use crate::transposition_table::TranspositionTable;
use crate::types::{Score, SolveResult};
use crate::worker_bitmap::WorkerBitmap;

/// Off-the-proof-path telemetry about how often eval-guided move ordering
/// picked the child that ultimately mattered (§10.5). Purely descriptive;
/// nothing here feeds back into the search.
#[derive(Default)]
pub struct EvalImpact {
    pub nodes_with_eval_ordering: AtomicU64,
    pub nodes_total: AtomicU64,
    pub rank_of_chosen_child_in_eval_order: AtomicU64,
}

impl EvalImpact {
    pub fn record(&self, used_eval_ordering: bool, rank_of_chosen: usize) {
        self.nodes_total.fetch_add(1, Ordering::Relaxed);
        if used_eval_ordering {
            self.nodes_with_eval_ordering.fetch_add(1, Ordering::Relaxed);
        }
        self.rank_of_chosen_child_in_eval_order.fetch_add(rank_of_chosen as u64, Ordering::Relaxed);
    }

    /// A snapshot suitable for reporting: the fraction of recursion steps
    /// that had eval ordering available, and the mean rank (in that eval
    /// order) of the child actually chosen — 0.0 means "the evaluator's
    /// top pick was always the one df-pn+ ended up recursing into".
    pub fn snapshot(&self) -> EvalImpactSnapshot {
        let nodes_total = self.nodes_total.load(Ordering::Relaxed);
        let nodes_with_eval_ordering = self.nodes_with_eval_ordering.load(Ordering::Relaxed);
        let rank_sum = self.rank_of_chosen_child_in_eval_order.load(Ordering::Relaxed);
        let mean_rank_of_chosen_child = if nodes_total == 0 { 0.0 } else { rank_sum as f64 / nodes_total as f64 };
        EvalImpactSnapshot {
            nodes_total,
            nodes_with_eval_ordering,
            mean_rank_of_chosen_child,
        }
    }
}

/// Plain-data readout of an [`EvalImpact`] counter set (§10.5).
#[derive(Clone, Copy, Debug, Default)]
pub struct EvalImpactSnapshot {
    pub nodes_total: u64,
    pub nodes_with_eval_ordering: u64,
    pub mean_rank_of_chosen_child: f64,
}

/// One row per legal root move. `result` starts `Unknown` and transitions
/// exactly once via CAS (§5's "Ordering guarantees").
pub struct RootMoveEntry {
    pub mv: Square,
    pub eval_score: Score,
    result: std::sync::atomic::AtomicU8,
    pub nodes_searched: AtomicU64,
    pub eval_impact: EvalImpact,
}

impl RootMoveEntry {
    fn new(mv: Square, eval_score: Score) -> RootMoveEntry {
        RootMoveEntry {
            mv,
            eval_score,
            result: std::sync::atomic::AtomicU8::new(SolveResult::Unknown.to_u8()),
            nodes_searched: AtomicU64::new(0),
            eval_impact: EvalImpact::default(),
        }
    }

    pub fn result(&self) -> SolveResult {
        SolveResult::from_u8(self.result.load(Ordering::Acquire))
    }

    /// Sets `result` the first time only: a later call on an already-decided
    /// move is a no-op (the CAS simply fails and is ignored), matching
    /// §5's "transitions Unknown→{Win,Lose,Draw} exactly once".
    pub fn try_set_result(&self, result: SolveResult) {
        let _ = self.result.compare_exchange(
            SolveResult::Unknown.to_u8(),
            result.to_u8(),
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }
}

pub struct RootMoveTable {
    entries: Vec<RootMoveEntry>,
}

impl RootMoveTable {
    pub fn new(moves: &[(Square, Score)]) -> RootMoveTable {
        RootMoveTable {
            entries: moves.iter().map(|&(mv, eval_score)| RootMoveEntry::new(mv, eval_score)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, i: usize) -> &RootMoveEntry {
        &self.entries[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RootMoveEntry> {
        self.entries.iter()
    }

    pub fn completed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.result() != SolveResult::Unknown).count()
    }

    pub fn total_nodes(&self) -> u64 {
        self.entries.iter().map(|e| e.nodes_searched.load(Ordering::Relaxed)).sum()
    }

    /// Final aggregation rule (§4.9): Win if any move proves Win; else Draw
    /// if any move proves Draw and none remain Unknown; else Lose iff every
    /// move proves Lose; else Unknown.
    pub fn aggregate(&self) -> SolveResult {
        let mut any_draw = false;
        let mut any_unknown = false;
        let mut all_lose = true;
        for e in &self.entries {
            match e.result() {
                SolveResult::Win => return SolveResult::Win,
                SolveResult::Draw => any_draw = true,
                SolveResult::Unknown => {
                    any_unknown = true;
                    all_lose = false;
                }
                SolveResult::Lose => {}
            }
        }
        if any_draw && !any_unknown {
            SolveResult::Draw
        } else if all_lose && !any_unknown {
            SolveResult::Lose
        } else {
            SolveResult::Unknown
        }
    }

    /// Best move per §4.9: the winning move, else the first proven Draw,
    /// else (nothing proven yet) the move with the highest static eval.
    pub fn best_move(&self) -> Option<Square> {
        if self.entries.is_empty() {
            return None;
        }
        if let Some(e) = self.entries.iter().find(|e| e.result() == SolveResult::Win) {
            return Some(e.mv);
        }
        if let Some(e) = self.entries.iter().find(|e| e.result() == SolveResult::Draw) {
            return Some(e.mv);
        }
        self.entries.iter().max_by_key(|e| e.eval_score).map(|e| e.mv)
    }
}

/// Everything a worker thread needs for the duration of one solve, bundled
/// so the orchestrator builds it once and clones the `Arc` per thread
/// (mirrors `search::SearchTask`'s role in the teacher's `threading.rs`).
pub struct SharedState {
    pub tt: TranspositionTable,
    pub global_queue: GlobalChunkQueue,
    pub shared_array: SharedTaskArray,
    pub worker_bitmap: WorkerBitmap,
    pub root_moves: RootMoveTable,
    pub shutdown: AtomicBool,
    pub found_win: AtomicBool,
    /// Index into `root_moves` of the move that produced the win; `usize::MAX`
    /// when no win has been found yet.
    pub winning_move: AtomicUsize,
    pub start_time: Instant,
    pub time_limit: Option<Duration>,
    pub options: SolverOptions,
}

impl SharedState {
    pub fn is_time_up(&self) -> bool {
        match self.time_limit {
            Some(limit) => self.start_time.elapsed() >= limit,
            None => false,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Broadcasts shutdown and wakes every worker blocked in the global
    /// queue's condvar (§4.9).
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.global_queue.shutdown();
    }

    /// CAS `found_win` false→true exactly once (§5); records which root
    /// move won before any observer can read `winning_move`.
    pub fn try_set_found_win(&self, root_move: usize) {
        if self
            .found_win
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.winning_move.store(root_move, Ordering::Release);
        }
    }

    pub fn has_found_win(&self) -> bool {
        self.found_win.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RootMoveTable {
        RootMoveTable::new(&[(Square::A1, 10), (Square::B1, -5), (Square::C1, 0)])
    }

    #[test]
    fn aggregate_is_unknown_until_all_resolved() {
        let t = table();
        assert_eq!(t.aggregate(), SolveResult::Unknown);
        t.get(0).try_set_result(SolveResult::Lose);
        assert_eq!(t.aggregate(), SolveResult::Unknown);
    }

    #[test]
    fn any_win_dominates() {
        let t = table();
        t.get(0).try_set_result(SolveResult::Lose);
        t.get(1).try_set_result(SolveResult::Win);
        assert_eq!(t.aggregate(), SolveResult::Win);
        assert_eq!(t.best_move(), Some(Square::B1));
    }

    #[test]
    fn all_lose_aggregates_to_lose() {
        let t = table();
        for e in t.iter() {
            e.try_set_result(SolveResult::Lose);
        }
        assert_eq!(t.aggregate(), SolveResult::Lose);
    }

    #[test]
    fn draw_with_no_unknowns_aggregates_to_draw() {
        let t = table();
        t.get(0).try_set_result(SolveResult::Lose);
        t.get(1).try_set_result(SolveResult::Draw);
        t.get(2).try_set_result(SolveResult::Lose);
        assert_eq!(t.aggregate(), SolveResult::Draw);
        assert_eq!(t.best_move(), Some(Square::B1));
    }

    #[test]
    fn best_move_falls_back_to_highest_eval_when_unproven() {
        let t = table();
        assert_eq!(t.best_move(), Some(Square::A1));
    }

    #[test]
    fn result_is_set_exactly_once() {
        let t = table();
        t.get(0).try_set_result(SolveResult::Win);
        t.get(0).try_set_result(SolveResult::Lose);
        assert_eq!(t.get(0).result(), SolveResult::Win);
    }
}
