//! Root orchestration (§4.9): enumerates root moves, builds the shared
//! resources every worker needs, launches the pool, and aggregates the
//! final result. The single public entry point a caller (the CLI, a test,
//! a future GUI) needs to solve one position.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::info;

use crate::bit;
use crate::bitboard;
use crate::board::Board;
use crate::engine::{self, WorkerContext};
use crate::eval;
use crate::global_chunk_queue::GlobalChunkQueue;
use crate::options::SolverOptions;
pub use crate::root::EvalImpactSnapshot;
use crate::root::{RootMoveTable, SharedState};
use crate::shared_task_array::SharedTaskArray;
use crate::square::Square;
use crate::task::Task;
use crate::transposition_table::{TTStats, TranspositionTable};
use crate::types::{NodeKind, SolveResult};
use crate::worker;
use crate::worker_bitmap::WorkerBitmap;
use crate::zobrist;

/// Poll interval for the orchestrator's termination checks (§4.9).
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-root-move line in the final report (§3's "Global root-move table",
/// §6's "Result output").
pub struct RootMoveStat {
    pub mv: Square,
    pub eval_score: i32,
    pub result: SolveResult,
    pub nodes_searched: u64,
    /// Only meaningful when [`SolverOptions::trace_eval_impact`] was set;
    /// all-zero otherwise (§10.5).
    pub eval_impact: EvalImpactSnapshot,
}

/// Everything the caller needs after one solve completes (§6's "Result
/// output", §7's "Timeout... returns Unknown with partial statistics").
pub struct SolveOutcome {
    pub result: SolveResult,
    pub best_move: Option<Square>,
    pub nodes_searched: u64,
    pub elapsed: Duration,
    pub tt_stats: TTStats,
    pub root_moves: Vec<RootMoveStat>,
}

impl SolveOutcome {
    pub fn nps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.nodes_searched as f64 / secs
        }
    }
}

/// Enumerates the legal root moves (or the single forced pass, or the
/// already-terminal position) and their static eval, sorted descending
/// (§4.9's "sorts root moves by static eval"). All evals share the root
/// player's own perspective, so they compare directly against each other.
enum RootShape {
    /// Neither side has a legal move: solved immediately, no workers needed.
    Terminal(SolveResult),
    /// One or more legal moves (or the single forced-pass pseudo-move).
    Moves { kind: NodeKind, depth: u32, specs: Vec<(Square, u64, u64, i32)> },
}

fn root_shape(board: &Board) -> RootShape {
    let own_moves = bitboard::get_moves(board.player, board.opponent);
    if own_moves != 0 {
        let mut specs = Vec::new();
        let mut bits = own_moves;
        while bits != 0 {
            let idx = bits.trailing_zeros() as usize;
            let sq = Square::from_usize_unchecked(idx);
            let child = Board::from_bitboards(board.player, board.opponent).make_move(sq);
            let score = -eval::evaluate(child.player, child.opponent);
            specs.push((sq, child.player, child.opponent, score));
            bits = bit::clear_lsb_u64(bits);
        }
        specs.sort_by(|a, b| b.3.cmp(&a.3));
        return RootShape::Moves {
            kind: NodeKind::Or,
            depth: board.get_empty_count().saturating_sub(1),
            specs,
        };
    }

    let opponent_moves = bitboard::get_moves(board.opponent, board.player);
    if opponent_moves == 0 {
        let score = engine::signed_terminal_score(
            board.get_player_count() as i32,
            board.get_opponent_count() as i32,
            board.get_empty_count() as i32,
        );
        let (_, _, result) = engine::terminal_pn_dn(NodeKind::Or, score);
        return RootShape::Terminal(result);
    }

    // Forced pass: the root player has no move, so the single "root move"
    // is the pass itself, represented with no algebraic square (§6 leaves
    // this case to the caller; `Square::None` is the natural fit here).
    RootShape::Moves {
        kind: NodeKind::And,
        depth: board.get_empty_count(),
        specs: vec![(Square::None, board.opponent, board.player, 0)],
    }
}

/// Solves `board` (the side to move is whichever side `board.player`
/// belongs to) under `options`, running the full parallel df-pn+ engine
/// (§2's control flow, §4.9). Always returns — a timeout surfaces as
/// `SolveResult::Unknown` with whatever partial statistics accumulated,
/// never as an error (§7).
pub fn solve(board: &Board, options: &SolverOptions) -> SolveOutcome {
    // §9's "Global init ordering": both lazily-built tables must exist
    // before any worker starts, not race into existence under it.
    zobrist::init();
    crate::stability::init();
    let start_time = Instant::now();

    let (kind, depth, specs) = match root_shape(board) {
        RootShape::Terminal(result) => {
            info!("root position already terminal, result={result:?}");
            return SolveOutcome {
                result,
                best_move: None,
                nodes_searched: 0,
                elapsed: start_time.elapsed(),
                tt_stats: TTStats::default(),
                root_moves: Vec::new(),
            };
        }
        RootShape::Moves { kind, depth, specs } => (kind, depth, specs),
    };

    let root_move_table = RootMoveTable::new(&specs.iter().map(|&(mv, _, _, score)| (mv, score)).collect::<Vec<_>>());
    let tasks: Vec<Task> = specs
        .iter()
        .enumerate()
        .map(|(i, &(_, player, opponent, score))| Task::new(player, opponent, i, score, score, true, kind, depth, 0))
        .collect();

    let shared_array_capacity = tasks.len().next_power_of_two().max(1024);
    let shared = Arc::new(SharedState {
        tt: TranspositionTable::new(options.tt_mb_size),
        global_queue: GlobalChunkQueue::new(),
        shared_array: SharedTaskArray::new(shared_array_capacity),
        worker_bitmap: WorkerBitmap::new(options.threads),
        root_moves: root_move_table,
        shutdown: AtomicBool::new(false),
        found_win: AtomicBool::new(false),
        winning_move: AtomicUsize::new(usize::MAX),
        start_time,
        time_limit: options.time_limit_secs.map(Duration::from_secs),
        options: options.clone(),
    });

    for task in tasks {
        // The array was sized to comfortably exceed the root move count, so
        // this cannot fail in practice; a failure would only mean a root
        // task is silently dropped, worse than falling back to blocking.
        shared.shared_array.push(task);
    }

    info!("solving with {} workers, {} root moves, depth {}", options.threads, shared.root_moves.len(), depth);

    let handles: Vec<_> = (0..options.threads)
        .map(|id| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let mut ctx = WorkerContext::new(id);
                worker::worker_loop(&mut ctx, &shared);
            })
        })
        .collect();

    loop {
        thread::sleep(POLL_INTERVAL);
        if shared.root_moves.completed_count() == shared.root_moves.len() {
            break;
        }
        if shared.is_time_up() {
            info!("time limit exceeded, shutting down");
            break;
        }
        if shared.has_found_win() {
            break;
        }
    }
    shared.request_shutdown();

    for handle in handles {
        let _ = handle.join();
    }

    let result = shared.root_moves.aggregate();
    let best_move = shared.root_moves.best_move();
    let nodes_searched = shared.root_moves.total_nodes();
    let tt_stats = shared.tt.stats();
    let root_moves = shared
        .root_moves
        .iter()
        .map(|e| RootMoveStat {
            mv: e.mv,
            eval_score: e.eval_score,
            result: e.result(),
            nodes_searched: e.nodes_searched.load(Ordering::Relaxed),
            eval_impact: e.eval_impact.snapshot(),
        })
        .collect();

    info!("result={result:?} best_move={best_move:?} nodes={nodes_searched}");

    SolveOutcome {
        result,
        best_move,
        nodes_searched,
        elapsed: start_time.elapsed(),
        tt_stats,
        root_moves,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(threads: usize) -> SolverOptions {
        SolverOptions {
            threads,
            tt_mb_size: 1,
            ..SolverOptions::default()
        }
    }

    #[test]
    fn solves_a_full_board_win_with_no_search() {
        let player: u64 = (1u64 << 33) - 1;
        let opponent: u64 = !player;
        let board = Board::from_bitboards(player, opponent);
        let outcome = solve(&board, &opts(1));
        assert_eq!(outcome.result, SolveResult::Win);
        assert_eq!(outcome.nodes_searched, 0);
    }

    #[test]
    fn solves_a_full_board_draw() {
        let player: u64 = (1u64 << 32) - 1;
        let opponent: u64 = !player;
        let board = Board::from_bitboards(player, opponent);
        let outcome = solve(&board, &opts(1));
        assert_eq!(outcome.result, SolveResult::Draw);
    }

    #[test]
    fn solves_a_one_empty_forced_win() {
        // 63 squares filled, mover's only legal move wins the board outright.
        let player: u64 = (1u64 << 32) - 1;
        let opponent: u64 = ((1u64 << 63) - 1) ^ player;
        let board = Board::from_bitboards(player, opponent);
        let outcome = solve(&board, &opts(2));
        assert_eq!(outcome.result, SolveResult::Win);
        assert!(outcome.best_move.is_some());
    }

    #[test]
    fn idempotent_across_repeated_solves() {
        let player: u64 = (1u64 << 32) - 1;
        let opponent: u64 = ((1u64 << 63) - 1) ^ player;
        let board = Board::from_bitboards(player, opponent);
        let first = solve(&board, &opts(2));
        let second = solve(&board, &opts(2));
        assert_eq!(first.result, second.result);
        assert_eq!(first.best_move, second.best_move);
    }
}
