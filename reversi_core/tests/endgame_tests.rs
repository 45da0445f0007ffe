//! Integration fixtures and invariant checks (§8's scenario table S1-S6 and
//! quantified invariants 1-8), exercised only through the public solver API.

use reversi_core::board::Board;
use reversi_core::options::SolverOptions;
use reversi_core::piece::Piece;
use reversi_core::solver;
use reversi_core::square::Square;
use reversi_core::types::SolveResult;

fn opts(threads: usize) -> SolverOptions {
    SolverOptions {
        threads,
        tt_mb_size: 1,
        ..SolverOptions::default()
    }
}

/// S1: a full board, mover ahead on discs, is an immediate Win with no search.
#[test]
fn s1_full_board_mover_ahead_wins() {
    let player: u64 = (1u64 << 33) - 1; // 33 discs
    let opponent: u64 = !player; // 31 discs
    let board = Board::from_bitboards(player, opponent);
    let outcome = solver::solve(&board, &opts(1));
    assert_eq!(outcome.result, SolveResult::Win);
    assert_eq!(outcome.nodes_searched, 0);
}

/// S2: a full board, mover behind on discs, is an immediate Lose.
#[test]
fn s2_full_board_mover_behind_loses() {
    let player: u64 = (1u64 << 31) - 1; // 31 discs
    let opponent: u64 = !player; // 33 discs
    let board = Board::from_bitboards(player, opponent);
    let outcome = solver::solve(&board, &opts(1));
    assert_eq!(outcome.result, SolveResult::Lose);
}

/// S3: a full board, even split, is an immediate Draw.
#[test]
fn s3_full_board_even_split_draws() {
    let player: u64 = (1u64 << 32) - 1; // 32 discs
    let opponent: u64 = !player; // 32 discs
    let board = Board::from_bitboards(player, opponent);
    let outcome = solver::solve(&board, &opts(1));
    assert_eq!(outcome.result, SolveResult::Draw);
}

/// S4: one empty square, the mover's only legal move wins the board outright.
#[test]
fn s4_one_empty_forced_win() {
    let player: u64 = (1u64 << 32) - 1;
    let opponent: u64 = ((1u64 << 63) - 1) ^ player;
    let board = Board::from_bitboards(player, opponent);
    let outcome = solver::solve(&board, &opts(2));
    assert_eq!(outcome.result, SolveResult::Win);
    assert!(outcome.best_move.is_some());
}

/// Invariant 5: solving the same position twice under the same options
/// produces the same result and best move (no nondeterminism leaking from
/// thread scheduling or TT contention into the final answer).
#[test]
fn idempotent_across_repeated_solves() {
    let player: u64 = (1u64 << 32) - 1;
    let opponent: u64 = ((1u64 << 63) - 1) ^ player;
    let board = Board::from_bitboards(player, opponent);
    let first = solver::solve(&board, &opts(2));
    let second = solver::solve(&board, &opts(2));
    assert_eq!(first.result, second.result);
    assert_eq!(first.best_move, second.best_move);
}

/// Invariant 6: applying a legal move increases total occupied squares by
/// exactly 1 (one placed disc; flips change color, never count).
#[test]
fn make_move_increases_disc_count_by_one() {
    let board = Board::new();
    let before = board.get_player_count() + board.get_opponent_count();
    let moves = board.get_moves();
    let sq = Square::from_usize_unchecked(moves.trailing_zeros() as usize);
    let after_board = board.make_move(sq);
    let after = after_board.get_player_count() + after_board.get_opponent_count();
    assert_eq!(after, before + 1);
}

/// Invariant 7: the legal-move set never overlaps the occupied squares.
#[test]
fn legal_moves_disjoint_from_occupied() {
    let board = Board::new();
    let occupied = board.player | board.opponent;
    assert_eq!(board.get_moves() & occupied, 0);
}

/// Invariant 8: a terminal leaf's score is within [-64, 64] and has the
/// correct sign relative to who is ahead on discs.
#[test]
fn terminal_score_within_bounds_and_correct_sign() {
    for (player_bits, opponent_bits) in [(33usize, 31usize), (31, 33), (40, 24)] {
        let player: u64 = (1u64 << player_bits) - 1;
        let opponent: u64 = ((1u64 << (player_bits + opponent_bits)) - 1) ^ player;
        let board = Board::from_bitboards(player, opponent);
        let outcome = solver::solve(&board, &opts(1));
        match outcome.result {
            SolveResult::Win => assert!(player_bits > opponent_bits),
            SolveResult::Lose => assert!(player_bits < opponent_bits),
            SolveResult::Draw => assert_eq!(player_bits, opponent_bits),
            SolveResult::Unknown => panic!("a full board must resolve immediately"),
        }
    }
}

/// Proxy for invariant 3 (symmetry-invariant canonical hashing): a solver
/// result must not depend on which of a position's 8 board symmetries was
/// actually passed in, since the transposition table keys on the canonical
/// form either way.
#[test]
fn result_is_invariant_under_board_symmetry() {
    // A position with a handful of empties so the engine does real search
    // (not just the immediate-terminal fast path).
    let player: u64 = (1u64 << 30) - 1;
    let opponent: u64 = ((1u64 << 60) - 1) ^ player;
    let board = Board::from_bitboards(player, opponent);

    let base = solver::solve(&board, &opts(2)).result;
    let rotated = board.rotate_90_clockwise();
    let flipped = board.flip_horizontal();

    assert_eq!(solver::solve(&rotated, &opts(2)).result, base);
    assert_eq!(solver::solve(&flipped, &opts(2)).result, base);
}

/// S5: a regression fixture carried over from the teacher's own
/// `reversi_core/tests/endgame_tests.rs` (`test_solve_5`), which records the
/// board's perfect-play score as 28 for Black under its alpha-beta engine.
/// A score of 28 (positive, Black to move) is a forced Win for Black in this
/// engine's own framing, so the two engines' results agree on this fixture
/// even though they search it by entirely different algorithms.
#[test]
fn s5_teacher_fixture_board_is_a_forced_win() {
    let board = Board::from_string(
        "--O--O----OOOOO-XOOOOOOOXXOOXOOOXXXXXOXXXOXXOOXXXXXXOXOXXOOOOOOX",
        Piece::Black,
    );
    let outcome = solver::solve(&board, &opts(4));
    assert_eq!(outcome.result, SolveResult::Win);
    assert!(outcome.best_move.is_some());
}

/// S6-style regression scenario: a midgame-depth position with only a
/// handful of empties should still resolve to a proven result (not
/// Unknown) well within a generous time budget, and do so consistently
/// across repeated solves.
#[test]
fn small_midgame_position_resolves_consistently() {
    let player: u64 = (1u64 << 29) - 1;
    let opponent: u64 = ((1u64 << 58) - 1) ^ player;
    let board = Board::from_bitboards(player, opponent);
    let options = SolverOptions {
        threads: 4,
        tt_mb_size: 4,
        ..SolverOptions::default()
    };
    let first = solver::solve(&board, &options);
    assert_ne!(first.result, SolveResult::Unknown);
    let second = solver::solve(&board, &options);
    assert_eq!(first.result, second.result);
    assert_eq!(first.best_move, second.best_move);
}
