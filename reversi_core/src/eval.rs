//! Static evaluation.
//!
//! The search kernel only ever calls [`evaluate`] — it never inspects how
//! the number was produced (§1's "opaque `evaluate(player, opponent) -> i32`").
//! This implementation's evaluator is a compact disc/mobility/corner-stability
//! heuristic built from the primitives [`crate::bitboard`] and
//! [`crate::stability`] already expose; see `DESIGN.md` for why a full
//! feature-table network (what the external weight file in §6 actually
//! encodes) is out of scope here. [`WeightFile`] still parses that file's
//! header so a real weight file can be pointed at and validated — its body
//! is not otherwise consulted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::bitboard;
use crate::board::Board;
use crate::error::SolverError;
use crate::types::Score;

const MOBILITY_WEIGHT: i32 = 10;
const CORNER_WEIGHT: i32 = 25;
const STABILITY_WEIGHT: i32 = 8;

/// Sign-flipped static evaluation from `player`'s perspective: positive
/// means `player` is ahead. Used both for terminal-independent move
/// ordering (§4.5 step 4) and as the root orchestrator's initial move sort
/// (§4.9).
pub fn evaluate(player: u64, opponent: u64) -> Score {
    let disc_diff = player.count_ones() as i32 - opponent.count_ones() as i32;

    let player_moves = bitboard::get_moves(player, opponent);
    let opponent_moves = bitboard::get_moves(opponent, player);
    let mobility_diff = player_moves.count_ones() as i32 - opponent_moves.count_ones() as i32;

    let corner_diff = bitboard::corner_weighted_count(player) as i32 - bitboard::corner_weighted_count(opponent) as i32;

    let player_stable = crate::stability::get_stable_discs(player, opponent).count_ones() as i32;
    let opponent_stable = crate::stability::get_stable_discs(opponent, player).count_ones() as i32;
    let stability_diff = player_stable - opponent_stable;

    disc_diff + MOBILITY_WEIGHT * mobility_diff + CORNER_WEIGHT * corner_diff + STABILITY_WEIGHT * stability_diff
}

/// Convenience wrapper taking a [`Board`], matching the call shape
/// `search.rs`'s evaluator uses in the reference engine.
pub fn evaluate_board(board: &Board) -> Score {
    evaluate(board.player, board.opponent)
}

/// Parsed header of the edax-style weight file (§6). The body (61 plies of
/// 114,364 packed `i16` feature weights each) is read in full but kept
/// opaque — nothing in this implementation decodes the packed-size
/// expansion schedule, since `evaluate` never consults it.
pub struct WeightFile {
    pub edax_header: u32,
    pub eval_header: u32,
    pub version: u32,
    pub release: u32,
    pub build: u32,
    pub date: f64,
    body: Vec<u8>,
}

const PLIES: usize = 61;
const PACKED_WEIGHTS_PER_PLY: usize = 114_364;

impl WeightFile {
    pub fn load(path: &Path) -> Result<WeightFile, SolverError> {
        let mut file = File::open(path).map_err(|e| SolverError::EvalFile(format!("{}: {e}", path.display())))?;

        let edax_header = file
            .read_u32::<LittleEndian>()
            .map_err(|e| SolverError::EvalFile(format!("reading edax header: {e}")))?;
        let eval_header = file
            .read_u32::<LittleEndian>()
            .map_err(|e| SolverError::EvalFile(format!("reading eval header: {e}")))?;
        let version = file
            .read_u32::<LittleEndian>()
            .map_err(|e| SolverError::EvalFile(format!("reading version: {e}")))?;
        let release = file
            .read_u32::<LittleEndian>()
            .map_err(|e| SolverError::EvalFile(format!("reading release: {e}")))?;
        let build = file
            .read_u32::<LittleEndian>()
            .map_err(|e| SolverError::EvalFile(format!("reading build: {e}")))?;
        let date = file
            .read_f64::<LittleEndian>()
            .map_err(|e| SolverError::EvalFile(format!("reading date: {e}")))?;

        let expected_body_bytes = PLIES * PACKED_WEIGHTS_PER_PLY * size_of::<i16>();
        let mut body = vec![0u8; expected_body_bytes];
        file.read_exact(&mut body)
            .map_err(|e| SolverError::EvalFile(format!("expected {expected_body_bytes} body bytes: {e}")))?;

        Ok(WeightFile {
            edax_header,
            eval_header,
            version,
            release,
            build,
            date,
            body,
        })
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
