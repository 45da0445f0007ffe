//! Canonical position hashing.
//!
//! The transposition table keys on the lexicographically smallest of a
//! position's 8 board symmetries (identity, two diagonal flips, two axis
//! flips, and the three non-trivial rotations), so that symmetric positions
//! share one slot. The symmetry generators themselves already exist in
//! [`crate::bit`]; this module only picks the minimum and hashes it.

use std::sync::OnceLock;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;

use crate::bit;

/// Fixed so that two runs of the solver agree on TT keys. Any constant
/// works; this one has no significance beyond being memorable.
const ZOBRIST_SEED: u64 = 0x5EED_1234_ABCD_0001;

struct ZobristTables {
    player: [u64; 64],
    opponent: [u64; 64],
}

static TABLES: OnceLock<ZobristTables> = OnceLock::new();

fn tables() -> &'static ZobristTables {
    TABLES.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
        let mut player = [0u64; 64];
        let mut opponent = [0u64; 64];
        for slot in player.iter_mut() {
            *slot = rng.random();
        }
        for slot in opponent.iter_mut() {
            *slot = rng.random();
        }
        ZobristTables { player, opponent }
    })
}

/// Initializes the random tables. Called once by [`crate::init`] before any
/// worker starts; harmless (and cheap) to call again.
pub fn init() {
    tables();
}

/// All 8 symmetric images of `(player, opponent)` under the dihedral group
/// of the board, including the identity.
#[inline]
fn symmetries(player: u64, opponent: u64) -> [(u64, u64); 8] {
    let rot90 = (bit::rotate_90_clockwise(player), bit::rotate_90_clockwise(opponent));
    let rot180 = (bit::rotate_180_clockwise(player), bit::rotate_180_clockwise(opponent));
    let rot270 = (bit::rotate_270_clockwise(player), bit::rotate_270_clockwise(opponent));
    let flip_v = (bit::flip_vertical(player), bit::flip_vertical(opponent));
    let flip_h = (bit::flip_horizontal(player), bit::flip_horizontal(opponent));
    let diag_a1h8 = (bit::flip_diag_a1h8(player), bit::flip_diag_a1h8(opponent));
    let diag_a8h1 = (bit::flip_diag_a8h1(player), bit::flip_diag_a8h1(opponent));
    [
        (player, opponent),
        rot90,
        rot180,
        rot270,
        flip_v,
        flip_h,
        diag_a1h8,
        diag_a8h1,
    ]
}

/// The lexicographically smallest `(player, opponent)` pair among the 8
/// symmetric images of this position.
#[inline]
pub fn canonical(player: u64, opponent: u64) -> (u64, u64) {
    symmetries(player, opponent)
        .into_iter()
        .min()
        .expect("symmetries is non-empty")
}

/// A symmetry-invariant hash of `(player, opponent)`, suitable as a
/// transposition table key.
#[inline]
pub fn hash(player: u64, opponent: u64) -> u64 {
    let (p, o) = canonical(player, opponent);
    let t = tables();
    let mut h = 0u64;
    let mut bits = p;
    while bits != 0 {
        let sq = bits.trailing_zeros() as usize;
        h ^= t.player[sq];
        bits = bit::clear_lsb_u64(bits);
    }
    let mut bits = o;
    while bits != 0 {
        let sq = bits.trailing_zeros() as usize;
        h ^= t.opponent[sq];
        bits = bit::clear_lsb_u64(bits);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_symmetry_invariant() {
        let player = 0x0000000810000000u64;
        let opponent = 0x0000001008000000u64;
        let base = hash(player, opponent);
        for (p, o) in symmetries(player, opponent) {
            assert_eq!(hash(p, o), base);
        }
    }

    #[test]
    fn distinct_positions_usually_differ() {
        let a = hash(0x0000000810000000, 0x0000001008000000);
        let b = hash(0x0000000000000001, 0x0000000000000002);
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_is_idempotent() {
        let player = 0x0000000810000000u64;
        let opponent = 0x0000001008000000u64;
        let (p, o) = canonical(player, opponent);
        assert_eq!(canonical(p, o), (p, o));
    }
}
