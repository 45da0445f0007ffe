//! Common type aliases used throughout the engine.

/// Number of empty squares remaining; the unit the search kernel recurses on.
pub type Depth = u32;

/// A proof or disproof number. Saturates at [`crate::node::INFINITY`].
pub type Pn = u32;

/// A static evaluation score, in the same units [`crate::eval::evaluate`] returns.
pub type Score = i32;

/// Floating-point score, used by the static evaluator's intermediate math.
pub type Scoref = f32;

/// Scheduling priority of a [`crate::task::Task`]. Higher sorts first in
/// every priority queue in the scheduler (§4.4).
pub type Priority = i32;

/// Depth of a subtask relative to the root Task that spawned it, 0 at the
/// root itself (§4.7, GLOSSARY).
pub type Generation = u32;

/// Which side the df-pn+ kernel is computing proof numbers for at a node.
///
/// An OR-node is one where the root player is to move: the node is proven a
/// Win as soon as one child is; disproven (Lose) only once every child is.
/// An AND-node is the mirror image, with the opponent to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Or,
    And,
}

impl NodeKind {
    /// The node kind of a child reached by playing any move from this node.
    #[inline]
    pub fn flip(self) -> NodeKind {
        match self {
            NodeKind::Or => NodeKind::And,
            NodeKind::And => NodeKind::Or,
        }
    }
}

/// The proven or provisional outcome of a search node, from the root
/// player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SolveResult {
    Unknown = 0,
    Win = 1,
    Lose = 2,
    Draw = 3,
}

impl SolveResult {
    /// Packs into a byte for storage in an `AtomicU8` (the root-move table's
    /// CAS-on-result field, §4.9).
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Self::to_u8`]. Panics on an out-of-range byte, which can
    /// only happen from memory corruption or a programming error.
    #[inline]
    pub fn from_u8(v: u8) -> SolveResult {
        match v {
            0 => SolveResult::Unknown,
            1 => SolveResult::Win,
            2 => SolveResult::Lose,
            3 => SolveResult::Draw,
            _ => panic!("invalid SolveResult byte: {v}"),
        }
    }
}
