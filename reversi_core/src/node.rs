//! Search-tree nodes and the per-worker arena that owns them.
//!
//! A node's lifetime is scoped to the task that created it: workers never
//! share nodes, and an entire tree is discarded at once by rewinding the
//! arena, never by freeing individual nodes.

use aligned_vec::{AVec, CACHELINE_ALIGN};

use crate::types::{Depth, NodeKind, Pn, Score, SolveResult};

/// Saturating stand-in for infinity in proof/disproof number arithmetic.
pub const INFINITY: Pn = 100_000_000;

/// A handle into a [`NodePool`]. Cheap to copy; `None` represents "no node".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(u32);

impl NodeRef {
    const NIL: u32 = u32::MAX;

    #[inline]
    pub fn none() -> NodeRef {
        NodeRef(Self::NIL)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == Self::NIL
    }
}

pub struct Node {
    pub player: u64,
    pub opponent: u64,
    pub kind: NodeKind,
    pub depth: Depth,
    pub pn: Pn,
    pub dn: Pn,
    pub threshold_pn: Pn,
    pub threshold_dn: Pn,
    pub result: SolveResult,
    pub is_proven: bool,
    pub eval_score: Score,
    /// Children in the order the spawner/kernel should try them.
    pub children: Vec<NodeRef>,
}

impl Node {
    fn new(player: u64, opponent: u64, kind: NodeKind, depth: Depth) -> Node {
        Node {
            player,
            opponent,
            kind,
            depth,
            pn: 1,
            dn: 1,
            threshold_pn: INFINITY,
            threshold_dn: INFINITY,
            result: SolveResult::Unknown,
            is_proven: false,
            eval_score: 0,
            children: Vec::new(),
        }
    }
}

/// Number of nodes allocated per arena block. Chosen so a block comfortably
/// covers one root task's worth of search before a reallocation is needed.
const BLOCK_SIZE: usize = 8192;

/// Bump-allocates [`Node`]s in fixed-size blocks, one pool per worker.
///
/// Each block is cache-line aligned: blocks are large enough that this
/// buys nothing for any single `Node`, but it keeps the block's own
/// header away from a worker-local cache line another thread might touch.
///
/// `reset` rewinds the allocator to the start without freeing blocks, so a
/// worker that solves many tasks in sequence pays the block-allocation cost
/// only the first few times, not once per task.
pub struct NodePool {
    blocks: Vec<AVec<Node>>,
    block_idx: usize,
    slot_idx: usize,
}

impl NodePool {
    pub fn new() -> NodePool {
        NodePool {
            blocks: vec![AVec::with_capacity(CACHELINE_ALIGN, BLOCK_SIZE)],
            block_idx: 0,
            slot_idx: 0,
        }
    }

    /// Allocates a fresh node and returns a handle to it.
    pub fn alloc(&mut self, player: u64, opponent: u64, kind: NodeKind, depth: Depth) -> NodeRef {
        if self.slot_idx == BLOCK_SIZE {
            self.block_idx += 1;
            self.slot_idx = 0;
            if self.block_idx == self.blocks.len() {
                self.blocks.push(AVec::with_capacity(CACHELINE_ALIGN, BLOCK_SIZE));
            }
        }
        let block = &mut self.blocks[self.block_idx];
        let node = Node::new(player, opponent, kind, depth);
        if self.slot_idx == block.len() {
            block.push(node);
        } else {
            block[self.slot_idx] = node;
        }
        let global_idx = self.block_idx * BLOCK_SIZE + self.slot_idx;
        self.slot_idx += 1;
        NodeRef(global_idx as u32)
    }

    #[inline]
    pub fn get(&self, r: NodeRef) -> &Node {
        let idx = r.0 as usize;
        &self.blocks[idx / BLOCK_SIZE][idx % BLOCK_SIZE]
    }

    #[inline]
    pub fn get_mut(&mut self, r: NodeRef) -> &mut Node {
        let idx = r.0 as usize;
        &mut self.blocks[idx / BLOCK_SIZE][idx % BLOCK_SIZE]
    }

    /// Rewinds the pool so the next `alloc` reuses slot 0, without
    /// deallocating the underlying blocks.
    pub fn reset(&mut self) {
        self.block_idx = 0;
        self.slot_idx = 0;
    }
}

impl Default for NodePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_get_round_trip() {
        let mut pool = NodePool::new();
        let r = pool.alloc(1, 2, NodeKind::Or, 10);
        assert_eq!(pool.get(r).player, 1);
        assert_eq!(pool.get(r).opponent, 2);
        assert_eq!(pool.get(r).depth, 10);
    }

    #[test]
    fn reset_reuses_slots() {
        let mut pool = NodePool::new();
        let first = pool.alloc(1, 2, NodeKind::Or, 5);
        pool.reset();
        let second = pool.alloc(3, 4, NodeKind::And, 6);
        assert_eq!(first, second);
        assert_eq!(pool.get(second).player, 3);
    }

    #[test]
    fn spans_multiple_blocks() {
        let mut pool = NodePool::new();
        for i in 0..(BLOCK_SIZE * 2 + 5) {
            let r = pool.alloc(i as u64, 0, NodeKind::Or, 0);
            assert_eq!(pool.get(r).player, i as u64);
        }
    }
}
