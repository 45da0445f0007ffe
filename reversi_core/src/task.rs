//! Units of work moved between workers by the three-tier scheduler (§3, §4.4).

use crate::types::{Depth, Generation, NodeKind, Priority, Score};

/// A subtree to prove, named by position rather than by a live node —
/// Tasks must be cheaply movable between threads, so they carry no arena
/// reference (§3).
#[derive(Clone, Copy, Debug)]
pub struct Task {
    pub player: u64,
    pub opponent: u64,
    /// Index into the root-move table this task's proof ultimately feeds.
    pub root_move: usize,
    pub priority: Priority,
    pub eval_score: Score,
    pub is_root: bool,
    pub kind: NodeKind,
    pub depth: Depth,
    pub generation: Generation,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        player: u64,
        opponent: u64,
        root_move: usize,
        priority: Priority,
        eval_score: Score,
        is_root: bool,
        kind: NodeKind,
        depth: Depth,
        generation: Generation,
    ) -> Task {
        Task {
            player,
            opponent,
            root_move,
            priority,
            eval_score,
            is_root,
            kind,
            depth,
            generation,
        }
    }

    /// Builds the Task for a spawned child subtree, per the spawning
    /// policy's priority-boost formula (§4.7): the child inherits the
    /// ancestor root Task's `root_move` (invariant 4, §3), its generation is
    /// the parent node's generation plus one, and its priority is bumped so
    /// fresher (shallower-generation) subtasks tend to edge out stale ones.
    ///
    /// Takes the *parent node's* generation and kind directly rather than a
    /// live ancestor `Task`, since most spawns happen many recursion levels
    /// below the literal root Task that a worker first picked up.
    #[allow(clippy::too_many_arguments)]
    pub fn child(
        root_move: usize,
        parent_generation: Generation,
        parent_kind: NodeKind,
        player: u64,
        opponent: u64,
        eval_score: Score,
        depth: Depth,
    ) -> Task {
        let generation = parent_generation + 1;
        let priority = eval_score as Priority + 5_000 - 1_000 * generation as Priority;
        Task {
            player,
            opponent,
            root_move,
            priority,
            eval_score,
            is_root: false,
            kind: parent_kind.flip(),
            depth,
            generation,
        }
    }

    /// The root-split priority boost (§4.7): a flat `+10000` rather than the
    /// generation-scaled formula in [`Self::child`], since root-split
    /// subtasks are always generation 1 and meant to be picked up first.
    pub fn root_split_child(root_move: usize, player: u64, opponent: u64, eval_score: Score, depth: Depth, parent_kind: NodeKind) -> Task {
        Task {
            player,
            opponent,
            root_move,
            priority: eval_score as Priority + 10_000,
            eval_score,
            is_root: false,
            kind: parent_kind.flip(),
            depth,
            generation: 1,
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by `priority` only, so `Task` can sit directly in a
/// `BinaryHeap`/custom max-heap without a wrapper (§4.4).
impl Ord for Task {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// Fixed-size batch of Tasks, the unit the GlobalChunkQueue actually stores
/// (GLOSSARY, §4.4).
pub const CHUNK_SIZE: usize = 16;

#[derive(Clone, Debug)]
pub struct Chunk {
    tasks: Vec<Task>,
    pub top_priority: Priority,
}

impl Chunk {
    /// `tasks` must already be sorted descending by priority; `tasks[0]`
    /// becomes `top_priority`.
    pub fn new(tasks: Vec<Task>) -> Chunk {
        debug_assert!(!tasks.is_empty());
        debug_assert!(tasks.len() <= CHUNK_SIZE);
        let top_priority = tasks[0].priority;
        Chunk { tasks, top_priority }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.top_priority == other.top_priority
    }
}
impl Eq for Chunk {}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.top_priority.cmp(&other.top_priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(priority: Priority) -> Task {
        Task::new(0, 0, 0, priority, 0, false, NodeKind::Or, 10, 0)
    }

    #[test]
    fn tasks_order_by_priority() {
        let mut v = vec![t(5), t(1), t(9)];
        v.sort();
        assert_eq!(v.iter().map(|t| t.priority).collect::<Vec<_>>(), vec![1, 5, 9]);
    }

    #[test]
    fn spawn_child_inherits_root_move_and_bumps_generation() {
        let child = Task::child(3, 0, NodeKind::Or, 4, 5, 20, 11);
        assert_eq!(child.root_move, 3);
        assert_eq!(child.generation, 1);
        assert_eq!(child.kind, NodeKind::And);
        assert_eq!(child.priority, 20 + 5_000 - 1_000);
    }

    #[test]
    fn root_split_child_always_generation_one() {
        let child = Task::root_split_child(2, 8, 9, 30, 10, NodeKind::And);
        assert_eq!(child.generation, 1);
        assert_eq!(child.kind, NodeKind::Or);
        assert_eq!(child.priority, 30 + 10_000);
    }

    #[test]
    fn chunk_top_priority_is_first_task() {
        let chunk = Chunk::new(vec![t(9), t(5), t(1)]);
        assert_eq!(chunk.top_priority, 9);
        assert_eq!(chunk.len(), 3);
    }
}
