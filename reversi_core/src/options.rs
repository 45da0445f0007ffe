//! Solver configuration (§6, §10.3).
//!
//! A plain struct built once by the CLI and handed by `Arc` to the
//! orchestrator, the same pattern `reversi_core::search::options::SearchOptions`
//! uses for the alpha-beta engine: no builder, no env-var magic, just public
//! fields with `Default` values matching the hybrid engine's documented
//! defaults.

use std::path::PathBuf;

/// `-G 1 -D 5 -S 9999`, carried forward verbatim from the original CLI
/// (§6, §9's "Hybrid engine default flags" resolution).
pub const DEFAULT_MAX_GENERATION: u32 = 1;
pub const DEFAULT_MIN_DEPTH_FOR_SPAWN: u32 = 5;
pub const DEFAULT_SPAWN_LIMIT_PER_NODE: usize = 9999;

#[derive(Clone, Debug)]
pub struct SolverOptions {
    /// Worker thread count; defaults to the host's logical CPU count.
    pub threads: usize,
    /// Wall-clock budget for the whole solve; `None` means unbounded.
    pub time_limit_secs: Option<u64>,
    /// Transposition table size budget, in megabytes.
    pub tt_mb_size: usize,
    /// Optional path to an edax-style evaluation weight file (§6). When
    /// absent, the built-in heuristic in [`crate::eval`] is used unmodified.
    pub eval_path: Option<PathBuf>,

    /// `-G`: cap on a subtask's generation distance from its root Task (§4.7).
    pub max_generation: u32,
    /// `-D`: minimum remaining empties a node must have to be spawn-eligible (§4.7).
    pub min_depth_for_spawn: u32,
    /// `-S`: maximum subtasks spawned per expansion (§4.7).
    pub spawn_limit_per_node: usize,

    /// Debug/trace toggles (§6); each maps to a `log` target at `debug!`/`trace!`.
    pub verbose: bool,
    pub trace_threads: bool,
    pub trace_work_steal: bool,
    pub trace_eval_impact: bool,

    /// Optional result-sink paths (§6).
    pub csv_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl Default for SolverOptions {
    fn default() -> SolverOptions {
        SolverOptions {
            threads: num_cpus::get().max(1),
            time_limit_secs: None,
            tt_mb_size: 256,
            eval_path: None,
            max_generation: DEFAULT_MAX_GENERATION,
            min_depth_for_spawn: DEFAULT_MIN_DEPTH_FOR_SPAWN,
            spawn_limit_per_node: DEFAULT_SPAWN_LIMIT_PER_NODE,
            verbose: false,
            trace_threads: false,
            trace_work_steal: false,
            trace_eval_impact: false,
            csv_path: None,
            json_path: None,
            log_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hybrid_engine_cli_flags() {
        let opts = SolverOptions::default();
        assert_eq!(opts.max_generation, 1);
        assert_eq!(opts.min_depth_for_spawn, 5);
        assert_eq!(opts.spawn_limit_per_node, 9999);
    }
}
