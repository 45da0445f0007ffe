//! The recoverable half of §7's error taxonomy.
//!
//! Only input parsing (position files, eval weight files) produces a
//! `Result` the caller can act on. Resource exhaustion and invariant
//! violations stay `panic!`/`assert!`, matching both §7's rationale ("the
//! working set is bounded by configuration and cannot recover meaningfully")
//! and the reference engine's own assert-first style. Position file parsing
//! lives entirely in `reversi_cli::position` with its own error enum, since
//! the file format is a CLI-level concern (§1's "out of scope" list); this
//! enum only covers the one input format `reversi_core` itself parses.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("eval weight file {0}")]
    EvalFile(String),
}
