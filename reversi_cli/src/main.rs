//! CLI surface (§6): `solver <pos_file> [threads] [time_limit_sec] [eval_file] [flags]`.
//!
//! A thin collaborator around `reversi_core::solver::solve`: parses the
//! position file, builds `SolverOptions` from the flags, prints the result,
//! and optionally emits a CSV row or JSON object. Exit codes per §6: `0` on a
//! proven result, `1` on a parse error, `2` on `Unknown` (timeout).

mod position;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use reversi_core::options::SolverOptions;
use reversi_core::solver::{self, SolveOutcome};
use reversi_core::types::SolveResult;

/// Positional/flag surface matching §6's `solver <pos_file> [threads]
/// [time_limit_sec] [eval_file] [flags]`, plus the hybrid scheduler's
/// `-G`/`-D`/`-S` knobs and the debug/output flags it lists.
#[derive(Parser, Debug)]
#[command(name = "solver", about = "Exact endgame solver for Othello/Reversi positions")]
struct Cli {
    /// Position file: a 64-character board line followed by a side-to-move line.
    pos_file: PathBuf,

    /// Worker thread count; defaults to the host's logical CPU count.
    threads: Option<usize>,

    /// Wall-clock budget in seconds; unset means unbounded.
    time_limit_sec: Option<u64>,

    /// Optional edax-style evaluation weight file; the built-in heuristic is
    /// used when absent.
    eval_file: Option<PathBuf>,

    /// Transposition table size budget, in megabytes.
    #[arg(long, default_value_t = 256)]
    tt_mb: usize,

    /// Cap on a subtask's generation distance from its root Task.
    #[arg(short = 'G', long, default_value_t = reversi_core::options::DEFAULT_MAX_GENERATION)]
    max_generation: u32,

    /// Minimum remaining empties a node must have to be spawn-eligible.
    #[arg(short = 'D', long, default_value_t = reversi_core::options::DEFAULT_MIN_DEPTH_FOR_SPAWN)]
    min_depth_for_spawn: u32,

    /// Maximum subtasks spawned per expansion.
    #[arg(short = 'S', long, default_value_t = reversi_core::options::DEFAULT_SPAWN_LIMIT_PER_NODE)]
    spawn_limit: usize,

    /// Verbose logging (equivalent to RUST_LOG=debug for this process).
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Trace worker thread lifecycle events.
    #[arg(long)]
    trace_threads: bool,

    /// Trace work-stealing / chunk export-import events.
    #[arg(long)]
    trace_work_steal: bool,

    /// Record and print eval-ordering impact telemetry (§10.3's `EvalImpact`).
    #[arg(short = 'e', long)]
    eval_impact: bool,

    /// Append log output to this file in addition to stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Append one CSV row with the result to this file.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write a JSON object with the result to this file.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn build_options(cli: &Cli) -> SolverOptions {
    let default = SolverOptions::default();
    SolverOptions {
        threads: cli.threads.unwrap_or(default.threads),
        time_limit_secs: cli.time_limit_sec,
        tt_mb_size: cli.tt_mb,
        eval_path: cli.eval_file.clone(),
        max_generation: cli.max_generation,
        min_depth_for_spawn: cli.min_depth_for_spawn,
        spawn_limit_per_node: cli.spawn_limit,
        verbose: cli.verbose,
        trace_threads: cli.trace_threads,
        trace_work_steal: cli.trace_work_steal,
        trace_eval_impact: cli.eval_impact,
        csv_path: cli.csv.clone(),
        json_path: cli.json.clone(),
        log_path: cli.log_file.clone(),
    }
}

fn result_name(result: SolveResult) -> &'static str {
    match result {
        SolveResult::Win => "WIN",
        SolveResult::Lose => "LOSE",
        SolveResult::Draw => "DRAW",
        SolveResult::Unknown => "UNKNOWN",
    }
}

/// Prints the human-readable report to stdout (§6's "Result output").
fn print_report(outcome: &SolveOutcome, eval_impact: bool) {
    println!("result: {}", result_name(outcome.result));
    match outcome.best_move {
        Some(mv) => println!("best move: {mv}"),
        None => println!("best move: none"),
    }
    println!("nodes: {}", outcome.nodes_searched);
    println!("time: {:.3}s", outcome.elapsed.as_secs_f64());
    println!("nps: {:.0}", outcome.nps());
    println!(
        "tt: hits={} stores={} collisions={}",
        outcome.tt_stats.hits, outcome.tt_stats.stores, outcome.tt_stats.collisions
    );
    for rm in &outcome.root_moves {
        print!("  {} eval={} result={} nodes={}", rm.mv, rm.eval_score, result_name(rm.result), rm.nodes_searched);
        if eval_impact {
            print!(
                "  eval_impact: ordered={}/{} mean_rank={:.2}",
                rm.eval_impact.nodes_with_eval_ordering, rm.eval_impact.nodes_total, rm.eval_impact.mean_rank_of_chosen_child
            );
        }
        println!();
    }
}

fn csv_row(outcome: &SolveOutcome, eval_impact: bool) -> String {
    let mut row = format!(
        "{},{},{},{:.3},{:.0},{},{},{}",
        result_name(outcome.result),
        outcome.best_move.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string()),
        outcome.nodes_searched,
        outcome.elapsed.as_secs_f64(),
        outcome.nps(),
        outcome.tt_stats.hits,
        outcome.tt_stats.stores,
        outcome.tt_stats.collisions,
    );
    if eval_impact {
        let (ordered, total, rank): (u64, u64, f64) = outcome
            .root_moves
            .iter()
            .map(|rm| (rm.eval_impact.nodes_with_eval_ordering, rm.eval_impact.nodes_total, rm.eval_impact.mean_rank_of_chosen_child))
            .fold((0, 0, 0.0), |acc, x| (acc.0 + x.0, acc.1 + x.1, acc.2 + x.2));
        row.push_str(&format!(",{ordered},{total},{rank:.3}"));
    }
    row.push('\n');
    row
}

fn json_object(outcome: &SolveOutcome, eval_impact: bool) -> serde_json::Value {
    serde_json::json!({
        "result": result_name(outcome.result),
        "best_move": outcome.best_move.map(|m| m.to_string()),
        "nodes_searched": outcome.nodes_searched,
        "elapsed_secs": outcome.elapsed.as_secs_f64(),
        "nps": outcome.nps(),
        "tt_hits": outcome.tt_stats.hits,
        "tt_stores": outcome.tt_stats.stores,
        "tt_collisions": outcome.tt_stats.collisions,
        "root_moves": outcome.root_moves.iter().map(|rm| {
            let mut obj = serde_json::json!({
                "move": rm.mv.to_string(),
                "eval_score": rm.eval_score,
                "result": result_name(rm.result),
                "nodes_searched": rm.nodes_searched,
            });
            if eval_impact {
                obj["eval_impact"] = serde_json::json!({
                    "nodes_with_eval_ordering": rm.eval_impact.nodes_with_eval_ordering,
                    "nodes_total": rm.eval_impact.nodes_total,
                    "mean_rank_of_chosen_child": rm.eval_impact.mean_rank_of_chosen_child,
                });
            }
            obj
        }).collect::<Vec<_>>(),
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    if let Some(path) = &cli.log_file {
        match fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("failed to open log file {}: {e}", path.display()),
        }
    }
    builder.init();

    reversi_core::init();

    let text = match fs::read_to_string(&cli.pos_file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("parse error: {}: {e}", cli.pos_file.display());
            return ExitCode::from(1);
        }
    };

    let parsed = match position::parse(&text) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("parse error: {e}");
            return ExitCode::from(1);
        }
    };

    if let Some(path) = &cli.eval_file {
        if let Err(e) = reversi_core::eval::WeightFile::load(path) {
            eprintln!("parse error: {e}");
            return ExitCode::from(1);
        }
    }

    let options = build_options(&cli);
    info!(
        "solving {} with {} workers, time_limit={:?}",
        cli.pos_file.display(),
        options.threads,
        options.time_limit_secs
    );

    let outcome = solver::solve(&parsed.board, &options);
    print_report(&outcome, cli.eval_impact);

    if let Some(path) = &cli.csv {
        if let Err(e) = fs::write(path, csv_row(&outcome, cli.eval_impact)) {
            eprintln!("failed to write CSV to {}: {e}", path.display());
        }
    }
    if let Some(path) = &cli.json {
        match serde_json::to_string_pretty(&json_object(&outcome, cli.eval_impact)) {
            Ok(text) => {
                if let Err(e) = fs::write(path, text) {
                    eprintln!("failed to write JSON to {}: {e}", path.display());
                }
            }
            Err(e) => eprintln!("failed to serialize JSON: {e}"),
        }
    }

    match outcome.result {
        SolveResult::Unknown => ExitCode::from(2),
        SolveResult::Win | SolveResult::Lose | SolveResult::Draw => ExitCode::from(0),
    }
}
