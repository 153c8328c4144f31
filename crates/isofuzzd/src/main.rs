//! CLI front end over `isofuzz-core` and `isofuzz-reproducer`. Kept
//! deliberately thin: every command is a few lines of wiring, with all the
//! real logic living in the library crates. Exit codes: `0` clean, `1`
//! anomaly/fatal bug found, `2` a usage or I/O failure prevented the test
//! from running at all.

mod commands;
mod schema;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use isofuzz_core::{init_logging, run_test, CoreError, RunConfig, TestOutcome};
use isofuzz_dut::MemoryDut;
use isofuzz_reproducer::{decycle, minimize, read_reproducer, replay, to_queue, write_reproducer};
use tracing::{error, info};

use commands::{Cli, Commands, MinimizeArgs, ReproduceArgs, RunArgs};

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Reproduce(args) => reproduce(args),
        Commands::Minimize(args) => minimize_cmd(args),
        Commands::Decycle(args) => decycle_cmd(args),
    }
}

fn run(args: RunArgs) -> ExitCode {
    let config = RunConfig {
        seed: args.seed,
        table_count: args.table_count,
        transaction_count: args.transaction_count,
        statements_per_transaction: args.statements_per_transaction,
        abort_probability_pct: args.abort_probability_pct,
        is_serializable: args.is_serializable,
        ..RunConfig::default()
    };
    let mut dut = MemoryDut::new();
    match run_test(&config, &mut dut, &args.reproducer_dir) {
        Ok(TestOutcome::Clean) => {
            info!(seed = config.seed, "no anomaly observed");
            ExitCode::from(0)
        }
        Ok(TestOutcome::Anomaly { analysis, reproducer_dir }) => {
            println!("anomaly found: {:?}", analysis.verdict);
            println!("reproducer written to {}", reproducer_dir.display());
            ExitCode::from(1)
        }
        Err(CoreError::FatalBug(msg)) => {
            println!("fatal bug observed: {msg}");
            ExitCode::from(1)
        }
        Err(err) => {
            error!(%err, "run failed");
            ExitCode::from(2)
        }
    }
}

fn reproduce(args: ReproduceArgs) -> ExitCode {
    match replay_reproducer(&args.dir) {
        Ok(analysis) => {
            if analysis.verdict.any() {
                println!("anomaly confirmed: {:?}", analysis.verdict);
                ExitCode::from(1)
            } else {
                println!("no anomaly: reproducer no longer reproduces");
                ExitCode::from(0)
            }
        }
        Err(err) => {
            error!(%err, "reproduce failed");
            ExitCode::from(2)
        }
    }
}

fn minimize_cmd(args: MinimizeArgs) -> ExitCode {
    let files = match read_reproducer(&args.dir) {
        Ok(files) => files,
        Err(err) => {
            error!(%err, "could not read reproducer");
            return ExitCode::from(2);
        }
    };
    let queue = to_queue(&files);

    let baseline = match replay_queue(&queue) {
        Ok(analysis) => analysis,
        Err(err) => {
            error!(%err, "baseline replay failed");
            return ExitCode::from(2);
        }
    };
    if !baseline.verdict.any() {
        println!("reproducer does not currently reproduce any anomaly; nothing to minimize");
        return ExitCode::from(0);
    }
    let target = target_for(&baseline.verdict);

    let minimized = match minimize(&queue, target, |candidate| replay_queue(candidate).map(|a| a.verdict)) {
        Ok(minimized) => minimized,
        Err(err) => {
            error!(%err, "minimize failed");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = write_reproducer(&args.out, &minimized) {
        error!(%err, "could not write minimized reproducer");
        return ExitCode::from(2);
    }
    println!("minimized {} statements down to {}", queue.len(), minimized.len());
    println!("written to {}", args.out.display());
    ExitCode::from(1)
}

fn decycle_cmd(args: ReproduceArgs) -> ExitCode {
    let files = match read_reproducer(&args.dir) {
        Ok(files) => files,
        Err(err) => {
            error!(%err, "could not read reproducer");
            return ExitCode::from(2);
        }
    };
    let queue = to_queue(&files);

    let baseline = match replay_queue(&queue) {
        Ok(analysis) => analysis,
        Err(err) => {
            error!(%err, "baseline replay failed");
            return ExitCode::from(2);
        }
    };
    if !baseline.verdict.any() {
        println!("reproducer does not currently reproduce any anomaly; nothing to decycle");
        return ExitCode::from(0);
    }
    let target = target_for(&baseline.verdict);

    match decycle(&queue, target, |candidate| replay_queue(candidate).map(|a| a.verdict)) {
        Ok(load_bearing) => {
            println!("{} of {} statements are load-bearing:", load_bearing.len(), queue.len());
            for i in &load_bearing {
                println!("  [{i}] txn {:?}: {}", queue[*i].txn, queue[*i].text);
            }
            ExitCode::from(1)
        }
        Err(err) => {
            error!(%err, "decycle failed");
            ExitCode::from(2)
        }
    }
}

fn replay_reproducer(dir: &Path) -> Result<isofuzz_analyzer::Analysis, isofuzz_reproducer::ReproducerError> {
    let files = read_reproducer(dir)?;
    let queue = to_queue(&files);
    replay_queue(&queue)
}

/// Declares every table the queue touches on a fresh `MemoryDut` and
/// replays it. A reproducer carries no schema of its own, so every call
/// site that needs to re-execute a queue goes through here rather than
/// through `isofuzz_reproducer::replay` directly.
fn replay_queue(
    queue: &[isofuzz_instrument::InstrumentedStmt],
) -> Result<isofuzz_analyzer::Analysis, isofuzz_reproducer::ReproducerError> {
    let mut dut = MemoryDut::new();
    schema::declare_referenced_tables(queue, &mut dut);
    replay(queue, &mut dut, true)
}

/// Picks the first anomaly a baseline replay confirmed, so minimize/decycle
/// shrink toward preserving that one predicate rather than "any anomaly at
/// all" drifting between runs.
fn target_for(verdict: &isofuzz_analyzer::Verdict) -> impl Fn(&isofuzz_analyzer::Verdict) -> bool {
    let (g1a, g1b, g1c, g2_item, gsia, gsib) =
        (verdict.g1a, verdict.g1b, verdict.g1c, verdict.g2_item, verdict.gsia, verdict.gsib);
    move |v: &isofuzz_analyzer::Verdict| {
        (g1a && v.g1a)
            || (g1b && v.g1b)
            || (g1c && v.g1c)
            || (g2_item && v.g2_item)
            || (gsia && v.gsia)
            || (gsib && v.gsib)
    }
}
