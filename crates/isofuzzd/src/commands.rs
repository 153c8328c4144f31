use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "isofuzzd")]
#[command(about = "generates and replays isolation-anomaly tests against transactional DUTs", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(name = "run", about = "generate and run one randomized test")]
    Run(RunArgs),
    #[command(name = "reproduce", about = "replay a saved reproducer and report its verdict")]
    Reproduce(ReproduceArgs),
    #[command(name = "minimize", about = "shrink a reproducer to the smallest queue reproducing its anomaly")]
    Minimize(MinimizeArgs),
    #[command(name = "decycle", about = "report which statements are load-bearing for a reproducer's anomaly")]
    Decycle(ReproduceArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// seed for the random source
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    #[arg(long, default_value_t = 3)]
    pub table_count: u32,
    #[arg(long, default_value_t = 4)]
    pub transaction_count: u32,
    #[arg(long, default_value_t = 6)]
    pub statements_per_transaction: u32,
    #[arg(long, default_value_t = 10)]
    pub abort_probability_pct: u32,
    /// whether committed transactions may freely interleave while another
    /// committed transaction is blocked; set to false to test a
    /// non-serializable isolation level
    #[arg(long, default_value_t = true)]
    pub is_serializable: bool,
    /// directory a reproducer is written to on any anomaly or fatal bug
    #[arg(long, default_value = "reproducers")]
    pub reproducer_dir: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ReproduceArgs {
    /// directory containing stmts.sql, tid.txt, and usage.txt
    pub dir: PathBuf,
}

#[derive(Debug, Parser)]
pub struct MinimizeArgs {
    /// directory containing stmts.sql, tid.txt, and usage.txt
    pub dir: PathBuf,
    /// directory the minimized reproducer is written to
    pub out: PathBuf,
}
