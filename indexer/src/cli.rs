use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "claim-indexer")]
#[command(about = "Claim chain relational indexer", long_about = None)]
pub struct Args {
    /// Path to configuration file (optional, uses defaults if not provided)
    #[arg(short, long, default_value = "claim-indexer.toml")]
    pub config_path: PathBuf,

    /// SQLite database file
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Full node JSON-RPC URL, credentials included
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Network (mainnet, testnet, regtest)
    #[arg(short, long)]
    pub network: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Fan-out ceiling (0 = one worker per CPU)
    #[arg(long)]
    pub workers: Option<usize>,

    /// First height to index into an empty database
    #[arg(long)]
    pub start_height: Option<u64>,

    /// Index blocks only, without the reconciliation jobs
    #[arg(long)]
    pub no_jobs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Follow the chain and run the reconciliation jobs (default)
    Run,
    /// Report differences between the index and the node for a height range
    Validate {
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long)]
        to: Option<u64>,
    },
    /// Recompute every address balance from the ledger rows
    ResyncBalances,
}

pub fn parse_args() -> Args {
    Args::parse()
}
