use std::process;

use anyhow::Context;
use tracing::{error, info};

use claim_indexer::cli::{self, Command};
use claim_indexer::jobs::ChainValidation;
use claim_indexer::{Config, Daemon};

#[tokio::main]
async fn main() {
    let args = cli::parse_args();
    init_logging(&args);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(args: cli::Args) -> anyhow::Result<()> {
    let mut config = Config::load(&args.config_path)
        .with_context(|| format!("loading {}", args.config_path.display()))?;
    config.apply_env_overrides();
    config.apply_cli_overrides(&args)?;

    let daemon = Daemon::new(config.clone()).await.context("initializing indexer")?;

    match args.command.clone().unwrap_or(Command::Run) {
        Command::Run => {
            daemon.run().await?;
            info!("Claim indexer stopped");
        }
        Command::Validate { from, to } => {
            let pipeline = daemon.pipeline().clone();
            let to = match to {
                Some(to) => to,
                None => pipeline.db().blocks().max_height().await?.map_or(0, |h| h.max(0) as u64),
            };
            let issues = ChainValidation::new(pipeline, config.jobs.validation_batch)
                .validate_range(from, to)
                .await?;
            info!("{} issues between heights {} and {}", issues.len(), from, to);
        }
        Command::ResyncBalances => {
            let changed = daemon.pipeline().db().addresses().resync_all_balances().await?;
            info!("Resynced balances, {} addresses changed", changed);
        }
    }
    Ok(())
}

fn init_logging(args: &cli::Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt().with_env_filter(filter).with_target(true).with_thread_ids(true).init();
    }
}
