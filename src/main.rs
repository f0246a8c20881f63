//! DEX Wallet Rotator
//!
//! Main entry point for the rotation daemon.
//!
//! Each cycle the active wallet buys the quote token with a random slice of
//! its balance, hands the rest to the next HD-derived wallet, and the next
//! cycle is scheduled for that wallet after a random delay. When a wallet
//! runs low, earlier wallets' token positions are sold back into it.
//!
//! Usage:
//!   dex-rotator --env-file .env.bsc
//!   dex-rotator --env-file .env.bsc --tuning tuning.toml --cycles 10
//!   dex-rotator --dry-run
//!
//! SIGINT / SIGTERM stop the process; a cycle in flight is abandoned and the
//! next run resumes from the ledger.
//!
//! Created: 2026-10-19

use anyhow::{Context, Result};
use clap::Parser;
use dex_rotator::chain::{MnemonicDerivation, RpcChain};
use dex_rotator::config::{load_config_from_file, TuningFile};
use dex_rotator::ledger::WalletLedger;
use dex_rotator::logging::setup_logging;
use dex_rotator::rotation::{Daemon, RandomSampler, TokioClock};
use futures::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// DEX wallet rotation daemon
#[derive(Parser)]
#[command(name = "dex-rotator")]
struct Args {
    /// .env file to load (defaults to ./.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// TOML file overriding investment / schedule / rebalance tunables
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<u64>,

    /// Estimate and sign, never broadcast (one cycle, on a copy of the ledger)
    #[arg(long)]
    dry_run: bool,

    /// Log level or filter directives (falls back to RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.log_level.as_deref(), args.log_json);

    info!("DEX Wallet Rotator starting...");

    let mut config = load_config_from_file(args.env_file.as_deref())
        .context("Failed to load configuration")?;
    if let Some(path) = &args.tuning {
        config = TuningFile::load(path)?.apply(config)?;
        info!("Tuning overrides applied from {}", path.display());
    }

    let mut cycles = args.cycles;
    if args.dry_run {
        cycles = Some(1);
        config.ledger_path = WalletLedger::dry_run_copy(&config.ledger_path)
            .context("Failed to prepare dry-run ledger")?;
        info!("Dry run: one cycle, ledger at {}", config.ledger_path.display());
    }

    info!("RPC URL: {}", config.rpc_url.chars().take(40).collect::<String>());
    info!("Router: {:?}", config.router);
    info!("Pair: {:?} / {:?}", config.base_token, config.quote_token);
    info!(
        "Investment: {} - {} (reserve {})",
        config.min_investment, config.max_investment, config.min_coin_balance
    );
    info!("Delay: {}s - {}s", config.min_delay_secs, config.max_delay_secs);

    let chain = RpcChain::connect_http(&config.rpc_url, config.chain_id)
        .context("Failed to create RPC provider")?;
    let remote_chain_id = chain
        .remote_chain_id()
        .await
        .context("Failed to reach RPC endpoint")?;
    if remote_chain_id != config.chain_id {
        anyhow::bail!(
            "CHAIN_ID {} does not match the node's chain id {}",
            config.chain_id,
            remote_chain_id
        );
    }

    let mut daemon = Daemon::new(
        config,
        Arc::new(chain),
        MnemonicDerivation::new(),
        TokioClock,
        Box::new(RandomSampler::new()),
    )
    .context("Failed to initialise daemon")?;
    daemon.set_dry_run(args.dry_run);

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    tokio::select! {
        result = daemon.run(cycles) => {
            match result {
                Ok(reason) => info!("Rotation finished: {}", reason),
                Err(e) => {
                    error!("Rotation aborted: {}", e);
                    handle.close();
                    return Err(e.into());
                }
            }
        }
        Some(sig) = signals.next() => {
            warn!("Received signal {}, shutting down", sig);
        }
    }

    handle.close();
    Ok(())
}
