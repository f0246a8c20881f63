//! Ledger Report CLI
//!
//! Read-only summary of the wallet ledger: one line per wallet with its last
//! recorded balances, then totals. Never touches the chain and never writes
//! or creates the ledger.
//!
//! Usage:
//!   ledger-report
//!   ledger-report --ledger data/wallets.json --holders-only
//!
//! Created: 2026-10-19

use anyhow::{Context, Result};
use clap::Parser;
use dex_rotator::config::DEFAULT_LEDGER_PATH;
use dex_rotator::ledger::WalletLedger;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ledger-report")]
struct Args {
    /// Ledger file
    #[arg(long, env = "LEDGER_PATH", default_value = DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,

    /// Only list wallets that still hold tokens
    #[arg(long)]
    holders_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_target(false)
        .init();

    let args = Args::parse();

    let ledger = WalletLedger::open_existing(&args.ledger)
        .with_context(|| format!("Failed to open ledger {}", args.ledger.display()))?;
    let mut records = ledger.records().to_vec();
    records.sort_by_key(|r| r.derivation_index);

    println!("Ledger: {} ({} wallets)", args.ledger.display(), records.len());
    println!(
        "{:>6}  {:<42}  {:>24}  {:>20}  {:>24}  {}",
        "index", "address", "tokens", "coin", "pool", "updated"
    );

    for r in &records {
        if args.holders_only && r.token_balance <= Decimal::ZERO {
            continue;
        }

        let updated = r
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>6}  {:<42}  {:>24}  {:>20}  {:>24}  {}",
            r.derivation_index,
            format!("{:?}", r.address),
            r.token_balance,
            r.coin_balance,
            r.pool_balance,
            updated
        );
    }

    println!();
    println!("Token holders: {}", ledger.token_holders().len());
    println!("Total tokens:  {}", ledger.total_token_balance());
    println!("Total coin:    {}", ledger.total_coin_balance());
    if let Some(latest) = ledger.latest() {
        println!("Active wallet: #{} {:?}", latest.derivation_index, latest.address);
    }

    Ok(())
}
