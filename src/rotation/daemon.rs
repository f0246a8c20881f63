//! Rotation Daemon
//!
//! Runs one rotation cycle for the active wallet and schedules the next one
//! for a freshly derived wallet:
//!
//!   Idle → Evaluating → (Rebalancing)? → Buying → Migrating → Scheduled
//!
//! The daemon owns the ledger outright; nothing else writes to it. Each cycle
//! is strictly sequential, so no wallet ever has two transactions in flight.
//!
//! Terminal conditions end the run without scheduling a successor: the
//! active wallet has no balance, or it is still below the reserve after
//! rebalancing. Every other per-step failure is logged and the cycle carries
//! on in degraded form.
//!
//! Created: 2026-10-19

use super::executor::TradeExecutor;
use super::planner::{InvestmentPlanner, PlanOutcome, Sampler};
use super::rebalancer::{LiquidityRebalancer, RebalanceReport};
use super::schedule::{Clock, DelayWindow, ScheduledCycle};
use crate::chain::{ChainAdapter, ContractCaller, KeyDerivation};
use crate::error::{RotationError, RotationResult};
use crate::ledger::WalletLedger;
use crate::types::{MarketMove, RotatorConfig, TxOutcome, WalletRecord};
use crate::units::{to_units, wei_to_ether_lossy};
use alloy::primitives::U256;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Idle,
    Evaluating,
    Rebalancing,
    Buying,
    Migrating,
    Scheduled,
    Terminated,
}

/// Why the run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// Active wallet balance is zero
    NoGas,
    /// Still below the reserve after rebalancing
    InsufficientLiquidity,
    /// Requested number of cycles reached
    CycleLimit,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TerminalReason::NoGas => write!(f, "active wallet has no balance"),
            TerminalReason::InsufficientLiquidity => {
                write!(f, "balance below reserve after rebalancing")
            }
            TerminalReason::CycleLimit => write!(f, "cycle limit reached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Scheduled(ScheduledCycle),
    Terminated(TerminalReason),
}

pub struct Daemon<C, K, T> {
    config: RotatorConfig,
    executor: TradeExecutor<C>,
    keys: K,
    clock: T,
    sampler: Box<dyn Sampler>,
    ledger: WalletLedger,
    planner: InvestmentPlanner,
    rebalancer: LiquidityRebalancer,
    window: DelayWindow,
    active: WalletRecord,
    state: DaemonState,
    pending: Option<ScheduledCycle>,
    last_rebalance: Option<RebalanceReport>,
}

impl<C, K, T> Daemon<C, K, T>
where
    C: ChainAdapter + ContractCaller,
    K: KeyDerivation,
    T: Clock,
{
    /// Load the ledger, restore keys and pick the active wallet.
    ///
    /// Resumes from the highest-index wallet in the ledger (the one the last
    /// run funded). An empty ledger starts at `config.start_index`.
    pub fn new(
        config: RotatorConfig,
        chain: Arc<C>,
        keys: K,
        clock: T,
        sampler: Box<dyn Sampler>,
    ) -> RotationResult<Self> {
        let mut ledger = WalletLedger::load(&config.ledger_path)?;
        ledger.hydrate(&keys, &config.seed_phrase)?;

        let active = match ledger.latest() {
            Some(record) => {
                info!(
                    "Resuming from wallet #{} {:?} ({} records in ledger)",
                    record.derivation_index,
                    record.address,
                    ledger.len()
                );
                record.clone()
            }
            None => {
                let key = keys.derive(&config.seed_phrase, config.start_index)?;
                let record = WalletRecord::derived(key.secret, key.address, key.index);
                info!("Starting with wallet #{} {:?}", record.derivation_index, record.address);
                ledger.upsert(record.clone())?;
                ledger.persist()?;
                record
            }
        };

        let planner = InvestmentPlanner::new(
            config.min_investment,
            config.max_investment,
            config.min_coin_balance,
        );
        let rebalancer = LiquidityRebalancer::new(config.candidate_gas_units, config.quote_token_decimals);
        let window = DelayWindow::new(config.min_delay_secs, config.max_delay_secs);
        let executor = TradeExecutor::new(chain, &config);

        Ok(Self {
            config,
            executor,
            keys,
            clock,
            sampler,
            ledger,
            planner,
            rebalancer,
            window,
            active,
            state: DaemonState::Idle,
            pending: None,
            last_rebalance: None,
        })
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.executor.set_dry_run(dry_run);
    }

    pub fn active(&self) -> &WalletRecord {
        &self.active
    }

    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn pending(&self) -> Option<&ScheduledCycle> {
        self.pending.as_ref()
    }

    pub fn last_rebalance(&self) -> Option<&RebalanceReport> {
        self.last_rebalance.as_ref()
    }

    /// Run cycles until a terminal condition or `max_cycles` is reached,
    /// sleeping on the clock between them.
    ///
    /// A chain read failure that prevents a cycle from starting reschedules
    /// the same wallet. Ledger write failures end the run with an error.
    pub async fn run(&mut self, max_cycles: Option<u64>) -> RotationResult<TerminalReason> {
        let mut completed = 0u64;

        loop {
            if let Some(limit) = max_cycles {
                if completed >= limit {
                    info!("Stopping after {} cycle(s)", completed);
                    self.state = DaemonState::Terminated;
                    return Ok(TerminalReason::CycleLimit);
                }
            }

            let next = match self.run_cycle().await {
                Ok(CycleOutcome::Scheduled(next)) => next,
                Ok(CycleOutcome::Terminated(reason)) => return Ok(reason),
                Err(RotationError::Chain(e)) => {
                    error!("Cycle for {:?} aborted: {}", self.active.address, e);
                    let retry = self.window.schedule(
                        &self.clock,
                        self.sampler.as_mut(),
                        self.active.address,
                        self.active.derivation_index,
                    );
                    info!("⏰ Retrying {}", retry);
                    self.pending = Some(retry.clone());
                    self.state = DaemonState::Scheduled;
                    retry
                }
                Err(e) => return Err(e),
            };

            completed += 1;
            if max_cycles.map_or(false, |limit| completed >= limit) {
                continue;
            }
            self.clock.sleep_until(next.trigger_at).await;
        }
    }

    /// One full cycle for the active wallet.
    pub async fn run_cycle(&mut self) -> RotationResult<CycleOutcome> {
        self.pending = None;
        self.last_rebalance = None;

        // ── Evaluating ──
        self.state = DaemonState::Evaluating;
        let balance = self.coin_balance_of(&self.active).await?;
        info!(
            "💰 Wallet #{} {:?}: {} native",
            self.active.derivation_index, self.active.address, balance
        );

        let investment = match self.planner.plan(balance, self.sampler.as_mut()) {
            PlanOutcome::Invest(amount) => amount,
            PlanOutcome::Exhausted => return Ok(self.terminate(TerminalReason::NoGas)),
            PlanOutcome::LowLiquidity { balance, attempted } => {
                warn!(
                    "Low liquidity: {} native, wanted to invest {} (reserve {})",
                    balance, attempted, self.planner.reserve
                );

                // ── Rebalancing ──
                self.state = DaemonState::Rebalancing;
                let report = self
                    .rebalancer
                    .rebalance(&self.executor, &mut self.ledger, &self.active)
                    .await?;
                self.last_rebalance = Some(report);

                let refreshed = self.coin_balance_of(&self.active).await?;
                match self.planner.recheck(refreshed, attempted) {
                    PlanOutcome::Invest(amount) => amount,
                    PlanOutcome::Exhausted => return Ok(self.terminate(TerminalReason::NoGas)),
                    PlanOutcome::LowLiquidity { balance, .. } => {
                        warn!("Still {} native after rebalancing", balance);
                        return Ok(self.terminate(TerminalReason::InsufficientLiquidity));
                    }
                }
            }
        };
        info!("Investing {} native", investment);

        // ── Buying ──
        self.state = DaemonState::Buying;
        match self.executor.buy(&self.active, investment).await {
            Ok(TxOutcome::Skipped(reason)) => warn!("Buy skipped: {}", reason),
            Ok(_) => {}
            Err(e) => warn!("Buy failed, continuing without it: {}", e),
        }

        if let Some(tokens) = self.token_balance_of(&self.active).await {
            self.active.token_balance = tokens;
        }
        self.ledger.upsert(self.active.clone())?;
        self.ledger.persist()?;

        // ── Migrating ──
        self.state = DaemonState::Migrating;
        let next_index = self.active.derivation_index.checked_add(1).ok_or_else(|| {
            RotationError::KeyDerivation("derivation index exhausted".to_string())
        })?;
        let key = self.keys.derive(&self.config.seed_phrase, next_index)?;
        let mut next = WalletRecord::derived(key.secret, key.address, key.index);
        info!("🔑 Next wallet #{} {:?}", next.derivation_index, next.address);

        // Record the target before funds move, so a crash mid-transfer still
        // leaves it discoverable.
        self.ledger.upsert(next.clone())?;
        self.ledger.persist()?;

        match self.executor.sweep_coin(&self.active, next.address).await {
            Ok(TxOutcome::Skipped(reason)) => warn!("Migration skipped: {}", reason),
            Ok(_) => info!("Migrated balance to {:?}", next.address),
            Err(e) => warn!("Migration to {:?} failed: {}", next.address, e),
        }

        self.refresh_active().await;
        if let Ok(raw) = self.executor.chain().get_balance(next.address).await {
            next.coin_balance = wei_to_ether_lossy(raw);
        }

        self.ledger.upsert(self.active.clone())?;
        self.ledger.upsert(next.clone())?;
        self.ledger.persist()?;

        // ── Scheduled ──
        let scheduled = self.window.schedule(
            &self.clock,
            self.sampler.as_mut(),
            next.address,
            next.derivation_index,
        );
        info!("⏰ Next cycle: {}", scheduled);

        self.active = next;
        self.state = DaemonState::Scheduled;
        self.pending = Some(scheduled.clone());
        Ok(CycleOutcome::Scheduled(scheduled))
    }

    fn terminate(&mut self, reason: TerminalReason) -> CycleOutcome {
        warn!("🛑 Rotation stopped at wallet #{}: {}", self.active.derivation_index, reason);
        self.state = DaemonState::Terminated;
        self.pending = None;
        CycleOutcome::Terminated(reason)
    }

    async fn coin_balance_of(&self, wallet: &WalletRecord) -> RotationResult<Decimal> {
        let raw = self.executor.chain().get_balance(wallet.address).await?;
        Ok(wei_to_ether_lossy(raw))
    }

    async fn token_balance_of(&self, wallet: &WalletRecord) -> Option<Decimal> {
        match self
            .executor
            .chain()
            .balance_of(self.config.quote_token, wallet.address)
            .await
        {
            Ok(raw) => Some(self.token_units(raw)),
            Err(e) => {
                warn!("Token balance read for {:?} failed: {}", wallet.address, e);
                None
            }
        }
    }

    /// Re-read the active wallet's balances after it has traded and handed off.
    async fn refresh_active(&mut self) {
        let chain = self.executor.chain().clone();
        let address = self.active.address;

        if let Some(tokens) = self.token_balance_of(&self.active).await {
            self.active.token_balance = tokens;
        }
        match chain.get_balance(address).await {
            Ok(raw) => self.active.coin_balance = wei_to_ether_lossy(raw),
            Err(e) => warn!("Coin balance read for {:?} failed: {}", address, e),
        }
        match chain.get_transaction_count(address).await {
            Ok(nonce) => self.active.nonce = Some(nonce),
            Err(e) => warn!("Nonce read for {:?} failed: {}", address, e),
        }

        match chain.balance_of(self.config.quote_token, self.config.pair_pool).await {
            Ok(raw) => {
                let pool = self.token_units(raw);
                match self.previous_pool_balance() {
                    Some(previous) => info!(
                        "📊 {} (pool {} -> {})",
                        MarketMove::between(previous, pool),
                        previous,
                        pool
                    ),
                    None => info!("📊 Pool holds {} tokens", pool),
                }
                self.active.pool_balance = pool;
            }
            Err(e) => warn!("Pool balance read failed: {}", e),
        }
    }

    /// Pool balance recorded by the most recent earlier wallet that saw one
    fn previous_pool_balance(&self) -> Option<Decimal> {
        self.ledger
            .records()
            .iter()
            .filter(|r| r.derivation_index < self.active.derivation_index)
            .filter(|r| r.pool_balance > Decimal::ZERO)
            .max_by_key(|r| r.derivation_index)
            .map(|r| r.pool_balance)
    }

    fn token_units(&self, raw: U256) -> Decimal {
        to_units(raw, self.config.quote_token_decimals).unwrap_or(Decimal::MAX)
    }
}
