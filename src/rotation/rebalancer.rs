//! Liquidity Rebalancer
//!
//! When the active wallet is too thin to trade, earlier wallets that still
//! hold the quote token are liquidated back into native currency with the
//! proceeds paid to the active wallet.
//!
//! Candidates come from the ledger but are re-verified on-chain, then taken
//! largest position first (ledger order on ties). Per candidate:
//!
//! 1. fund its gas from the active wallet if it cannot pay for approve + sell
//! 2. approve the router for the token's total supply if the allowance is short
//! 3. sell the whole balance, proceeds to the active wallet
//! 4. sweep any unused gas top-up back to the active wallet
//!
//! A failing candidate is logged and skipped. Only a ledger write failure
//! stops the pass.
//!
//! Created: 2026-10-19

use super::executor::{AllowanceState, TradeExecutor};
use crate::chain::{ChainAdapter, ContractCaller};
use crate::error::{ChainError, RotationResult};
use crate::ledger::WalletLedger;
use crate::types::{SkipReason, TxOutcome, WalletRecord};
use crate::units::{to_units, wei_to_ether_lossy};
use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// What one rebalancing pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    /// Candidates processed, in processing order
    pub visited: Vec<Address>,
    pub sold: Vec<Address>,
    pub failed: Vec<(Address, String)>,
}

impl RebalanceReport {
    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LiquidityRebalancer {
    /// Gas units a candidate must be able to pay for (approve + sell)
    pub candidate_gas_units: u64,
    pub quote_token_decimals: u8,
}

impl LiquidityRebalancer {
    pub fn new(candidate_gas_units: u64, quote_token_decimals: u8) -> Self {
        Self {
            candidate_gas_units,
            quote_token_decimals,
        }
    }

    /// Run one pass for `active`, updating and persisting the ledger after
    /// each candidate.
    pub async fn rebalance<C>(
        &self,
        executor: &TradeExecutor<C>,
        ledger: &mut WalletLedger,
        active: &WalletRecord,
    ) -> RotationResult<RebalanceReport>
    where
        C: ChainAdapter + ContractCaller,
    {
        let mut report = RebalanceReport::default();
        let candidates = self.verified_candidates(executor, ledger, active, &mut report).await?;

        info!("🔄 Rebalancing: {} candidate wallet(s)", candidates.len());

        for (candidate, live_balance) in candidates {
            report.visited.push(candidate.address);
            info!(
                "Candidate #{} {:?}: {} tokens",
                candidate.derivation_index,
                candidate.address,
                self.token_units(live_balance)
            );

            match self.liquidate(executor, active, &candidate, live_balance).await {
                Ok(TxOutcome::Confirmed(_)) | Ok(TxOutcome::DryRun { .. }) => {
                    report.sold.push(candidate.address);
                }
                Ok(TxOutcome::Skipped(reason)) => {
                    warn!("Candidate {:?} skipped: {}", candidate.address, reason);
                    report.failed.push((candidate.address, reason.to_string()));
                }
                Err(e) => {
                    warn!("Candidate {:?} failed: {}", candidate.address, e);
                    report.failed.push((candidate.address, e.to_string()));
                }
            }

            let refreshed = self.refresh(executor, candidate).await;
            ledger.upsert(refreshed)?;
            ledger.persist()?;
        }

        info!(
            "Rebalancing done: {} sold, {} failed",
            report.sold.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Ledger token holders other than `active`, re-read on-chain, largest first.
    async fn verified_candidates<C>(
        &self,
        executor: &TradeExecutor<C>,
        ledger: &mut WalletLedger,
        active: &WalletRecord,
        report: &mut RebalanceReport,
    ) -> RotationResult<Vec<(WalletRecord, U256)>>
    where
        C: ChainAdapter + ContractCaller,
    {
        let chain = executor.chain();
        let mut verified = Vec::new();
        let mut zeroed = false;

        for mut record in ledger.token_holders() {
            if record.address == active.address {
                continue;
            }
            match chain.balance_of(executor.quote_token(), record.address).await {
                Ok(live) if live.is_zero() => {
                    debug!("{:?} no longer holds tokens", record.address);
                    record.token_balance = Decimal::ZERO;
                    ledger.upsert(record)?;
                    zeroed = true;
                }
                Ok(live) => verified.push((record, live)),
                Err(e) => {
                    warn!("Could not verify {:?}: {}", record.address, e);
                    report.failed.push((record.address, e.to_string()));
                }
            }
        }

        if zeroed {
            ledger.persist()?;
        }

        // Stable: equal balances keep ledger order
        verified.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(verified)
    }

    async fn liquidate<C>(
        &self,
        executor: &TradeExecutor<C>,
        active: &WalletRecord,
        candidate: &WalletRecord,
        live_balance: U256,
    ) -> Result<TxOutcome, ChainError>
    where
        C: ChainAdapter + ContractCaller,
    {
        if !candidate.has_secret() {
            return Err(ChainError::Signing(format!(
                "no key loaded for {:?}",
                candidate.address
            )));
        }

        if let Some(reason) = self.fund_gas(executor, active, candidate).await? {
            return Ok(TxOutcome::Skipped(reason));
        }

        if let AllowanceState::Blocked(reason) = executor
            .ensure_allowance(candidate, executor.quote_token(), live_balance)
            .await?
        {
            return Ok(TxOutcome::Skipped(reason));
        }

        let outcome = executor.sell(candidate, active.address).await?;

        if matches!(outcome, TxOutcome::Confirmed(_)) {
            match executor.sweep_coin(candidate, active.address).await {
                Ok(TxOutcome::Confirmed(_)) => debug!("Leftover gas returned from {:?}", candidate.address),
                Ok(_) => {}
                Err(e) => warn!("Leftover sweep from {:?} failed: {}", candidate.address, e),
            }
        }

        Ok(outcome)
    }

    /// Top the candidate up to `candidate_gas_units` worth of gas. Returns a
    /// skip reason when the top-up could not be made.
    async fn fund_gas<C>(
        &self,
        executor: &TradeExecutor<C>,
        active: &WalletRecord,
        candidate: &WalletRecord,
    ) -> Result<Option<SkipReason>, ChainError>
    where
        C: ChainAdapter + ContractCaller,
    {
        let chain = executor.chain();
        let gas_price = chain.get_gas_price().await?;
        let needed = U256::from(gas_price) * U256::from(self.candidate_gas_units);
        let have = chain.get_balance(candidate.address).await?;
        if have >= needed {
            return Ok(None);
        }

        let top_up = needed - have;
        info!(
            "Funding {} native gas to {:?}",
            wei_to_ether_lossy(top_up),
            candidate.address
        );
        match executor.transfer_coin(active, candidate.address, top_up).await? {
            TxOutcome::Skipped(reason) => Ok(Some(reason)),
            _ => Ok(None),
        }
    }

    /// Best-effort re-read of a candidate's balances for the ledger
    async fn refresh<C>(&self, executor: &TradeExecutor<C>, mut record: WalletRecord) -> WalletRecord
    where
        C: ChainAdapter + ContractCaller,
    {
        let chain = executor.chain();
        match chain.balance_of(executor.quote_token(), record.address).await {
            Ok(raw) => record.token_balance = self.token_units(raw),
            Err(e) => warn!("Token balance refresh for {:?} failed: {}", record.address, e),
        }
        match chain.get_balance(record.address).await {
            Ok(raw) => record.coin_balance = wei_to_ether_lossy(raw),
            Err(e) => warn!("Coin balance refresh for {:?} failed: {}", record.address, e),
        }
        record
    }

    fn token_units(&self, raw: U256) -> Decimal {
        to_units(raw, self.quote_token_decimals).unwrap_or(Decimal::MAX)
    }
}

