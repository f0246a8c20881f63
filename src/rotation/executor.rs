//! Trade Executor
//!
//! Turns buy / sell / approve / transfer intents into complete transaction
//! lifecycles against a Uniswap-V2-style router:
//!
//!   nonce → gas price → estimate → balance check → sign → broadcast → receipt
//!
//! Gas price and estimate are fetched right before signing and never cached.
//! A failed estimate means the call would revert: nothing is sent and the
//! caller gets `TxOutcome::Skipped`. Swaps run with `amountOutMin = 0`.
//!
//! Created: 2026-10-19

use crate::chain::{ChainAdapter, ContractCaller, TxTemplate};
use crate::error::ChainError;
use crate::types::{RotatorConfig, SkipReason, TxOutcome, WalletRecord};
use crate::units::{ether_to_wei, wei_to_ether_lossy};
use alloy::primitives::{Address, Bytes, U256};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of making sure the router may spend a wallet's tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceState {
    /// Existing allowance already covers the amount
    Sufficient,
    /// An approval was just confirmed (or simulated in dry-run)
    Approved,
    /// Could not get there; the dependent swap must be skipped
    Blocked(SkipReason),
}

/// Executor for rotation trades
pub struct TradeExecutor<C> {
    chain: Arc<C>,
    router: Address,
    base_token: Address,
    quote_token: Address,
    swap_deadline_secs: u64,
    /// Dry run mode - estimate and sign, never broadcast
    dry_run: bool,
}

impl<C: ChainAdapter + ContractCaller> TradeExecutor<C> {
    pub fn new(chain: Arc<C>, config: &RotatorConfig) -> Self {
        Self {
            chain,
            router: config.router,
            base_token: config.base_token,
            quote_token: config.quote_token,
            swap_deadline_secs: config.swap_deadline_secs,
            dry_run: false,
        }
    }

    /// Enable or disable dry run mode
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
        if dry_run {
            info!("Executor in DRY RUN mode - transactions will be signed but not sent");
        } else {
            warn!("⚠️ Executor in LIVE mode - transactions will be broadcast!");
        }
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    pub fn router(&self) -> Address {
        self.router
    }

    pub fn quote_token(&self) -> Address {
        self.quote_token
    }

    fn deadline(&self) -> U256 {
        let now = Utc::now().timestamp().max(0) as u64;
        U256::from(now + self.swap_deadline_secs)
    }

    /// Buy the quote token with `amount` of native currency (ether units).
    ///
    /// The first buy from a wallet also approves the base token to the router.
    /// The native-value swap never spends that allowance, so each fresh wallet
    /// pays one extra approve transaction (about 46k gas) for it. Later buys
    /// from the same wallet see the allowance and skip the approval.
    pub async fn buy(&self, wallet: &WalletRecord, amount: Decimal) -> Result<TxOutcome, ChainError> {
        let value = ether_to_wei(amount);
        if value.is_zero() {
            return Ok(TxOutcome::Skipped(SkipReason::NothingToSend));
        }

        if let AllowanceState::Blocked(reason) =
            self.ensure_allowance(wallet, self.base_token, value).await?
        {
            return Ok(TxOutcome::Skipped(reason));
        }

        info!("📈 Buy: {} native from {:?}", amount, wallet.address);
        let data = self.chain.encode_swap_exact_eth_for_tokens_supporting_fee(
            U256::ZERO,
            vec![self.base_token, self.quote_token],
            wallet.address,
            self.deadline(),
        );

        let outcome = self.submit(wallet, self.router, value, data).await?;
        if let Some(hash) = outcome.tx_hash() {
            info!("✅ Buy complete: {:?}", hash);
        }
        Ok(outcome)
    }

    /// Sell the wallet's whole live token balance for native currency,
    /// paying the proceeds to `recipient`.
    pub async fn sell(&self, wallet: &WalletRecord, recipient: Address) -> Result<TxOutcome, ChainError> {
        let balance = self.chain.balance_of(self.quote_token, wallet.address).await?;
        if balance.is_zero() {
            debug!("{:?} holds no tokens, nothing to sell", wallet.address);
            return Ok(TxOutcome::Skipped(SkipReason::NothingToSend));
        }

        if let AllowanceState::Blocked(reason) =
            self.ensure_allowance(wallet, self.quote_token, balance).await?
        {
            return Ok(TxOutcome::Skipped(reason));
        }

        let path = vec![self.quote_token, self.base_token];

        // Informational only; a failed quote does not block the sell
        match self.chain.get_amounts_out(self.router, balance, path.clone()).await {
            Ok(amounts) => {
                if let Some(out) = amounts.last() {
                    info!(
                        "📉 Sell: {} tokens from {:?}, expecting ~{} native",
                        balance,
                        wallet.address,
                        wei_to_ether_lossy(*out)
                    );
                }
            }
            Err(e) => warn!("Quote for {:?} failed: {}", wallet.address, e),
        }

        let data = self.chain.encode_swap_exact_tokens_for_eth_supporting_fee(
            balance,
            U256::ZERO,
            path,
            recipient,
            self.deadline(),
        );

        let outcome = self.submit(wallet, self.router, U256::ZERO, data).await?;
        if let Some(hash) = outcome.tx_hash() {
            info!("✅ Sell complete: {:?}", hash);
        }
        Ok(outcome)
    }

    /// Make sure `router` may spend `amount` of `token` from `wallet`.
    ///
    /// Approves the token's total supply when short, then re-reads the
    /// allowance to confirm it took.
    pub async fn ensure_allowance(
        &self,
        wallet: &WalletRecord,
        token: Address,
        amount: U256,
    ) -> Result<AllowanceState, ChainError> {
        let allowance = self.chain.allowance(token, wallet.address, self.router).await?;
        if allowance >= amount {
            debug!("Sufficient allowance: {} >= {}", allowance, amount);
            return Ok(AllowanceState::Sufficient);
        }

        let supply = self.chain.total_supply(token).await?;
        info!("Approving {:?} for router from {:?}", token, wallet.address);
        let data = self.chain.encode_approve(self.router, supply);

        match self.submit(wallet, token, U256::ZERO, data).await? {
            TxOutcome::Skipped(reason) => {
                warn!("Approval from {:?} skipped: {}", wallet.address, reason);
                Ok(AllowanceState::Blocked(reason))
            }
            TxOutcome::DryRun { .. } => Ok(AllowanceState::Approved),
            TxOutcome::Confirmed(receipt) => {
                info!("Approval confirmed: {:?}", receipt.hash);
                let allowance = self.chain.allowance(token, wallet.address, self.router).await?;
                if allowance < amount {
                    warn!("Allowance still {} < {} after approval", allowance, amount);
                    return Ok(AllowanceState::Blocked(SkipReason::AllowanceNotRaised));
                }
                Ok(AllowanceState::Approved)
            }
        }
    }

    /// Plain native transfer of `amount` wei.
    pub async fn transfer_coin(
        &self,
        wallet: &WalletRecord,
        to: Address,
        amount: U256,
    ) -> Result<TxOutcome, ChainError> {
        if amount.is_zero() {
            return Ok(TxOutcome::Skipped(SkipReason::NothingToSend));
        }
        self.submit(wallet, to, amount, Bytes::new()).await
    }

    /// Send everything except the transfer's own gas cost to `to`.
    pub async fn sweep_coin(&self, wallet: &WalletRecord, to: Address) -> Result<TxOutcome, ChainError> {
        let mut tx = self.template(wallet.address, to, U256::ZERO, Bytes::new()).await?;
        let gas_limit = match self.chain.estimate_gas(&tx).await {
            Ok(gas) => gas,
            Err(ChainError::GasEstimation(e)) => {
                warn!("Sweep from {:?} skipped: gas estimation failed: {}", wallet.address, e);
                return Ok(TxOutcome::Skipped(SkipReason::GasEstimation(e)));
            }
            Err(e) => return Err(e),
        };

        let balance = self.chain.get_balance(wallet.address).await?;
        let gas_cost = U256::from(gas_limit) * U256::from(tx.gas_price);
        if balance <= gas_cost {
            debug!("{:?} balance {} does not cover sweep gas {}", wallet.address, balance, gas_cost);
            return Ok(TxOutcome::Skipped(SkipReason::NothingToSend));
        }

        tx.value = balance - gas_cost;
        tx.gas_limit = Some(gas_limit);
        info!(
            "Sweeping {} native from {:?} to {:?}",
            wei_to_ether_lossy(tx.value),
            wallet.address,
            to
        );
        self.finalize(wallet, tx).await
    }

    /// Full lifecycle for one transaction from `wallet`.
    pub async fn submit(
        &self,
        wallet: &WalletRecord,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        let mut tx = self.template(wallet.address, to, value, data).await?;

        let gas_limit = match self.chain.estimate_gas(&tx).await {
            Ok(gas) => gas,
            Err(ChainError::GasEstimation(e)) => {
                warn!("Tx from {:?} to {:?} skipped: gas estimation failed: {}", wallet.address, to, e);
                return Ok(TxOutcome::Skipped(SkipReason::GasEstimation(e)));
            }
            Err(e) => return Err(e),
        };
        tx.gas_limit = Some(gas_limit);

        let required = value + U256::from(gas_limit) * U256::from(tx.gas_price);
        let available = self.chain.get_balance(wallet.address).await?;
        if available < required {
            warn!(
                "Tx from {:?} skipped: need {} wei, have {} wei",
                wallet.address, required, available
            );
            return Ok(TxOutcome::Skipped(SkipReason::InsufficientBalance { required, available }));
        }

        self.finalize(wallet, tx).await
    }

    async fn template(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<TxTemplate, ChainError> {
        let nonce = self.chain.get_transaction_count(from).await?;
        let gas_price = self.chain.get_gas_price().await?;
        Ok(TxTemplate {
            from,
            to,
            value,
            data,
            nonce,
            gas_price,
            gas_limit: None,
        })
    }

    async fn finalize(&self, wallet: &WalletRecord, tx: TxTemplate) -> Result<TxOutcome, ChainError> {
        let key = wallet
            .secret
            .as_ref()
            .ok_or_else(|| ChainError::Signing(format!("no key loaded for {:?}", wallet.address)))?;
        let gas_limit = tx.gas_limit.unwrap_or_default();

        let signed = self.chain.sign(&tx, key).await?;

        if self.dry_run {
            info!(
                "🔬 DRY RUN: would send {} wei {:?} -> {:?} (nonce {}, gas {} @ {})",
                tx.value, tx.from, tx.to, tx.nonce, gas_limit, tx.gas_price
            );
            return Ok(TxOutcome::DryRun {
                gas_limit,
                gas_price: tx.gas_price,
            });
        }

        let receipt = self.chain.broadcast(signed).await?;
        if !receipt.success {
            return Err(ChainError::Reverted {
                hash: format!("{:?}", receipt.hash),
            });
        }
        Ok(TxOutcome::Confirmed(receipt))
    }
}
