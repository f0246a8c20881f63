// Core data structures for the rotation daemon

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Raw secp256k1 private key bytes.
///
/// Owned by exactly one `WalletRecord`. Never serialized and never printed:
/// `Debug` is redacted so a stray `{:?}` on a record cannot leak it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(B256);

impl SecretKey {
    pub fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    pub fn expose(&self) -> &B256 {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SecretKey(<redacted>)")
    }
}

/// One wallet the daemon has derived, with its last-observed balances.
///
/// Balances are advisory: they are what the daemon saw the last time it
/// looked, and are always re-read on-chain before being acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    /// Re-derived from the seed on load; never written to the ledger file.
    #[serde(skip)]
    pub secret: Option<SecretKey>,
    pub address: Address,
    #[serde(alias = "index")]
    pub derivation_index: u32,
    /// Quote-token holding, in token units
    #[serde(default)]
    pub token_balance: Decimal,
    /// Native-currency holding, in ether units
    #[serde(default, alias = "bnbBalance")]
    pub coin_balance: Decimal,
    /// Pool's quote-token balance when this wallet last traded (informational)
    #[serde(default)]
    pub pool_balance: Decimal,
    /// Cached nonce, not authoritative
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletRecord {
    /// Fresh record for a just-derived wallet (all balances zero).
    pub fn derived(secret: SecretKey, address: Address, derivation_index: u32) -> Self {
        Self {
            secret: Some(secret),
            address,
            derivation_index,
            token_balance: Decimal::ZERO,
            coin_balance: Decimal::ZERO,
            pool_balance: Decimal::ZERO,
            nonce: None,
            updated_at: None,
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

// Equality is over persisted state only; the secret is re-derived, not stored.
impl PartialEq for WalletRecord {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.derivation_index == other.derivation_index
            && self.token_balance == other.token_balance
            && self.coin_balance == other.coin_balance
            && self.pool_balance == other.pool_balance
            && self.nonce == other.nonce
            && self.updated_at == other.updated_at
    }
}

/// Why a transaction was deliberately not sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// eth_estimateGas failed - the call would most likely revert
    GasEstimation(String),
    /// Sender cannot cover value + gas
    InsufficientBalance { required: U256, available: U256 },
    /// Nothing left to move after gas
    NothingToSend,
    /// Approval was sent but the allowance is still short
    AllowanceNotRaised,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::GasEstimation(e) => write!(f, "gas estimation failed: {}", e),
            SkipReason::InsufficientBalance { required, available } => {
                write!(f, "insufficient balance: need {} wei, have {} wei", required, available)
            }
            SkipReason::NothingToSend => write!(f, "nothing to send after gas"),
            SkipReason::AllowanceNotRaised => write!(f, "allowance still below required amount"),
        }
    }
}

/// Mined transaction summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceiptSummary {
    pub hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Result of one transaction lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(TxReceiptSummary),
    Skipped(SkipReason),
    /// Estimated and signed, not broadcast
    DryRun { gas_limit: u64, gas_price: u128 },
}

impl TxOutcome {
    /// True when the transaction went through (or would have, in dry-run)
    pub fn is_success(&self) -> bool {
        matches!(self, TxOutcome::Confirmed(_) | TxOutcome::DryRun { .. })
    }

    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            TxOutcome::Confirmed(receipt) => Some(receipt.hash),
            _ => None,
        }
    }
}

/// Direction of the pool's quote-token balance since the last cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketMove {
    /// Pool quote-token balance shrank
    Down,
    /// Pool quote-token balance grew
    Up,
    Unchanged,
}

impl MarketMove {
    pub fn between(previous: Decimal, current: Decimal) -> Self {
        if current < previous {
            MarketMove::Down
        } else if current > previous {
            MarketMove::Up
        } else {
            MarketMove::Unchanged
        }
    }
}

impl fmt::Display for MarketMove {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MarketMove::Down => write!(f, "market is down"),
            MarketMove::Up => write!(f, "market is up"),
            MarketMove::Unchanged => write!(f, "market unchanged"),
        }
    }
}

/// Daemon configuration
#[derive(Clone)]
pub struct RotatorConfig {
    // Network
    pub rpc_url: String,
    pub chain_id: u64,

    // Wallets
    pub seed_phrase: String,
    pub start_index: u32,

    // Contracts
    pub router: Address,
    pub base_token: Address,
    pub quote_token: Address,
    pub pair_pool: Address,
    pub quote_token_decimals: u8,

    // Investment (ether units)
    pub min_investment: Decimal,
    pub max_investment: Decimal,
    pub min_coin_balance: Decimal,

    // Scheduling
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,

    // Execution
    pub swap_deadline_secs: u64,
    /// Gas units funded to a rebalancing candidate so it can approve + sell
    pub candidate_gas_units: u64,

    // Storage
    pub ledger_path: PathBuf,
}

impl fmt::Debug for RotatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RotatorConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("seed_phrase", &"<redacted>")
            .field("start_index", &self.start_index)
            .field("router", &self.router)
            .field("base_token", &self.base_token)
            .field("quote_token", &self.quote_token)
            .field("pair_pool", &self.pair_pool)
            .field("quote_token_decimals", &self.quote_token_decimals)
            .field("min_investment", &self.min_investment)
            .field("max_investment", &self.max_investment)
            .field("min_coin_balance", &self.min_coin_balance)
            .field("min_delay_secs", &self.min_delay_secs)
            .field("max_delay_secs", &self.max_delay_secs)
            .field("swap_deadline_secs", &self.swap_deadline_secs)
            .field("candidate_gas_units", &self.candidate_gas_units)
            .field("ledger_path", &self.ledger_path)
            .finish()
    }
}
