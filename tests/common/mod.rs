//! In-memory chain for integration testing.
//!
//! `FakeChain` implements `ChainAdapter` + `ContractCaller` over plain maps.
//! Calldata is decoded with the same `sol!` bindings the daemon encodes with,
//! so a swap, approve or transfer has the on-chain effect the router or token
//! would give it. Gas used always equals the estimate.

#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dex_rotator::chain::{ChainAdapter, ContractCaller, DerivedKey, KeyDerivation, TxTemplate};
use dex_rotator::contracts::{IUniswapV2Router02, IERC20};
use dex_rotator::error::{ChainError, RotationError};
use dex_rotator::rotation::Clock;
use dex_rotator::ledger::WalletLedger;
use dex_rotator::types::{RotatorConfig, SecretKey, TxReceiptSummary, WalletRecord};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

pub const SEED: &str = "test test test test test test test test test test test junk";

pub const GAS_PRICE: u128 = 1_000_000_000;
pub const TRANSFER_GAS: u64 = 21_000;
pub const APPROVE_GAS: u64 = 46_000;
pub const SWAP_GAS: u64 = 150_000;

/// Quote-token wei received per native wei on a buy (and paid back on a sell)
pub const TOKENS_PER_COIN: u64 = 100;

pub fn router() -> Address {
    Address::repeat_byte(0x10)
}

pub fn base_token() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn quote_token() -> Address {
    Address::repeat_byte(0xcc)
}

pub fn pair_pool() -> Address {
    Address::repeat_byte(0xdd)
}

pub fn ether(amount: Decimal) -> U256 {
    dex_rotator::units::ether_to_wei(amount)
}

/// What a broadcast transaction did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentKind {
    Transfer,
    Approve { token: Address },
    Buy,
    Sell { amount_in: U256, recipient: Address },
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub kind: SentKind,
}

#[derive(Default)]
struct State {
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    nonces: HashMap<Address, u64>,
    signed: HashMap<u64, TxTemplate>,
    next_id: u64,
    sent: Vec<SentTx>,
    fail_sells_from: HashSet<Address>,
    fail_reads: bool,
}

pub struct FakeChain {
    state: Mutex<State>,
    total_supply: U256,
}

impl FakeChain {
    pub fn new() -> Self {
        let chain = Self {
            state: Mutex::new(State::default()),
            total_supply: U256::from(10u8).pow(U256::from(30u8)),
        };
        chain.set_tokens(pair_pool(), ether(dec!(1000000)));
        chain
    }

    pub fn set_native(&self, who: Address, amount: U256) {
        self.state.lock().unwrap().native.insert(who, amount);
    }

    pub fn native(&self, who: Address) -> U256 {
        self.state.lock().unwrap().native.get(&who).copied().unwrap_or_default()
    }

    pub fn set_tokens(&self, who: Address, amount: U256) {
        self.state.lock().unwrap().tokens.insert((quote_token(), who), amount);
    }

    pub fn tokens(&self, who: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(&(quote_token(), who))
            .copied()
            .unwrap_or_default()
    }

    /// Estimation of any sell from `who` fails, as if the swap would revert
    pub fn fail_sells_from(&self, who: Address) {
        self.state.lock().unwrap().fail_sells_from.insert(who);
    }

    /// Every balance read fails with a transient RPC error
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    fn classify(&self, state: &State, tx: &TxTemplate) -> Result<(SentKind, u64), ChainError> {
        let native = state.native.get(&tx.from).copied().unwrap_or_default();
        if native < tx.value {
            return Err(ChainError::GasEstimation("insufficient funds for transfer".into()));
        }

        if tx.data.is_empty() {
            return Ok((SentKind::Transfer, TRANSFER_GAS));
        }

        let selector: [u8; 4] = tx
            .data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ChainError::GasEstimation("short calldata".into()))?;

        if selector == IERC20::approveCall::SELECTOR {
            return Ok((SentKind::Approve { token: tx.to }, APPROVE_GAS));
        }

        if tx.to != router() {
            return Err(ChainError::GasEstimation("execution reverted: unknown call".into()));
        }

        if selector == IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::SELECTOR {
            if tx.value.is_zero() {
                return Err(ChainError::GasEstimation("execution reverted: INSUFFICIENT_INPUT_AMOUNT".into()));
            }
            return Ok((SentKind::Buy, SWAP_GAS));
        }

        if selector == IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::SELECTOR {
            let call = IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::abi_decode(&tx.data)
                .map_err(|e| ChainError::GasEstimation(e.to_string()))?;
            if state.fail_sells_from.contains(&tx.from) {
                return Err(ChainError::GasEstimation("execution reverted: TRANSFER_FAILED".into()));
            }
            let held = state.tokens.get(&(quote_token(), tx.from)).copied().unwrap_or_default();
            let allowed = state
                .allowances
                .get(&(quote_token(), tx.from, router()))
                .copied()
                .unwrap_or_default();
            if held < call.amountIn || allowed < call.amountIn {
                return Err(ChainError::GasEstimation("execution reverted: TRANSFER_FROM_FAILED".into()));
            }
            return Ok((
                SentKind::Sell {
                    amount_in: call.amountIn,
                    recipient: call.to,
                },
                SWAP_GAS,
            ));
        }

        Err(ChainError::GasEstimation("execution reverted: unknown selector".into()))
    }
}

fn add(map: &mut HashMap<Address, U256>, who: Address, amount: U256) {
    let entry = map.entry(who).or_default();
    *entry += amount;
}

fn sub(map: &mut HashMap<Address, U256>, who: Address, amount: U256) -> Result<(), ChainError> {
    let entry = map.entry(who).or_default();
    if *entry < amount {
        return Err(ChainError::Broadcast("insufficient funds".into()));
    }
    *entry -= amount;
    Ok(())
}

#[async_trait]
impl ChainAdapter for FakeChain {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        Ok(state.native.get(&address).copied().unwrap_or_default())
    }

    async fn get_gas_price(&self) -> Result<u128, ChainError> {
        Ok(GAS_PRICE)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        Ok(self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, tx: &TxTemplate) -> Result<u64, ChainError> {
        let state = self.state.lock().unwrap();
        self.classify(&state, tx).map(|(_, gas)| gas)
    }

    async fn sign(&self, tx: &TxTemplate, _key: &SecretKey) -> Result<Bytes, ChainError> {
        if tx.gas_limit.is_none() {
            return Err(ChainError::Signing("Missing gas limit in tx template".into()));
        }
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.signed.insert(id, tx.clone());
        Ok(Bytes::from(id.to_be_bytes().to_vec()))
    }

    async fn broadcast(&self, signed: Bytes) -> Result<TxReceiptSummary, ChainError> {
        let id = u64::from_be_bytes(
            signed[..]
                .try_into()
                .map_err(|_| ChainError::Broadcast("malformed tx".into()))?,
        );
        let mut state = self.state.lock().unwrap();
        let tx = state
            .signed
            .remove(&id)
            .ok_or_else(|| ChainError::Broadcast("unknown tx".into()))?;

        let expected_nonce = state.nonces.get(&tx.from).copied().unwrap_or_default();
        if tx.nonce != expected_nonce {
            return Err(ChainError::Broadcast(format!(
                "nonce mismatch: got {}, want {}",
                tx.nonce, expected_nonce
            )));
        }

        let (kind, gas_used) = self.classify(&state, &tx).map_err(|e| ChainError::Broadcast(e.to_string()))?;
        let gas_cost = U256::from(gas_used) * U256::from(tx.gas_price);
        sub(&mut state.native, tx.from, tx.value + gas_cost)?;
        *state.nonces.entry(tx.from).or_default() += 1;

        match &kind {
            SentKind::Transfer => add(&mut state.native, tx.to, tx.value),
            SentKind::Approve { token } => {
                let call = IERC20::approveCall::abi_decode(&tx.data)
                    .map_err(|e| ChainError::Broadcast(e.to_string()))?;
                state.allowances.insert((*token, tx.from, call.spender), call.amount);
            }
            SentKind::Buy => {
                let call = IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::abi_decode(&tx.data)
                    .map_err(|e| ChainError::Broadcast(e.to_string()))?;
                let out = tx.value * U256::from(TOKENS_PER_COIN);
                let pool = state.tokens.entry((quote_token(), pair_pool())).or_default();
                *pool = pool.saturating_sub(out);
                *state.tokens.entry((quote_token(), call.to)).or_default() += out;
            }
            SentKind::Sell { amount_in, recipient } => {
                *state.tokens.entry((quote_token(), tx.from)).or_default() -= *amount_in;
                *state.tokens.entry((quote_token(), pair_pool())).or_default() += *amount_in;
                let allowance = state.allowances.entry((quote_token(), tx.from, router())).or_default();
                *allowance = allowance.saturating_sub(*amount_in);
                add(&mut state.native, *recipient, *amount_in / U256::from(TOKENS_PER_COIN));
            }
        }

        state.sent.push(SentTx {
            from: tx.from,
            to: tx.to,
            value: tx.value,
            kind,
        });

        Ok(TxReceiptSummary {
            hash: B256::from(U256::from(id + 1).to_be_bytes::<32>()),
            block_number: Some(1_000 + id),
            gas_used,
            success: true,
        })
    }
}

#[async_trait]
impl ContractCaller for FakeChain {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        Ok(state.tokens.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn total_supply(&self, _token: Address) -> Result<U256, ChainError> {
        Ok(self.total_supply)
    }

    async fn get_amounts_out(
        &self,
        _router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>, ChainError> {
        let out = if path.first() == Some(&quote_token()) {
            amount_in / U256::from(TOKENS_PER_COIN)
        } else {
            amount_in * U256::from(TOKENS_PER_COIN)
        };
        Ok(vec![amount_in, out])
    }
}

/// Cheap deterministic derivation: index `i` maps to a fixed address
pub struct FakeKeys;

impl FakeKeys {
    pub fn address(index: u32) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xaa;
        bytes[16..].copy_from_slice(&index.to_be_bytes());
        Address::from(bytes)
    }
}

impl KeyDerivation for FakeKeys {
    fn derive(&self, seed_phrase: &str, index: u32) -> Result<DerivedKey, RotationError> {
        if seed_phrase != SEED {
            return Err(RotationError::KeyDerivation("unknown seed".into()));
        }
        let mut secret = [0u8; 32];
        secret[28..].copy_from_slice(&index.to_be_bytes());
        secret[0] = 0x01;
        Ok(DerivedKey {
            secret: SecretKey::new(B256::from(secret)),
            address: Self::address(index),
            index,
        })
    }
}

/// Clock that only moves when slept on
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<DateTime<Utc>> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        self.sleeps.lock().unwrap().push(at);
        let mut now = self.now.lock().unwrap();
        if at > *now {
            *now = at;
        }
    }
}

pub fn temp_ledger(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dex-rotator-it-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("wallets.json")
}

pub fn cleanup(ledger: &PathBuf) {
    if let Some(dir) = ledger.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

pub fn test_config(ledger_path: PathBuf) -> RotatorConfig {
    RotatorConfig {
        rpc_url: "http://localhost:8545".to_string(),
        chain_id: 56,
        seed_phrase: SEED.to_string(),
        start_index: 0,
        router: router(),
        base_token: base_token(),
        quote_token: quote_token(),
        pair_pool: pair_pool(),
        quote_token_decimals: 18,
        min_investment: dec!(0.0001),
        max_investment: dec!(0.01),
        min_coin_balance: dec!(0.0005),
        min_delay_secs: 3000,
        max_delay_secs: 12000,
        swap_deadline_secs: 7200,
        candidate_gas_units: 400_000,
        ledger_path,
    }
}

/// Fresh record for `index` with its key loaded
pub fn wallet(index: u32) -> WalletRecord {
    let key = FakeKeys.derive(SEED, index).unwrap();
    WalletRecord::derived(key.secret, key.address, key.index)
}

/// Put wallet `index` on the fake chain and in the ledger with the given
/// holdings (token and coin amounts in whole units).
pub fn seed_wallet(
    ledger: &mut WalletLedger,
    chain: &FakeChain,
    index: u32,
    tokens: Decimal,
    coin: Decimal,
) -> WalletRecord {
    let mut record = wallet(index);
    record.token_balance = tokens;
    record.coin_balance = coin;
    chain.set_tokens(record.address, ether(tokens));
    chain.set_native(record.address, ether(coin));
    ledger.upsert(record.clone()).unwrap();
    ledger.persist().unwrap();
    record
}
