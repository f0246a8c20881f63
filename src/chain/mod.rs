//! Chain Collaborators
//!
//! The rotation core never touches a provider, signer or ABI coder directly.
//! It goes through three seams:
//!
//! - `ChainAdapter`  : balances, gas, nonces, signing, broadcast
//! - `ContractCaller`: typed ERC-20 / router reads and calldata encoders
//! - `KeyDerivation` : seed phrase + index → key pair
//!
//! `RpcChain` implements the first two against a JSON-RPC node via alloy;
//! `MnemonicDerivation` implements the third. Tests substitute in-memory fakes.
//!
//! Created: 2026-10-19

pub mod keys;
pub mod retry;
pub mod rpc;

use crate::contracts::{IUniswapV2Router02, IERC20};
use crate::error::{ChainError, RotationError};
use crate::types::SecretKey;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

pub use crate::types::TxReceiptSummary;
pub use keys::MnemonicDerivation;
pub use rpc::RpcChain;

/// Unsigned transaction, fully specified except for the signature.
///
/// `gas_limit` is `None` until the estimate comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxTemplate {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: Option<u64>,
}

/// Node-facing operations. Every call is a blocking round-trip from the
/// caller's point of view; implementations must not reorder sends.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn get_gas_price(&self) -> Result<u128, ChainError>;

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError>;

    /// Fails with `ChainError::GasEstimation` when the call would revert.
    async fn estimate_gas(&self, tx: &TxTemplate) -> Result<u64, ChainError>;

    async fn sign(&self, tx: &TxTemplate, key: &SecretKey) -> Result<Bytes, ChainError>;

    /// Broadcast and wait for the receipt.
    async fn broadcast(&self, signed: Bytes) -> Result<TxReceiptSummary, ChainError>;
}

/// Typed access to the token and router contracts.
///
/// Reads go to the chain; the `encode_*` methods are pure and have default
/// implementations built on the `sol!` bindings.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    async fn total_supply(&self, token: Address) -> Result<U256, ChainError>;

    async fn get_amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>, ChainError>;

    fn encode_approve(&self, spender: Address, amount: U256) -> Bytes {
        IERC20::approveCall { spender, amount }.abi_encode().into()
    }

    fn encode_transfer(&self, to: Address, amount: U256) -> Bytes {
        IERC20::transferCall { to, amount }.abi_encode().into()
    }

    fn encode_swap_exact_eth_for_tokens(
        &self,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    ) -> Bytes {
        IUniswapV2Router02::swapExactETHForTokensCall {
            amountOutMin: amount_out_min,
            path,
            to,
            deadline,
        }
        .abi_encode()
        .into()
    }

    fn encode_swap_exact_tokens_for_eth(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    ) -> Bytes {
        IUniswapV2Router02::swapExactTokensForETHCall {
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path,
            to,
            deadline,
        }
        .abi_encode()
        .into()
    }

    fn encode_swap_exact_eth_for_tokens_supporting_fee(
        &self,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    ) -> Bytes {
        IUniswapV2Router02::swapExactETHForTokensSupportingFeeOnTransferTokensCall {
            amountOutMin: amount_out_min,
            path,
            to,
            deadline,
        }
        .abi_encode()
        .into()
    }

    fn encode_swap_exact_tokens_for_eth_supporting_fee(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    ) -> Bytes {
        IUniswapV2Router02::swapExactTokensForETHSupportingFeeOnTransferTokensCall {
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path,
            to,
            deadline,
        }
        .abi_encode()
        .into()
    }

    fn encode_swap_exact_tokens_for_tokens_supporting_fee(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: Vec<Address>,
        to: Address,
        deadline: U256,
    ) -> Bytes {
        IUniswapV2Router02::swapExactTokensForTokensSupportingFeeOnTransferTokensCall {
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path,
            to,
            deadline,
        }
        .abi_encode()
        .into()
    }
}

/// A key pair derived from the seed
#[derive(Debug, Clone)]
pub struct DerivedKey {
    pub secret: SecretKey,
    pub address: Address,
    pub index: u32,
}

/// Deterministic HD derivation: the same (seed, index) always yields the same key.
pub trait KeyDerivation: Send + Sync {
    fn derive(&self, seed_phrase: &str, index: u32) -> Result<DerivedKey, RotationError>;
}
