//! DEX Wallet Rotation Library
//!
//! Trades a fixed token pair through a Uniswap-V2-style router from a
//! sequence of HD-derived wallets, moving funds to a fresh wallet each cycle
//! and recycling old token positions when the active wallet runs low.
//!
//! Created: 2026-10-19

pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod rotation;
pub mod types;
pub mod units;

// Re-export commonly used types
pub use chain::{ChainAdapter, ContractCaller, KeyDerivation, MnemonicDerivation, RpcChain};
pub use config::load_config_from_file;
pub use error::{ChainError, RotationError, RotationResult};
pub use ledger::WalletLedger;
pub use rotation::{CycleOutcome, Daemon, TerminalReason, TradeExecutor};
pub use types::{MarketMove, RotatorConfig, TxOutcome, WalletRecord};
