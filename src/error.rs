//! Error Taxonomy
//!
//! `ChainError` covers everything that can go wrong talking to the chain.
//! `RotationError` is what the rotation core hands back to the daemon, which
//! decides per kind whether to skip a step, stop the run, or keep going.
//!
//! Created: 2026-10-19

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Transport or node failure on a read; safe to retry.
    #[error("RPC call failed: {0}")]
    Rpc(String),

    /// Node refused to estimate gas, usually because the call would revert.
    #[error("Gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    /// A signed send failed. Never retried with the same nonce.
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Transaction reverted: {hash}")]
    Reverted { hash: String },
}

impl ChainError {
    /// Only read-side failures qualify for bounded retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(_))
    }
}

#[derive(Error, Debug)]
pub enum RotationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RotationResult<T> = std::result::Result<T, RotationError>;
