//! Configuration management
//!
//! Settings come from a `.env` file plus the process environment, with an
//! optional TOML file overriding the numeric tunables:
//!
//! ```toml
//! [investment]
//! min = "0.0002"
//! max = "0.02"
//! reserve = "0.001"
//!
//! [schedule]
//! min_delay_secs = 600
//! max_delay_secs = 1800
//!
//! [rebalance]
//! candidate_gas_units = 300000
//! ```
//!
//! Created: 2026-10-19

use crate::error::{RotationError, RotationResult};
use crate::types::RotatorConfig;
use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

pub const DEFAULT_MIN_INVESTMENT: &str = "0.0001";
pub const DEFAULT_MAX_INVESTMENT: &str = "0.01";
pub const DEFAULT_MIN_COIN_BALANCE: &str = "0.0005";
pub const DEFAULT_MIN_DELAY_SECS: u64 = 3000;
pub const DEFAULT_MAX_DELAY_SECS: u64 = 12000;
/// Upper bound on MAX_DELAY_SECS (30 days)
pub const MAX_DELAY_LIMIT_SECS: u64 = 30 * 24 * 3600;
pub const DEFAULT_LEDGER_PATH: &str = "data/wallets.json";
pub const DEFAULT_SWAP_DEADLINE_SECS: u64 = 7200;
pub const DEFAULT_CANDIDATE_GAS_UNITS: u64 = 400_000;
pub const DEFAULT_QUOTE_TOKEN_DECIMALS: u8 = 18;

/// Load from `env_file` (or `.env` in the working directory when `None`)
/// and the process environment.
pub fn load_config_from_file(env_file: Option<&Path>) -> RotationResult<RotatorConfig> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path).map_err(|e| {
                RotationError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let config = config_from_lookup(|key| std::env::var(key).ok())?;
    info!("Configuration loaded (chain {}, ledger {})", config.chain_id, config.ledger_path.display());
    Ok(config)
}

/// Build and validate a config from any key lookup.
pub fn config_from_lookup<F>(lookup: F) -> RotationResult<RotatorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> RotationResult<String> {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RotationError::Config(format!("{} not set", key)))
    };
    let optional = |key: &str, default: &str| -> String {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let config = RotatorConfig {
        rpc_url: required("RPC_URL")?,
        chain_id: parse("CHAIN_ID", &required("CHAIN_ID")?)?,

        seed_phrase: required("SEED_PHRASE")?,
        start_index: parse("START_INDEX", &optional("START_INDEX", "0"))?,

        router: parse_address("DEX_ROUTER_ADDRESS", &required("DEX_ROUTER_ADDRESS")?)?,
        base_token: parse_address("BASE_TOKEN_ADDRESS", &required("BASE_TOKEN_ADDRESS")?)?,
        quote_token: parse_address("QUOTE_TOKEN_ADDRESS", &required("QUOTE_TOKEN_ADDRESS")?)?,
        pair_pool: parse_address("PAIR_POOL_ADDRESS", &required("PAIR_POOL_ADDRESS")?)?,
        quote_token_decimals: parse(
            "QUOTE_TOKEN_DECIMALS",
            &optional("QUOTE_TOKEN_DECIMALS", &DEFAULT_QUOTE_TOKEN_DECIMALS.to_string()),
        )?,

        min_investment: parse("MIN_INVESTMENT", &optional("MIN_INVESTMENT", DEFAULT_MIN_INVESTMENT))?,
        max_investment: parse("MAX_INVESTMENT", &optional("MAX_INVESTMENT", DEFAULT_MAX_INVESTMENT))?,
        min_coin_balance: parse(
            "MIN_COIN_BALANCE",
            &optional("MIN_COIN_BALANCE", DEFAULT_MIN_COIN_BALANCE),
        )?,

        min_delay_secs: parse(
            "MIN_DELAY_SECS",
            &optional("MIN_DELAY_SECS", &DEFAULT_MIN_DELAY_SECS.to_string()),
        )?,
        max_delay_secs: parse(
            "MAX_DELAY_SECS",
            &optional("MAX_DELAY_SECS", &DEFAULT_MAX_DELAY_SECS.to_string()),
        )?,

        swap_deadline_secs: parse(
            "SWAP_DEADLINE_SECS",
            &optional("SWAP_DEADLINE_SECS", &DEFAULT_SWAP_DEADLINE_SECS.to_string()),
        )?,
        candidate_gas_units: parse(
            "CANDIDATE_GAS_UNITS",
            &optional("CANDIDATE_GAS_UNITS", &DEFAULT_CANDIDATE_GAS_UNITS.to_string()),
        )?,

        ledger_path: PathBuf::from(optional("LEDGER_PATH", DEFAULT_LEDGER_PATH)),
    };

    validate(&config)?;
    Ok(config)
}

fn parse<T>(key: &str, raw: &str) -> RotationResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| RotationError::Config(format!("Invalid {} '{}': {}", key, raw, e)))
}

fn parse_address(key: &str, raw: &str) -> RotationResult<Address> {
    Address::from_str(raw)
        .map_err(|e| RotationError::Config(format!("Invalid {} '{}': {}", key, raw, e)))
}

/// Reject settings the daemon cannot run with.
pub fn validate(config: &RotatorConfig) -> RotationResult<()> {
    if config.seed_phrase.split_whitespace().count() < 12 {
        return Err(RotationError::Config(
            "SEED_PHRASE must have at least 12 words".to_string(),
        ));
    }
    if config.min_investment <= Decimal::ZERO {
        return Err(RotationError::Config("MIN_INVESTMENT must be positive".to_string()));
    }
    if config.min_investment > config.max_investment {
        return Err(RotationError::Config(format!(
            "MIN_INVESTMENT {} exceeds MAX_INVESTMENT {}",
            config.min_investment, config.max_investment
        )));
    }
    if config.min_coin_balance < Decimal::ZERO {
        return Err(RotationError::Config("MIN_COIN_BALANCE must not be negative".to_string()));
    }
    if config.min_delay_secs > config.max_delay_secs {
        return Err(RotationError::Config(format!(
            "MIN_DELAY_SECS {} exceeds MAX_DELAY_SECS {}",
            config.min_delay_secs, config.max_delay_secs
        )));
    }
    if config.max_delay_secs > MAX_DELAY_LIMIT_SECS {
        return Err(RotationError::Config(format!(
            "MAX_DELAY_SECS {} exceeds the {} second limit",
            config.max_delay_secs, MAX_DELAY_LIMIT_SECS
        )));
    }
    if config.quote_token_decimals > 28 {
        return Err(RotationError::Config(format!(
            "QUOTE_TOKEN_DECIMALS {} is not supported",
            config.quote_token_decimals
        )));
    }
    Ok(())
}

/// Optional TOML overrides for the numeric tunables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TuningFile {
    #[serde(default)]
    pub investment: Option<InvestmentTuning>,
    #[serde(default)]
    pub schedule: Option<ScheduleTuning>,
    #[serde(default)]
    pub rebalance: Option<RebalanceTuning>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvestmentTuning {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub reserve: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleTuning {
    pub min_delay_secs: Option<u64>,
    pub max_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebalanceTuning {
    pub candidate_gas_units: Option<u64>,
    pub swap_deadline_secs: Option<u64>,
}

impl TuningFile {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> RotationResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RotationError::Config(format!(
                "Failed to read tuning file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> RotationResult<Self> {
        toml::from_str(content)
            .map_err(|e| RotationError::Config(format!("Failed to parse tuning TOML: {}", e)))
    }

    /// Apply the overrides and re-validate.
    pub fn apply(&self, mut config: RotatorConfig) -> RotationResult<RotatorConfig> {
        if let Some(inv) = &self.investment {
            if let Some(min) = inv.min {
                config.min_investment = min;
            }
            if let Some(max) = inv.max {
                config.max_investment = max;
            }
            if let Some(reserve) = inv.reserve {
                config.min_coin_balance = reserve;
            }
        }
        if let Some(schedule) = &self.schedule {
            if let Some(min) = schedule.min_delay_secs {
                config.min_delay_secs = min;
            }
            if let Some(max) = schedule.max_delay_secs {
                config.max_delay_secs = max;
            }
        }
        if let Some(rebalance) = &self.rebalance {
            if let Some(units) = rebalance.candidate_gas_units {
                config.candidate_gas_units = units;
            }
            if let Some(secs) = rebalance.swap_deadline_secs {
                config.swap_deadline_secs = secs;
            }
        }

        validate(&config)?;
        Ok(config)
    }
}
