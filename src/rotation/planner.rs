//! Investment Planner
//!
//! Pure decision: given the active wallet's native balance, how much to put
//! into this cycle's buy, and whether the wallet is too thin to trade at all.
//! Every amount is in ether units; conversion from wei happened when the
//! balance was read.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;

/// Resolution of a uniform draw between two decimals
const SAMPLE_STEPS: u64 = 1_000_000_000;

/// Wei precision
const AMOUNT_DP: u32 = 18;

/// Source of uniform draws, injectable so tests can pin the outcome.
pub trait Sampler: Send {
    /// Uniform in `[low, high]`
    fn uniform_decimal(&mut self, low: Decimal, high: Decimal) -> Decimal;

    /// Uniform in `[low, high]`
    fn uniform_u64(&mut self, low: u64, high: u64) -> u64;
}

/// `rand`-backed sampler seeded from OS entropy
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomSampler {
    fn uniform_decimal(&mut self, low: Decimal, high: Decimal) -> Decimal {
        if high <= low {
            return low;
        }
        let step = self.rng.gen_range(0..=SAMPLE_STEPS);
        let fraction = Decimal::from(step) / Decimal::from(SAMPLE_STEPS);
        (low + (high - low) * fraction).round_dp(AMOUNT_DP)
    }

    fn uniform_u64(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

/// Always lands at the same relative position in the range (0 = low, 1 = high)
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler {
    pub fraction: Decimal,
}

impl FixedSampler {
    pub fn new(fraction: Decimal) -> Self {
        Self {
            fraction: fraction.clamp(Decimal::ZERO, Decimal::ONE),
        }
    }
}

impl Sampler for FixedSampler {
    fn uniform_decimal(&mut self, low: Decimal, high: Decimal) -> Decimal {
        if high <= low {
            return low;
        }
        (low + (high - low) * self.fraction).round_dp(AMOUNT_DP)
    }

    fn uniform_u64(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        let span = Decimal::from(high - low) * self.fraction;
        low + span.trunc().to_u64().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Buy with this much native currency
    Invest(Decimal),
    /// Investing `attempted` would leave the wallet at or below the reserve
    LowLiquidity { balance: Decimal, attempted: Decimal },
    /// Nothing to pay gas with; the run ends here
    Exhausted,
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlanOutcome::Invest(amount) => write!(f, "invest {}", amount),
            PlanOutcome::LowLiquidity { balance, attempted } => {
                write!(f, "low liquidity (balance {}, wanted {})", balance, attempted)
            }
            PlanOutcome::Exhausted => write!(f, "no balance left"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvestmentPlanner {
    pub min_investment: Decimal,
    pub max_investment: Decimal,
    /// Native balance a wallet must keep for gas
    pub reserve: Decimal,
}

impl InvestmentPlanner {
    pub fn new(min_investment: Decimal, max_investment: Decimal, reserve: Decimal) -> Self {
        Self {
            min_investment,
            max_investment,
            reserve,
        }
    }

    /// Draw an investment for `balance` and check it against the reserve.
    pub fn plan(&self, balance: Decimal, sampler: &mut dyn Sampler) -> PlanOutcome {
        if balance <= Decimal::ZERO {
            return PlanOutcome::Exhausted;
        }

        let low = self.min_investment.min(balance);
        let high = self.max_investment.min(balance);
        let invest = sampler.uniform_decimal(low, high);

        self.recheck(balance, invest)
    }

    /// Re-evaluate a previously drawn investment against a fresh balance.
    ///
    /// Used after rebalancing: the amount is not re-drawn.
    pub fn recheck(&self, balance: Decimal, invest: Decimal) -> PlanOutcome {
        if balance <= Decimal::ZERO {
            return PlanOutcome::Exhausted;
        }
        if balance <= self.reserve || balance - invest <= self.reserve {
            return PlanOutcome::LowLiquidity {
                balance,
                attempted: invest,
            };
        }
        PlanOutcome::Invest(invest)
    }
}
