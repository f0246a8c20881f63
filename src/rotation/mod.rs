//! Wallet Rotation
//!
//! The decision core of the daemon:
//! - `planner`: how much to invest, and whether the wallet is too thin
//! - `executor`: approve / buy / sell / transfer transaction lifecycles
//! - `rebalancer`: liquidate earlier wallets' token positions into the active one
//! - `schedule`: clock abstraction and delay sampling
//! - `daemon`: the per-cycle state machine and run loop
//!
//! Created: 2026-10-19

pub mod daemon;
pub mod executor;
pub mod planner;
pub mod rebalancer;
pub mod schedule;

pub use daemon::{CycleOutcome, Daemon, DaemonState, TerminalReason};
pub use executor::{AllowanceState, TradeExecutor};
pub use planner::{FixedSampler, InvestmentPlanner, PlanOutcome, RandomSampler, Sampler};
pub use rebalancer::{LiquidityRebalancer, RebalanceReport};
pub use schedule::{Clock, DelayWindow, ScheduledCycle, TokioClock};
