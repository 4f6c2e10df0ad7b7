//! Per-symbol straddle backtest.
//!
//! This module provides the single-instrument simulation:
//! - Entry signals from forecast vs proxy volatility
//! - Exit policies (fixed, trailing, volatility target, time decay)
//! - Trade lifecycle with exact decimal bookkeeping
//! - The cursor-driven scan over a bar series

pub mod exit_policy;
pub mod signal;
pub mod simulator;
pub mod trade;

pub use exit_policy::{ExitPolicy, ExitState};
pub use signal::{Signal, SignalRule};
pub use simulator::{
    collect_trades, CapitalSchedule, SimulationResult, SimulatorConfig, TradeSimulator,
};
pub use trade::{premium_to_decimal, ExitReason, OpenPosition, Trade, TradeError, PREMIUM_DP};
