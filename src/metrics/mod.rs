//! Performance metrics module.
//!
//! Provides the reporting layer:
//! - Per-symbol win rate, ROI and exit reason counts
//! - ROI leaderboard
//! - Portfolio summaries
//! - Exit policy comparison

pub mod calculator;

pub use calculator::{ExitComparison, MetricsCalculator, PortfolioSummary, SymbolSummary};
