//! Capital calibration.
//!
//! Runs the portfolio ledger for a ladder of candidate capitals and reports
//! the smallest one that admits every proposal.

use std::collections::HashSet;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtest::Trade;
use crate::metrics::SymbolSummary;

use super::ledger::{PortfolioError, PortfolioResult, PortfolioSimulator};

/// One row of the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalCandidate {
    pub capital: Decimal,
    pub missed_trades: usize,
    pub min_cash_seen: Decimal,
    pub final_cash: Decimal,
    pub roi: Decimal,
}

impl From<&PortfolioResult> for CapitalCandidate {
    fn from(result: &PortfolioResult) -> Self {
        Self {
            capital: result.initial_capital,
            missed_trades: result.missed_trades,
            min_cash_seen: result.min_cash_seen,
            final_cash: result.final_cash,
            roi: result.roi(),
        }
    }
}

/// Results for every candidate, in ascending capital order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSweep {
    pub candidates: Vec<CapitalCandidate>,
    /// Smallest candidate with no missed trades.
    pub required_capital: Option<Decimal>,
}

impl CapitalSweep {
    /// Sweep `capitals` over the same proposal stream.
    pub fn run(trades: &[Trade], capitals: &[Decimal]) -> Result<Self, PortfolioError> {
        let mut capitals = capitals.to_vec();
        capitals.sort();
        capitals.dedup();

        let simulator = PortfolioSimulator::without_trajectory();
        let results = capitals
            .par_iter()
            .map(|&capital| simulator.run(capital, trades))
            .collect::<Result<Vec<_>, _>>()?;

        let required_capital = results
            .iter()
            .find(|r| r.is_sufficient())
            .map(|r| r.initial_capital);
        let candidates = results.iter().map(CapitalCandidate::from).collect();

        match required_capital {
            Some(capital) => info!(
                "Minimum capital to take all {} trades: {}",
                trades.len(),
                capital
            ),
            None => warn!(
                "No candidate up to {} takes all {} trades",
                capitals.last().copied().unwrap_or_default(),
                trades.len()
            ),
        }

        Ok(Self {
            candidates,
            required_capital,
        })
    }
}

/// Keep only trades of the `n` best symbols by ROI.
///
/// `summaries` is expected in leaderboard order (best first).
pub fn top_symbols(trades: &[Trade], summaries: &[SymbolSummary], n: usize) -> Vec<Trade> {
    let keep: HashSet<&str> = summaries.iter().take(n).map(|s| s.symbol.as_str()).collect();
    trades
        .iter()
        .filter(|t| keep.contains(t.symbol.as_str()))
        .cloned()
        .collect()
}
