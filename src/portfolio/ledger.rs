//! Shared-capital portfolio simulation.
//!
//! Replays trades produced independently per symbol against one cash pool.
//! Proposals are considered in entry-time order; a proposal is admitted only
//! if cash covers its cost, otherwise it is counted as missed and dropped.
//! Admitted trades return `cost + pnl` to the pool at their exit time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::backtest::Trade;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Initial capital must be positive, got {0}")]
    InvalidCapital(Decimal),
}

/// Portfolio-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Capital for a single portfolio run.
    pub initial_capital: Decimal,
    /// Capitals tried by the calibration sweep.
    pub candidate_capitals: Vec<Decimal>,
    /// Symbols kept by ROI before the sweep (`None` = all).
    pub top_symbols: Option<usize>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(500_000),
            candidate_capitals: [
                100_000, 200_000, 300_000, 400_000, 500_000, 750_000, 1_000_000, 1_500_000,
                2_000_000,
            ]
            .into_iter()
            .map(Decimal::from)
            .collect(),
            top_symbols: Some(20),
        }
    }
}

/// What changed the cash balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashEvent {
    Admitted,
    Missed,
    Released,
}

/// Cash balance right after an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPoint {
    pub time: NaiveDateTime,
    pub cash: Decimal,
    pub event: CashEvent,
    pub symbol: String,
}

/// Outcome of one portfolio run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    pub initial_capital: Decimal,
    pub final_cash: Decimal,
    pub admitted_trades: usize,
    pub missed_trades: usize,
    /// Sum of pnl over admitted trades.
    pub admitted_pnl: Decimal,
    /// Lowest cash after any admission decision.
    pub min_cash_seen: Decimal,
    /// Largest `initial - cash` observed.
    pub peak_capital_in_use: Decimal,
    pub trajectory: Vec<CashPoint>,
}

impl PortfolioResult {
    /// `(final_cash - initial) / initial`
    pub fn roi(&self) -> Decimal {
        (self.final_cash - self.initial_capital) / self.initial_capital
    }

    pub fn roi_pct(&self) -> f64 {
        (self.roi() * Decimal::ONE_HUNDRED)
            .try_into()
            .unwrap_or(0.0)
    }

    /// Every proposal was admitted.
    pub fn is_sufficient(&self) -> bool {
        self.missed_trades == 0
    }
}

/// Release scheduled for an admitted trade. Ordered by exit time, then by
/// admission order so equal exit times release deterministically.
type Release = Reverse<(NaiveDateTime, usize, Decimal, String)>;

/// Sequential single-writer ledger over a proposal stream.
#[derive(Debug, Clone)]
pub struct PortfolioSimulator {
    record_trajectory: bool,
}

impl Default for PortfolioSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortfolioSimulator {
    pub fn new() -> Self {
        Self {
            record_trajectory: true,
        }
    }

    /// Skip recording the cash trajectory (used by sweeps).
    pub fn without_trajectory() -> Self {
        Self {
            record_trajectory: false,
        }
    }

    pub fn run(
        &self,
        initial_capital: Decimal,
        trades: &[Trade],
    ) -> Result<PortfolioResult, PortfolioError> {
        if initial_capital <= Decimal::ZERO {
            return Err(PortfolioError::InvalidCapital(initial_capital));
        }

        let mut proposals: Vec<&Trade> = trades.iter().collect();
        // Stable: equal entry times keep input order.
        proposals.sort_by_key(|t| t.entry_time);

        let mut cash = initial_capital;
        let mut releases: BinaryHeap<Release> = BinaryHeap::new();
        let mut result = PortfolioResult {
            initial_capital,
            final_cash: initial_capital,
            admitted_trades: 0,
            missed_trades: 0,
            admitted_pnl: Decimal::ZERO,
            min_cash_seen: initial_capital,
            peak_capital_in_use: Decimal::ZERO,
            trajectory: Vec::new(),
        };

        for (seq, trade) in proposals.into_iter().enumerate() {
            self.release_until(&mut releases, &mut cash, Some(trade.entry_time), &mut result);

            let event = if cash >= trade.cost {
                cash -= trade.cost;
                releases.push(Reverse((
                    trade.exit_time,
                    seq,
                    trade.release_amount(),
                    trade.symbol.clone(),
                )));
                result.admitted_trades += 1;
                result.admitted_pnl += trade.pnl;
                CashEvent::Admitted
            } else {
                debug!(
                    "{} at {} missed: cost {} > cash {}",
                    trade.symbol, trade.entry_time, trade.cost, cash
                );
                result.missed_trades += 1;
                CashEvent::Missed
            };

            result.min_cash_seen = result.min_cash_seen.min(cash);
            result.peak_capital_in_use = result.peak_capital_in_use.max(initial_capital - cash);
            self.record(&mut result, trade.entry_time, cash, event, &trade.symbol);
        }

        self.release_until(&mut releases, &mut cash, None, &mut result);
        result.final_cash = cash;

        info!(
            "Portfolio with {}: {} admitted, {} missed, final cash {}, min cash {}",
            initial_capital, result.admitted_trades, result.missed_trades, cash, result.min_cash_seen
        );
        Ok(result)
    }

    /// Credit every release with `exit_time <= until` (all when `None`).
    fn release_until(
        &self,
        releases: &mut BinaryHeap<Release>,
        cash: &mut Decimal,
        until: Option<NaiveDateTime>,
        result: &mut PortfolioResult,
    ) {
        while let Some(Reverse((exit_time, _, _, _))) = releases.peek() {
            if until.is_some_and(|t| *exit_time > t) {
                break;
            }
            if let Some(Reverse((exit_time, _, amount, symbol))) = releases.pop() {
                *cash += amount;
                self.record(result, exit_time, *cash, CashEvent::Released, &symbol);
            }
        }
    }

    fn record(
        &self,
        result: &mut PortfolioResult,
        time: NaiveDateTime,
        cash: Decimal,
        event: CashEvent,
        symbol: &str,
    ) {
        if self.record_trajectory {
            result.trajectory.push(CashPoint {
                time,
                cash,
                event,
                symbol: symbol.to_string(),
            });
        }
    }
}
