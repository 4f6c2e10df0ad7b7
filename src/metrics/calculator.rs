//! Performance metrics calculator.
//!
//! Per-symbol statistics, the ROI leaderboard, portfolio summaries and the
//! exit-policy comparison.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{collect_trades, ExitPolicy, ExitReason, Trade, TradeSimulator};
use crate::data::Bar;
use crate::portfolio::PortfolioResult;

/// Statistics for one symbol's trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction of trades with positive pnl.
    pub win_rate: f64,
    pub net_pnl: Decimal,
    /// Premium paid over all trades.
    pub total_cost: Decimal,
    /// `net_pnl / reference capital * 100`
    pub roi_pct: f64,
    pub avg_holding_bars: f64,
    /// Mean of per-trade `pnl / cost`.
    pub avg_return_pct: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    /// Trades closed by the horizon or end of data rather than the policy.
    pub forced_exits: usize,
}

impl SymbolSummary {
    /// Count of trades closed for `reason`.
    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exit_reasons.get(&reason).copied().unwrap_or(0)
    }
}

/// Headline numbers of a portfolio run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub initial_capital: Decimal,
    pub admitted_trades: usize,
    pub missed_trades: usize,
    pub final_cash: Decimal,
    pub roi_pct: f64,
    pub min_cash_seen: Decimal,
    pub peak_capital_in_use: Decimal,
}

impl PortfolioSummary {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Portfolio Summary\n\
             =================\n\
             \n\
             Initial Capital: {:.2}\n\
             Trades: {} admitted, {} missed\n\
             Final Cash: {:.2}\n\
             ROI: {:.2}%\n\
             Min Cash: {:.2}\n\
             Peak Capital In Use: {:.2}",
            self.initial_capital,
            self.admitted_trades,
            self.missed_trades,
            self.final_cash,
            self.roi_pct,
            self.min_cash_seen,
            self.peak_capital_in_use,
        )
    }
}

/// How one exit policy fared over a shared set of bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitComparison {
    pub policy: String,
    pub total_trades: usize,
    pub win_rate: f64,
    /// Mean of per-trade `pnl / cost`.
    pub avg_return_pct: f64,
    /// Sum of per-trade `pnl / cost`.
    pub total_return_pct: f64,
    /// Mean best `pnl_pct` seen while open.
    pub avg_max_favorable_pct: f64,
}

/// Metrics calculator.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    /// Capital ROI is measured against.
    reference_capital: Decimal,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(Decimal::from(30_000))
    }
}

impl MetricsCalculator {
    pub fn new(reference_capital: Decimal) -> Self {
        Self { reference_capital }
    }

    /// Summarize the trades of one symbol.
    pub fn summarize_symbol(&self, symbol: &str, trades: &[Trade]) -> SymbolSummary {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let net_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
        let total_cost: Decimal = trades.iter().map(|t| t.cost).sum();

        let roi_pct = if self.reference_capital.is_zero() {
            0.0
        } else {
            to_f64(net_pnl / self.reference_capital * Decimal::ONE_HUNDRED)
        };

        let mut exit_reasons = BTreeMap::new();
        for trade in trades {
            *exit_reasons.entry(trade.exit_reason).or_insert(0) += 1;
        }

        SymbolSummary {
            symbol: symbol.to_string(),
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            win_rate: ratio(winning_trades, total_trades),
            net_pnl,
            total_cost,
            roi_pct,
            avg_holding_bars: mean(trades.iter().map(|t| t.holding_bars() as f64)),
            avg_return_pct: mean(trades.iter().map(Trade::return_pct)),
            exit_reasons,
            forced_exits: trades.iter().filter(|t| t.exit_reason.is_forced()).count(),
        }
    }

    /// One summary per symbol, best ROI first; ties ordered by symbol.
    pub fn leaderboard(&self, trades: &[Trade]) -> Vec<SymbolSummary> {
        let mut by_symbol: BTreeMap<&str, Vec<Trade>> = BTreeMap::new();
        for trade in trades {
            by_symbol
                .entry(trade.symbol.as_str())
                .or_default()
                .push(trade.clone());
        }

        let mut board: Vec<SymbolSummary> = by_symbol
            .into_iter()
            .map(|(symbol, trades)| self.summarize_symbol(symbol, &trades))
            .collect();

        board.sort_by(|a, b| {
            b.roi_pct
                .partial_cmp(&a.roi_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        board
    }

    pub fn summarize_portfolio(result: &PortfolioResult) -> PortfolioSummary {
        PortfolioSummary {
            initial_capital: result.initial_capital,
            admitted_trades: result.admitted_trades,
            missed_trades: result.missed_trades,
            final_cash: result.final_cash,
            roi_pct: result.roi_pct(),
            min_cash_seen: result.min_cash_seen,
            peak_capital_in_use: result.peak_capital_in_use,
        }
    }

    /// Re-run the universe under each policy and compare outcomes.
    pub fn compare_exits(
        simulator: &TradeSimulator,
        universe: &[(String, Vec<Bar>)],
        policies: &[ExitPolicy],
    ) -> Vec<ExitComparison> {
        policies
            .iter()
            .map(|policy| {
                let results = simulator
                    .clone()
                    .with_exit_policy(policy.clone())
                    .run_universe(universe);
                Self::exit_comparison(policy.name(), &collect_trades(&results))
            })
            .collect()
    }

    fn exit_comparison(policy: &str, trades: &[Trade]) -> ExitComparison {
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        ExitComparison {
            policy: policy.to_string(),
            total_trades: trades.len(),
            win_rate: ratio(winners, trades.len()),
            avg_return_pct: mean(trades.iter().map(Trade::return_pct)),
            total_return_pct: trades.iter().map(Trade::return_pct).sum(),
            avg_max_favorable_pct: mean(trades.iter().map(|t| t.max_favorable_pct)),
        }
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.try_into().unwrap_or(0.0)
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}
