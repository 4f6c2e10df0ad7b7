//! Single-instrument trade simulator.
//!
//! Walks a bar series as an explicit state machine:
//! 1. Flat: look for an `Enter` signal at the cursor
//! 2. Check the optional capital gate
//! 3. Open: mark the straddle on each following bar, at most
//!    `look_ahead_bars` ahead, and ask the exit policy
//! 4. Close (policy exit, horizon, or end of data) and resume the scan on
//!    the bar after the exit
//!
//! Every step returns the next cursor, so bars held by a position are never
//! rescanned for entries and no bar beyond the look-ahead bound is read.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, StrategyConfig};
use crate::data::{mean_spot, Bar};
use crate::pricing::StraddleValuer;

use super::exit_policy::ExitPolicy;
use super::signal::{Signal, SignalRule};
use super::trade::{premium_to_decimal, ExitReason, OpenPosition, Trade, TradeError};

/// Configuration for the per-symbol scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Maximum bars a position may be held (1875 = five 375-bar sessions).
    pub look_ahead_bars: usize,

    /// Notional one lot should represent; quantity = notional / mean spot.
    pub notional_per_lot: f64,

    /// Fixed quantity, overriding the notional heuristic.
    pub quantity: Option<u32>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            look_ahead_bars: 1875,
            notional_per_lot: 750_000.0,
            quantity: None,
        }
    }
}

/// Capital available to a single symbol, growing in steps over time.
///
/// Available at bar `i`: `min(cap, initial + floor(i / interval_bars) * step)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSchedule {
    pub initial: Decimal,
    pub step: Decimal,
    pub interval_bars: usize,
    pub cap: Decimal,
}

impl Default for CapitalSchedule {
    fn default() -> Self {
        Self {
            initial: Decimal::from(30_000),
            step: Decimal::from(5_000),
            // ~30 sessions of 375 bars
            interval_bars: 11_250,
            cap: Decimal::from(50_000),
        }
    }
}

impl CapitalSchedule {
    pub fn available_at(&self, bar_index: usize) -> Decimal {
        let steps = if self.interval_bars == 0 {
            0
        } else {
            bar_index / self.interval_bars
        };
        (self.initial + self.step * Decimal::from(steps as u64)).min(self.cap)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial <= Decimal::ZERO || self.step < Decimal::ZERO || self.cap < self.initial {
            return Err(ConfigError::Invalid(format!(
                "capital schedule must be increasing from a positive start (initial {}, step {}, cap {})",
                self.initial, self.step, self.cap
            )));
        }
        if self.interval_bars == 0 {
            return Err(ConfigError::Invalid(
                "capital schedule interval_bars must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of simulating one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub symbol: String,
    /// Quantity used for every trade.
    pub quantity: u32,
    /// Bars in the input series.
    pub bars: usize,
    /// Closed trades in entry order.
    pub trades: Vec<Trade>,
    /// Trades dropped because pricing or bookkeeping failed.
    pub rejected_trades: usize,
    /// Entry signals skipped by the capital gate.
    pub unaffordable_signals: usize,
}

impl SimulationResult {
    fn empty(symbol: &str, bars: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity: 0,
            bars,
            trades: Vec::new(),
            rejected_trades: 0,
            unaffordable_signals: 0,
        }
    }

    pub fn total_pnl(&self) -> Decimal {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

/// Result of one state-machine step.
enum Step {
    /// Stay flat and continue at the given bar.
    Advance(usize),
    /// Entry skipped by the capital gate.
    Unaffordable(usize),
    /// A trade opened and closed.
    Closed { trade: Trade, next: usize },
    /// A trade was attempted but cannot be recorded consistently.
    Rejected { error: TradeError, next: usize },
}

/// How the scanned window ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WindowExit {
    /// Offset from entry of the exit bar.
    pub offset: usize,
    /// Premium at the exit bar, rounded to the booking precision.
    pub premium: Decimal,
    pub reason: ExitReason,
}

/// Run the exit policy over a window of `(offset, premium)` marks.
///
/// Each mark is rounded to the booking precision before the policy sees it,
/// so the exit decision and the recorded trade agree. Stops at the first
/// policy exit. Without one, the last mark is returned
/// with `forced_reason`. `None` only when the window had no marks at all.
pub(crate) fn scan_window<I>(
    policy: &ExitPolicy,
    position: &mut OpenPosition,
    marks: I,
    forced_reason: ExitReason,
) -> Result<Option<WindowExit>, TradeError>
where
    I: IntoIterator<Item = Result<(usize, f64), TradeError>>,
{
    let mut state = policy.start(position.entry_volatility);
    let mut last = None;

    for mark in marks {
        let (offset, premium) = mark?;
        let premium = premium_to_decimal(premium)?;
        let pnl_pct = position.pnl_pct(premium);
        position.observe(pnl_pct);
        if let Some(reason) = policy.evaluate(&mut state, offset, pnl_pct) {
            return Ok(Some(WindowExit {
                offset,
                premium,
                reason,
            }));
        }
        last = Some((offset, premium));
    }

    Ok(last.map(|(offset, premium)| WindowExit {
        offset,
        premium,
        reason: forced_reason,
    }))
}

/// Per-symbol long straddle simulator.
#[derive(Debug, Clone)]
pub struct TradeSimulator {
    valuer: StraddleValuer,
    signal_rule: SignalRule,
    exit_policy: ExitPolicy,
    config: SimulatorConfig,
    capital_schedule: Option<CapitalSchedule>,
}

impl Default for TradeSimulator {
    fn default() -> Self {
        Self::new(
            StraddleValuer::default(),
            SignalRule::default(),
            ExitPolicy::default(),
            SimulatorConfig::default(),
        )
    }
}

impl TradeSimulator {
    pub fn new(
        valuer: StraddleValuer,
        signal_rule: SignalRule,
        exit_policy: ExitPolicy,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            valuer,
            signal_rule,
            exit_policy,
            config,
            capital_schedule: None,
        }
    }

    /// Build from a validated strategy configuration.
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            valuer: StraddleValuer::new(config.pricing.clone()),
            signal_rule: config.signal.clone(),
            exit_policy: config.exit_policy.clone(),
            config: config.simulator.clone(),
            capital_schedule: config.capital_schedule.clone(),
        }
    }

    /// Gate entries on a per-symbol capital schedule.
    pub fn with_capital_schedule(mut self, schedule: CapitalSchedule) -> Self {
        self.capital_schedule = Some(schedule);
        self
    }

    /// Swap the exit policy, keeping everything else.
    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    /// Units per trade for this series.
    pub fn lot_size(&self, bars: &[Bar]) -> u32 {
        if let Some(quantity) = self.config.quantity {
            return quantity;
        }
        match mean_spot(bars) {
            Some(mean) => (self.config.notional_per_lot / mean).floor() as u32,
            None => 0,
        }
    }

    /// Simulate one symbol over its full bar series.
    pub fn run(&self, symbol: &str, bars: &[Bar]) -> SimulationResult {
        let quantity = self.lot_size(bars);
        if quantity == 0 {
            warn!("{}: lot size is zero over {} bars, skipping", symbol, bars.len());
            return SimulationResult::empty(symbol, bars.len());
        }

        let signals = self.signal_rule.classify_series(bars);
        let mut result = SimulationResult {
            quantity,
            ..SimulationResult::empty(symbol, bars.len())
        };

        let mut cursor = 0;
        while cursor < bars.len() {
            cursor = match self.step(symbol, bars, &signals, quantity, cursor) {
                Step::Advance(next) => next,
                Step::Unaffordable(next) => {
                    result.unaffordable_signals += 1;
                    next
                }
                Step::Closed { trade, next } => {
                    debug!(
                        "{}: bars {}-{} {:?} pnl {}",
                        symbol, trade.entry_index, trade.exit_index, trade.exit_reason, trade.pnl
                    );
                    result.trades.push(trade);
                    next
                }
                Step::Rejected { error, next } => {
                    warn!("{}: trade at bar {} rejected: {}", symbol, cursor, error);
                    result.rejected_trades += 1;
                    next
                }
            };
        }

        info!(
            "{}: {} trades, {} rejected, {} unaffordable, pnl {}",
            symbol,
            result.trades.len(),
            result.rejected_trades,
            result.unaffordable_signals,
            result.total_pnl()
        );
        result
    }

    /// Simulate many symbols in parallel. Output order matches input order.
    pub fn run_universe(&self, universe: &[(String, Vec<Bar>)]) -> Vec<SimulationResult> {
        universe
            .par_iter()
            .map(|(symbol, bars)| self.run(symbol, bars))
            .collect()
    }

    fn step(
        &self,
        symbol: &str,
        bars: &[Bar],
        signals: &[Signal],
        quantity: u32,
        cursor: usize,
    ) -> Step {
        if !signals[cursor].is_enter() {
            return Step::Advance(cursor + 1);
        }
        // No bar left to exit on.
        if cursor + 1 >= bars.len() {
            return Step::Advance(bars.len());
        }

        let bar = &bars[cursor];
        let position = match self.open(symbol, bar, cursor, quantity) {
            Ok(position) => position,
            Err(error) => {
                return Step::Rejected {
                    error,
                    next: cursor + 1,
                }
            }
        };

        if let Some(schedule) = &self.capital_schedule {
            let available = schedule.available_at(cursor);
            if position.cost() > available {
                debug!(
                    "{}: entry at bar {} costs {} but only {} available",
                    symbol,
                    cursor,
                    position.cost(),
                    available
                );
                return Step::Unaffordable(cursor + 1);
            }
        }

        match self.hold(position, bars, cursor) {
            Ok(trade) => {
                let next = trade.exit_index + 1;
                Step::Closed { trade, next }
            }
            Err(error) => Step::Rejected {
                error,
                next: cursor + 1,
            },
        }
    }

    fn open(
        &self,
        symbol: &str,
        bar: &Bar,
        index: usize,
        quantity: u32,
    ) -> Result<OpenPosition, TradeError> {
        let premium = self
            .valuer
            .entry_premium(bar.spot_close, bar.volatility_proxy)?;
        OpenPosition::new(
            symbol,
            index,
            bar.timestamp,
            bar.spot_close,
            bar.volatility_proxy,
            premium,
            quantity,
        )
    }

    /// Hold an open position through the bounded window and close it.
    fn hold(
        &self,
        mut position: OpenPosition,
        bars: &[Bar],
        entry_index: usize,
    ) -> Result<Trade, TradeError> {
        let bound = entry_index.saturating_add(self.config.look_ahead_bars);
        let last_index = bound.min(bars.len() - 1);
        let forced_reason = if bound > last_index {
            ExitReason::EndOfData
        } else {
            ExitReason::HorizonExpired
        };

        let strike = position.entry_spot;
        let entry_time = position.entry_time;
        let marks = bars[entry_index + 1..=last_index]
            .iter()
            .enumerate()
            .map(|(i, bar)| (i + 1, bar))
            // Unpriceable bars and bars that do not move the clock forward
            // cannot be exits; they are stepped over.
            .filter(|(_, bar)| bar.is_priceable() && bar.timestamp > entry_time)
            .map(|(offset, bar)| {
                self.valuer
                    .mark(bar.spot_close, strike, offset, bar.volatility_proxy)
                    .map(|premium| (offset, premium))
                    .map_err(TradeError::from)
            });

        let exit = scan_window(&self.exit_policy, &mut position, marks, forced_reason)?
            .ok_or_else(|| {
                TradeError::InconsistentBookkeeping(format!(
                    "{}: no priceable bar after entry {}",
                    position.symbol, entry_index
                ))
            })?;

        let exit_index = entry_index + exit.offset;
        let exit_bar = &bars[exit_index];
        position.close(
            exit_index,
            exit_bar.timestamp,
            exit_bar.spot_close,
            exit.premium,
            exit.reason,
        )
    }
}

/// All trades of several results, flattened in result order.
pub fn collect_trades(results: &[SimulationResult]) -> Vec<Trade> {
    results.iter().flat_map(|r| r.trades.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    /// Bars with the given spots; `enter` marks which bars signal entry.
    fn bars(spots: &[f64], proxies: &[f64], enter: &[bool]) -> Vec<Bar> {
        spots
            .iter()
            .enumerate()
            .map(|(i, &spot)| {
                let proxy = proxies[i.min(proxies.len() - 1)];
                let predicted = if enter[i.min(enter.len() - 1)] {
                    proxy * 2.0
                } else {
                    proxy * 0.5
                };
                Bar::new(start() + Duration::minutes(i as i64), spot, proxy, predicted, 0.05)
            })
            .collect()
    }

    fn wavy_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                let spot = 1000.0 + 40.0 * (x / 37.0).sin() + 15.0 * (x / 7.0).cos();
                let proxy = 0.18 + 0.05 * (x / 53.0).sin();
                let predicted = 0.20 + 0.08 * (x / 29.0).cos();
                let trend = 0.03 * (x / 41.0).sin();
                Bar::new(start() + Duration::minutes(i as i64), spot, proxy, predicted, trend)
            })
            .collect()
    }

    fn simulator(look_ahead: usize) -> TradeSimulator {
        TradeSimulator::new(
            StraddleValuer::default(),
            SignalRule::default(),
            ExitPolicy::default(),
            SimulatorConfig {
                look_ahead_bars: look_ahead,
                quantity: Some(10),
                ..SimulatorConfig::default()
            },
        )
    }

    #[test]
    fn test_scan_window_exits_at_first_take_profit_bar() {
        let ts = start();
        let mut position = OpenPosition::new("X", 0, ts, 1000.0, 0.2, 100.0, 1).unwrap();
        // 100 -> 131 over 10 bars, then flat
        let path: Vec<f64> = (1..=20)
            .map(|i| if i <= 10 { 100.0 + 3.1 * i as f64 } else { 131.0 })
            .collect();
        let marks = path.iter().enumerate().map(|(i, &p)| Ok((i + 1, p)));

        let exit = scan_window(&ExitPolicy::default(), &mut position, marks, ExitReason::HorizonExpired)
            .unwrap()
            .unwrap();

        // First premium >= 130 is 131.0 at bar 10 (127.9 at bar 9).
        assert_eq!(exit.offset, 10);
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert!(exit.premium >= dec!(130));
        assert!(path[..exit.offset - 1].iter().all(|&p| p < 130.0));
    }

    #[test]
    fn test_scan_window_forced_close_on_last_mark() {
        let mut position = OpenPosition::new("X", 0, start(), 1000.0, 0.2, 100.0, 1).unwrap();
        let marks = vec![Ok((1, 101.0)), Ok((2, 99.0)), Ok((3, 102.0))];
        let exit = scan_window(&ExitPolicy::default(), &mut position, marks, ExitReason::EndOfData)
            .unwrap()
            .unwrap();
        assert_eq!(
            exit,
            WindowExit {
                offset: 3,
                premium: dec!(102),
                reason: ExitReason::EndOfData
            }
        );
        assert!((position.max_favorable_pct - 0.02).abs() < 1e-12);
        assert!((position.max_adverse_pct + 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_scan_window_decides_on_rounded_premium() {
        let policy = ExitPolicy::default();

        // 13.000131 rounds to 13.0001, just under +30% of 10.0001.
        let mut position = OpenPosition::new("X", 0, start(), 1000.0, 0.2, 10.0001, 1).unwrap();
        let marks = vec![Ok((1, 13.000131)), Ok((2, 11.0))];
        let exit = scan_window(&policy, &mut position, marks, ExitReason::HorizonExpired)
            .unwrap()
            .unwrap();
        assert_eq!(exit.offset, 2);
        assert_eq!(exit.reason, ExitReason::HorizonExpired);

        let mut position = OpenPosition::new("X", 0, start(), 1000.0, 0.2, 10.0001, 1).unwrap();
        let marks = vec![Ok((1, 13.0002)), Ok((2, 11.0))];
        let exit = scan_window(&policy, &mut position, marks, ExitReason::HorizonExpired)
            .unwrap()
            .unwrap();
        assert_eq!(exit.offset, 1);
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_eq!(exit.premium, dec!(13.0002));

        let trade = position
            .close(1, start() + Duration::minutes(1), 1000.0, exit.premium, exit.reason)
            .unwrap();
        assert!(trade.return_pct() >= 0.30);
    }

    #[test]
    fn test_take_profit_on_breakout() {
        let spots: Vec<f64> = (0..60).map(|i| 1000.0 + 2.0 * i as f64).collect();
        let mut enter = vec![false; 60];
        enter[0] = true;
        let bars = bars(&spots, &[0.20], &enter);

        let result = simulator(100).run("BREAKOUT", &bars);
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 0);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert!(trade.exit_spot > trade.entry_spot);
        assert!(trade.is_winner());
    }

    #[test]
    fn test_volatility_crush_hits_stop_loss() {
        let spots = vec![1000.0; 10];
        let proxies = [0.30, 0.15];
        let mut enter = vec![false; 10];
        enter[0] = true;
        let bars = bars(&spots, &proxies, &enter);

        let result = simulator(100).run("CRUSH", &bars);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_index, 1);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!(trade.pnl < Decimal::ZERO);
    }

    #[test]
    fn test_causality_and_no_overlap() {
        let bars = wavy_bars(3000);
        let look_ahead = 120;
        let result = simulator(look_ahead).run("WAVY", &bars);
        assert!(!result.trades.is_empty());

        for trade in &result.trades {
            assert!(trade.exit_index > trade.entry_index);
            assert!(trade.exit_index <= trade.entry_index + look_ahead);
            assert!(trade.exit_time > trade.entry_time);
            assert_eq!(trade.cost, trade.entry_premium * Decimal::from(trade.quantity));
            assert_eq!(
                trade.pnl,
                (trade.exit_premium - trade.entry_premium) * Decimal::from(trade.quantity)
            );
        }
        for pair in result.trades.windows(2) {
            assert!(pair[1].entry_index > pair[0].exit_index);
        }
    }

    #[test]
    fn test_deterministic() {
        let bars = wavy_bars(2000);
        let sim = simulator(200);
        assert_eq!(sim.run("WAVY", &bars), sim.run("WAVY", &bars));
    }

    #[test]
    fn test_resumes_after_exit_when_every_bar_signals() {
        let spots = vec![1000.0; 30];
        let bars = bars(&spots, &[0.20], &[true]);
        let result = simulator(5).run("FLAT", &bars);

        // Flat spot never triggers; each trade runs the full horizon.
        assert!(result.trades.len() >= 4);
        for pair in result.trades.windows(2) {
            assert_eq!(pair[1].entry_index, pair[0].exit_index + 1);
        }
        assert!(result.trades.iter().all(|t| t.holding_bars() <= 5));
    }

    #[test]
    fn test_truncates_horizon_at_end_of_data() {
        let spots = vec![1000.0; 8];
        let mut enter = vec![false; 8];
        enter[4] = true;
        let bars = bars(&spots, &[0.20], &enter);

        let result = simulator(1875).run("SHORT", &bars);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_index, 7);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn test_horizon_expired_reason() {
        let spots = vec![1000.0; 20];
        let mut enter = vec![false; 20];
        enter[0] = true;
        let bars = bars(&spots, &[0.20], &enter);

        let trade = &simulator(5).run("H", &bars).trades[0];
        assert_eq!(trade.exit_index, 5);
        assert_eq!(trade.exit_reason, ExitReason::HorizonExpired);
    }

    #[test]
    fn test_signal_on_last_bar_is_ignored() {
        let spots = vec![1000.0; 5];
        let mut enter = vec![false; 5];
        enter[4] = true;
        let bars = bars(&spots, &[0.20], &enter);
        let result = simulator(10).run("END", &bars);
        assert!(result.trades.is_empty());
        assert_eq!(result.rejected_trades, 0);
    }

    #[test]
    fn test_duplicate_timestamp_rejects_trade_not_run() {
        let spots = vec![1000.0; 6];
        let mut enter = vec![false; 6];
        enter[0] = true;
        enter[2] = true;
        let mut bars = bars(&spots, &[0.20], &enter);
        bars[1].timestamp = bars[0].timestamp;

        let result = simulator(1).run("DUP", &bars);
        assert_eq!(result.rejected_trades, 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_index, 2);
    }

    #[test]
    fn test_repeated_timestamp_is_not_an_exit_candidate() {
        let spots = vec![1000.0; 300];
        let mut enter = vec![false; 300];
        enter[0] = true;
        enter[10] = true;
        let mut bars = bars(&spots, &[0.20], &enter);
        // A stale tick that would hit take-profit if it were marked.
        bars[1].timestamp = bars[0].timestamp;
        bars[1].spot_close = 1100.0;

        let result = simulator(200).run("STALE", &bars);
        assert_eq!(result.rejected_trades, 0);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 0);
        assert_ne!(trade.exit_index, 1);
        assert!(trade.exit_time > trade.entry_time);
        assert_eq!(trade.exit_index, 200);
        assert_eq!(trade.exit_reason, ExitReason::HorizonExpired);
        // Bar 10 fell inside the first trade's window.
        assert_eq!(result.trades.len(), 1);
    }

    #[test]
    fn test_rejection_resumes_on_next_bar() {
        let spots = vec![1000.0; 12];
        let mut enter = vec![false; 12];
        enter[0] = true;
        enter[3] = true;
        let mut bars = bars(&spots, &[0.20], &enter);
        // Every bar in the first window lags the entry clock.
        for bar in &mut bars[1..=2] {
            bar.timestamp = start() - Duration::minutes(1);
        }

        let result = simulator(2).run("LAG", &bars);
        assert_eq!(result.rejected_trades, 1);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_index, 3);
    }

    #[test]
    fn test_unbounded_look_ahead_does_not_overflow() {
        let spots = vec![1000.0; 5];
        let mut enter = vec![false; 5];
        enter[1] = true;
        let bars = bars(&spots, &[0.20], &enter);

        let result = simulator(usize::MAX).run("HUGE", &bars);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_index, 4);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn test_unpriceable_bars_are_skipped_while_holding() {
        let spots = vec![1000.0, 1000.0, f64::NAN, 1000.0, 1000.0];
        let mut enter = vec![false; 5];
        enter[0] = true;
        let bars = bars(&spots, &[0.20], &enter);
        let result = simulator(2).run("GAP", &bars);
        assert_eq!(result.trades.len(), 1);
        // Bar 2 is the horizon but unpriceable: close on bar 1.
        assert_eq!(result.trades[0].exit_index, 1);
    }

    #[test]
    fn test_lot_size_from_notional() {
        let sim = TradeSimulator::default();
        let bars = bars(&[2900.0, 3100.0], &[0.2], &[false]);
        assert_eq!(sim.lot_size(&bars), 250);
        assert_eq!(sim.lot_size(&[]), 0);
        assert!(sim.run("EMPTY", &[]).trades.is_empty());
    }

    #[test]
    fn test_capital_schedule() {
        let schedule = CapitalSchedule::default();
        assert_eq!(schedule.available_at(0), dec!(30000));
        assert_eq!(schedule.available_at(11_250), dec!(35000));
        assert_eq!(schedule.available_at(11_250 * 10), dec!(50000));
        assert!(schedule.validate().is_ok());
        assert!(CapitalSchedule {
            interval_bars: 0,
            ..CapitalSchedule::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_capital_gate_skips_expensive_entries() {
        let spots = vec![1000.0; 10];
        let mut enter = vec![false; 10];
        enter[0] = true;
        let bars = bars(&spots, &[0.20], &enter);

        let tight = CapitalSchedule {
            initial: dec!(1),
            step: dec!(0),
            interval_bars: 100,
            cap: dec!(1),
        };
        let result = simulator(5).with_capital_schedule(tight).run("POOR", &bars);
        assert!(result.trades.is_empty());
        assert_eq!(result.unaffordable_signals, 1);

        let result = simulator(5)
            .with_capital_schedule(CapitalSchedule::default())
            .run("RICH", &bars);
        assert_eq!(result.trades.len(), 1);
    }

    #[test]
    fn test_run_universe_matches_individual_runs() {
        let sim = simulator(150);
        let universe = vec![
            ("A".to_string(), wavy_bars(800)),
            ("B".to_string(), wavy_bars(1200)),
            ("C".to_string(), Vec::new()),
        ];
        let results = sim.run_universe(&universe);
        assert_eq!(results.len(), 3);
        for (result, (symbol, bars)) in results.iter().zip(&universe) {
            assert_eq!(result, &sim.run(symbol, bars));
        }
        let all = collect_trades(&results);
        assert_eq!(all.len(), results[0].trades.len() + results[1].trades.len());
    }
}
