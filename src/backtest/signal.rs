//! Per-bar entry signals.
//!
//! A bar signals `Enter` when the model forecasts materially more volatility
//! than the market proxy prices in, and price is trending away from its long
//! average. Signals are computed once for the whole series and never change.

use serde::{Deserialize, Serialize};

use crate::data::Bar;

/// Entry signal for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Open a long straddle.
    Enter,
    /// Do nothing.
    Neutral,
}

impl Signal {
    pub fn is_enter(&self) -> bool {
        matches!(self, Self::Enter)
    }
}

/// Thresholds that turn a forecast into a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalRule {
    /// Required forecast edge over the proxy (1.1 = forecast 10% above).
    pub edge_multiplier: f64,
    /// Minimum absolute trend strength for the trend to count as active.
    pub trend_threshold: f64,
}

impl Default for SignalRule {
    fn default() -> Self {
        Self {
            edge_multiplier: 1.1,
            trend_threshold: 0.01,
        }
    }
}

impl SignalRule {
    pub fn new(edge_multiplier: f64, trend_threshold: f64) -> Self {
        Self {
            edge_multiplier,
            trend_threshold,
        }
    }

    /// Classify a single bar.
    pub fn classify(&self, bar: &Bar) -> Signal {
        if !bar.is_priceable() || !bar.predicted_volatility.is_finite() {
            return Signal::Neutral;
        }

        let has_edge = bar.predicted_volatility > bar.volatility_proxy * self.edge_multiplier;
        let trend_active = bar.trend_strength.abs() > self.trend_threshold;

        if has_edge && trend_active {
            Signal::Enter
        } else {
            Signal::Neutral
        }
    }

    /// Classify every bar of a series.
    pub fn classify_series(&self, bars: &[Bar]) -> Vec<Signal> {
        bars.iter().map(|b| self.classify(b)).collect()
    }
}
