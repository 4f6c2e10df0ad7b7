//! Core data types for the straddle backtester.
//!
//! These are the values handed over by the feature/forecast pipeline: one
//! [`Bar`] per trading minute, and option chain rows for the GEX analysis.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Parse the usual broker spellings ("C", "call", "CE", ...).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CE" | "CALL" => Some(Self::Call),
            "P" | "PE" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// Greeks for an option contract (or a sum of contracts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    /// Per calendar day.
    pub theta: f64,
    /// Per 1 volatility point.
    pub vega: f64,
    /// Per 1 rate point.
    pub rho: f64,
}

impl Greeks {
    /// Leg-wise sum, used for multi-leg positions such as straddles.
    pub fn add(&self, other: &Greeks) -> Greeks {
        Greeks {
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            theta: self.theta + other.theta,
            vega: self.vega + other.vega,
            rho: self.rho + other.rho,
        }
    }
}

/// One minute bar for a single underlying.
///
/// Volatilities are annualized fractions (0.20 = 20%). The series may
/// contain duplicated timestamps or gaps; the simulator treats every bar as
/// one scan step and never interpolates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar close time.
    pub timestamp: NaiveDateTime,

    /// Underlying close price.
    pub spot_close: f64,

    /// Market-implied volatility proxy (trailing historical vol).
    pub volatility_proxy: f64,

    /// Forecast realized volatility from the model.
    pub predicted_volatility: f64,

    /// Signed distance of price from its long moving average.
    pub trend_strength: f64,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        spot_close: f64,
        volatility_proxy: f64,
        predicted_volatility: f64,
        trend_strength: f64,
    ) -> Self {
        Self {
            timestamp,
            spot_close,
            volatility_proxy,
            predicted_volatility,
            trend_strength,
        }
    }

    /// Spot and proxy are usable as pricing inputs.
    pub fn is_priceable(&self) -> bool {
        self.spot_close.is_finite()
            && self.spot_close > 0.0
            && self.volatility_proxy.is_finite()
            && self.volatility_proxy > 0.0
    }
}

/// A single row of an option chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    /// Strike price
    pub strike: f64,

    /// Option type (call or put)
    pub option_type: OptionType,

    /// Open interest in contracts
    pub open_interest: f64,

    /// Implied volatility (annualized fraction)
    pub implied_volatility: f64,

    /// Expiration date
    pub expiry: NaiveDate,
}

impl ChainRow {
    pub fn new(
        strike: f64,
        option_type: OptionType,
        open_interest: f64,
        implied_volatility: f64,
        expiry: NaiveDate,
    ) -> Self {
        Self {
            strike,
            option_type,
            open_interest,
            implied_volatility,
            expiry,
        }
    }
}

/// Mean close price of a series, `None` when no bar has a usable price.
pub fn mean_spot(bars: &[Bar]) -> Option<f64> {
    let (sum, count) = bars
        .iter()
        .filter(|b| b.spot_close.is_finite() && b.spot_close > 0.0)
        .fold((0.0, 0usize), |(s, n), b| (s + b.spot_close, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
