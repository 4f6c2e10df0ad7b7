//! At-the-money straddle valuation.
//!
//! A straddle is one call plus one put at the same strike. The strike is
//! fixed at the entry spot and never re-struck; each later tick is priced
//! with the time remaining and the live volatility of that tick.

use serde::{Deserialize, Serialize};

use crate::data::{Greeks, OptionType};

use super::black_scholes::{BlackScholes, PricingResult};

/// Pricing parameters shared by every straddle in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Risk-free rate.
    pub rate: f64,
    /// Days to expiry at entry.
    pub time_to_expiry_days: f64,
    /// Bars per trading day (375 one-minute bars for a 6h15m session).
    pub bars_per_day: f64,
    /// Calendar days per year used to annualize elapsed time.
    pub days_per_year: f64,
    /// Floor for time remaining, in years.
    pub min_time_to_expiry: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            rate: 0.07,
            time_to_expiry_days: 7.0,
            bars_per_day: 375.0,
            days_per_year: 365.0,
            min_time_to_expiry: 0.0001,
        }
    }
}

/// Values straddles struck at entry.
#[derive(Debug, Clone)]
pub struct StraddleValuer {
    bs: BlackScholes,
    config: ValuationConfig,
}

impl StraddleValuer {
    pub fn new(config: ValuationConfig) -> Self {
        Self {
            bs: BlackScholes::new(config.rate),
            config,
        }
    }

    /// Time to expiry at entry, in years.
    pub fn entry_time_to_expiry(&self) -> f64 {
        self.config.time_to_expiry_days / self.config.days_per_year
    }

    /// Time remaining after `elapsed_bars`, floored so ordinary ticks never
    /// reach the pricer's expiry fallback.
    pub fn remaining_time(&self, elapsed_bars: usize) -> f64 {
        let bars_per_year = self.config.bars_per_day * self.config.days_per_year;
        let elapsed = elapsed_bars as f64 / bars_per_year;
        (self.entry_time_to_expiry() - elapsed).max(self.config.min_time_to_expiry)
    }

    /// Call + put at the same strike.
    pub fn straddle_value(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> PricingResult<f64> {
        let call = self.bs.price(spot, strike, time, vol, OptionType::Call)?;
        let put = self.bs.price(spot, strike, time, vol, OptionType::Put)?;
        Ok(call + put)
    }

    /// Premium paid for an ATM straddle opened at `spot`.
    pub fn entry_premium(&self, spot: f64, vol: f64) -> PricingResult<f64> {
        self.straddle_value(spot, spot, self.entry_time_to_expiry(), vol)
    }

    /// Mark an open straddle `elapsed_bars` after entry with the live `vol`.
    pub fn mark(&self, spot: f64, strike: f64, elapsed_bars: usize, vol: f64) -> PricingResult<f64> {
        self.straddle_value(spot, strike, self.remaining_time(elapsed_bars), vol)
    }

    /// Combined Greeks of both legs.
    pub fn straddle_greeks(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
    ) -> PricingResult<Greeks> {
        let call = self.bs.greeks(spot, strike, time, vol, OptionType::Call)?;
        let put = self.bs.greeks(spot, strike, time, vol, OptionType::Put)?;
        Ok(call.add(&put))
    }
}

impl Default for StraddleValuer {
    fn default() -> Self {
        Self::new(ValuationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_remaining_time_decays_per_bar() {
        let valuer = StraddleValuer::default();
        let entry = valuer.entry_time_to_expiry();
        assert_relative_eq!(entry, 7.0 / 365.0);
        assert_relative_eq!(valuer.remaining_time(375), entry - 1.0 / 365.0, epsilon = 1e-12);
        // A week of bars exhausts the option; the floor holds.
        assert_eq!(valuer.remaining_time(375 * 7), 0.0001);
        assert_eq!(valuer.remaining_time(1_000_000), 0.0001);
    }

    #[test]
    fn test_straddle_is_call_plus_put() {
        let valuer = StraddleValuer::default();
        let bs = BlackScholes::new(0.07);
        let t = 7.0 / 365.0;
        let expected = bs.call_price(1000.0, 1000.0, t, 0.25).unwrap()
            + bs.put_price(1000.0, 1000.0, t, 0.25).unwrap();
        assert_relative_eq!(valuer.entry_premium(1000.0, 0.25).unwrap(), expected);
    }

    #[test]
    fn test_straddle_symmetric_at_expiry() {
        let valuer = StraddleValuer::default();
        assert_eq!(valuer.straddle_value(120.0, 100.0, 0.0, 0.2).unwrap(), 20.0);
        assert_eq!(valuer.straddle_value(80.0, 100.0, 0.0, 0.2).unwrap(), 20.0);
        // Approaching expiry converges on intrinsic.
        let near = valuer.straddle_value(120.0, 100.0, 1e-9, 0.2).unwrap();
        assert_relative_eq!(near, 20.0, epsilon = 1e-6);
    }

    #[test]
    fn test_live_vol_changes_mark() {
        let valuer = StraddleValuer::default();
        let calm = valuer.mark(1000.0, 1000.0, 10, 0.15).unwrap();
        let crushed = valuer.mark(1000.0, 1000.0, 10, 0.10).unwrap();
        assert!(crushed < calm);
    }

    #[test]
    fn test_atm_straddle_greeks() {
        let valuer = StraddleValuer::default();
        let greeks = valuer
            .straddle_greeks(25800.0, 25800.0, 7.0 / 365.0, 0.15)
            .unwrap();
        assert!(greeks.delta.abs() < 0.1, "ATM straddle delta near zero: {}", greeks.delta);
        assert!(greeks.gamma > 0.0);
        assert!(greeks.vega > 0.0);
        assert!(greeks.theta < 0.0);
    }

    #[test]
    fn test_invalid_spot_propagates() {
        let valuer = StraddleValuer::default();
        assert!(valuer.entry_premium(0.0, 0.2).is_err());
    }
}
