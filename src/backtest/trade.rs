//! Trade records for the straddle backtest.
//!
//! Handles the trade lifecycle:
//! - Entry (open position with the premium paid)
//! - Exit (terminal fields set once, bookkeeping checked)
//! - P&L calculation
//!
//! Premiums are rounded to [`PREMIUM_DP`] decimal places at entry and exit,
//! so `cost = entry_premium * quantity` and
//! `pnl = (exit_premium - entry_premium) * quantity` hold exactly.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::PricingError;

/// Decimal places kept on premiums.
pub const PREMIUM_DP: u32 = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Inconsistent bookkeeping: {0}")]
    InconsistentBookkeeping(String),
}

/// Reason for exiting a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitReason {
    /// Premium gain reached the take-profit threshold.
    TakeProfit,
    /// Premium loss reached the stop-loss threshold.
    StopLoss,
    /// Retraced from the high-water mark after trailing activated.
    TrailingStop,
    /// Gain reached the entry-volatility-scaled target.
    VolatilityTarget,
    /// Not profitable enough after the allotted time.
    TimeDecay,
    /// Look-ahead bound reached without a trigger.
    HorizonExpired,
    /// Series ended before the look-ahead bound.
    EndOfData,
}

impl ExitReason {
    /// Forced closes, as opposed to a policy decision.
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::HorizonExpired | Self::EndOfData)
    }
}

/// Round a model premium to the stored precision.
pub fn premium_to_decimal(premium: f64) -> Result<Decimal, TradeError> {
    if !premium.is_finite() || premium < 0.0 {
        return Err(TradeError::InconsistentBookkeeping(format!(
            "premium {} is not a finite non-negative value",
            premium
        )));
    }
    Decimal::from_f64_retain(premium)
        .map(|d| d.round_dp(PREMIUM_DP))
        .ok_or_else(|| {
            TradeError::InconsistentBookkeeping(format!("premium {} not representable", premium))
        })
}

/// A straddle that has been bought and not yet closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    /// Bar index of the entry.
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    /// Spot at entry, also the strike of both legs.
    pub entry_spot: f64,
    /// Volatility proxy used to price the entry.
    pub entry_volatility: f64,
    /// Premium per unit, rounded.
    pub entry_premium: Decimal,
    pub quantity: u32,
    /// Best and worst `pnl_pct` seen while open.
    pub max_favorable_pct: f64,
    pub max_adverse_pct: f64,
}

impl OpenPosition {
    pub fn new(
        symbol: &str,
        entry_index: usize,
        entry_time: NaiveDateTime,
        entry_spot: f64,
        entry_volatility: f64,
        entry_premium: f64,
        quantity: u32,
    ) -> Result<Self, TradeError> {
        let entry_premium = premium_to_decimal(entry_premium)?;
        if entry_premium.is_zero() {
            return Err(TradeError::InconsistentBookkeeping(format!(
                "{}: zero entry premium at bar {}",
                symbol, entry_index
            )));
        }
        if quantity == 0 {
            return Err(TradeError::InconsistentBookkeeping(format!(
                "{}: zero quantity at bar {}",
                symbol, entry_index
            )));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            entry_index,
            entry_time,
            entry_spot,
            entry_volatility,
            entry_premium,
            quantity,
            max_favorable_pct: 0.0,
            max_adverse_pct: 0.0,
        })
    }

    /// Capital tied up by the position.
    pub fn cost(&self) -> Decimal {
        self.entry_premium * Decimal::from(self.quantity)
    }

    /// Running return on premium for a rounded mark `premium`.
    pub fn pnl_pct(&self, premium: Decimal) -> f64 {
        ((premium - self.entry_premium) / self.entry_premium)
            .try_into()
            .unwrap_or(0.0)
    }

    /// Record the excursion of one mark.
    pub fn observe(&mut self, pnl_pct: f64) {
        self.max_favorable_pct = self.max_favorable_pct.max(pnl_pct);
        self.max_adverse_pct = self.max_adverse_pct.min(pnl_pct);
    }

    /// Close the position, checking that entry and exit bookkeeping agree.
    pub fn close(
        self,
        exit_index: usize,
        exit_time: NaiveDateTime,
        exit_spot: f64,
        exit_premium: Decimal,
        exit_reason: ExitReason,
    ) -> Result<Trade, TradeError> {
        if exit_index <= self.entry_index {
            return Err(TradeError::InconsistentBookkeeping(format!(
                "{}: exit bar {} not after entry bar {}",
                self.symbol, exit_index, self.entry_index
            )));
        }
        if exit_time <= self.entry_time {
            return Err(TradeError::InconsistentBookkeeping(format!(
                "{}: exit time {} not after entry time {}",
                self.symbol, exit_time, self.entry_time
            )));
        }

        if exit_premium.is_sign_negative() {
            return Err(TradeError::InconsistentBookkeeping(format!(
                "{}: negative exit premium {}",
                self.symbol, exit_premium
            )));
        }
        let exit_premium = exit_premium.round_dp(PREMIUM_DP);
        let quantity = Decimal::from(self.quantity);
        let cost = self.cost();
        let pnl = (exit_premium - self.entry_premium) * quantity;

        Ok(Trade {
            symbol: self.symbol,
            entry_index: self.entry_index,
            entry_time: self.entry_time,
            entry_spot: self.entry_spot,
            entry_volatility: self.entry_volatility,
            entry_premium: self.entry_premium,
            quantity: self.quantity,
            cost,
            exit_index,
            exit_time,
            exit_spot,
            exit_premium,
            pnl,
            exit_reason,
            max_favorable_pct: self.max_favorable_pct,
            max_adverse_pct: self.max_adverse_pct,
        })
    }
}

/// A completed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub entry_spot: f64,
    pub entry_volatility: f64,
    pub entry_premium: Decimal,
    pub quantity: u32,
    /// `entry_premium * quantity`
    pub cost: Decimal,
    pub exit_index: usize,
    pub exit_time: NaiveDateTime,
    pub exit_spot: f64,
    pub exit_premium: Decimal,
    /// `(exit_premium - entry_premium) * quantity`
    pub pnl: Decimal,
    pub exit_reason: ExitReason,
    pub max_favorable_pct: f64,
    pub max_adverse_pct: f64,
}

impl Trade {
    /// Check if trade was profitable.
    pub fn is_winner(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// Bars between entry and exit.
    pub fn holding_bars(&self) -> usize {
        self.exit_index - self.entry_index
    }

    /// P&L as a fraction of cost.
    pub fn return_pct(&self) -> f64 {
        if self.cost.is_zero() {
            return 0.0;
        }
        (self.pnl / self.cost).try_into().unwrap_or(0.0)
    }

    /// Cash returned to the pool when the trade closes.
    pub fn release_amount(&self) -> Decimal {
        self.cost + self.pnl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_premium_rounding() {
        assert_eq!(premium_to_decimal(12.345678).unwrap(), dec!(12.3457));
        assert!(premium_to_decimal(f64::NAN).is_err());
        assert!(premium_to_decimal(-1.0).is_err());
    }

    #[test]
    fn test_close_computes_exact_pnl() {
        let position = OpenPosition::new("TITAN", 10, ts(10, 0), 3400.0, 0.22, 50.0, 220).unwrap();
        assert_eq!(position.cost(), dec!(11000));

        let trade = position
            .close(
                40,
                ts(10, 30),
                3500.0,
                premium_to_decimal(65.12346).unwrap(),
                ExitReason::TakeProfit,
            )
            .unwrap();

        assert_eq!(trade.exit_premium, dec!(65.1235));
        assert_eq!(trade.cost, dec!(11000));
        assert_eq!(trade.pnl, (dec!(65.1235) - dec!(50)) * dec!(220));
        assert_eq!(trade.holding_bars(), 30);
        assert_eq!(trade.release_amount(), trade.cost + trade.pnl);
        assert!(trade.is_winner());
    }

    #[test]
    fn test_close_rejects_time_travel() {
        let position = OpenPosition::new("TITAN", 10, ts(10, 0), 3400.0, 0.22, 50.0, 1).unwrap();
        let err = position
            .clone()
            .close(10, ts(10, 5), 3400.0, dec!(50), ExitReason::StopLoss)
            .unwrap_err();
        assert!(matches!(err, TradeError::InconsistentBookkeeping(_)));

        // Duplicated timestamp on a later bar
        let err = position
            .close(11, ts(10, 0), 3400.0, dec!(50), ExitReason::StopLoss)
            .unwrap_err();
        assert!(matches!(err, TradeError::InconsistentBookkeeping(_)));
    }

    #[test]
    fn test_zero_premium_or_quantity_rejected() {
        assert!(OpenPosition::new("X", 0, ts(10, 0), 100.0, 0.2, 0.00001, 10).is_err());
        assert!(OpenPosition::new("X", 0, ts(10, 0), 100.0, 0.2, 5.0, 0).is_err());
    }

    #[test]
    fn test_excursions_and_pnl_pct() {
        let mut position = OpenPosition::new("X", 0, ts(10, 0), 100.0, 0.2, 10.0, 1).unwrap();
        assert!((position.pnl_pct(dec!(13)) - 0.3).abs() < 1e-12);
        position.observe(0.12);
        position.observe(-0.08);
        position.observe(0.05);
        assert_eq!(position.max_favorable_pct, 0.12);
        assert_eq!(position.max_adverse_pct, -0.08);
    }

    #[test]
    fn test_negative_exit_premium_rejected() {
        let position = OpenPosition::new("X", 0, ts(10, 0), 100.0, 0.2, 10.0, 1).unwrap();
        assert!(position
            .close(1, ts(10, 1), 100.0, dec!(-0.5), ExitReason::StopLoss)
            .is_err());
    }

    #[test]
    fn test_forced_reasons() {
        assert!(ExitReason::HorizonExpired.is_forced());
        assert!(ExitReason::EndOfData.is_forced());
        assert!(!ExitReason::TakeProfit.is_forced());
        assert!(!ExitReason::TimeDecay.is_forced());
    }

    #[test]
    fn test_losing_trade_return() {
        let position = OpenPosition::new("X", 0, ts(10, 0), 100.0, 0.2, 10.0, 100).unwrap();
        let trade = position
            .close(5, ts(10, 5), 100.0, dec!(8.5), ExitReason::StopLoss)
            .unwrap();
        assert_eq!(trade.pnl, dec!(-150));
        assert!(!trade.is_winner());
        assert!((trade.return_pct() + 0.15).abs() < 1e-12);
    }
}
