//! Exit policies for open straddles.
//!
//! Every policy sees the same input on each bar after entry (the bar offset
//! and the running `pnl_pct = (premium - entry_premium) / entry_premium`)
//! and answers with an optional [`ExitReason`]. The simulator runs a single
//! loop and asks the configured policy; variants never get their own loop.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

use super::trade::ExitReason;

/// How an open position is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Fixed take-profit / stop-loss on premium. Take-profit wins ties.
    FixedThreshold { take_profit: f64, stop_loss: f64 },

    /// Trail the high-water mark once profit exceeds `activation`; hard stop
    /// until then.
    TrailingStop {
        activation: f64,
        trail: f64,
        stop_loss: f64,
    },

    /// Take profit at `entry_volatility * multiplier`.
    VolatilityTarget { multiplier: f64, stop_loss: f64 },

    /// Give up on trades still below `min_profit` after `max_bars_below`
    /// bars; fixed thresholds otherwise.
    TimeDecay {
        max_bars_below: usize,
        min_profit: f64,
        take_profit: f64,
        stop_loss: f64,
    },
}

impl Default for ExitPolicy {
    fn default() -> Self {
        Self::FixedThreshold {
            take_profit: 0.30,
            stop_loss: -0.15,
        }
    }
}

/// Per-trade policy state, created fresh at every entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitState {
    /// Volatility proxy at entry.
    pub entry_volatility: f64,
    /// Best `pnl_pct` seen while trailing.
    pub high_water_mark: f64,
    pub trailing_active: bool,
}

impl ExitPolicy {
    pub fn trailing_stop() -> Self {
        Self::TrailingStop {
            activation: 0.20,
            trail: 0.10,
            stop_loss: -0.15,
        }
    }

    pub fn volatility_target() -> Self {
        Self::VolatilityTarget {
            multiplier: 1.5,
            stop_loss: -0.15,
        }
    }

    pub fn time_decay() -> Self {
        Self::TimeDecay {
            // Two sessions of one-minute bars
            max_bars_below: 750,
            min_profit: 0.10,
            take_profit: 0.30,
            stop_loss: -0.15,
        }
    }

    /// Short identifier used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedThreshold { .. } => "fixed_threshold",
            Self::TrailingStop { .. } => "trailing_stop",
            Self::VolatilityTarget { .. } => "volatility_target",
            Self::TimeDecay { .. } => "time_decay",
        }
    }

    /// Fresh state for a trade opened at `entry_volatility`.
    pub fn start(&self, entry_volatility: f64) -> ExitState {
        ExitState {
            entry_volatility,
            high_water_mark: f64::NEG_INFINITY,
            trailing_active: false,
        }
    }

    /// Decide whether to exit on the bar `bar_offset` bars after entry.
    pub fn evaluate(
        &self,
        state: &mut ExitState,
        bar_offset: usize,
        pnl_pct: f64,
    ) -> Option<ExitReason> {
        match *self {
            Self::FixedThreshold {
                take_profit,
                stop_loss,
            } => fixed(pnl_pct, take_profit, stop_loss),

            Self::TrailingStop {
                activation,
                trail,
                stop_loss,
            } => {
                if pnl_pct > activation {
                    state.trailing_active = true;
                }
                if state.trailing_active {
                    state.high_water_mark = state.high_water_mark.max(pnl_pct);
                    (pnl_pct <= state.high_water_mark - trail).then_some(ExitReason::TrailingStop)
                } else {
                    (pnl_pct <= stop_loss).then_some(ExitReason::StopLoss)
                }
            }

            Self::VolatilityTarget {
                multiplier,
                stop_loss,
            } => {
                let target = state.entry_volatility * multiplier;
                if pnl_pct >= target {
                    Some(ExitReason::VolatilityTarget)
                } else {
                    (pnl_pct <= stop_loss).then_some(ExitReason::StopLoss)
                }
            }

            Self::TimeDecay {
                max_bars_below,
                min_profit,
                take_profit,
                stop_loss,
            } => {
                if bar_offset > max_bars_below && pnl_pct < min_profit {
                    Some(ExitReason::TimeDecay)
                } else {
                    fixed(pnl_pct, take_profit, stop_loss)
                }
            }
        }
    }

    /// Reject parameter combinations that can never behave sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        match *self {
            Self::FixedThreshold {
                take_profit,
                stop_loss,
            }
            | Self::TimeDecay {
                take_profit,
                stop_loss,
                ..
            } => {
                if !(take_profit > 0.0 && stop_loss < 0.0) {
                    return invalid(format!(
                        "{}: take_profit {} must be > 0 and stop_loss {} < 0",
                        self.name(),
                        take_profit,
                        stop_loss
                    ));
                }
            }
            Self::TrailingStop {
                activation,
                trail,
                stop_loss,
            } => {
                if !(trail > 0.0 && activation > stop_loss && stop_loss < 0.0) {
                    return invalid(format!(
                        "trailing_stop: need trail > 0 and stop_loss < 0 < activation (got {}, {}, {})",
                        trail, stop_loss, activation
                    ));
                }
            }
            Self::VolatilityTarget {
                multiplier,
                stop_loss,
            } => {
                if !(multiplier > 0.0 && stop_loss < 0.0) {
                    return invalid(format!(
                        "volatility_target: multiplier {} must be > 0 and stop_loss {} < 0",
                        multiplier, stop_loss
                    ));
                }
            }
        }
        Ok(())
    }
}

fn fixed(pnl_pct: f64, take_profit: f64, stop_loss: f64) -> Option<ExitReason> {
    if pnl_pct >= take_profit {
        Some(ExitReason::TakeProfit)
    } else if pnl_pct <= stop_loss {
        Some(ExitReason::StopLoss)
    } else {
        None
    }
}
