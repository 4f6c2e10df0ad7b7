//! Strategy configuration.
//!
//! Every section is optional in TOML and falls back to its defaults, so an
//! empty file is a valid configuration.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::analytics::GexConfig;
use crate::backtest::{CapitalSchedule, ExitPolicy, SignalRule, SimulatorConfig};
use crate::portfolio::PortfolioConfig;
use crate::pricing::ValuationConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Root configuration for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub pricing: ValuationConfig,
    pub signal: SignalRule,
    pub simulator: SimulatorConfig,
    pub exit_policy: ExitPolicy,
    /// Per-symbol capital gate; absent means unconstrained.
    pub capital_schedule: Option<CapitalSchedule>,
    pub portfolio: PortfolioConfig,
    pub gex: GexConfig,
}

impl StrategyConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded strategy config from {}", path.display());
        Ok(config)
    }

    /// Check every section for values the simulation cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pricing;
        ensure(p.rate.is_finite(), || format!("pricing.rate {} is not finite", p.rate))?;
        ensure(p.time_to_expiry_days > 0.0, || {
            format!("pricing.time_to_expiry_days {} must be > 0", p.time_to_expiry_days)
        })?;
        ensure(p.bars_per_day > 0.0 && p.days_per_year > 0.0, || {
            "pricing.bars_per_day and pricing.days_per_year must be > 0".to_string()
        })?;
        ensure(p.min_time_to_expiry > 0.0, || {
            format!("pricing.min_time_to_expiry {} must be > 0", p.min_time_to_expiry)
        })?;

        ensure(self.signal.edge_multiplier > 0.0, || {
            format!("signal.edge_multiplier {} must be > 0", self.signal.edge_multiplier)
        })?;
        ensure(self.signal.trend_threshold >= 0.0, || {
            format!("signal.trend_threshold {} must be >= 0", self.signal.trend_threshold)
        })?;

        let s = &self.simulator;
        ensure(s.look_ahead_bars > 0, || "simulator.look_ahead_bars must be > 0".to_string())?;
        ensure(s.notional_per_lot > 0.0, || {
            format!("simulator.notional_per_lot {} must be > 0", s.notional_per_lot)
        })?;
        ensure(s.quantity != Some(0), || "simulator.quantity must be > 0".to_string())?;

        self.exit_policy.validate()?;
        if let Some(schedule) = &self.capital_schedule {
            schedule.validate()?;
        }

        let pf = &self.portfolio;
        ensure(pf.initial_capital > Decimal::ZERO, || {
            format!("portfolio.initial_capital {} must be > 0", pf.initial_capital)
        })?;
        ensure(
            !pf.candidate_capitals.is_empty()
                && pf.candidate_capitals.iter().all(|c| *c > Decimal::ZERO),
            || "portfolio.candidate_capitals must be non-empty and positive".to_string(),
        )?;
        ensure(pf.top_symbols != Some(0), || "portfolio.top_symbols must be > 0".to_string())?;

        ensure(self.gex.lot_size > 0.0 && self.gex.min_time_to_expiry > 0.0, || {
            "gex.lot_size and gex.min_time_to_expiry must be > 0".to_string()
        })?;

        Ok(())
    }
}

fn ensure(ok: bool, msg: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid(msg()))
    }
}
