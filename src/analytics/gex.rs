//! Gamma exposure (GEX) of an option chain.
//!
//! GEX per row = gamma * open interest * spot * lot size, with call
//! exposure counted positive and put exposure negative. The sign of the net
//! total classifies the dealer-positioning regime.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{ChainRow, OptionType};
use crate::pricing::{BlackScholes, PricingError, PricingResult};

/// Rupees per crore.
const CRORE: f64 = 1e7;

/// GEX engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GexConfig {
    pub rate: f64,
    /// Units per contract.
    pub lot_size: f64,
    /// Floor for time to expiry, in years.
    pub min_time_to_expiry: f64,
}

impl Default for GexConfig {
    fn default() -> Self {
        Self {
            rate: 0.07,
            lot_size: 25.0,
            min_time_to_expiry: 0.001,
        }
    }
}

/// Market regime implied by net GEX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GexRegime {
    /// Dealers long gamma; moves get dampened.
    PositivePinning,
    /// Dealers short gamma; moves get amplified.
    NegativeTrending,
}

impl GexRegime {
    pub fn from_net(net_gex: f64) -> Self {
        if net_gex >= 0.0 {
            Self::PositivePinning
        } else {
            Self::NegativeTrending
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PositivePinning => "Positive (Pinning)",
            Self::NegativeTrending => "Negative (Trending)",
        }
    }
}

/// Exposure of a single chain row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeGex {
    pub strike: f64,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
    pub gamma: f64,
    /// Signed exposure.
    pub gex: f64,
}

/// Aggregated exposure of a chain snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GexReport {
    pub spot: f64,
    pub as_of: NaiveDate,
    pub net_gex: f64,
    pub call_gex: f64,
    pub put_gex: f64,
    pub regime: GexRegime,
    /// Rows that contributed, in input order.
    pub strikes: Vec<StrikeGex>,
    /// Rows skipped for zero open interest or volatility.
    pub skipped_rows: usize,
}

impl GexReport {
    pub fn net_gex_crores(&self) -> f64 {
        self.net_gex / CRORE
    }

    /// Strike with the largest absolute exposure.
    pub fn largest_strike(&self) -> Option<&StrikeGex> {
        self.strikes
            .iter()
            .max_by(|a, b| a.gex.abs().total_cmp(&b.gex.abs()))
    }
}

/// Computes chain-wide gamma exposure.
#[derive(Debug, Clone, Default)]
pub struct GexEngine {
    config: GexConfig,
}

impl GexEngine {
    pub fn new(config: GexConfig) -> Self {
        Self { config }
    }

    /// Years from `as_of` to `expiry`, floored.
    pub fn time_to_expiry(&self, as_of: NaiveDate, expiry: NaiveDate) -> f64 {
        let days = (expiry - as_of).num_days() as f64;
        (days / 365.0).max(self.config.min_time_to_expiry)
    }

    pub fn calculate(
        &self,
        chain: &[ChainRow],
        spot: f64,
        as_of: NaiveDate,
    ) -> PricingResult<GexReport> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(PricingError::InvalidPricingInput {
                field: "spot",
                value: spot,
            });
        }

        let bs = BlackScholes::new(self.config.rate);
        let mut strikes = Vec::with_capacity(chain.len());
        let mut skipped_rows = 0;
        let (mut call_gex, mut put_gex) = (0.0, 0.0);

        for row in chain {
            if !(row.open_interest > 0.0) || !(row.implied_volatility > 0.0) {
                skipped_rows += 1;
                continue;
            }

            let time = self.time_to_expiry(as_of, row.expiry);
            let gamma = bs.gamma(spot, row.strike, time, row.implied_volatility)?;
            let exposure = gamma * row.open_interest * spot * self.config.lot_size;

            let gex = match row.option_type {
                OptionType::Call => {
                    call_gex += exposure;
                    exposure
                }
                OptionType::Put => {
                    put_gex -= exposure;
                    -exposure
                }
            };

            strikes.push(StrikeGex {
                strike: row.strike,
                option_type: row.option_type,
                expiry: row.expiry,
                gamma,
                gex,
            });
        }

        let net_gex = call_gex + put_gex;
        let regime = GexRegime::from_net(net_gex);
        debug!(
            "GEX at spot {}: net {:.2} Cr ({}), {} rows, {} skipped",
            spot,
            net_gex / CRORE,
            regime.label(),
            strikes.len(),
            skipped_rows
        );

        Ok(GexReport {
            spot,
            as_of,
            net_gex,
            call_gex,
            put_gex,
            regime,
            strikes,
            skipped_rows,
        })
    }
}
