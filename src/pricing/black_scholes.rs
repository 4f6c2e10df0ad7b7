//! Closed-form Black-Scholes pricing and Greeks for European options.
//!
//! Degenerate inputs (`time <= 0` or `vol <= 0`) price at intrinsic value
//! instead of evaluating `d1`/`d2`. Non-positive spot or strike is a caller
//! bug and is reported as [`PricingError::InvalidPricingInput`].
//!
//! Greeks units:
//! - Delta, gamma: raw
//! - Theta: per calendar day
//! - Vega, rho: per 1 point (1%) move

use std::f64::consts::{PI, SQRT_2};

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use thiserror::Error;

use crate::data::{Greeks, OptionType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("Invalid pricing input: {field} = {value}")]
    InvalidPricingInput { field: &'static str, value: f64 },
}

pub type PricingResult<T> = Result<T, PricingError>;

/// Lower bound of the implied volatility search.
const IV_MIN: f64 = 1e-4;
/// Upper bound of the implied volatility search.
const IV_MAX: f64 = 5.0;
const IV_PRICE_TOLERANCE: f64 = 1e-8;

/// Black-Scholes calculator for a fixed risk-free rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlackScholes {
    /// Risk-free interest rate (annualized, continuous).
    pub rate: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self { rate: 0.07 }
    }
}

impl BlackScholes {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator = (spot / strike).ln() + (self.rate + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    fn d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.d1(spot, strike, time, vol) - vol * time.sqrt()
    }

    /// Standard normal CDF.
    pub(crate) fn norm_cdf(x: f64) -> f64 {
        0.5 * erfc(-x / SQRT_2)
    }

    /// Standard normal PDF.
    pub(crate) fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
    }

    fn is_degenerate(time: f64, vol: f64) -> bool {
        time <= 0.0 || vol <= 0.0
    }

    fn check(&self, spot: f64, strike: f64, time: f64, vol: f64) -> PricingResult<()> {
        let checks: [(&'static str, f64, bool); 5] = [
            ("spot", spot, spot.is_finite() && spot > 0.0),
            ("strike", strike, strike.is_finite() && strike > 0.0),
            ("time_to_expiry", time, !time.is_nan()),
            ("volatility", vol, !vol.is_nan()),
            ("rate", self.rate, self.rate.is_finite()),
        ];
        for (field, value, ok) in checks {
            if !ok {
                return Err(PricingError::InvalidPricingInput { field, value });
            }
        }
        Ok(())
    }

    /// Intrinsic value at expiry.
    pub fn intrinsic(spot: f64, strike: f64, opt_type: OptionType) -> f64 {
        match opt_type {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }

    /// Calculate call option price.
    pub fn call_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> PricingResult<f64> {
        self.price(spot, strike, time, vol, OptionType::Call)
    }

    /// Calculate put option price.
    pub fn put_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> PricingResult<f64> {
        self.price(spot, strike, time, vol, OptionType::Put)
    }

    /// Calculate option price based on type.
    pub fn price(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> PricingResult<f64> {
        self.check(spot, strike, time, vol)?;
        Ok(self.price_unchecked(spot, strike, time, vol, opt_type))
    }

    fn price_unchecked(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> f64 {
        if Self::is_degenerate(time, vol) {
            return Self::intrinsic(spot, strike, opt_type);
        }

        let d1 = self.d1(spot, strike, time, vol);
        let d2 = self.d2(spot, strike, time, vol);
        let discount = (-self.rate * time).exp();

        let price = match opt_type {
            OptionType::Call => spot * Self::norm_cdf(d1) - strike * discount * Self::norm_cdf(d2),
            OptionType::Put => strike * discount * Self::norm_cdf(-d2) - spot * Self::norm_cdf(-d1),
        };
        // Cancellation deep out of the money can leave a tiny negative.
        price.max(0.0)
    }

    /// Calculate all Greeks in one pass.
    pub fn greeks(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> PricingResult<Greeks> {
        self.check(spot, strike, time, vol)?;

        if Self::is_degenerate(time, vol) {
            let delta = match opt_type {
                OptionType::Call if spot > strike => 1.0,
                OptionType::Put if spot < strike => -1.0,
                _ => 0.0,
            };
            return Ok(Greeks {
                delta,
                ..Greeks::default()
            });
        }

        let sqrt_t = time.sqrt();
        let d1 = self.d1(spot, strike, time, vol);
        let d2 = d1 - vol * sqrt_t;
        let discount = (-self.rate * time).exp();
        let pdf_d1 = Self::norm_pdf(d1);

        let gamma = pdf_d1 / (spot * vol * sqrt_t);
        let vega = spot * pdf_d1 * sqrt_t / 100.0;
        let decay = -spot * pdf_d1 * vol / (2.0 * sqrt_t);

        let (delta, theta, rho) = match opt_type {
            OptionType::Call => (
                Self::norm_cdf(d1),
                (decay - self.rate * strike * discount * Self::norm_cdf(d2)) / 365.0,
                strike * time * discount * Self::norm_cdf(d2) / 100.0,
            ),
            OptionType::Put => (
                Self::norm_cdf(d1) - 1.0,
                (decay + self.rate * strike * discount * Self::norm_cdf(-d2)) / 365.0,
                -strike * time * discount * Self::norm_cdf(-d2) / 100.0,
            ),
        };

        Ok(Greeks {
            delta,
            gamma,
            theta,
            vega,
            rho,
        })
    }

    /// Gamma (same for calls and puts).
    pub fn gamma(&self, spot: f64, strike: f64, time: f64, vol: f64) -> PricingResult<f64> {
        Ok(self.greeks(spot, strike, time, vol, OptionType::Call)?.gamma)
    }

    /// Implied volatility from an option price.
    ///
    /// Newton-Raphson from a Brenner-Subrahmanyam seed, falling back to
    /// bisection when vega vanishes or Newton fails to converge. Returns
    /// `0.0` for invalid inputs, prices outside the no-arbitrage bounds, or
    /// non-convergence.
    pub fn implied_vol(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        price: f64,
        opt_type: OptionType,
    ) -> f64 {
        if self.check(spot, strike, time, 0.0).is_err()
            || time <= 0.0
            || !price.is_finite()
            || price <= 0.0
        {
            return 0.0;
        }

        let discounted_strike = strike * (-self.rate * time).exp();
        let (lower, upper) = match opt_type {
            OptionType::Call => ((spot - discounted_strike).max(0.0), spot),
            OptionType::Put => ((discounted_strike - spot).max(0.0), discounted_strike),
        };
        if price <= lower || price >= upper {
            return 0.0;
        }

        let objective = |vol: f64| self.price_unchecked(spot, strike, time, vol, opt_type) - price;

        let mut vol = ((price / spot) * (2.0 * PI / time).sqrt()).clamp(0.01, IV_MAX);
        for _ in 0..100 {
            let diff = objective(vol);
            if diff.abs() < IV_PRICE_TOLERANCE {
                return vol;
            }

            // Raw vega (not scaled per point)
            let vega = spot * Self::norm_pdf(self.d1(spot, strike, time, vol)) * time.sqrt();
            if vega.abs() < 1e-10 {
                break;
            }

            vol = (vol - diff / vega).clamp(IV_MIN, IV_MAX);
        }

        let (mut lo, mut hi) = (IV_MIN, IV_MAX);
        if objective(lo) > 0.0 || objective(hi) < 0.0 {
            return 0.0;
        }
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            let diff = objective(mid);
            if diff.abs() < IV_PRICE_TOLERANCE {
                return mid;
            }
            if diff > 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        0.0
    }
}

/// Full set of inputs for one option valuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingInputs {
    pub spot: f64,
    pub strike: f64,
    /// Years.
    pub time_to_expiry: f64,
    pub risk_free_rate: f64,
    pub volatility: f64,
    pub option_type: OptionType,
}

impl PricingInputs {
    pub fn price(&self) -> PricingResult<f64> {
        BlackScholes::new(self.risk_free_rate).price(
            self.spot,
            self.strike,
            self.time_to_expiry,
            self.volatility,
            self.option_type,
        )
    }

    pub fn greeks(&self) -> PricingResult<Greeks> {
        BlackScholes::new(self.risk_free_rate).greeks(
            self.spot,
            self.strike,
            self.time_to_expiry,
            self.volatility,
            self.option_type,
        )
    }
}
