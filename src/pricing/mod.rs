//! Option pricing.
//!
//! - Black-Scholes prices, Greeks and implied volatility
//! - ATM straddle valuation with time decay and live volatility

pub mod black_scholes;
pub mod straddle;

pub use black_scholes::{BlackScholes, PricingError, PricingInputs, PricingResult};
pub use straddle::{StraddleValuer, ValuationConfig};
