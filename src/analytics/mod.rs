//! Options analytics module.
//!
//! Provides:
//! - Gamma exposure (GEX) aggregation and regime classification

pub mod gex;

pub use gex::{GexConfig, GexEngine, GexRegime, GexReport, StrikeGex};
