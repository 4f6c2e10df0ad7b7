//! Shared-capital portfolio replay and capital calibration.

pub mod calibration;
pub mod ledger;

pub use calibration::{top_symbols, CapitalCandidate, CapitalSweep};
pub use ledger::{
    CashEvent, CashPoint, PortfolioConfig, PortfolioError, PortfolioResult, PortfolioSimulator,
};
