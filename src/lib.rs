pub mod analytics;
pub mod backtest;
pub mod config;
pub mod data;
pub mod metrics;
pub mod portfolio;
pub mod pricing;

// Re-export commonly used types
pub use analytics::{GexEngine, GexRegime, GexReport};
pub use backtest::{
    CapitalSchedule, ExitPolicy, ExitReason, SignalRule, SimulationResult, SimulatorConfig, Trade,
    TradeSimulator,
};
pub use config::{ConfigError, StrategyConfig};
pub use data::{Bar, ChainRow, Greeks, OptionType};
pub use metrics::{ExitComparison, MetricsCalculator, PortfolioSummary, SymbolSummary};
pub use portfolio::{CapitalSweep, PortfolioResult, PortfolioSimulator};
pub use pricing::{BlackScholes, PricingError, StraddleValuer};
