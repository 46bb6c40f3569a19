//! Strategy backtesting.
//!
//! NavSeries → Signal → simulator (state mutation) → equity curve → metrics.
//! Each run owns its own state, so independent runs can execute in parallel.

mod evaluation;
mod metrics;
mod orchestrator;
mod report;
mod simulator;

pub use evaluation::TradeEvaluation;
pub use metrics::{MetricsEngine, MetricsReport, ScoreScale};
pub use orchestrator::{
    run_backtest, BacktestOrchestrator, BacktestRequest, BacktestResponse, BacktestRun,
    BacktestSettings, CompareRequest, ComparisonEntry, ComparisonReport, ErrorResponse,
    ALLOWED_DAYS, MIN_BASE_INVEST, MIN_INITIAL_AMOUNT,
};
pub use report::BacktestReport;
pub use simulator::{EquityPoint, PortfolioSimulator, RunState, SimulationResult, Trade};
