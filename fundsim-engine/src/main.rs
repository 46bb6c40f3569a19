//! Fundsim Engine - fund strategy backtesting service.
//!
//! Serves the backtest API over NAV histories read from the configured
//! data directory.

use anyhow::Result;
use fundsim_common::config::Config;
use fundsim_common::logging::init_logging_with_exclusions;
use fundsim_engine::BacktestService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration (file + FUNDSIM_* overrides) and reject bad values early
    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Fundsim Engine v{}", env!("CARGO_PKG_VERSION"));

    let service = BacktestService::new(config);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
