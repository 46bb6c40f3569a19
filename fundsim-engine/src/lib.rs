//! Fundsim Engine Library
//!
//! Backtests periodic-investment strategies against historical fund NAV
//! series and scores their risk-adjusted performance.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  fundsim-engine (Rust Service)                      │
//! │                           :4436                                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────────┐  │
//! │  │  NavSource  │─▶│  Strategy   │─▶│  Simulator  │─▶│  Metrics   │  │
//! │  │  (fetch)    │  │  (signals)  │  │  (state)    │  │  (report)  │  │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Periodic investment
//! - Buys deploy external capital (`base_invest * multiplier`) and never
//!   draw down cash
//! - Sells turn shares back into cash
//!
//! ## Strategies
//! - Dual moving average, mean reversion, target value, grid trading and an
//!   enhanced rule-based regime classifier with a stop-loss
//!
//! ## Metrics
//! - Sharpe over three windows (all, trailing year, year to date), Sortino,
//!   Calmar, VaR, drawdown and a weighted composite score

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backtest;
pub mod error;
pub mod nav;
pub mod portfolio;
pub mod routes;
pub mod strategy;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use fundsim_common::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::backtest::{BacktestOrchestrator, BacktestSettings};
use crate::nav::{JsonFileNavSource, NavSource};

/// Default wall-clock budget for one request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Backtest service state
pub struct BacktestState {
    /// Configuration
    pub config: Config,
    /// Runs backtests against the configured NAV source
    pub orchestrator: BacktestOrchestrator,
}

impl BacktestState {
    /// Create state reading NAV files from the configured data directory
    pub fn new(config: Config) -> Self {
        let source = Arc::new(JsonFileNavSource::new(config.nav_data_dir()));
        Self::with_source(config, source)
    }

    /// Create state over an explicit NAV source
    pub fn with_source(config: Config, source: Arc<dyn NavSource>) -> Self {
        let settings = BacktestSettings::from_config(&config);
        Self {
            orchestrator: BacktestOrchestrator::new(source, settings),
            config,
        }
    }

    fn request_timeout(&self) -> Duration {
        let secs = self
            .config
            .backtest
            .as_ref()
            .map_or(DEFAULT_REQUEST_TIMEOUT_SECS, |b| b.request_timeout_secs);
        Duration::from_secs(secs.max(1))
    }
}

/// Main backtest service
pub struct BacktestService {
    state: Arc<BacktestState>,
}

impl BacktestService {
    /// Create a new backtest service
    pub fn new(config: Config) -> Self {
        Self {
            state: Arc::new(BacktestState::new(config)),
        }
    }

    /// Create a service over an explicit NAV source
    pub fn with_source(config: Config, source: Arc<dyn NavSource>) -> Self {
        Self {
            state: Arc::new(BacktestState::with_source(config, source)),
        }
    }

    /// Build HTTP routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(routes::health))
            .route("/api/v1/strategies", get(routes::list_strategies))
            .route("/api/v1/backtest", post(routes::run_backtest))
            .route("/api/v1/backtest/compare", post(routes::compare_backtests))
            .layer(TimeoutLayer::new(self.state.request_timeout()))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the backtest service
    pub async fn start(self) -> Result<()> {
        let host = self.state.config.backtest_host();
        let port = self.state.config.backtest_port();
        let app = self.router();

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        tracing::info!(
            address = %addr,
            data_dir = %self.state.config.nav_data_dir().display(),
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
