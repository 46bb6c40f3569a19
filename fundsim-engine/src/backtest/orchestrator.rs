//! Backtest orchestration.
//!
//! Composes data retrieval, simulation, metrics and evaluation per
//! `(fund, strategy)` request. A single run is a pure synchronous function
//! ([`run_backtest`]); [`BacktestOrchestrator`] adds NAV fetching and the
//! fan-out used by batch comparisons.

use futures::future::join_all;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use fundsim_common::config::Config;
use fundsim_common::logging::generate_run_id;

use super::evaluation::TradeEvaluation;
use super::metrics::{MetricsEngine, MetricsReport};
use super::report::BacktestReport;
use super::simulator::{PortfolioSimulator, RunState, SimulationResult, Trade};
use crate::error::{BacktestError, BacktestResult};
use crate::nav::{NavSeries, NavSource};
use crate::strategy::{Strategy, StrategyId, StrategyParams};

/// Look-back windows a request may ask for, in calendar days.
pub const ALLOWED_DAYS: [u32; 5] = [30, 60, 90, 180, 365];
pub const MIN_INITIAL_AMOUNT: f64 = 100.0;
pub const MIN_BASE_INVEST: f64 = 10.0;

// ============================================================================
// Request / Response
// ============================================================================

/// One backtest request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub fund_code: String,
    /// Wire id, resolved by [`BacktestRequest::validate`]
    pub strategy_id: String,
    pub initial_amount: f64,
    pub base_invest: f64,
    pub days: u32,
}

impl BacktestRequest {
    /// Reject structurally invalid requests before any work is done.
    pub fn validate(&self) -> BacktestResult<StrategyId> {
        if self.fund_code.trim().is_empty() {
            return Err(BacktestError::invalid("fund_code", "must not be empty"));
        }
        if !self.initial_amount.is_finite() || self.initial_amount < MIN_INITIAL_AMOUNT {
            return Err(BacktestError::invalid(
                "initial_amount",
                format!("must be at least {}", MIN_INITIAL_AMOUNT),
            ));
        }
        if !self.base_invest.is_finite() || self.base_invest < MIN_BASE_INVEST {
            return Err(BacktestError::invalid(
                "base_invest",
                format!("must be at least {}", MIN_BASE_INVEST),
            ));
        }
        if !ALLOWED_DAYS.contains(&self.days) {
            return Err(BacktestError::invalid(
                "days",
                format!("must be one of {:?}", ALLOWED_DAYS),
            ));
        }
        self.strategy_id.parse()
    }
}

/// Successful backtest result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResponse {
    pub success: bool,
    pub fund_code: String,
    pub strategy_id: StrategyId,
    pub final_value: f64,
    /// Percent
    pub total_return: f64,
    /// Percent
    pub annualized_return: f64,
    /// Percent, zero or negative
    pub max_drawdown: f64,
    /// Full-history Sharpe ratio
    pub sharpe_ratio: f64,
    /// Executed buys and sells
    pub trades_count: usize,
    /// One entry per simulated period, holds included
    pub trades: Vec<Trade>,
    pub evaluation: TradeEvaluation,
    pub data_points: usize,
    pub liquidated: bool,
    pub metrics: MetricsReport,
}

/// Failure body returned instead of a [`BacktestResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

impl From<&BacktestError> for ErrorResponse {
    fn from(e: &BacktestError) -> Self {
        Self::new(e.to_string())
    }
}

// ============================================================================
// Single Run
// ============================================================================

/// Strategy parameters and metric settings shared by every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestSettings {
    pub params: StrategyParams,
    pub metrics: MetricsEngine,
}

impl BacktestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            params: StrategyParams::from_config(config),
            metrics: MetricsEngine::from_config(config),
        }
    }
}

/// Everything produced by one `(fund, strategy)` run.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub fund_code: String,
    pub strategy_id: StrategyId,
    pub result: SimulationResult,
    pub metrics: MetricsReport,
    pub evaluation: TradeEvaluation,
}

impl BacktestRun {
    /// Simulate an already validated strategy over the trailing `days` of `series`.
    pub fn execute(
        series: &NavSeries,
        strategy_id: StrategyId,
        request: &BacktestRequest,
        settings: &BacktestSettings,
    ) -> Self {
        let window = series.last_days(request.days);
        let strategy = Strategy::from_id(strategy_id, &settings.params);
        let result =
            PortfolioSimulator::new(request.initial_amount, request.base_invest).run(&window, &strategy);
        let metrics = settings.metrics.compute(&result.equity_curve, &result.trades, &window);
        let evaluation = TradeEvaluation::from_trades(&result.trades);

        Self {
            fund_code: request.fund_code.clone(),
            strategy_id,
            result,
            metrics,
            evaluation,
        }
    }

    pub fn report(&self) -> BacktestReport {
        BacktestReport::generate(
            &self.fund_code,
            self.strategy_id,
            &self.result,
            &self.metrics,
            &self.evaluation,
        )
    }

    pub fn into_response(self) -> BacktestResponse {
        let trades_count = self.result.executed_trades().count();
        BacktestResponse {
            success: true,
            fund_code: self.fund_code,
            strategy_id: self.strategy_id,
            final_value: self.metrics.final_value,
            total_return: self.metrics.total_return,
            annualized_return: self.metrics.annualized_return,
            max_drawdown: self.metrics.max_drawdown,
            sharpe_ratio: self.metrics.sharpe_all,
            trades_count,
            data_points: self.result.data_points,
            liquidated: self.result.run_state == RunState::Liquidated,
            trades: self.result.trades,
            evaluation: self.evaluation,
            metrics: self.metrics,
        }
    }
}

/// Validate `request` and run it against `series`.
///
/// Pure and synchronous: no I/O, no shared state.
pub fn run_backtest(
    series: &NavSeries,
    request: &BacktestRequest,
    settings: &BacktestSettings,
) -> BacktestResult<BacktestResponse> {
    let strategy_id = request.validate()?;
    Ok(BacktestRun::execute(series, strategy_id, request, settings).into_response())
}

// ============================================================================
// Batch Comparison
// ============================================================================

/// Run every strategy over every fund with the same amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub fund_codes: Vec<String>,
    /// Empty means all strategies
    #[serde(default)]
    pub strategy_ids: Vec<String>,
    pub initial_amount: f64,
    pub base_invest: f64,
    pub days: u32,
}

impl CompareRequest {
    /// Expand into validated single requests.
    pub fn expand(&self) -> BacktestResult<Vec<(StrategyId, BacktestRequest)>> {
        if self.fund_codes.is_empty() {
            return Err(BacktestError::invalid("fund_codes", "must not be empty"));
        }
        let strategy_ids: Vec<String> = if self.strategy_ids.is_empty() {
            StrategyId::ALL.iter().map(|id| id.as_str().to_string()).collect()
        } else {
            self.strategy_ids.clone()
        };

        let mut requests = Vec::with_capacity(self.fund_codes.len() * strategy_ids.len());
        for fund_code in &self.fund_codes {
            for strategy_id in &strategy_ids {
                let request = BacktestRequest {
                    fund_code: fund_code.trim().to_string(),
                    strategy_id: strategy_id.clone(),
                    initial_amount: self.initial_amount,
                    base_invest: self.base_invest,
                    days: self.days,
                };
                let id = request.validate()?;
                requests.push((id, request));
            }
        }
        Ok(requests)
    }
}

/// One ranked line of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    /// 1 = best composite score
    pub rank: usize,
    pub fund_code: String,
    pub strategy_id: StrategyId,
    pub composite_score: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub trades_count: usize,
    pub data_points: usize,
}

/// Ranked results of a batch comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub success: bool,
    pub total_runs: usize,
    pub entries: Vec<ComparisonEntry>,
}

impl ComparisonReport {
    /// Rank runs by composite score, best first. Ties keep fund/strategy order.
    pub fn rank(mut responses: Vec<BacktestResponse>) -> Self {
        responses.sort_by(|a, b| {
            b.metrics
                .composite_score
                .total_cmp(&a.metrics.composite_score)
                .then_with(|| a.fund_code.cmp(&b.fund_code))
                .then_with(|| a.strategy_id.cmp(&b.strategy_id))
        });

        let entries: Vec<ComparisonEntry> = responses
            .into_iter()
            .enumerate()
            .map(|(i, r)| ComparisonEntry {
                rank: i + 1,
                composite_score: r.metrics.composite_score,
                total_return: r.total_return,
                annualized_return: r.annualized_return,
                max_drawdown: r.max_drawdown,
                sharpe_ratio: r.sharpe_ratio,
                trades_count: r.trades_count,
                data_points: r.data_points,
                fund_code: r.fund_code,
                strategy_id: r.strategy_id,
            })
            .collect();

        Self {
            success: true,
            total_runs: entries.len(),
            entries,
        }
    }

    pub fn best(&self) -> Option<&ComparisonEntry> {
        self.entries.first()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs requests against a NAV source.
pub struct BacktestOrchestrator {
    source: Arc<dyn NavSource>,
    settings: Arc<BacktestSettings>,
}

impl BacktestOrchestrator {
    pub fn new(source: Arc<dyn NavSource>, settings: BacktestSettings) -> Self {
        Self {
            source,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    /// Fetch a fund's history. Missing data degrades to an empty series.
    async fn fetch(&self, fund_code: &str) -> BacktestResult<NavSeries> {
        match self.source.fetch(fund_code).await {
            Ok(series) => Ok(series),
            Err(e) if e.is_not_found() => {
                warn!(
                    fund = fund_code,
                    source = self.source.name(),
                    "No NAV data available, metrics will be zero"
                );
                Ok(NavSeries::empty(fund_code))
            }
            Err(e) => Err(BacktestError::DataSource(e)),
        }
    }

    /// Run one backtest.
    pub async fn run(&self, request: &BacktestRequest) -> BacktestResult<BacktestResponse> {
        let run_id = generate_run_id();
        let strategy_id = request.validate()?;
        let series = self.fetch(request.fund_code.trim()).await?;

        let run = BacktestRun::execute(&series, strategy_id, request, &self.settings);
        info!(
            run_id = %run_id,
            fund = %run.fund_code,
            strategy = %strategy_id,
            data_points = run.result.data_points,
            total_return = run.metrics.total_return,
            composite = run.metrics.composite_score,
            "Backtest completed"
        );

        Ok(run.into_response())
    }

    /// Run every requested `(fund, strategy)` combination and rank the results.
    ///
    /// NAV fetches run concurrently, simulations in parallel on the rayon pool.
    pub async fn compare(&self, request: &CompareRequest) -> BacktestResult<ComparisonReport> {
        let run_id = generate_run_id();
        let requests = request.expand()?;

        let mut fund_codes: Vec<String> = requests.iter().map(|(_, r)| r.fund_code.clone()).collect();
        fund_codes.sort();
        fund_codes.dedup();

        let fetched = join_all(fund_codes.iter().map(|code| self.fetch(code))).await;
        let mut series_by_fund: HashMap<String, Arc<NavSeries>> = HashMap::with_capacity(fund_codes.len());
        for (code, series) in fund_codes.into_iter().zip(fetched) {
            series_by_fund.insert(code, Arc::new(series?));
        }

        let jobs: Vec<(Arc<NavSeries>, StrategyId, BacktestRequest)> = requests
            .into_iter()
            .filter_map(|(id, req)| {
                series_by_fund
                    .get(&req.fund_code)
                    .map(|series| (Arc::clone(series), id, req))
            })
            .collect();
        let settings = Arc::clone(&self.settings);

        let responses = tokio::task::spawn_blocking(move || {
            jobs.par_iter()
                .map(|(series, id, req)| BacktestRun::execute(series, *id, req, &settings).into_response())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| BacktestError::Worker(e.to_string()))?;

        let report = ComparisonReport::rank(responses);
        info!(
            run_id = %run_id,
            runs = report.total_runs,
            best = ?report.best().map(|b| (b.fund_code.as_str(), b.strategy_id.as_str())),
            "Comparison completed"
        );

        Ok(report)
    }
}
