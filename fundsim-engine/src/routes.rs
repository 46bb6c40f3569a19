//! HTTP routes for the backtest service.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::backtest::{
    BacktestRequest, BacktestResponse, CompareRequest, ComparisonReport, ErrorResponse,
    ALLOWED_DAYS, MIN_BASE_INVEST, MIN_INITIAL_AMOUNT,
};
use crate::error::BacktestError;
use crate::strategy::{SignalGenerator, Strategy, StrategyId};
use crate::BacktestState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

#[derive(Debug, Serialize)]
pub struct StrategyInfo {
    pub id: StrategyId,
    pub name: String,
    /// Points required before the strategy starts deciding
    pub min_lookback: usize,
}

#[derive(Debug, Serialize)]
pub struct StrategiesResponse {
    pub strategies: Vec<StrategyInfo>,
    pub allowed_days: Vec<u32>,
    pub min_initial_amount: f64,
    pub min_base_invest: f64,
}

/// Error rendered as `{success: false, error}` with the matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl From<BacktestError> for ApiError {
    fn from(e: BacktestError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if e.is_client_error() {
            tracing::debug!(error = %e, "Backtest request rejected");
        } else {
            tracing::error!(error = %e, "Backtest request failed");
        }
        Self {
            status,
            body: ErrorResponse::from(&e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new(e.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "fundsim-engine".to_string(),
    })
}

/// List supported strategies and request limits
pub async fn list_strategies(State(state): State<Arc<BacktestState>>) -> Json<StrategiesResponse> {
    let params = &state.orchestrator.settings().params;
    let strategies = StrategyId::ALL
        .iter()
        .map(|id| StrategyInfo {
            id: *id,
            name: id.display_name().to_string(),
            min_lookback: Strategy::from_id(*id, params).min_lookback(),
        })
        .collect();

    Json(StrategiesResponse {
        strategies,
        allowed_days: ALLOWED_DAYS.to_vec(),
        min_initial_amount: MIN_INITIAL_AMOUNT,
        min_base_invest: MIN_BASE_INVEST,
    })
}

/// Run one backtest
pub async fn run_backtest(
    State(state): State<Arc<BacktestState>>,
    payload: Result<Json<BacktestRequest>, JsonRejection>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state.orchestrator.run(&request).await?;
    Ok(Json(response))
}

/// Run and rank a batch of backtests
pub async fn compare_backtests(
    State(state): State<Arc<BacktestState>>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<ComparisonReport>, ApiError> {
    let Json(request) = payload?;
    let report = state.orchestrator.compare(&request).await?;
    Ok(Json(report))
}
