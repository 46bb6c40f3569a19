//! HTTP API tests driven through the router without binding a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use fundsim_common::config::Config;
use fundsim_engine::nav::{MemoryNavSource, NavSeries};
use fundsim_engine::BacktestService;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router() -> Router {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let navs = (0..80)
        .map(|i| (start + Duration::days(i), 1.0 + ((i as f64) * 0.25).sin() * 0.06))
        .collect();
    let source = MemoryNavSource::new().with_series(NavSeries::from_navs("110011", navs).unwrap());
    BacktestService::with_source(Config::default(), Arc::new(source)).router()
}

async fn send(router: Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(body.map_or_else(Body::empty, Body::from))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_reports_service() {
    let (status, body) = send(router(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "fundsim-engine");
}

#[tokio::test]
async fn strategies_are_listed() {
    let (status, body) = send(router(), Method::GET, "/api/v1/strategies", None).await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = body["strategies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec!["dual_ma", "mean_reversion", "target_value", "grid", "enhanced_rule_based"]
    );
    assert_eq!(body["allowed_days"], json!([30, 60, 90, 180, 365]));
}

#[tokio::test]
async fn backtest_returns_metrics() {
    let payload = json!({
        "fund_code": "110011",
        "strategy_id": "mean_reversion",
        "initial_amount": 10000.0,
        "base_invest": 500.0,
        "days": 90
    });
    let (status, body) = send(router(), Method::POST, "/api/v1/backtest", Some(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["strategy_id"], "mean_reversion");
    assert_eq!(body["data_points"], 80);
    assert_eq!(body["trades"].as_array().unwrap().len(), 80);
    assert!(body["metrics"]["composite_score"].is_number());
    assert!(body["metrics"]["sharpe_1y"].is_number());
}

#[tokio::test]
async fn unknown_strategy_is_rejected() {
    let payload = json!({
        "fund_code": "110011",
        "strategy_id": "martingale",
        "initial_amount": 10000.0,
        "base_invest": 500.0,
        "days": 90
    });
    let (status, body) = send(router(), Method::POST, "/api/v1/backtest", Some(payload.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("martingale"));
}

#[tokio::test]
async fn invalid_days_are_rejected() {
    let payload = json!({
        "fund_code": "110011",
        "strategy_id": "grid",
        "initial_amount": 10000.0,
        "base_invest": 500.0,
        "days": 45
    });
    let (status, body) = send(router(), Method::POST, "/api/v1/backtest", Some(payload.to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn malformed_json_gets_error_body() {
    let (status, body) = send(
        router(),
        Method::POST,
        "/api/v1/backtest",
        Some("{\"fund_code\": ".to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn compare_ranks_all_strategies() {
    let payload = json!({
        "fund_codes": ["110011"],
        "initial_amount": 10000.0,
        "base_invest": 500.0,
        "days": 180
    });
    let (status, body) = send(
        router(),
        Method::POST,
        "/api/v1/backtest/compare",
        Some(payload.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_runs"], 5);
    assert_eq!(body["entries"][0]["rank"], 1);
}

#[tokio::test]
async fn unknown_fund_yields_empty_result() {
    let payload = json!({
        "fund_code": "000000",
        "strategy_id": "grid",
        "initial_amount": 10000.0,
        "base_invest": 500.0,
        "days": 30
    });
    let (status, body) = send(router(), Method::POST, "/api/v1/backtest", Some(payload.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_points"], 0);
    assert_eq!(body["trades_count"], 0);
}
