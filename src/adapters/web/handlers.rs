//! HTTP request handlers.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::backtest::{
    compare_strategies, lookback_start, run_backtest, BacktestConfig, ChartData,
    StrategyComparison,
};
use crate::domain::metrics::PerformanceMetrics;
use crate::domain::position::TradeRecord;
use crate::domain::strategy::{Strategy, StrategyKind};
use crate::ports::result_port::{RunRecord, TradeQuery, TradeRow};

use super::{ApiError, AppState};

pub const MAX_PER_PAGE: usize = 500;

#[derive(Debug, Serialize)]
pub struct StrategyInfo {
    pub name: StrategyKind,
    pub minimum_bars: usize,
}

#[derive(Debug, Serialize)]
pub struct BacktestResponse {
    pub symbol: String,
    pub strategy: StrategyKind,
    #[serde(rename = "return")]
    pub total_return: f64,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<TradeRecord>,
    pub run_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub symbol: String,
    pub strategy: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TradeParams {
    pub symbol: Option<String>,
    pub strategy: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<TradeRow>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    /// Latest stored metrics when both symbol and strategy are given.
    pub metrics: Option<PerformanceMetrics>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn strategies() -> Json<Vec<StrategyInfo>> {
    Json(
        StrategyKind::ALL
            .into_iter()
            .map(|kind| StrategyInfo {
                name: kind,
                minimum_bars: kind.minimum_bars(),
            })
            .collect(),
    )
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("no such route")
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("invalid {field}, expected YYYY-MM-DD")))
}

fn clean_symbol(symbol: &str) -> Result<String, ApiError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ApiError::bad_request("symbol is required"));
    }
    Ok(symbol)
}

/// Explicit dates when given, otherwise the trailing lookback window.
fn range_config(
    state: &AppState,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<BacktestConfig, ApiError> {
    let as_of = state.today();
    let end_date = end
        .map(|s| parse_date(s, "end_date"))
        .transpose()?
        .unwrap_or(as_of);
    let start_date = match start {
        Some(s) => parse_date(s, "start_date")?,
        None => lookback_start(end_date, state.lookback_days)?,
    };
    let config = BacktestConfig {
        start_date,
        end_date,
        as_of,
    };
    config.validate()?;
    Ok(config)
}

pub async fn backtest(
    State(state): State<Arc<AppState>>,
    Path((strategy_id, symbol)): Path<(String, String)>,
) -> Result<Json<BacktestResponse>, ApiError> {
    let kind: StrategyKind = strategy_id.parse()?;
    let symbol = clean_symbol(&symbol)?;
    let config = BacktestConfig::trailing(state.lookback_days, state.today())?;
    tracing::info!(%symbol, strategy = %kind, "backtest requested");

    let response = tokio::task::spawn_blocking(move || {
        let strategy = Strategy::new(kind, &state.params);
        let result = run_backtest(state.data_port.as_ref(), &symbol, &strategy, &config)?;
        let summary = result.summary();
        let run_id = state.results.record_run(&RunRecord {
            symbol: summary.symbol.clone(),
            strategy: kind.id().to_string(),
            total_return: summary.total_return,
            metrics: result.metrics.clone(),
            trades: result.walk.trades.clone(),
            created_at: Utc::now(),
        })?;
        Ok::<_, ApiError>(BacktestResponse {
            symbol: summary.symbol,
            strategy: kind,
            total_return: summary.total_return,
            metrics: result.metrics,
            trades: result.walk.trades,
            run_id,
        })
    })
    .await??;

    Ok(Json(response))
}

pub async fn strategy_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<ChartData>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let kind: StrategyKind = params
        .strategy
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("strategy is required"))?
        .parse()?;
    let symbol = clean_symbol(&params.symbol)?;
    let config = range_config(
        &state,
        params.start_date.as_deref(),
        params.end_date.as_deref(),
    )?;

    let chart = tokio::task::spawn_blocking(move || {
        let strategy = Strategy::new(kind, &state.params);
        run_backtest(state.data_port.as_ref(), &symbol, &strategy, &config).map(|r| r.chart())
    })
    .await??;

    Ok(Json(chart))
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RangeParams>, QueryRejection>,
) -> Result<Json<Vec<StrategyComparison>>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let symbol = clean_symbol(&params.symbol)?;
    let config = range_config(
        &state,
        params.start_date.as_deref(),
        params.end_date.as_deref(),
    )?;

    let rows = tokio::task::spawn_blocking(move || {
        compare_strategies(state.data_port.as_ref(), &symbol, &state.params, &config)
    })
    .await??;

    Ok(Json(rows))
}

pub async fn trades(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TradeParams>, QueryRejection>,
) -> Result<Json<TradesResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = params.page.unwrap_or(1);
    let per_page = params.per_page.unwrap_or(50);
    if page == 0 {
        return Err(ApiError::bad_request("page starts at 1"));
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(ApiError::bad_request(format!(
            "per_page must be between 1 and {MAX_PER_PAGE}"
        )));
    }
    if let Some(strategy) = params.strategy.as_deref() {
        strategy.parse::<StrategyKind>()?;
    }

    let query = TradeQuery {
        symbol: params.symbol.map(|s| s.trim().to_uppercase()),
        strategy: params.strategy,
        page,
        per_page,
    };
    query.sql_window()?;

    let response = tokio::task::spawn_blocking(move || {
        let page = state.results.list_trades(&query)?;
        let metrics = match (&query.symbol, &query.strategy) {
            (Some(symbol), Some(strategy)) => state.results.latest_metrics(symbol, strategy)?,
            _ => None,
        };
        Ok::<_, ApiError>(TradesResponse {
            trades: page.trades,
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            metrics,
        })
    })
    .await??;

    Ok(Json(response))
}
