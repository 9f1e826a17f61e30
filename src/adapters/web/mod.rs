//! JSON HTTP API.
//!
//! Each request fetches, evaluates and (for `/api/backtest`) persists on a
//! blocking worker thread; handlers share no mutable state.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::*;

use axum::{routing::get, Router};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::strategy::StrategyParams;
use crate::ports::data_port::DataPort;
use crate::ports::result_port::ResultPort;

pub struct AppState {
    pub data_port: Arc<dyn DataPort + Send + Sync>,
    pub results: Arc<dyn ResultPort + Send + Sync>,
    pub params: StrategyParams,
    pub lookback_days: i64,
    /// Fixed evaluation date; `None` means today (UTC).
    pub as_of: Option<NaiveDate>,
}

impl AppState {
    pub fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/strategies", get(handlers::strategies))
        .route("/api/backtest/{strategy}/{symbol}", get(handlers::backtest))
        .route("/api/strategy_data", get(handlers::strategy_data))
        .route("/api/compare_strategies", get(handlers::compare))
        .route("/api/trades", get(handlers::trades))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(Arc::new(state))
}
