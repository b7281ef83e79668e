//! HTTP API for the Bourse daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Registered exchanges with their pairs and capabilities
//! - Cached-or-refreshed ticker and orderbook per exchange and pair
//! - Prometheus metrics
//!
//! Pairs in paths are canonical `BASE_QUOTE` (or `BASE-QUOTE`), whatever the
//! venue's own format.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use bourse_domain::{CurrencyPair, DomainError, ExchangeId, OrderbookSnapshot, TickerSnapshot};
use bourse_exec::{Capabilities, ExchangeError, ExchangePort};

use crate::error::DaemonError;
use crate::metrics::Metrics;
use crate::registry::ExchangeRegistry;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub registry: Arc<ExchangeRegistry>,
    pub metrics: Arc<Metrics>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// One registered exchange.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub id: ExchangeId,
    pub pairs: Vec<CurrencyPair>,
    pub capabilities: Capabilities,
}

/// Registered exchanges.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangesResponse {
    pub exchanges: Vec<ExchangeSummary>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/exchanges", get(exchanges_handler))
        .route("/exchanges/:exchange/ticker/:pair", get(ticker_handler))
        .route("/exchanges/:exchange/orderbook/:pair", get(orderbook_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List registered exchanges.
async fn exchanges_handler(State(state): State<Arc<ApiState>>) -> Json<ExchangesResponse> {
    let exchanges = state
        .registry
        .exchanges()
        .map(|exchange| ExchangeSummary {
            id: exchange.id(),
            pairs: exchange.enabled_pairs(),
            capabilities: exchange.capabilities().clone(),
        })
        .collect();

    Json(ExchangesResponse { exchanges })
}

/// Ticker for one pair, from cache or a fresh batch.
async fn ticker_handler(
    State(state): State<Arc<ApiState>>,
    Path((exchange, pair)): Path<(String, String)>,
) -> Result<Json<TickerSnapshot>, ApiError> {
    let (exchange, pair) = resolve(&state, &exchange, &pair).map_err(to_error_response)?;
    let snapshot = exchange
        .ticker(&pair)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(snapshot.as_ref().clone()))
}

/// Orderbook for one pair, from cache or a fresh batch.
async fn orderbook_handler(
    State(state): State<Arc<ApiState>>,
    Path((exchange, pair)): Path<(String, String)>,
) -> Result<Json<OrderbookSnapshot>, ApiError> {
    let (exchange, pair) = resolve(&state, &exchange, &pair).map_err(to_error_response)?;
    let snapshot = exchange
        .orderbook(&pair)
        .await
        .map_err(|e| to_error_response(e.into()))?;

    Ok(Json(snapshot.as_ref().clone()))
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> Result<impl IntoResponse, ApiError> {
    state.metrics.observe_cache(state.registry.cache());
    let body = state.metrics.render().map_err(to_error_response)?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// =============================================================================
// Helpers
// =============================================================================

fn resolve(
    state: &ApiState,
    exchange: &str,
    pair: &str,
) -> Result<(Arc<dyn ExchangePort>, CurrencyPair), DaemonError> {
    let id: ExchangeId = exchange.parse()?;
    let exchange = state.registry.get(id)?;
    let pair: CurrencyPair = pair.parse()?;
    Ok((exchange, pair))
}

fn to_error_response(error: DaemonError) -> ApiError {
    let status = match &error {
        DaemonError::Domain(DomainError::UnknownExchange(_)) => StatusCode::NOT_FOUND,
        DaemonError::ExchangeNotEnabled(_) => StatusCode::NOT_FOUND,
        DaemonError::Domain(_) => StatusCode::BAD_REQUEST,
        DaemonError::Exchange(e) => match e {
            ExchangeError::MissingCredentials(_) => StatusCode::UNAUTHORIZED,
            ExchangeError::InvalidPairFormat(_) | ExchangeError::InvalidParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ExchangeError::Unsupported { .. } => StatusCode::NOT_IMPLEMENTED,
            ExchangeError::Transport(_)
            | ExchangeError::ExchangeApi { .. }
            | ExchangeError::Decode(_)
            | ExchangeError::Signature(_) => StatusCode::BAD_GATEWAY,
        },
        DaemonError::Config(_) | DaemonError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================
