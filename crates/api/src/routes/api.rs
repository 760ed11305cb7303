use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use common::{CloseBar, Error, FutureBoard, PriceGrid};

use crate::{auth::require_auth, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/history", get(get_history))
        .route("/api/positions", get(get_positions))
        .route("/api/strategies", get(get_strategies))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Maps engine/broker errors onto HTTP statuses for JSON handlers.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Broker(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidExpiration(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryQuery {
    symbol: String,
    limit: Option<i64>,
}

/// Cached daily close prices for one symbol, newest first.
async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(90).clamp(1, 500);

    let bars: Vec<CloseBar> = sqlx::query_as(
        r#"SELECT symbol, trade_date, close, volume FROM close_prices
           WHERE symbol = ?1 ORDER BY trade_date DESC LIMIT ?2"#,
    )
    .bind(&q.symbol)
    .bind(limit)
    .fetch_all(&state.db)
    .await
    .map_err(Error::from)?;

    Ok(Json(json!({
        "symbol": q.symbol,
        "bars": bars,
        "count": bars.len(),
    })))
}

// ─── Positions ────────────────────────────────────────────────────────────────

/// Current broker positions with streaming P&L marks.
async fn get_positions(State(state): State<AppState>) -> Json<Value> {
    let positions = state.positions.read().await.clone();
    let total_unrealized_pnl: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();

    Json(json!({
        "positions": positions,
        "total_open": positions.len(),
        "total_unrealized_pnl": total_unrealized_pnl,
    }))
}

// ─── Strategies ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StrategiesQuery {
    symbol: String,
}

/// Fetch the option chains and future quotes for a symbol, run the spread
/// engine, and return the ranked candidates.
async fn get_strategies(
    State(state): State<AppState>,
    Query(q): Query<StrategiesQuery>,
) -> Result<Json<Value>, ApiError> {
    let expirations = state.broker.expirations(&q.symbol).await?;

    let mut future_prices = FutureBoard::new();
    for fq in state.broker.future_quotes(&q.symbol).await? {
        future_prices.insert(fq.expiration.clone(), fq);
    }

    let mut price_grid = PriceGrid::new();
    for expiration in &expirations {
        let chain = state.broker.option_chain(&q.symbol, expiration).await?;
        if !chain.is_empty() {
            price_grid.insert(expiration.clone(), chain);
        }
    }

    let today = Utc::now().date_naive();
    let candidates = spread::recommend(&price_grid, &future_prices, today)?;
    info!(symbol = %q.symbol, expirations = expirations.len(), candidates = candidates.len(), "Strategy scan complete");

    Ok(Json(json!({
        "symbol": q.symbol,
        "as_of": today.to_string(),
        "count": candidates.len(),
        "candidates": candidates,
    })))
}
