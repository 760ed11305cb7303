use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use common::PositionUpdate;

use crate::auth::token_matches;
use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/positions", get(ws_positions_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket endpoint that streams live position P&L to the dashboard.
/// Auth via query param `?token=<DASHBOARD_TOKEN>` (header auth not supported
/// in browser WebSocket API).
async fn ws_positions_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    if !token_matches(&state.dashboard_token, q.token.as_deref()) {
        return axum::response::IntoResponse::into_response((
            axum::http::StatusCode::UNAUTHORIZED,
            "unauthorized",
        ));
    }

    let positions = state.positions.clone();
    let update_rx = state.update_tx.subscribe();
    ws.on_upgrade(move |socket| async move {
        // Send the current snapshot first so the client renders immediately
        let snapshot = PositionUpdate::snapshot(positions.read().await.clone(), Utc::now());
        handle_ws(socket, snapshot, update_rx).await;
    })
}

async fn handle_ws(
    mut socket: WebSocket,
    snapshot: PositionUpdate,
    mut update_rx: tokio::sync::broadcast::Receiver<PositionUpdate>,
) {
    match serde_json::to_string(&snapshot) {
        Ok(text) => {
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to serialize position snapshot");
            return;
        }
    }

    // Then stream live updates
    loop {
        match update_rx.recv().await {
            Ok(update) => {
                let Ok(text) = serde_json::to_string(&update) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket position client lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                break;
            }
        }
    }
}
