use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

/// Compare a presented token against the configured dashboard token.
///
/// Shared by the bearer-header middleware below and the query-token check on
/// `/ws/positions`. An empty configured token locks the dashboard rather
/// than letting an empty header through.
pub fn token_matches(expected: &str, presented: Option<&str>) -> bool {
    !expected.is_empty() && presented == Some(expected)
}

/// Middleware enforcing `Authorization: Bearer <DASHBOARD_TOKEN>` on the
/// dashboard's JSON routes. Rejections use the same error envelope as the
/// route handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if token_matches(&state.dashboard_token, bearer) {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized" })),
    )
        .into_response()
}
