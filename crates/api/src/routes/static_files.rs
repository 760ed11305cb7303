use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use rust_embed::RustEmbed;

use crate::AppState;

const INDEX: &str = "index.html";

/// Dashboard single-page frontend, embedded at compile time from
/// `frontend/dist-placeholder/`. Point the folder at `../../frontend/dist/`
/// once the real bundle is built (`npm run build` in `frontend/`).
#[derive(RustEmbed)]
#[folder = "../../frontend/dist-placeholder/"]
struct DashboardAssets;

pub fn static_router() -> Router<AppState> {
    Router::new().fallback(serve_asset)
}

async fn serve_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { INDEX } else { path };

    if let Some(asset) = DashboardAssets::get(path) {
        return asset_response(path, asset.data.into_owned());
    }

    // Anything not in the bundle is a client-side route: hand the SPA shell
    // back and let the frontend router resolve it.
    match DashboardAssets::get(INDEX) {
        Some(index) => asset_response(INDEX, index.data.into_owned()),
        None => (StatusCode::NOT_FOUND, "Dashboard frontend not built").into_response(),
    }
}

fn asset_response(path: &str, data: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();
    ([(header::CONTENT_TYPE, mime)], data).into_response()
}
