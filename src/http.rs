//! `GET /`: serves the single HTML page, templated with the WebSocket URL
//! the embedded client script should connect to.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::ws::{self, AppState};

const PAGE_TEMPLATE: &str = include_str!("../static/index.html");

/// Build the application router: the index page and the WebSocket upgrade.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/websocket", get(ws::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(headers: HeaderMap, State(_state): State<AppState>) -> Html<String> {
    let scheme = ws_scheme(&headers);
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:8080");
    let ws_url = format!("{scheme}://{host}/websocket");
    Html(PAGE_TEMPLATE.replace("{{WS_URL}}", &ws_url))
}

/// `ws://` iff `Host` begins with `localhost` or `127.0.0.1`, else `wss://`.
fn ws_scheme(headers: &HeaderMap) -> &'static str {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "ws"
    } else {
        "wss"
    }
}
