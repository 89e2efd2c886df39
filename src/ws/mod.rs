//! The per-client message channel: upgrade handler, wire protocol types,
//! and the thread-safe writer every emitter must go through.

pub mod protocol;
pub mod writer;

use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use webrtc::api::API;

use crate::config::Config;
use crate::room::RoomRegistry;
use crate::session::run_session;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub api: Arc<API>,
    pub config: Arc<Config>,
}

/// `GET /websocket` — upgrade to the per-client message channel.
///
/// No origin check is performed; the reverse proxy / TLS termination in
/// front of this server is responsible for that.
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state.registry, state.api, state.config))
}
