//! SFU Server - Main Entry Point
//!
//! Many-to-many real-time audio conferencing server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use sfu_server::config::Config;
use sfu_server::http;
use sfu_server::keyframe;
use sfu_server::room::RoomRegistry;
use sfu_server::voice::api::build_api;
use sfu_server::ws::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required by webrtc-rs's DTLS
    // stack). Must happen before any WebRTC operation.
    let _ = rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sfu_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting SFU server");

    let api = Arc::new(build_api()?);
    let registry = Arc::new(RoomRegistry::new());

    tokio::spawn(keyframe::run_ticker(registry.clone(), config.keyframe_interval));

    let state = AppState {
        registry,
        api,
        config: config.clone(),
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("server shutdown complete");
    Ok(())
}
