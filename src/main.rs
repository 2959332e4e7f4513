//! Frame Wallet HTTP entrypoint.
//!
//! Launches the axum server that renders frames and drives the smart wallet:
//!
//! - `GET|POST /v1/generate-tx` – turn calldata into a compressed sign URL
//! - `GET|POST /v1/{token}` – prompt for, validate, and submit a signed action
//! - `GET /v1/{token}/h` – human-readable transaction preview
//! - `GET|POST /v1/wallet` – explorer redirect for the caller's wallet
//! - `GET|POST /view-transaction/{tx_hash}` – explorer redirect for a tx
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control the binding address
//! - `RPC_URL`, `HUB_URL`, `BUNDLER_RPC_URL`, `FRAME_WALLET_FACTORY`
//!   configure the collaborators
//! - `OTEL_*` variables enable span export

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use frame_wallet::config::Config;
use frame_wallet::handlers::{self, AppState};
use frame_wallet::shutdown::ShutdownSignal;
use frame_wallet::telemetry::Telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _telemetry = Telemetry::init();

    let config = Config::load()?;
    let addr = SocketAddr::new(config.host(), config.port());
    let state = Arc::new(AppState::from_config(config)?);

    let http_endpoints = Router::new()
        .merge(handlers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    tracing::info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    let shutdown = ShutdownSignal::listen()?;
    let cancellation_token = shutdown.cancellation_token();
    let graceful_shutdown = async move { cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    Ok(())
}
