/*
 * Responsibility
 * - Config load → service construction → Router assembly
 * - tracing init and request tracing layer
 * - axum::serve() startup
 */
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::services::jwks::{HttpKeySetSource, KeySetCache};
use crate::services::verify::TokenVerifier;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,guidogerb_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Arc::new(Config::from_env()?);

    tracing::info!(
        addr = %config.addr,
        jwks = %config.jwks_url,
        lambda = %config.lambda_url,
        fargate = %config.fargate_url,
        "starting gateway"
    );

    let state = build_state(config.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build process-level services and inject them into the shared state.
/// The key-set cache is constructed here, once, and owned by the state;
/// there is no process-global key client.
pub fn build_state(config: Arc<Config>) -> AppState {
    let client = reqwest::Client::new();
    let keys = KeySetCache::new(HttpKeySetSource::new(
        client.clone(),
        config.jwks_url.clone(),
    ));
    let verifier = Arc::new(TokenVerifier::new(config.issuer.clone(), Arc::new(keys)));
    AppState::new(config, verifier, client)
}

pub fn build_router(state: AppState) -> Router {
    api::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
