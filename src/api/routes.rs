/*
 * Responsibility
 * - URL structure of the gateway
 * - /healthz answers directly (any method, no auth); everything else
 *   falls through to the proxy chain
 */
use axum::{Router, routing::any};

use crate::api::handlers::{health::healthz, proxy::proxy};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", any(healthz))
        .fallback(proxy)
}
