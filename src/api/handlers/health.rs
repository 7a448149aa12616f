/*
 * Responsibility
 * - GET /healthz (liveness + effective routing configuration)
 * - Never requires authentication
 */
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "jwks": state.config.jwks_url,
        "lambda_url": state.config.lambda_url,
        "fargate_url": state.config.fargate_url,
    }))
}
