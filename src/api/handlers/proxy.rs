/*
 * Responsibility
 * - The per-request chain: resolve host → require bearer → verify token
 *   → forward upstream → relay the response
 * - Every stage early-exits into a GatewayError; nothing is retried
 */
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::services::{forward, tenant};
use crate::state::AppState;

pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let host_header = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .ok_or(GatewayError::MissingHost)?;

    let context = tenant::resolve(&state.config, host_header)?;

    let token = bearer_token(&headers).ok_or(GatewayError::MissingCredential)?;

    let claims = state
        .verifier
        .verify(token, &context.audience)
        .await
        .map_err(|err| {
            tracing::warn!(tenant = %context.tenant, error = %err, "token verification failed");
            GatewayError::InvalidCredential(err.to_string())
        })?;

    let forward_headers = forward::forward_headers(&headers, host_header, &context, &claims);

    tracing::debug!(
        tenant = %context.tenant,
        target = context.target.as_str(),
        method = %method,
        path = uri.path(),
        "forwarding request"
    );

    let upstream = forward::forward(
        &state.client,
        state.config.upstream_timeout,
        method,
        &uri,
        forward_headers,
        body,
        &context,
    )
    .await?;

    let mut response = (upstream.status, upstream.body).into_response();
    *response.headers_mut() = upstream.headers;
    Ok(response)
}

/// Scheme matching is ASCII case-insensitive; the token is everything
/// after the first space.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}
