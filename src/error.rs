/*
 * Responsibility
 * - Gateway-wide error taxonomy, one variant per externally visible failure kind
 * - IntoResponse: {"error": "<message>"} body, WWW-Authenticate challenge on 401
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Every failure a request can surface to the client. All credential
/// problems (bad signature, wrong issuer, wrong audience, expired token,
/// unresolvable key) collapse into `InvalidCredential`; the reason string
/// is the only differentiation clients get.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Host header is required")]
    MissingHost,
    #[error("Unknown API host '{host}'")]
    UnknownHost { host: String },
    #[error("Bearer token is required")]
    MissingCredential,
    #[error("{0}")]
    InvalidCredential(String),
    #[error("{0}")]
    UpstreamUnavailable(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingHost => StatusCode::BAD_REQUEST,
            GatewayError::UnknownHost { .. } => StatusCode::NOT_FOUND,
            GatewayError::MissingCredential | GatewayError::InvalidCredential(_) => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
