/*
 * Responsibility
 * - Bearer JWT verification: kid lookup via KeySetCache, RS256 signature,
 *   exact issuer + audience, expiry with zero leeway
 * - All failure detail goes to the log; callers only see the reason string
 */
use std::sync::Arc;

use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Deserialize;
use thiserror::Error;

use crate::services::jwks::KeySetCache;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Unable to resolve signing key")]
    KeyResolution,
    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Decoded token payload, read-only and scoped to one request.
///
/// `username` is what gets forwarded upstream, with `sub` as the
/// fallback; `cognito:groups` mirrors the identity provider's claim name.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub iat: Option<u64>,
    pub exp: u64,
}

pub struct TokenVerifier {
    issuer: String,
    keys: Arc<KeySetCache>,
}

impl TokenVerifier {
    pub fn new(issuer: String, keys: Arc<KeySetCache>) -> Self {
        Self { issuer, keys }
    }

    /// The expected audience comes from the routing decision, never from
    /// the token itself.
    pub async fn verify(&self, token: &str, expected_audience: &str) -> Result<Claims, VerifyError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or_else(|| {
            tracing::warn!("token header carries no kid");
            VerifyError::KeyResolution
        })?;

        let key = self.keys.verification_key(&kid).await.map_err(|err| {
            tracing::warn!(kid = %kid, error = %err, "signing key resolution failed");
            VerifyError::KeyResolution
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[expected_audience]);
        // No clock-skew leeway: an expired token is expired.
        validation.leeway = 0;

        let decoded = decode::<Claims>(token, &key, &validation)?;
        Ok(decoded.claims)
    }
}
