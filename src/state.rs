/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Clone is cheap (Arc internals); one reqwest::Client reused for
 *   both JWKS fetches and upstream forwarding
 */
use std::sync::Arc;

use crate::config::Config;
use crate::services::verify::TokenVerifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<TokenVerifier>,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Arc<Config>, verifier: Arc<TokenVerifier>, client: reqwest::Client) -> Self {
        Self {
            config,
            verifier,
            client,
        }
    }
}
