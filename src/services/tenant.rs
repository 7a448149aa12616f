/*
 * Responsibility
 * - Host header → BackendContext (tenant, audience, upstream, target)
 * - Pure function of configuration + host string; no I/O
 */
use crate::config::Config;
use crate::error::GatewayError;

const LAMBDA_HOST_PREFIX: &str = "api.local.";
const FARGATE_HOST_PREFIX: &str = "app.local.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendTarget {
    Lambda,
    Fargate,
}

impl BackendTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTarget::Lambda => "lambda",
            BackendTarget::Fargate => "fargate",
        }
    }
}

/// Per-request routing decision. Built once from the Host header,
/// never from token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendContext {
    pub tenant: String,
    pub audience: String,
    pub base_url: String,
    pub target: BackendTarget,
}

/// Matching is on the lowercased, port-stripped host; the error carries
/// the header exactly as the client sent it.
pub fn resolve(config: &Config, host_header: &str) -> Result<BackendContext, GatewayError> {
    let host = match host_header.split_once(':') {
        Some((host, _port)) => host,
        None => host_header,
    }
    .to_ascii_lowercase();

    if let Some(tenant) = host.strip_prefix(LAMBDA_HOST_PREFIX) {
        return Ok(BackendContext {
            tenant: tenant.to_string(),
            audience: config.lambda_audience.clone(),
            base_url: config.lambda_url.clone(),
            target: BackendTarget::Lambda,
        });
    }

    if let Some(tenant) = host.strip_prefix(FARGATE_HOST_PREFIX) {
        return Ok(BackendContext {
            tenant: tenant.to_string(),
            audience: config.fargate_audience.clone(),
            base_url: config.fargate_url.clone(),
            target: BackendTarget::Fargate,
        });
    }

    Err(GatewayError::UnknownHost {
        host: host_header.to_string(),
    })
}
