/*
 * Responsibility
 * - Environment configuration (JWKS URL, issuer, upstream URLs/audiences, timeout)
 * - Every knob has a local-dev default; present-but-invalid values fail startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

#[derive(Debug)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,

    pub jwks_url: String,
    pub issuer: String,

    pub lambda_url: String,
    pub fargate_url: String,
    pub lambda_audience: String,
    pub fargate_audience: String,

    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = match std::env::var("PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            Err(_) => 8080,
        };

        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let jwks_url = env_or(
            "COGNITO_JWKS_URL",
            "http://cognito-mock:8000/.well-known/jwks.json",
        );
        let issuer = env_or("COGNITO_ISSUER", "http://cognito-mock:8000");

        let lambda_url = env_or("LAMBDA_URL", "http://lambda-service:9000");
        let fargate_url = env_or("FARGATE_URL", "http://fargate-service:9001");
        let lambda_audience = env_or("LAMBDA_AUDIENCE", "guidogerb-api");
        let fargate_audience = env_or("FARGATE_AUDIENCE", "guidogerb-app");

        // The original deployment accepted fractional seconds here.
        let upstream_timeout = match std::env::var("UPSTREAM_TIMEOUT") {
            Ok(s) => {
                let seconds: f64 = s
                    .parse()
                    .map_err(|_| ConfigError::Invalid("UPSTREAM_TIMEOUT"))?;
                if !seconds.is_finite() || seconds <= 0.0 {
                    return Err(ConfigError::Invalid("UPSTREAM_TIMEOUT"));
                }
                Duration::from_secs_f64(seconds)
            }
            Err(_) => Duration::from_secs(10),
        };

        for (key, value) in [
            ("COGNITO_JWKS_URL", &jwks_url),
            ("LAMBDA_URL", &lambda_url),
            ("FARGATE_URL", &fargate_url),
        ] {
            Url::parse(value).map_err(|_| ConfigError::Invalid(key))?;
        }

        Ok(Self {
            addr,
            jwks_url,
            issuer,
            lambda_url,
            fargate_url,
            lambda_audience,
            fargate_audience,
            upstream_timeout,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
