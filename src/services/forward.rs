/*
 * Responsibility
 * - Build the upstream request: target URL, sanitized headers, injected
 *   identity headers, bounded timeout
 * - Capture the upstream response minus hop-by-hop headers
 */
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::error::GatewayError;
use crate::services::tenant::BackendContext;
use crate::services::verify::Claims;

pub const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";
pub const TENANT_HEADER: &str = "x-guidogerb-tenant";
pub const USERNAME_HEADER: &str = "x-guidogerb-username";
pub const TARGET_HEADER: &str = "x-guidogerb-target";

/// Inbound headers that never cross the trust boundary.
const STRIPPED_REQUEST_HEADERS: [&str; 3] = ["host", "content-length", "connection"];

/// Recomputed by the transport on the client leg instead of relayed.
const HOP_BY_HOP_RESPONSE_HEADERS: [&str; 3] = ["content-length", "connection", "transfer-encoding"];

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fresh header map per request: inbound headers minus the stripped set,
/// minus anything in the gateway's own identity namespace (a client must
/// not be able to smuggle those through), plus the injected identity
/// headers. Injection happens only after verification succeeded, which is
/// why `Claims` is a required argument.
pub fn forward_headers(
    inbound: &HeaderMap,
    host_header: &str,
    context: &BackendContext,
    claims: &Claims,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in inbound {
        let name_str = name.as_str();
        if STRIPPED_REQUEST_HEADERS.contains(&name_str) {
            continue;
        }
        if name_str == FORWARDED_HOST_HEADER || name_str.starts_with("x-guidogerb-") {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    insert_str(&mut headers, FORWARDED_HOST_HEADER, host_header);
    insert_str(&mut headers, TENANT_HEADER, &context.tenant);
    let username = claims.username.as_deref().unwrap_or(&claims.sub);
    insert_str(&mut headers, USERNAME_HEADER, username);
    insert_str(&mut headers, TARGET_HEADER, context.target.as_str());

    headers
}

fn insert_str(headers: &mut HeaderMap, name: &'static str, value: &str) {
    // Claim values are attacker-influenced; anything that cannot be a
    // header value is forwarded empty rather than dropped or rejected.
    let value = HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""));
    headers.insert(HeaderName::from_static(name), value);
}

/// Issue the upstream call. The timeout bounds the whole exchange; any
/// transport failure maps to `UpstreamUnavailable` (502). Upstream HTTP
/// error statuses are not failures here, they are relayed as-is.
pub async fn forward(
    client: &reqwest::Client,
    timeout: Duration,
    method: Method,
    uri: &Uri,
    headers: HeaderMap,
    body: Bytes,
    context: &BackendContext,
) -> Result<UpstreamResponse, GatewayError> {
    let mut target_url = format!("{}{}", context.base_url, uri.path());
    if let Some(query) = uri.query() {
        target_url.push('?');
        target_url.push_str(query);
    }

    let response = client
        .request(method, &target_url)
        .headers(headers)
        .body(body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| GatewayError::UpstreamUnavailable(err.to_string()))?;

    let status = response.status();
    let mut relayed = HeaderMap::new();
    for (name, value) in response.headers() {
        if HOP_BY_HOP_RESPONSE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }

    let body = response
        .bytes()
        .await
        .map_err(|err| GatewayError::UpstreamUnavailable(err.to_string()))?;

    Ok(UpstreamResponse {
        status,
        headers: relayed,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tenant::BackendTarget;

    fn context() -> BackendContext {
        BackendContext {
            tenant: "acme".to_string(),
            audience: "guidogerb-api".to_string(),
            base_url: "http://lambda.test:9000".to_string(),
            target: BackendTarget::Lambda,
        }
    }

    fn claims(username: Option<&str>) -> Claims {
        Claims {
            sub: "subject-1".to_string(),
            iss: "http://idp.test".to_string(),
            aud: "guidogerb-api".to_string(),
            username: username.map(str::to_string),
            groups: vec![],
            iat: None,
            exp: u64::MAX,
        }
    }

    #[test]
    fn strips_trust_boundary_headers_and_injects_identity() {
        let mut inbound = HeaderMap::new();
        inbound.insert("host", HeaderValue::from_static("api.local.acme:8080"));
        inbound.insert("content-length", HeaderValue::from_static("42"));
        inbound.insert("connection", HeaderValue::from_static("keep-alive"));
        inbound.insert("accept", HeaderValue::from_static("application/json"));

        let headers = forward_headers(
            &inbound,
            "api.local.acme:8080",
            &context(),
            &claims(Some("demo-user")),
        );

        assert!(!headers.contains_key("host"));
        assert!(!headers.contains_key("content-length"));
        assert!(!headers.contains_key("connection"));
        assert_eq!(headers["accept"], "application/json");
        assert_eq!(headers[FORWARDED_HOST_HEADER], "api.local.acme:8080");
        assert_eq!(headers[TENANT_HEADER], "acme");
        assert_eq!(headers[USERNAME_HEADER], "demo-user");
        assert_eq!(headers[TARGET_HEADER], "lambda");
    }

    #[test]
    fn client_supplied_identity_headers_cannot_survive() {
        let mut inbound = HeaderMap::new();
        inbound.insert(TENANT_HEADER, HeaderValue::from_static("spoofed"));
        inbound.insert(USERNAME_HEADER, HeaderValue::from_static("root"));
        inbound.insert(TARGET_HEADER, HeaderValue::from_static("fargate"));
        inbound.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("evil.host"));
        inbound.insert("x-guidogerb-anything", HeaderValue::from_static("nope"));

        let headers = forward_headers(&inbound, "api.local.acme", &context(), &claims(None));

        assert_eq!(headers[TENANT_HEADER], "acme");
        assert_eq!(headers[USERNAME_HEADER], "subject-1");
        assert_eq!(headers[TARGET_HEADER], "lambda");
        assert_eq!(headers[FORWARDED_HOST_HEADER], "api.local.acme");
        assert!(!headers.contains_key("x-guidogerb-anything"));
    }

    #[test]
    fn username_falls_back_to_subject() {
        let inbound = HeaderMap::new();
        let headers = forward_headers(&inbound, "api.local.acme", &context(), &claims(None));
        assert_eq!(headers[USERNAME_HEADER], "subject-1");
    }
}
