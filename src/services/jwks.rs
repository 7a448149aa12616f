/*
 * Responsibility
 * - Fetch + cache the identity provider's JWKS document, keyed by kid
 * - Single-flight refresh: a miss fetches at most once, concurrent callers
 *   ride the refresh that is already in flight
 */
use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key-set document unreachable: {0}")]
    Fetch(String),
    #[error("key-set document malformed: {0}")]
    Decode(String),
    #[error("no key matches the requested key id")]
    UnknownKeyId,
}

/// One entry of the published key-set document. Only RSA signing keys
/// with both modulus and exponent present become verification keys;
/// anything else is skipped rather than rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeySetDocument {
    pub keys: Vec<Jwk>,
}

/// Where the key-set document comes from. The HTTP implementation is the
/// production one; tests substitute an in-memory source.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<KeySetDocument, KeySetError>;
}

pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<KeySetDocument, KeySetError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| KeySetError::Fetch(err.to_string()))?
            .error_for_status()
            .map_err(|err| KeySetError::Fetch(err.to_string()))?;

        response
            .json::<KeySetDocument>()
            .await
            .map_err(|err| KeySetError::Decode(err.to_string()))
    }
}

struct CachedKeys {
    generation: u64,
    keys: HashMap<String, DecodingKey>,
}

/// The only shared mutable state in the gateway. The map is replaced
/// wholesale on refresh; the generation counter lets a caller that
/// queued behind an in-flight refresh tell "already refreshed, still
/// missing" apart from "not refreshed yet".
pub struct KeySetCache {
    source: Box<dyn KeySetSource>,
    cached: RwLock<CachedKeys>,
    refresh: Mutex<()>,
}

impl KeySetCache {
    pub fn new(source: impl KeySetSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cached: RwLock::new(CachedKeys {
                generation: 0,
                keys: HashMap::new(),
            }),
            refresh: Mutex::new(()),
        }
    }

    /// Look up the verification key for `kid`, refreshing the cached
    /// document at most once on a miss.
    pub async fn verification_key(&self, kid: &str) -> Result<DecodingKey, KeySetError> {
        let seen_generation = {
            let cached = self.cached.read().await;
            if let Some(key) = cached.keys.get(kid) {
                return Ok(key.clone());
            }
            cached.generation
        };

        let _refresh = self.refresh.lock().await;

        {
            let cached = self.cached.read().await;
            if let Some(key) = cached.keys.get(kid) {
                return Ok(key.clone());
            }
            // A refresh completed while we waited for the lock and the
            // kid still is not there; do not hammer the provider again.
            if cached.generation != seen_generation {
                return Err(KeySetError::UnknownKeyId);
            }
        }

        let document = self.source.fetch().await?;
        let keys = decode_document(document)?;

        let mut cached = self.cached.write().await;
        cached.generation += 1;
        cached.keys = keys;
        cached.keys.get(kid).cloned().ok_or(KeySetError::UnknownKeyId)
    }
}

fn decode_document(document: KeySetDocument) -> Result<HashMap<String, DecodingKey>, KeySetError> {
    let mut keys = HashMap::new();
    for jwk in document.keys {
        if jwk.kty != "RSA" {
            continue;
        }
        let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
            continue;
        };
        let key = DecodingKey::from_rsa_components(n, e)
            .map_err(|err| KeySetError::Decode(format!("jwk '{}': {}", jwk.kid, err)))?;
        keys.insert(jwk.kid, key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // 2048-bit RSA modulus/exponent, base64url without padding.
    const TEST_N: &str = "4WxT-Q_8cvGJj7WS17zCev49yqybFqS7JplMR_8_9nAB2CTh0G_sN0U6RVeMMb3EV-g9pDgugaQvD1qNV9ajGW4WPi8PCd3l_5yV1DABZT8_C6rqhfDP4XbdLuYdrxDP9AeVe8u2aMR8OdTCiYkmcJmutIWeh3wQ-p6m42O1VS3UsxAPu08-pKgwnnZu68NOc6_yW-b-vTDVFNVG7GQqDOpu1Gvh1qnwEPRgXClJKX-o_VZRo2FeAzwaMKbKmgXmAibWjGyww1_dM-gOtBoYCbtwSb5Ze8QtIkE-uDqCpqdoN3ZWcUed4-xwMxP9qQ8IZzSBX_YJBRxVU7br53Ag4Q";
    const TEST_E: &str = "AQAB";

    struct FakeSource {
        kids: Vec<&'static str>,
        fetches: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl KeySetSource for FakeSource {
        async fn fetch(&self) -> Result<KeySetDocument, KeySetError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(KeySetDocument {
                keys: self
                    .kids
                    .iter()
                    .map(|kid| Jwk {
                        kty: "RSA".to_string(),
                        kid: kid.to_string(),
                        key_use: Some("sig".to_string()),
                        alg: Some("RS256".to_string()),
                        n: Some(TEST_N.to_string()),
                        e: Some(TEST_E.to_string()),
                    })
                    .collect(),
            })
        }
    }

    fn cache_with(kids: Vec<&'static str>, delay: Duration) -> (KeySetCache, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let cache = KeySetCache::new(FakeSource {
            kids,
            fetches: fetches.clone(),
            delay,
        });
        (cache, fetches)
    }

    #[tokio::test]
    async fn cold_lookup_fetches_once_then_serves_from_cache() {
        let (cache, fetches) = cache_with(vec!["key-1"], Duration::ZERO);

        cache.verification_key("key-1").await.unwrap();
        cache.verification_key("key-1").await.unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_kid_refreshes_exactly_once_before_failing() {
        let (cache, fetches) = cache_with(vec!["key-1"], Duration::ZERO);

        let err = cache.verification_key("rotated-away").await.unwrap_err();
        assert!(matches!(err, KeySetError::UnknownKeyId));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // The failed lookup still cached the document for other kids.
        cache.verification_key("key-1").await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_refresh() {
        let (cache, fetches) = cache_with(vec!["key-1"], Duration::from_millis(50));
        let cache = Arc::new(cache);

        let lookups = (0..8).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.verification_key("key-1").await })
        });
        for lookup in lookups {
            lookup.await.unwrap().unwrap();
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_rsa_entries_are_skipped() {
        let document = KeySetDocument {
            keys: vec![
                Jwk {
                    kty: "EC".to_string(),
                    kid: "ec-key".to_string(),
                    key_use: Some("sig".to_string()),
                    alg: Some("ES256".to_string()),
                    n: None,
                    e: None,
                },
                Jwk {
                    kty: "RSA".to_string(),
                    kid: "rsa-key".to_string(),
                    key_use: Some("sig".to_string()),
                    alg: Some("RS256".to_string()),
                    n: Some(TEST_N.to_string()),
                    e: Some(TEST_E.to_string()),
                },
            ],
        };

        let keys = decode_document(document).unwrap();
        assert!(keys.contains_key("rsa-key"));
        assert!(!keys.contains_key("ec-key"));
    }
}
