// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token verification against the identity provider's trust material.
//!
//! Two trust-material shapes are supported, selected by configuration:
//! a shared HS256 secret, or a JWKS endpoint publishing rotating RS256
//! public keys. JWKS keys are cached in-process with a TTL taken from the
//! endpoint's Cache-Control header, and refreshes are serialized so a slow
//! endpoint cannot stall every request.

use crate::config::{Config, TrustMaterial};
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Decoded claim set of a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the provider's stable user identifier
    pub sub: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    /// Provider-assigned session identifier
    pub session_id: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub iss: String,
    pub aud: String,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
}

/// Verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerifyError {
    /// The token's expiry claim is in the past.
    #[error("token expired")]
    Expired,
    /// The token is malformed, untrusted, or its claims do not match
    /// expectations.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// A transient failure talking to the key-distribution endpoint.
    #[error("key fetch failed: {0}")]
    KeyFetch(String),
}

enum VerifierMode {
    SharedSecret {
        decoding_key: Arc<DecodingKey>,
    },
    Jwks {
        url: String,
    },
    /// Fixed RS256 key for deterministic tests.
    StaticJwks {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for bearer tokens issued by the external identity provider.
pub struct TokenVerifier {
    http_client: reqwest::Client,
    expected_issuer: String,
    expected_audience: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl TokenVerifier {
    /// Create a verifier from the configured trust material.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mode = match config.trust_material()? {
            TrustMaterial::SharedSecret(secret) => VerifierMode::SharedSecret {
                decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            },
            TrustMaterial::JwksEndpoint(url) => VerifierMode::Jwks { url },
        };

        tracing::info!(
            issuer = %config.auth_issuer,
            audience = %config.auth_audience,
            jwks = config.auth_jwks_url.is_some(),
            "Initialized token verifier"
        );

        Self::with_mode(config, mode)
    }

    /// Create a JWKS-mode verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_jwks(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static JWKS kid must not be empty");
        }

        Self::with_mode(
            config,
            VerifierMode::StaticJwks {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn with_mode(config: &Config, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        Ok(Self {
            http_client,
            expected_issuer: config.auth_issuer.clone(),
            expected_audience: config.auth_audience.clone(),
            mode,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    fn expected_algorithm(&self) -> Algorithm {
        match self.mode {
            VerifierMode::SharedSecret { .. } => Algorithm::HS256,
            VerifierMode::Jwks { .. } | VerifierMode::StaticJwks { .. } => Algorithm::RS256,
        }
    }

    /// Verify a raw bearer token and return its claim set.
    ///
    /// Checks, in order: the header parses and the algorithm matches the
    /// configured mode (tokens signed with any other algorithm are rejected
    /// outright, even if a key could verify them), the signature verifies,
    /// issuer and audience equal the configured values, and the expiry
    /// claim, when present, is strictly in the future. No storage access.
    pub async fn verify(&self, token: &str) -> Result<Claims, VerifyError> {
        let header = decode_header(token)
            .map_err(|e| VerifyError::Invalid(format!("invalid JWT header: {e}")))?;

        let expected_alg = self.expected_algorithm();
        if header.alg != expected_alg {
            return Err(VerifyError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let decoding_key = match &self.mode {
            VerifierMode::SharedSecret { decoding_key } => decoding_key.clone(),
            VerifierMode::Jwks { .. } | VerifierMode::StaticJwks { .. } => {
                let kid = header
                    .kid
                    .ok_or_else(|| VerifyError::Invalid("missing JWT kid".to_string()))?;
                self.decoding_key_for_kid(&kid).await?
            }
        };

        let mut validation = Validation::new(expected_alg);
        validation.set_required_spec_claims(&["iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        // Expiry must be strictly in the future.
        validation.leeway = 0;

        let token_data =
            decode::<Claims>(token, decoding_key.as_ref(), &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                    _ => VerifyError::Invalid(format!("JWT validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, VerifyError> {
        let jwks_url = match &self.mode {
            VerifierMode::StaticJwks {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(VerifyError::Invalid(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Jwks { url } => url.clone(),
            VerifierMode::SharedSecret { .. } => {
                return Err(VerifyError::Invalid(
                    "kid lookup in shared-secret mode".to_string(),
                ))
            }
        };

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(&jwks_url, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(VerifyError::Invalid(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, jwks_url: &str, force_refresh: bool) -> Result<(), VerifyError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = %jwks_url, "Refreshing JWKS cache");

        let response = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetch(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VerifyError::KeyFetch(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| VerifyError::KeyFetch(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }

            if jwk.kid.trim().is_empty() {
                continue;
            }

            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }

            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(VerifyError::KeyFetch(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}
