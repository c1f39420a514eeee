// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything here is read once at startup and treated as immutable
//! process-wide state; nothing re-reads the environment per request.

use std::env;

/// Trust material used to verify incoming bearer tokens.
///
/// The identity provider either shares an HS256 secret with us, or publishes
/// rotating RS256 public keys at a JWKS endpoint. Exactly one is configured.
#[derive(Debug, Clone)]
pub enum TrustMaterial {
    /// Shared HS256 signing secret.
    SharedSecret(String),
    /// JWKS endpoint publishing RS256 public keys.
    JwksEndpoint(String),
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Expected `iss` claim, e.g. `https://<project>.example.com/auth/v1`
    pub auth_issuer: String,
    /// Expected `aud` claim
    pub auth_audience: String,
    /// Shared HS256 secret (mutually exclusive with `auth_jwks_url`)
    pub auth_jwt_secret: Option<String>,
    /// JWKS endpoint for RS256 keys (mutually exclusive with `auth_jwt_secret`)
    pub auth_jwks_url: Option<String>,
    /// Whether to track per-token sessions server-side
    pub track_sessions: bool,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Timezone assigned to newly created preference records
    pub default_timezone: String,
    /// Language assigned to newly created preference records
    pub default_language: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development, a `.env` file is honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            auth_issuer: env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?,
            auth_audience: env::var("AUTH_AUDIENCE")
                .unwrap_or_else(|_| "authenticated".to_string()),
            auth_jwt_secret: env::var("AUTH_JWT_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            auth_jwks_url: env::var("AUTH_JWKS_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            // Session tracking defaults on; only the literal "false" disables it.
            track_sessions: env::var("TRACK_SESSIONS").as_deref() != Ok("false"),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            default_timezone: env::var("DEFAULT_TIMEZONE")
                .unwrap_or_else(|_| "America/New_York".to_string()),
            default_language: env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
        };

        // Fail at startup, not on the first request.
        config.trust_material()?;

        Ok(config)
    }

    /// Resolve the configured trust material.
    ///
    /// Exactly one of the shared secret and the JWKS endpoint must be set.
    pub fn trust_material(&self) -> Result<TrustMaterial, ConfigError> {
        match (&self.auth_jwt_secret, &self.auth_jwks_url) {
            (Some(secret), None) => Ok(TrustMaterial::SharedSecret(secret.clone())),
            (None, Some(url)) => Ok(TrustMaterial::JwksEndpoint(url.clone())),
            (None, None) => Err(ConfigError::Missing("AUTH_JWT_SECRET or AUTH_JWKS_URL")),
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "AUTH_JWT_SECRET and AUTH_JWKS_URL are mutually exclusive",
            )),
        }
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            auth_issuer: "https://test-project.example.com/auth/v1".to_string(),
            auth_audience: "authenticated".to_string(),
            auth_jwt_secret: Some("test_jwt_secret_32_bytes_minimum!".to_string()),
            auth_jwks_url: None,
            track_sessions: true,
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            default_timezone: "America/New_York".to_string(),
            default_language: "en".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
