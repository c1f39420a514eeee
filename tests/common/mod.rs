// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use coach_api::config::Config;
use coach_api::db::FirestoreDb;
use coach_api::routes::create_router;
use coach_api::services::{AccountService, IdentityService, TokenVerifier};
use coach_api::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Generate a unique subject identifier for test isolation.
#[allow(dead_code)]
pub fn unique_subject() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("user-{}", nanos)
}

/// Claim set matching what the identity provider issues.
#[derive(Serialize, Clone)]
#[allow(dead_code)]
pub struct TestClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
    pub iss: String,
    pub aud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub iat: i64,
}

#[allow(dead_code)]
impl TestClaims {
    /// A valid claim set for the given subject, expiring in an hour.
    pub fn new(config: &Config, sub: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: sub.to_string(),
            email: Some(format!("{}@example.com", sub)),
            phone: None,
            role: Some("authenticated".to_string()),
            session_id: None,
            user_metadata: None,
            iss: config.auth_issuer.clone(),
            aud: config.auth_audience.clone(),
            exp: Some(now + 3600),
            iat: now,
        }
    }

    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn without_exp(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn expired(mut self) -> Self {
        let now = chrono::Utc::now().timestamp();
        self.exp = Some(now - 3600);
        self.iat = now - 7200;
        self
    }

    pub fn with_issuer(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    pub fn with_audience(mut self, aud: &str) -> Self {
        self.aud = aud.to_string();
        self
    }
}

/// Sign a claim set with the test config's shared secret.
#[allow(dead_code)]
pub fn mint_token(config: &Config, claims: &TestClaims) -> String {
    let secret = config
        .auth_jwt_secret
        .as_ref()
        .expect("test config uses a shared secret");
    mint_token_with_secret(secret, claims)
}

/// Sign a claim set with an arbitrary secret (for tamper tests).
#[allow(dead_code)]
pub fn mint_token_with_secret(secret: &str, claims: &TestClaims) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test JWT")
}

/// Build an app and its state from the given config and database.
#[allow(dead_code)]
pub fn build_app(config: Config, db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let token_verifier =
        Arc::new(TokenVerifier::new(&config).expect("Failed to initialize token verifier"));
    let identity_service = IdentityService::new(db.clone(), &config);
    let account_service = AccountService::new(db.clone(), &config);

    let state = Arc::new(AppState {
        config,
        db,
        token_verifier,
        identity_service,
        account_service,
    });

    (create_router(state.clone()), state)
}

/// Create a test app with an offline mock database.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_db_offline())
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_db().await)
}
