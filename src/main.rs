// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coach API Server
//!
//! Authenticates requests against the external identity provider and
//! serves the account surface (profile, preferences, sessions, devices).

use coach_api::{
    config::Config,
    db::FirestoreDb,
    services::{AccountService, IdentityService, TokenVerifier},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Coach API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    let token_verifier =
        Arc::new(TokenVerifier::new(&config).expect("Failed to initialize token verifier"));

    let identity_service = IdentityService::new(db.clone(), &config);
    let account_service = AccountService::new(db.clone(), &config);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        token_verifier,
        identity_service,
        account_service,
    });

    // Build router
    let app = coach_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("coach_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
