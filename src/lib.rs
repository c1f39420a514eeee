// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Coach API: authentication, session and account backend.
//!
//! This crate validates bearer tokens issued by the external identity
//! provider, lazily provisions local user records, tracks server-side
//! session validity independent of token expiry, and serves the per-user
//! profile, preference, session and device resources.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{AccountService, IdentityService, TokenVerifier};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub token_verifier: Arc<TokenVerifier>,
    pub identity_service: IdentityService,
    pub account_service: AccountService,
}
