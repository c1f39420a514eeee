// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer authentication middleware.
//!
//! Three gates compose over the verifier and reconciler:
//! - [`require_auth`] rejects unless a valid credential reconciles
//! - [`optional_auth`] attaches the principal when it can, never rejects
//! - [`require_profile`] fails closed unless a profile record exists

use crate::error::AppError;
use crate::services::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires a valid bearer credential.
///
/// On success the [`AuthUser`] is inserted into the request extensions;
/// any failure (missing/invalid/expired credential, expired session,
/// storage error) surfaces as the corresponding error response.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user = authenticate_request(&state, request.headers()).await?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware that attaches the principal when validation succeeds.
///
/// Never rejects: a missing or invalid credential, and even a storage
/// failure during reconciliation, all fall through with no principal
/// attached.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate_request(&state, request.headers()).await {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
        }
        Err(err) => {
            tracing::debug!(error = %err, "Proceeding without principal");
        }
    }

    next.run(request).await
}

/// Secondary gate requiring a completed profile.
///
/// Must run after [`require_auth`]. Fails closed when no profile record
/// exists for the authenticated user; otherwise the [`Profile`] is
/// inserted into the request extensions for downstream handlers.
///
/// [`Profile`]: crate::models::Profile
pub async fn require_profile(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;

    let profile = state
        .db
        .get_profile(&user.id)
        .await?
        .ok_or(AppError::ProfileRequired)?;

    request.extensions_mut().insert(profile);

    Ok(next.run(request).await)
}

/// Verify the bearer credential and reconcile it into a principal.
async fn authenticate_request(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthUser, AppError> {
    let token = extract_bearer_token(headers.get(header::AUTHORIZATION))?;
    let claims = state.token_verifier.verify(token).await?;
    state.identity_service.authenticate(&claims).await
}

fn extract_bearer_token(auth_header: Option<&HeaderValue>) -> Result<&str, AppError> {
    let value = auth_header
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    let token = value.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    Ok(token)
}
