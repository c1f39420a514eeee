// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes for authenticated users.

use crate::error::{AppError, Result};
use crate::models::{
    Device, DeviceRegistration, Preferences, PreferencesPatch, Profile, ProfilePatch,
};
use crate::services::AuthUser;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Account routes (require authentication via bearer token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/auth/me", get(get_me))
        .route("/api/v1/auth/profile", post(upsert_profile).put(upsert_profile))
        .route("/api/v1/auth/preferences", put(update_preferences))
        .route("/api/v1/auth/sessions", get(list_sessions))
        .route("/api/v1/auth/sessions/revoke-others", post(revoke_other_sessions))
        .route("/api/v1/auth/sessions/{session_id}", delete(revoke_session))
        .route("/api/v1/auth/devices", post(register_device))
}

// ─── Current User ────────────────────────────────────────────

/// Current user response with one-to-one relations.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    /// Role from the presented token, not from storage
    pub role: Option<String>,
    /// Token-supplied user metadata plus the derived `has_profile` flag
    #[cfg_attr(
        feature = "binding-generation",
        ts(type = "Record<string, unknown>")
    )]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub profile: Option<Profile>,
    pub preferences: Option<Preferences>,
    pub devices: Vec<Device>,
}

/// Get the current user with profile, preferences and devices.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let overview = state.account_service.account_overview(&user.id).await?;

    Ok(Json(MeResponse {
        id: overview.user.id,
        email: overview.user.email,
        phone: overview.user.phone,
        role: user.role,
        metadata: user.metadata,
        profile: overview.profile,
        preferences: overview.preferences,
        devices: overview.devices,
    }))
}

// ─── Profile & Preferences ───────────────────────────────────

/// Create or partially update the caller's profile.
///
/// Creation requires both name fields; updates merge only the supplied
/// fields.
async fn upsert_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>> {
    patch
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let profile = state.account_service.upsert_profile(&user.id, &patch).await?;
    Ok(Json(profile))
}

/// Partially update the caller's preferences.
async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(patch): Json<PreferencesPatch>,
) -> Result<Json<Preferences>> {
    patch
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let preferences = state
        .account_service
        .update_preferences(&user.id, &patch)
        .await?;
    Ok(Json(preferences))
}

// ─── Sessions ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub session_id: String,
    pub expires_at: String,
    pub created_at: String,
    /// Whether this is the session the request was made with
    pub current: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionResponse>,
}

/// List the caller's active sessions, newest-created first.
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionsResponse>> {
    let sessions = state.account_service.list_sessions(&user.id).await?;

    let sessions = sessions
        .into_iter()
        .map(|session| SessionResponse {
            current: Some(session.jwt_id.as_str()) == user.session_id.as_deref(),
            session_id: session.jwt_id,
            expires_at: session.expires_at,
            created_at: session.created_at,
        })
        .collect();

    Ok(Json(SessionsResponse { sessions }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RevokeResponse {
    pub success: bool,
    /// Number of sessions revoked
    pub revoked: u32,
}

/// Revoke one of the caller's sessions.
///
/// Returns 404 when the session does not belong to the caller, without
/// revealing whether the identifier exists for another user.
async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<RevokeResponse>> {
    state
        .account_service
        .revoke_session(&user.id, &session_id)
        .await?;

    Ok(Json(RevokeResponse {
        success: true,
        revoked: 1,
    }))
}

/// Revoke all of the caller's sessions except the current one.
async fn revoke_other_sessions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RevokeResponse>> {
    let revoked = state
        .account_service
        .revoke_other_sessions(&user.id, user.session_id.as_deref())
        .await?;

    Ok(Json(RevokeResponse {
        success: true,
        revoked: revoked as u32,
    }))
}

// ─── Devices ─────────────────────────────────────────────────

/// Register a push-notification device for the caller.
///
/// Re-registering a known device identifier refreshes its push token
/// instead of creating a duplicate.
async fn register_device(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(registration): Json<DeviceRegistration>,
) -> Result<Json<Device>> {
    registration
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let device = state
        .account_service
        .register_device(&user.id, registration)
        .await?;
    Ok(Json(device))
}
