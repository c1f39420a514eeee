// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity reconciliation: align local user/session state with a verified
//! claim set.
//!
//! User auto-provisioning must happen before session creation: the session
//! record stores a resolved user id, never a raw claim. Both create steps
//! are idempotent under races: storage-level document-ID uniqueness is the
//! arbiter, and a losing insert falls back to re-reading.

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Preferences, Session, User};
use crate::services::token_verifier::Claims;
use crate::time_utils::format_utc_rfc3339;
use chrono::{TimeZone, Utc};

/// Authenticated principal attached to the request context.
///
/// `role` always comes fresh from the presented token, never from storage.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub session_id: Option<String>,
    /// Token-supplied user metadata plus the derived `has_profile` flag
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Reconciles verified claims against local user and session records.
#[derive(Clone)]
pub struct IdentityService {
    db: FirestoreDb,
    track_sessions: bool,
    default_timezone: String,
    default_language: String,
}

impl IdentityService {
    pub fn new(db: FirestoreDb, config: &Config) -> Self {
        Self {
            db,
            track_sessions: config.track_sessions,
            default_timezone: config.default_timezone.clone(),
            default_language: config.default_language.clone(),
        }
    }

    /// Reconcile a verified claim set into an [`AuthUser`].
    ///
    /// Provisions the user (with default preferences) on first sight,
    /// resolves or creates the session record when session tracking is on,
    /// and rejects sessions whose server-side expiry has passed.
    pub async fn authenticate(&self, claims: &Claims) -> Result<AuthUser, AppError> {
        let now = Utc::now();

        let user = match self.db.get_user(&claims.sub).await? {
            Some(user) => user,
            None => self.provision_user(claims, now).await?,
        };

        if self.track_sessions {
            if let Some(session_id) = &claims.session_id {
                self.resolve_session(claims, &user, session_id, now).await?;
            }
        }

        let has_profile = self.db.get_profile(&user.id).await?.is_some();

        let mut metadata = match &claims.user_metadata {
            Some(serde_json::Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };
        metadata.insert("has_profile".to_string(), serde_json::Value::Bool(has_profile));

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            phone: user.phone,
            role: claims.role.clone(),
            session_id: claims.session_id.clone(),
            metadata,
        })
    }

    /// Create the user and its default preferences on first sight.
    ///
    /// A concurrent creator winning the insert is not an error; we re-read.
    async fn provision_user(
        &self,
        claims: &Claims,
        now: chrono::DateTime<Utc>,
    ) -> Result<User, AppError> {
        let user = User {
            id: claims.sub.clone(),
            email: claims.email.clone().unwrap_or_default(),
            phone: claims.phone.clone(),
            created_at: format_utc_rfc3339(now),
        };
        let preferences =
            Preferences::defaults(&user.id, &self.default_timezone, &self.default_language);

        if self
            .db
            .create_user_with_preferences(&user, &preferences)
            .await?
        {
            return Ok(user);
        }

        self.db.get_user(&claims.sub).await?.ok_or_else(|| {
            AppError::Database("user missing after losing creation race".to_string())
        })
    }

    /// Resolve the claim's session against the session store.
    async fn resolve_session(
        &self,
        claims: &Claims,
        user: &User,
        session_id: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(session) = self.db.get_session(session_id).await? {
            return check_active(&session, now);
        }

        // A session-bearing credential with no expiry would create a session
        // that is dead on arrival; reject it instead.
        let Some(exp) = claims.exp else {
            tracing::warn!(
                user_id = %user.id,
                "Session-bearing token without exp claim"
            );
            return Err(AppError::InvalidToken);
        };
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(AppError::InvalidToken)?;

        let session = Session {
            jwt_id: session_id.to_string(),
            user_id: user.id.clone(),
            expires_at: format_utc_rfc3339(expires_at),
            created_at: format_utc_rfc3339(now),
        };

        if self.db.create_session(&session).await? {
            return Ok(());
        }

        // Lost the insert race; the winner's record is authoritative.
        let session = self.db.get_session(session_id).await?.ok_or_else(|| {
            AppError::Database("session missing after losing creation race".to_string())
        })?;
        check_active(&session, now)
    }
}

fn check_active(session: &Session, now: chrono::DateTime<Utc>) -> Result<(), AppError> {
    if session.is_active(now) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %session.user_id,
            jwt_id = %session.jwt_id,
            "Rejecting expired session"
        );
        Err(AppError::SessionExpired)
    }
}
