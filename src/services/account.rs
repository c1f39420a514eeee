// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account operations: the capability surface an authenticated principal
//! holds over its own profile, preferences, sessions and devices.

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{
    Device, DeviceRegistration, Preferences, PreferencesPatch, Profile, ProfilePatch, Session,
    User,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;

/// The current user record together with its one-to-one relations.
#[derive(Debug, Clone)]
pub struct AccountOverview {
    pub user: User,
    pub profile: Option<Profile>,
    pub preferences: Option<Preferences>,
    pub devices: Vec<Device>,
}

/// Business operations over a user's own account data.
#[derive(Clone)]
pub struct AccountService {
    db: FirestoreDb,
    default_timezone: String,
    default_language: String,
}

impl AccountService {
    pub fn new(db: FirestoreDb, config: &Config) -> Self {
        Self {
            db,
            default_timezone: config.default_timezone.clone(),
            default_language: config.default_language.clone(),
        }
    }

    /// Fetch the user with profile, preferences and unrevoked devices.
    pub async fn account_overview(&self, user_id: &str) -> Result<AccountOverview, AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let profile = self.db.get_profile(user_id).await?;
        let preferences = self.db.get_preferences(user_id).await?;
        let devices = self.db.list_active_devices(user_id).await?;

        Ok(AccountOverview {
            user,
            profile,
            preferences,
            devices,
        })
    }

    /// Create or partially update the user's profile.
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, AppError> {
        self.db.upsert_profile(user_id, patch).await
    }

    /// Partially update the user's preferences.
    ///
    /// The provisioning defaults serve as the base when the record is
    /// missing, so a crashed user creation heals here.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencesPatch,
    ) -> Result<Preferences, AppError> {
        let base = Preferences::defaults(user_id, &self.default_timezone, &self.default_language);
        self.db.update_preferences(base, patch).await
    }

    /// List the user's active sessions, newest-created first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        self.db.list_active_sessions(user_id).await
    }

    /// Soft-revoke one of the user's sessions.
    pub async fn revoke_session(&self, user_id: &str, jwt_id: &str) -> Result<(), AppError> {
        self.db.revoke_session(user_id, jwt_id).await
    }

    /// Soft-revoke all of the user's sessions except the current one.
    ///
    /// With no current session identifier, every session is revoked.
    pub async fn revoke_other_sessions(
        &self,
        user_id: &str,
        current_jwt_id: Option<&str>,
    ) -> Result<usize, AppError> {
        self.db.revoke_other_sessions(user_id, current_jwt_id).await
    }

    /// Register a push-notification device, upserting by device identifier.
    pub async fn register_device(
        &self,
        user_id: &str,
        registration: DeviceRegistration,
    ) -> Result<Device, AppError> {
        let now = format_utc_rfc3339(Utc::now());
        let device = Device {
            device_id: registration.device_id,
            user_id: user_id.to_string(),
            platform: registration.platform,
            push_token: registration.push_token,
            last_seen_at: now.clone(),
            created_at: now,
            revoked_at: None,
        };

        self.db.register_device(device).await
    }
}
