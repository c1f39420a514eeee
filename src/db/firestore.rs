// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides the four storage capability surfaces consumed by the auth layer:
//! - Users (point lookup/create by subject id)
//! - Sessions (point lookup by session id, create, list, revoke)
//! - Profiles & Preferences (point lookup, partial upsert)
//! - Devices (upsert by device id)
//!
//! Create-if-absent operations use create-only inserts so that document-ID
//! uniqueness is the arbiter under concurrent requests: a losing insert is
//! reported as "already exists" and the caller re-reads. Multi-step updates
//! run inside Firestore transactions.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Device, Preferences, PreferencesPatch, Profile, ProfilePatch, Session, User};
use crate::time_utils::format_utc_rfc3339;
use firestore::errors::FirestoreError;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by subject identifier.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a user together with its default preferences.
    ///
    /// The user insert is create-only; document-ID uniqueness decides races.
    /// Returns `false` when another request created the user first (callers
    /// re-read instead of failing). The preferences write is also create-only
    /// so a concurrent winner's defaults are never clobbered.
    pub async fn create_user_with_preferences(
        &self,
        user: &User,
        preferences: &Preferences,
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;

        let inserted: Result<(), FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await;

        match inserted {
            Ok(()) => {}
            Err(FirestoreError::DataConflictError(_)) => return Ok(false),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        let prefs_inserted: Result<(), FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::PREFERENCES)
            .document_id(&user.id)
            .object(preferences)
            .execute()
            .await;

        match prefs_inserted {
            Ok(()) => {}
            // Preferences already written (e.g. a crashed earlier attempt).
            Err(FirestoreError::DataConflictError(_)) => {}
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        tracing::info!(user_id = %user.id, "Provisioned user with default preferences");
        Ok(true)
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Get a session by its provider-assigned identifier.
    pub async fn get_session(&self, jwt_id: &str) -> Result<Option<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(&session_doc_id(jwt_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a session record (create-only).
    ///
    /// Returns `false` when the session identifier is already known; the
    /// caller re-reads and applies the usual expiry check.
    pub async fn create_session(&self, session: &Session) -> Result<bool, AppError> {
        let inserted: Result<(), FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::SESSIONS)
            .document_id(&session_doc_id(&session.jwt_id))
            .object(session)
            .execute()
            .await;

        match inserted {
            Ok(()) => {
                tracing::debug!(
                    user_id = %session.user_id,
                    jwt_id = %session.jwt_id,
                    "Session created"
                );
                Ok(true)
            }
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// List a user's active sessions, newest-created first.
    pub async fn list_active_sessions(&self, user_id: &str) -> Result<Vec<Session>, AppError> {
        let user_id = user_id.to_string();
        let now = format_utc_rfc3339(chrono::Utc::now());

        self.get_client()?
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("expires_at").greater_than(now.clone()),
                ])
            })
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Soft-revoke one of the user's sessions by setting its expiry to now.
    ///
    /// Returns `NotFound` when no session with that identifier belongs to
    /// the user; the caller cannot tell whether it exists for someone else.
    pub async fn revoke_session(&self, user_id: &str, jwt_id: &str) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let session: Option<Session> = client
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(&session_doc_id(jwt_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut session = match session {
            Some(session) if session.user_id == user_id => session,
            _ => {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound("Session not found".to_string()));
            }
        };

        session.expires_at = format_utc_rfc3339(chrono::Utc::now());

        client
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&session_doc_id(jwt_id))
            .object(&session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add revocation to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id = %user_id, jwt_id = %jwt_id, "Session revoked");
        Ok(())
    }

    /// Soft-revoke every session of the user except the current one.
    ///
    /// With no current session identifier, all of the user's sessions are
    /// revoked. Returns the number of sessions revoked.
    pub async fn revoke_other_sessions(
        &self,
        user_id: &str,
        current_jwt_id: Option<&str>,
    ) -> Result<usize, AppError> {
        let client = self.get_client()?;

        let owner = user_id.to_string();
        let sessions: Vec<Session> = client
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .filter(move |q| q.field("user_id").eq(owner.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let now = format_utc_rfc3339(chrono::Utc::now());
        let targets: Vec<Session> = sessions
            .into_iter()
            .filter(|session| Some(session.jwt_id.as_str()) != current_jwt_id)
            .map(|mut session| {
                session.expires_at = now.clone();
                session
            })
            .collect();

        for chunk in targets.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for session in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::SESSIONS)
                    .document_id(&session_doc_id(&session.jwt_id))
                    .object(session)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add revocation to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch revocation: {}", e))
            })?;
        }

        tracing::info!(
            user_id = %user_id,
            revoked = targets.len(),
            "Revoked other sessions"
        );
        Ok(targets.len())
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a user's profile.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or partially update a user's profile in one transaction.
    ///
    /// Creation requires both name fields; updates merge only the supplied
    /// fields, leaving the rest unchanged.
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing: Option<Profile> = client
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let profile = match existing {
            Some(mut profile) => {
                patch.apply(&mut profile);
                profile
            }
            None => {
                let (Some(firstname), Some(lastname)) = (&patch.firstname, &patch.lastname) else {
                    let _ = transaction.rollback().await;
                    return Err(AppError::BadRequest(
                        "firstname and lastname are required to create a profile".to_string(),
                    ));
                };
                Profile {
                    user_id: user_id.to_string(),
                    firstname: firstname.clone(),
                    lastname: lastname.clone(),
                    sex: patch.sex,
                    height_cm: patch.height_cm,
                    weight_kg: patch.weight_kg,
                    experience_level: patch.experience_level,
                    health_notes: patch.health_notes.clone(),
                    goal_type: patch.goal_type,
                    unit_system: patch.unit_system,
                }
            }
        };

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(user_id)
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(profile)
    }

    // ─── Preference Operations ───────────────────────────────────

    /// Get a user's preferences.
    pub async fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PREFERENCES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Partially update preferences in one transaction.
    ///
    /// `base` carries the provisioning defaults; a missing record (possible
    /// after a crashed user creation) is healed rather than rejected.
    pub async fn update_preferences(
        &self,
        base: Preferences,
        patch: &PreferencesPatch,
    ) -> Result<Preferences, AppError> {
        let client = self.get_client()?;
        let user_id = base.user_id.clone();

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing: Option<Preferences> = client
            .fluent()
            .select()
            .by_id_in(collections::PREFERENCES)
            .obj()
            .one(&user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut preferences = existing.unwrap_or(base);
        patch.apply(&mut preferences);

        client
            .fluent()
            .update()
            .in_col(collections::PREFERENCES)
            .document_id(&user_id)
            .object(&preferences)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add preferences to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(preferences)
    }

    // ─── Device Operations ───────────────────────────────────────

    /// Get a device by its provider-assigned identifier.
    pub async fn get_device(&self, device_id: &str) -> Result<Option<Device>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DEVICES)
            .obj()
            .one(&device_doc_id(device_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Register a device, upserting by device identifier in one transaction.
    ///
    /// Device identifiers are globally unique: re-registration refreshes the
    /// push token and last-seen timestamp and clears any prior revocation,
    /// keeping the original owner, platform and creation time.
    pub async fn register_device(&self, device: Device) -> Result<Device, AppError> {
        let client = self.get_client()?;
        let doc_id = device_doc_id(&device.device_id);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let existing: Option<Device> = client
            .fluent()
            .select()
            .by_id_in(collections::DEVICES)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let device = match existing {
            Some(mut known) => {
                known.push_token = device.push_token;
                known.last_seen_at = device.last_seen_at;
                known.revoked_at = None;
                known
            }
            None => device,
        };

        client
            .fluent()
            .update()
            .in_col(collections::DEVICES)
            .document_id(&doc_id)
            .object(&device)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add device to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            user_id = %device.user_id,
            device_id = %device.device_id,
            "Device registered"
        );
        Ok(device)
    }

    /// List a user's devices that have not been revoked.
    pub async fn list_active_devices(&self, user_id: &str) -> Result<Vec<Device>, AppError> {
        let owner = user_id.to_string();
        let devices: Vec<Device> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DEVICES)
            .filter(move |q| q.field("user_id").eq(owner.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(devices
            .into_iter()
            .filter(|device| device.revoked_at.is_none())
            .collect())
    }
}

/// Session document ID from the provider's session identifier.
fn session_doc_id(jwt_id: &str) -> String {
    urlencoding::encode(jwt_id).into_owned()
}

/// Device document ID from the client-supplied device identifier.
fn device_doc_id(device_id: &str) -> String {
    urlencoding::encode(device_id).into_owned()
}
