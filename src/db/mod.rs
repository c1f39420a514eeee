// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PROFILES: &str = "profiles";
    pub const PREFERENCES: &str = "preferences";
    pub const SESSIONS: &str = "sessions";
    pub const DEVICES: &str = "devices";
}
