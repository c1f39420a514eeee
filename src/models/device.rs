// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device model: a push-notification endpoint registered by a client.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Client platform a device runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

/// A registered device. The provider-assigned device identifier is unique
/// across all users (it is the document ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Device {
    pub device_id: String,
    pub user_id: String,
    pub platform: Platform,
    pub push_token: Option<String>,
    pub last_seen_at: String,
    pub created_at: String,
    /// Set when the device was revoked; cleared on re-registration
    pub revoked_at: Option<String>,
}

/// Device registration request payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DeviceRegistration {
    pub platform: Platform,
    #[validate(length(min = 1, max = 255))]
    pub device_id: String,
    #[validate(length(max = 4096))]
    pub push_token: Option<String>,
}
