// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User, profile and preference models.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// A local user record, lazily provisioned from a verified token.
///
/// The identity provider's subject claim is the primary key (also used as
/// the document ID); this subsystem never generates user identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned subject identifier
    pub id: String,
    /// Email address (empty when the provider did not share one)
    pub email: String,
    /// Phone number, if shared
    pub phone: Option<String>,
    /// When the user was first seen
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    WeightLoss,
    MuscleGain,
    Endurance,
    GeneralFitness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

/// Per-user training profile (one-to-one with [`User`], keyed by user ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub user_id: String,
    pub firstname: String,
    pub lastname: String,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub experience_level: Option<ExperienceLevel>,
    pub health_notes: Option<String>,
    pub goal_type: Option<GoalType>,
    pub unit_system: Option<UnitSystem>,
}

/// Partial profile write. Absent fields are left untouched on update;
/// the name fields are mandatory only when the write creates the profile.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfilePatch {
    #[validate(length(min = 1, max = 100))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub lastname: Option<String>,
    pub sex: Option<Sex>,
    #[validate(range(min = 100.0, max = 250.0))]
    pub height_cm: Option<f64>,
    #[validate(range(min = 30.0, max = 300.0))]
    pub weight_kg: Option<f64>,
    pub experience_level: Option<ExperienceLevel>,
    #[validate(length(max = 2000))]
    pub health_notes: Option<String>,
    pub goal_type: Option<GoalType>,
    pub unit_system: Option<UnitSystem>,
}

impl ProfilePatch {
    /// Apply the supplied fields on top of an existing profile.
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(firstname) = &self.firstname {
            profile.firstname = firstname.clone();
        }
        if let Some(lastname) = &self.lastname {
            profile.lastname = lastname.clone();
        }
        if let Some(sex) = self.sex {
            profile.sex = Some(sex);
        }
        if let Some(height_cm) = self.height_cm {
            profile.height_cm = Some(height_cm);
        }
        if let Some(weight_kg) = self.weight_kg {
            profile.weight_kg = Some(weight_kg);
        }
        if let Some(experience_level) = self.experience_level {
            profile.experience_level = Some(experience_level);
        }
        if let Some(health_notes) = &self.health_notes {
            profile.health_notes = Some(health_notes.clone());
        }
        if let Some(goal_type) = self.goal_type {
            profile.goal_type = Some(goal_type);
        }
        if let Some(unit_system) = self.unit_system {
            profile.unit_system = Some(unit_system);
        }
    }
}

/// Per-user preferences, created together with the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Preferences {
    pub user_id: String,
    pub timezone: String,
    pub unit_system: UnitSystem,
    pub voice_enabled: bool,
    pub tts_voice: Option<String>,
    pub language: String,
    pub notif_push: bool,
    pub notif_email: bool,
    pub notif_sms: bool,
}

impl Preferences {
    /// Defaults assigned at user creation.
    pub fn defaults(user_id: &str, timezone: &str, language: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            timezone: timezone.to_string(),
            unit_system: UnitSystem::Metric,
            voice_enabled: true,
            tts_voice: None,
            language: language.to_string(),
            notif_push: true,
            notif_email: false,
            notif_sms: false,
        }
    }
}

/// Partial preference update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PreferencesPatch {
    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
    pub unit_system: Option<UnitSystem>,
    pub voice_enabled: Option<bool>,
    #[validate(length(max = 64))]
    pub tts_voice: Option<String>,
    #[validate(length(min = 2, max = 16))]
    pub language: Option<String>,
    pub notif_push: Option<bool>,
    pub notif_email: Option<bool>,
    pub notif_sms: Option<bool>,
}

impl PreferencesPatch {
    /// Apply the supplied fields on top of existing preferences.
    pub fn apply(&self, preferences: &mut Preferences) {
        if let Some(timezone) = &self.timezone {
            preferences.timezone = timezone.clone();
        }
        if let Some(unit_system) = self.unit_system {
            preferences.unit_system = unit_system;
        }
        if let Some(voice_enabled) = self.voice_enabled {
            preferences.voice_enabled = voice_enabled;
        }
        if let Some(tts_voice) = &self.tts_voice {
            preferences.tts_voice = Some(tts_voice.clone());
        }
        if let Some(language) = &self.language {
            preferences.language = language.clone();
        }
        if let Some(notif_push) = self.notif_push {
            preferences.notif_push = notif_push;
        }
        if let Some(notif_email) = self.notif_email {
            preferences.notif_email = notif_email;
        }
        if let Some(notif_sms) = self.notif_sms {
            preferences.notif_sms = notif_sms;
        }
    }
}
