// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models shared between storage and the API.

pub mod device;
pub mod session;
pub mod user;

pub use device::{Device, DeviceRegistration, Platform};
pub use session::Session;
pub use user::{
    ExperienceLevel, GoalType, Preferences, PreferencesPatch, Profile, ProfilePatch, Sex,
    UnitSystem, User,
};
