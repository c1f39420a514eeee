// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod identity;
pub mod token_verifier;

pub use account::{AccountOverview, AccountService};
pub use identity::{AuthUser, IdentityService};
pub use token_verifier::{Claims, TokenVerifier, VerifyError};
