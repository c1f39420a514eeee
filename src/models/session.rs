// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session model: one provider-issued token's server-side validity window.

use crate::time_utils::parse_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked session, keyed by the provider's session/token identifier.
///
/// Revocation is soft: `expires_at` is moved to the revocation instant and
/// the record is kept. The token itself may still be within its own expiry;
/// the session record is what we consult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Provider-assigned session identifier (also the document ID)
    pub jwt_id: String,
    /// Owning user
    pub user_id: String,
    /// When this session stops being honored (RFC 3339)
    pub expires_at: String,
    /// When this session was first seen (RFC 3339)
    pub created_at: String,
}

impl Session {
    /// A session is active iff its expiry is strictly in the future.
    ///
    /// An unparseable expiry counts as inactive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match parse_utc_rfc3339(&self.expires_at) {
            Some(expires_at) => expires_at > now,
            None => {
                tracing::warn!(
                    jwt_id = %self.jwt_id,
                    expires_at = %self.expires_at,
                    "Session has malformed expiry; treating as inactive"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::format_utc_rfc3339;
    use chrono::Duration;

    fn session(expires_at: String) -> Session {
        Session {
            jwt_id: "s1".to_string(),
            user_id: "u1".to_string(),
            expires_at,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn active_requires_strictly_future_expiry() {
        let now = Utc::now();
        assert!(session(format_utc_rfc3339(now + Duration::hours(1))).is_active(now));
        assert!(!session(format_utc_rfc3339(now)).is_active(now));
        assert!(!session(format_utc_rfc3339(now - Duration::seconds(1))).is_active(now));
    }

    #[test]
    fn malformed_expiry_is_inactive() {
        assert!(!session("garbage".to_string()).is_active(Utc::now()));
    }
}
