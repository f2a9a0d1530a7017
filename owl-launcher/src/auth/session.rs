//! Session token types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current time as Unix seconds.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A stored game session for one subject.
///
/// The refresh handle belongs to the identity provider and never leaves the
/// identity manager; see [`AuthToken`] for what the UI receives.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Game access token.
    pub access_token: String,
    /// Per-install client identifier.
    pub client_token: String,
    /// Subject identifier (game profile id).
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Unix seconds after which the access token is no longer valid.
    pub expires_at: i64,
    /// Provider refresh handle, if the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl SessionToken {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }

    /// The UI-facing view of this session.
    pub fn to_public(&self) -> AuthToken {
        AuthToken {
            access_token: self.access_token.clone(),
            client_token: self.client_token.clone(),
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("expires_at", &self.expires_at)
            .field("has_refresh", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Session as returned to the UI.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub client_token: String,
    pub uuid: String,
    pub name: String,
    pub expires_at: i64,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
