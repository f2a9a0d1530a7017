//! Error types for the identity flow.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for identity operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// One hop of the token exchange chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeHop {
    AuthorizationCode,
    RefreshToken,
    XboxLive,
    Xsts,
    GameService,
    Profile,
}

impl ExchangeHop {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization-code",
            Self::RefreshToken => "refresh-token",
            Self::XboxLive => "xbox-live",
            Self::Xsts => "xsts",
            Self::GameService => "game-service",
            Self::Profile => "profile",
        }
    }
}

impl fmt::Display for ExchangeHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by the identity manager.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Callback state is unknown, expired or was already consumed.
    #[error("Login state is unknown, expired or already used")]
    InvalidState,

    /// Callback URI could not be interpreted.
    #[error("Malformed callback: {0}")]
    MalformedCallback(String),

    /// The identity provider returned an error instead of a code.
    #[error("Identity provider rejected the login: {error}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    ProviderRejected {
        error: String,
        description: Option<String>,
    },

    /// A hop of the exchange chain failed.
    #[error("Token exchange failed at {hop}: {reason}")]
    ExchangeFailed { hop: ExchangeHop, reason: String },

    /// A hop could not reach its service.
    #[error("Network failure at {hop}: {reason}")]
    Network { hop: ExchangeHop, reason: String },

    /// The exchange chain did not finish in time.
    #[error("Token exchange timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Token storage could not be read or written.
    #[error("Token storage failure at {path}: {reason}")]
    Storage { path: PathBuf, reason: String },

    /// No valid session for the subject.
    #[error("Not signed in")]
    NotAuthenticated,
}

impl AuthError {
    pub(crate) fn exchange(hop: ExchangeHop, reason: impl fmt::Display) -> Self {
        Self::ExchangeFailed {
            hop,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn storage(path: &std::path::Path, error: impl fmt::Display) -> Self {
        Self::Storage {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }

    /// Map a transport error, keeping timeouts and connection failures apart
    /// from responses the service actually sent.
    pub(crate) fn transport(hop: ExchangeHop, error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            Self::Network {
                hop,
                reason: error.to_string(),
            }
        } else {
            Self::exchange(hop, error)
        }
    }

    /// Whether the failure came from the network rather than a rejection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}
