//! Application error types.
//!
//! Every component error converts into [`LauncherError`], whose
//! [`ErrorKind`] is what the UI receives alongside the message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::auth::AuthError;
use crate::launch::LaunchError;
use crate::manager::ManagerError;
use crate::runtime::RuntimeError;
use crate::settings::SettingsError;

/// Structured failure kind, serializable for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidState,
    ExchangeFailed,
    IntegrityMismatch,
    PathTraversal,
    DownloadFailed,
    RuntimeUnavailable,
    AlreadyRunning,
    NotAuthenticated,
    ContentIncomplete,
    /// Token store or content-state store fault.
    Storage,
    InvalidConfig,
    Network,
    Cancelled,
    Internal,
}

impl From<&ManagerError> for ErrorKind {
    fn from(e: &ManagerError) -> Self {
        match e {
            ManagerError::IntegrityMismatch { .. } => Self::IntegrityMismatch,
            ManagerError::PathTraversal { .. } => Self::PathTraversal,
            ManagerError::DownloadFailed { .. } => Self::DownloadFailed,
            ManagerError::StateStorage { .. } => Self::Storage,
            ManagerError::VersionNotFound(_) | ManagerError::InvalidConfig(_) => {
                Self::InvalidConfig
            }
            ManagerError::Cancelled => Self::Cancelled,
            ManagerError::CatalogFetchFailed { .. }
            | ManagerError::ManifestFetchFailed { .. }
            | ManagerError::Transport { .. }
            | ManagerError::HttpStatus { .. }
            | ManagerError::Timeout { .. } => Self::Network,
            ManagerError::CatalogParseFailed { .. } | ManagerError::ManifestParseFailed { .. } => {
                Self::DownloadFailed
            }
            ManagerError::ExtractionFailed { .. } => Self::DownloadFailed,
            ManagerError::ReadFailed { .. }
            | ManagerError::WriteFailed { .. }
            | ManagerError::CreateDirFailed { .. } => Self::Internal,
        }
    }
}

impl From<&AuthError> for ErrorKind {
    fn from(e: &AuthError) -> Self {
        match e {
            AuthError::InvalidState | AuthError::MalformedCallback(_) => Self::InvalidState,
            AuthError::ProviderRejected { .. } | AuthError::ExchangeFailed { .. } => {
                Self::ExchangeFailed
            }
            AuthError::Network { .. } | AuthError::Timeout { .. } => Self::Network,
            AuthError::Storage { .. } => Self::Storage,
            AuthError::NotAuthenticated => Self::NotAuthenticated,
        }
    }
}

impl From<&ArchiveError> for ErrorKind {
    fn from(e: &ArchiveError) -> Self {
        if matches!(e, ArchiveError::PathTraversal { .. }) {
            Self::PathTraversal
        } else {
            Self::DownloadFailed
        }
    }
}

impl From<&RuntimeError> for ErrorKind {
    fn from(e: &RuntimeError) -> Self {
        match e {
            RuntimeError::Download(inner) => Self::from(inner),
            _ => Self::RuntimeUnavailable,
        }
    }
}

/// Top-level error returned by the command facade.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Content(#[from] ManagerError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(e) => ErrorKind::from(e),
            Self::Archive(e) => ErrorKind::from(e),
            Self::Content(e) => ErrorKind::from(e),
            Self::Runtime(e) => ErrorKind::from(e),
            Self::Launch(e) => e.kind(),
            Self::Settings(SettingsError::Invalid(_)) => ErrorKind::InvalidConfig,
            Self::Settings(_) => ErrorKind::Storage,
        }
    }

    /// Whether the failure is an unrecoverable store fault rather than
    /// something a retry could fix.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ExchangeHop;
    use crate::launch::Phase;
    use std::path::PathBuf;

    #[test]
    fn test_kinds() {
        let err: LauncherError = AuthError::InvalidState.into();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err: LauncherError = AuthError::ExchangeFailed {
            hop: ExchangeHop::Xsts,
            reason: "no account".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ExchangeFailed);
        assert!(err.to_string().contains("xsts"));

        let err: LauncherError = ManagerError::IntegrityMismatch {
            entry: "mods/a.jar".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);

        let err: LauncherError = LaunchError::AlreadyRunning {
            operation: "pack".into(),
            phase: Phase::Running,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_storage_faults_are_fatal() {
        let err: LauncherError = AuthError::Storage {
            path: PathBuf::from("/x/tokens.json"),
            reason: "disk full".into(),
        }
        .into();
        assert!(err.is_fatal());

        let err: LauncherError = ManagerError::StateStorage {
            path: PathBuf::from("/x/content-state.json"),
            reason: "corrupt".into(),
        }
        .into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_kind_wire_name() {
        let json = serde_json::to_string(&ErrorKind::RuntimeUnavailable).unwrap();
        assert_eq!(json, "\"runtime_unavailable\"");
    }
}
