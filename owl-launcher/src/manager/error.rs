//! Error types for the content manager.

use std::io;
use std::path::PathBuf;

use crate::archive::ArchiveError;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while fetching catalogs or syncing content.
#[derive(Debug)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to fetch the package catalog.
    CatalogFetchFailed { url: String, reason: String },

    /// Failed to parse the package catalog.
    CatalogParseFailed { url: String, reason: String },

    /// Failed to fetch a package file manifest.
    ManifestFetchFailed { url: String, reason: String },

    /// Failed to parse a package file manifest.
    ManifestParseFailed { url: String, reason: String },

    /// Transport failure while downloading; retried by the engine.
    Transport { url: String, reason: String },

    /// Server answered with a non-success status.
    HttpStatus { url: String, status: u16 },

    /// Network timeout.
    Timeout { url: String, timeout_secs: u64 },

    /// A file could not be downloaded after all attempts.
    DownloadFailed { entry: String, reason: String },

    /// Downloaded bytes did not match the declared digest.
    IntegrityMismatch {
        entry: String,
        expected: String,
        actual: String,
    },

    /// A manifest path or archive entry escapes its destination.
    PathTraversal { entry: String },

    /// Archive extraction failed.
    ExtractionFailed { path: PathBuf, reason: String },

    /// The requested game version does not exist.
    VersionNotFound(String),

    /// The installed-content index could not be read or written.
    StateStorage { path: PathBuf, reason: String },

    /// Invalid configuration.
    InvalidConfig(String),

    /// The operation was cancelled.
    Cancelled,
}

impl ManagerError {
    /// Whether another attempt at the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::CatalogFetchFailed { url, reason } => {
                write!(f, "failed to fetch modpack list from {}: {}", url, reason)
            }
            Self::CatalogParseFailed { url, reason } => {
                write!(f, "failed to parse modpack list from {}: {}", url, reason)
            }
            Self::ManifestFetchFailed { url, reason } => {
                write!(f, "failed to fetch file manifest from {}: {}", url, reason)
            }
            Self::ManifestParseFailed { url, reason } => {
                write!(f, "failed to parse file manifest from {}: {}", url, reason)
            }
            Self::Transport { url, reason } => {
                write!(f, "request to {} failed: {}", url, reason)
            }
            Self::HttpStatus { url, status } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            Self::Timeout { url, timeout_secs } => {
                write!(f, "request to {} timed out after {}s", url, timeout_secs)
            }
            Self::DownloadFailed { entry, reason } => {
                write!(f, "failed to download {}: {}", entry, reason)
            }
            Self::IntegrityMismatch {
                entry,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "integrity check failed for {}: expected {}, got {}",
                    entry, expected, actual
                )
            }
            Self::PathTraversal { entry } => {
                write!(f, "refusing path outside the install directory: {}", entry)
            }
            Self::ExtractionFailed { path, reason } => {
                write!(f, "failed to extract {}: {}", path.display(), reason)
            }
            Self::VersionNotFound(version) => write!(f, "unknown game version: {}", version),
            Self::StateStorage { path, reason } => {
                write!(
                    f,
                    "installed content index at {} is unusable: {}",
                    path.display(),
                    reason
                )
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ArchiveError> for ManagerError {
    fn from(error: ArchiveError) -> Self {
        match error {
            ArchiveError::ReadFailed { path, source } => Self::ReadFailed { path, source },
            ArchiveError::WriteFailed { path, source } => Self::WriteFailed { path, source },
            ArchiveError::CreateDirFailed { path, source } => Self::CreateDirFailed { path, source },
            ArchiveError::ChecksumMismatch {
                filename,
                expected,
                actual,
            } => Self::IntegrityMismatch {
                entry: filename,
                expected,
                actual,
            },
            ArchiveError::PathTraversal { entry } => Self::PathTraversal { entry },
            ArchiveError::ExtractionFailed { path, reason } => {
                Self::ExtractionFailed { path, reason }
            }
            ArchiveError::UnsupportedFormat(name) => Self::ExtractionFailed {
                path: PathBuf::from(&name),
                reason: "unsupported archive format".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let url = || "https://cdn.test/a.jar".to_string();
        assert!(ManagerError::Transport {
            url: url(),
            reason: "reset".into()
        }
        .is_retryable());
        assert!(ManagerError::HttpStatus {
            url: url(),
            status: 503
        }
        .is_retryable());
        assert!(ManagerError::HttpStatus {
            url: url(),
            status: 429
        }
        .is_retryable());
        assert!(!ManagerError::HttpStatus {
            url: url(),
            status: 404
        }
        .is_retryable());
        assert!(!ManagerError::IntegrityMismatch {
            entry: "a.jar".into(),
            expected: "x".into(),
            actual: "y".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_archive_errors_map_to_taxonomy() {
        let err: ManagerError = ArchiveError::PathTraversal {
            entry: "../x".into(),
        }
        .into();
        assert!(matches!(err, ManagerError::PathTraversal { .. }));

        let err: ManagerError = ArchiveError::ChecksumMismatch {
            filename: "a.jar".into(),
            expected: "1".into(),
            actual: "2".into(),
        }
        .into();
        assert!(matches!(err, ManagerError::IntegrityMismatch { .. }));
    }
}
