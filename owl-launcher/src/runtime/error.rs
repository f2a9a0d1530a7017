//! Runtime provisioning errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::manager::ManagerError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no Java runtime is published for {os}/{arch}")]
    UnsupportedHost { os: String, arch: String },

    #[error("no Java {major} runtime available for this platform")]
    NoAsset { major: u32 },

    #[error("runtime query {url} failed: {reason}")]
    Query { url: String, reason: String },

    #[error("runtime download failed: {0}")]
    Download(#[from] ManagerError),

    #[error("failed to install runtime into {path}: {reason}")]
    Install { path: PathBuf, reason: String },

    #[error("no java executable found under {0}")]
    BinaryNotFound(PathBuf),

    #[error("runtime index {path}: {reason}")]
    Index { path: PathBuf, reason: String },
}

impl RuntimeError {
    /// Whether no runtime can be obtained for this host at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::UnsupportedHost { .. } | Self::NoAsset { .. })
    }

    pub(crate) fn install(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Install {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
