//! Launch errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::app::ErrorKind;
use crate::manager::ManagerError;

use super::status::Phase;

pub type LaunchResult<T> = Result<T, LaunchError>;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{operation} is already {phase}")]
    AlreadyRunning { operation: String, phase: Phase },

    #[error("not signed in")]
    NotAuthenticated,

    #[error("content incomplete: {0}")]
    ContentIncomplete(String),

    #[error("invalid launch configuration: {0}")]
    InvalidConfig(String),

    #[error("Java runtime not found at {0}")]
    RuntimeMissing(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read game metadata: {0}")]
    Metadata(#[from] ManagerError),

    #[error("status cannot move from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },
}

impl LaunchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::ContentIncomplete(_) => ErrorKind::ContentIncomplete,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::RuntimeMissing(_) => ErrorKind::RuntimeUnavailable,
            Self::Spawn { .. } => ErrorKind::Internal,
            Self::Metadata(e) => ErrorKind::from(e),
            Self::InvalidTransition { .. } => ErrorKind::Internal,
        }
    }
}
