//! CLI error type and exit codes.

use std::fmt;

use owl_launcher::{ErrorKind, LauncherError};

/// Errors surfaced to the terminal.
#[derive(Debug)]
pub enum CliError {
    /// A pipeline command failed.
    Launcher(LauncherError),
    /// Sign-in did not complete.
    Login(String),
    /// Bad arguments or a missing catalog entry.
    Usage(String),
    /// Terminal I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Launcher(e) => write!(f, "{}", e),
            CliError::Login(msg) => write!(f, "Sign-in failed: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Launcher(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LauncherError> for CliError {
    fn from(e: LauncherError) -> Self {
        CliError::Launcher(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl CliError {
    /// Machine-readable category, when the pipeline reported one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CliError::Launcher(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// 2 for unrecoverable store faults, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Launcher(e) if e.is_fatal() => 2,
            _ => 1,
        }
    }
}
