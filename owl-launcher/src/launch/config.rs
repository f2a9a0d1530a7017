//! Launch Configuration: everything one game start needs.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{LaunchError, LaunchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Who the game runs as. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub access_token: String,
    pub subject_id: String,
    pub display_name: String,
}

impl fmt::Debug for IdentityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaims")
            .field("access_token", &"<redacted>")
            .field("subject_id", &self.subject_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LaunchConfiguration {
    pub runtime_path: PathBuf,
    /// MiB.
    pub max_memory: u32,
    /// MiB.
    pub min_memory: u32,
    /// `None` leaves the window size to the game.
    pub resolution: Option<Resolution>,
    /// Instance directory holding versions, libraries, assets and package files.
    pub content_root: PathBuf,
    /// Version profile to launch (a loader profile or the game version).
    pub version_id: String,
    pub identity: IdentityClaims,
}

impl LaunchConfiguration {
    /// Check memory, resolution, runtime path and identity.
    pub fn validate(&self) -> LaunchResult<()> {
        if self.identity.access_token.trim().is_empty() || self.identity.subject_id.trim().is_empty() {
            return Err(LaunchError::NotAuthenticated);
        }
        if self.min_memory == 0 || self.min_memory > self.max_memory {
            return Err(LaunchError::InvalidConfig(format!(
                "memory must satisfy 0 < min ({}) <= max ({})",
                self.min_memory, self.max_memory
            )));
        }
        if let Some(resolution) = self.resolution {
            if resolution.width == 0 || resolution.height == 0 {
                return Err(LaunchError::InvalidConfig(format!(
                    "resolution {}x{} is not drawable",
                    resolution.width, resolution.height
                )));
            }
        }
        if self.version_id.trim().is_empty() {
            return Err(LaunchError::InvalidConfig("no version to launch".into()));
        }
        if !self.runtime_path.is_file() {
            return Err(LaunchError::RuntimeMissing(self.runtime_path.clone()));
        }
        Ok(())
    }
}
