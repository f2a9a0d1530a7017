//! User preferences (`settings.json`).
//!
//! Stored camelCase. Files written by older versions used snake_case keys;
//! those are read once and rewritten in the current shape.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::launch::Resolution;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_MAX_MEMORY_MB: u32 = 4096;
pub const DEFAULT_MIN_MEMORY_MB: u32 = 2048;

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not in a known format: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub java_path: String,
    pub max_memory: u32,
    pub min_memory: u32,
    pub game_resolution: Resolution,
    pub game_directory: PathBuf,
}

#[derive(Deserialize)]
struct LegacySettings {
    java_path: String,
    max_memory: u32,
    min_memory: u32,
    game_resolution: Resolution,
    game_directory: PathBuf,
}

impl From<LegacySettings> for Settings {
    fn from(legacy: LegacySettings) -> Self {
        Self {
            java_path: legacy.java_path,
            max_memory: legacy.max_memory,
            min_memory: legacy.min_memory,
            game_resolution: legacy.game_resolution,
            game_directory: legacy.game_directory,
        }
    }
}

/// Java command used when the user has not picked one.
pub fn default_java_command() -> &'static str {
    if cfg!(windows) {
        "javaw.exe"
    } else {
        "java"
    }
}

impl Settings {
    pub fn with_game_directory(game_directory: impl Into<PathBuf>) -> Self {
        Self {
            java_path: default_java_command().to_string(),
            max_memory: DEFAULT_MAX_MEMORY_MB,
            min_memory: DEFAULT_MIN_MEMORY_MB,
            game_resolution: Resolution::default(),
            game_directory: game_directory.into(),
        }
    }

    /// Reject values no launch could use.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.min_memory == 0 || self.min_memory > self.max_memory {
            return Err(SettingsError::Invalid(format!(
                "memory must satisfy 0 < min ({}) <= max ({})",
                self.min_memory, self.max_memory
            )));
        }
        if self.game_resolution.width == 0 || self.game_resolution.height == 0 {
            return Err(SettingsError::Invalid("resolution must be non-zero".into()));
        }
        if self.game_directory.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("game directory is empty".into()));
        }
        Ok(())
    }

    /// The configured Java binary when it names an existing file.
    ///
    /// A bare command such as `java` is resolved by the runtime provisioner
    /// instead, so it yields `None`.
    pub fn java_override(&self) -> Option<PathBuf> {
        let path = PathBuf::from(self.java_path.trim());
        path.is_file().then_some(path)
    }
}

/// Loads and saves [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    default_game_directory: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, default_game_directory: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_game_directory: default_game_directory.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings. A missing file is created with defaults; a legacy
    /// file is migrated in place.
    pub async fn load(&self) -> SettingsResult<Settings> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Settings::with_game_directory(&self.default_game_directory);
                self.save(&defaults).await?;
                info!(path = %self.path.display(), "Created default settings");
                return Ok(defaults);
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let current_err = match serde_json::from_slice::<Settings>(&content) {
            Ok(settings) => return Ok(settings),
            Err(e) => e,
        };
        match serde_json::from_slice::<LegacySettings>(&content) {
            Ok(legacy) => {
                let settings = Settings::from(legacy);
                self.save(&settings).await?;
                info!(path = %self.path.display(), "Migrated legacy settings");
                Ok(settings)
            }
            Err(_) => Err(SettingsError::Format {
                path: self.path.clone(),
                reason: current_err.to_string(),
            }),
        }
    }

    pub async fn save(&self, settings: &Settings) -> SettingsResult<()> {
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let json = serde_json::to_vec_pretty(settings).map_err(|e| SettingsError::Format {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> SettingsStore {
        SettingsStore::new(temp.path().join(SETTINGS_FILE), temp.path().join("game"))
    }

    #[tokio::test]
    async fn test_missing_file_creates_defaults() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let settings = store.load().await.unwrap();
        assert_eq!(settings.max_memory, 4096);
        assert_eq!(settings.min_memory, 2048);
        assert_eq!(settings.game_resolution, Resolution { width: 1280, height: 720 });
        assert_eq!(settings.game_directory, temp.path().join("game"));
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_camel_case_on_disk() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut settings = Settings::with_game_directory("/games/owl");
        settings.max_memory = 8192;
        store.save(&settings).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["maxMemory"], 8192);
        assert_eq!(raw["gameResolution"]["width"], 1280);
        assert_eq!(raw["gameDirectory"], "/games/owl");
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_legacy_file_is_migrated() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        std::fs::write(
            store.path(),
            r#"{"java_path": "/opt/java/bin/java", "max_memory": 6144, "min_memory": 1024,
                "game_resolution": {"width": 800, "height": 600}, "game_directory": "/g"}"#,
        )
        .unwrap();

        let settings = store.load().await.unwrap();
        assert_eq!(settings.java_path, "/opt/java/bin/java");
        assert_eq!(settings.max_memory, 6144);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("javaPath"));
        assert!(!raw.contains("java_path"));
    }

    #[tokio::test]
    async fn test_garbage_is_a_format_error() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load().await, Err(SettingsError::Format { .. })));
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::with_game_directory("/g");
        assert!(settings.validate().is_ok());
        settings.min_memory = 8192;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_java_override_needs_existing_file() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::with_game_directory("/g");
        assert_eq!(settings.java_override(), None);

        let java = temp.path().join("java");
        std::fs::write(&java, b"").unwrap();
        settings.java_path = java.to_string_lossy().into_owned();
        assert_eq!(settings.java_override(), Some(java));
    }
}
