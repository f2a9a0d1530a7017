//! Application configuration for the launcher.
//!
//! `AppConfig` gathers endpoints, directories and tuning knobs for every
//! pipeline component so they are configured consistently from one place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::MicrosoftConfig;
use crate::game::VERSION_MANIFEST_URL;
use crate::manager::download::{RetryPolicy, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use crate::runtime::ADOPTIUM_API_URL;

/// Directory name under the platform config/data dirs.
pub const APP_DIR_NAME: &str = "owl-launcher";

/// Public client id of the launcher's Azure app registration.
pub const DEFAULT_CLIENT_ID: &str = "6ff71649-4b80-4545-8552-435c570bd6e8";

/// Pending logins are forgotten after this many seconds.
pub const DEFAULT_PENDING_LOGIN_TTL_SECS: u64 = 600;

pub const ENV_HOME: &str = "OWL_LAUNCHER_HOME";
pub const ENV_ACL_URL: &str = "OWL_LAUNCHER_ACL_URL";
pub const ENV_CLIENT_ID: &str = "OWL_LAUNCHER_CLIENT_ID";

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// OAuth registration and token-chain endpoints.
    pub microsoft: MicrosoftConfig,

    /// Where the subject → groups ACL is fetched from. `None` grants only
    /// the default group.
    pub acl_url: Option<String>,

    pub adoptium_api: String,
    pub version_manifest_url: String,

    /// Settings, tokens and the local modpack list.
    pub config_dir: PathBuf,
    /// Root for instances, runtimes and logs.
    pub data_dir: PathBuf,
    pub instances_dir: PathBuf,
    pub runtimes_dir: PathBuf,

    pub http_timeout: Duration,
    pub download_concurrency: usize,
    pub retry: RetryPolicy,
    pub pending_login_ttl: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        Self::with_dirs(config_dir, data_dir)
    }
}

impl AppConfig {
    /// Defaults rooted at explicit directories.
    pub fn with_dirs(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            microsoft: MicrosoftConfig {
                client_id: DEFAULT_CLIENT_ID.to_string(),
                ..MicrosoftConfig::default()
            },
            acl_url: None,
            adoptium_api: ADOPTIUM_API_URL.to_string(),
            version_manifest_url: VERSION_MANIFEST_URL.to_string(),
            config_dir: config_dir.into(),
            instances_dir: data_dir.join("instances"),
            runtimes_dir: data_dir.join("runtimes"),
            data_dir,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            download_concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            pending_login_ttl: Duration::from_secs(DEFAULT_PENDING_LOGIN_TTL_SECS),
        }
    }

    /// Defaults with the process environment applied.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply `OWL_LAUNCHER_*` overrides read through `lookup`.
    pub fn with_env<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        let mut config = match non_empty(ENV_HOME) {
            Some(home) => {
                let home = PathBuf::from(home);
                Self {
                    microsoft: self.microsoft,
                    acl_url: self.acl_url,
                    adoptium_api: self.adoptium_api,
                    version_manifest_url: self.version_manifest_url,
                    http_timeout: self.http_timeout,
                    download_concurrency: self.download_concurrency,
                    retry: self.retry,
                    pending_login_ttl: self.pending_login_ttl,
                    ..Self::with_dirs(home.join("config"), &home)
                }
            }
            None => self,
        };
        if let Some(url) = non_empty(ENV_ACL_URL) {
            config.acl_url = Some(url);
        }
        if let Some(client_id) = non_empty(ENV_CLIENT_ID) {
            config.microsoft.client_id = client_id;
        }
        config
    }

    pub fn with_acl_url(mut self, url: impl Into<String>) -> Self {
        self.acl_url = Some(url.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.microsoft.client_id = client_id.into();
        self
    }

    pub fn with_microsoft(mut self, microsoft: MicrosoftConfig) -> Self {
        self.microsoft = microsoft;
        self
    }

    pub fn with_adoptium_api(mut self, url: impl Into<String>) -> Self {
        self.adoptium_api = url.into();
        self
    }

    pub fn with_version_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.version_manifest_url = url.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_download_concurrency(mut self, concurrency: usize) -> Self {
        self.download_concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pending_login_ttl(mut self, ttl: Duration) -> Self {
        self.pending_login_ttl = ttl;
        self
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(crate::settings::SETTINGS_FILE)
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.config_dir.join("tokens.json")
    }

    pub fn modpacks_path(&self) -> PathBuf {
        self.config_dir.join(crate::modpack::MODPACKS_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Default game directory offered in fresh settings.
    pub fn default_game_directory(&self) -> &Path {
        &self.instances_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_with_dirs_layout() {
        let config = AppConfig::with_dirs("/cfg", "/data");
        assert_eq!(config.instances_dir, PathBuf::from("/data/instances"));
        assert_eq!(config.runtimes_dir, PathBuf::from("/data/runtimes"));
        assert_eq!(config.tokens_path(), PathBuf::from("/cfg/tokens.json"));
        assert_eq!(config.settings_path(), PathBuf::from("/cfg/settings.json"));
        assert_eq!(config.download_concurrency, 4);
        assert_eq!(config.pending_login_ttl, Duration::from_secs(600));
        assert_eq!(config.microsoft.scopes, "XboxLive.signin offline_access");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_HOME, "/owl"),
            (ENV_ACL_URL, "https://acl.example/acl.json"),
            (ENV_CLIENT_ID, "client-123"),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::with_dirs("/cfg", "/data")
            .with_download_concurrency(8)
            .with_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, PathBuf::from("/owl"));
        assert_eq!(config.config_dir, PathBuf::from("/owl/config"));
        assert_eq!(config.instances_dir, PathBuf::from("/owl/instances"));
        assert_eq!(config.acl_url.as_deref(), Some("https://acl.example/acl.json"));
        assert_eq!(config.microsoft.client_id, "client-123");
        assert_eq!(config.download_concurrency, 8);
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let config = AppConfig::with_dirs("/cfg", "/data").with_env(|key| {
            (key == ENV_CLIENT_ID).then(|| "  ".to_string())
        });
        assert_eq!(config.microsoft.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.data_dir, PathBuf::from("/data"));
    }
}
