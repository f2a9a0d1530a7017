//! Application wiring and the UI command facade.
//!
//! `Launcher` owns one instance of every pipeline component and exposes the
//! commands the UI issues. It holds no pipeline state of its own beyond the
//! shared status registry.
//!
//! ```text
//! UI ──► Launcher
//!          ├── IdentityManager ──► TokenStore (tokens.json)
//!          ├── AccessResolver  ──► ACL source
//!          ├── ContentSyncer   ──► DownloadEngine ──► content-state.json
//!          ├── RuntimeProvisioner ──► runtimes.json
//!          └── LaunchOrchestrator ──► StatusRegistry ──► UI subscribers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use owl_launcher::app::{AppConfig, Launcher};
//!
//! let launcher = Launcher::start(AppConfig::from_env()).await?;
//! let login = launcher.get_microsoft_auth_url();
//! ```

mod cancel;
mod commands;
mod config;
mod error;

pub use cancel::{OperationScope, OperationTokens};
pub use commands::{
    java_operation, LaunchOptions, Launcher, MicrosoftAuthUrl, MinecraftVersionRequest,
    OnlineModpack,
};
pub use config::{
    AppConfig, APP_DIR_NAME, DEFAULT_CLIENT_ID, DEFAULT_PENDING_LOGIN_TTL_SECS, ENV_ACL_URL,
    ENV_CLIENT_ID, ENV_HOME,
};
pub use error::{ErrorKind, LauncherError, LauncherResult};
