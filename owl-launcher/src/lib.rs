//! Owl Launcher - authenticated acquisition and launch pipeline
//!
//! This library signs a user in through Microsoft OAuth2 and the Xbox Live
//! token chain, works out which modpacks the user may see, downloads and
//! verifies a pack's files, provisions a matching Java runtime, and starts
//! the game with the session injected as launch arguments.
//!
//! The [`app::Launcher`] facade exposes the commands a UI issues; progress is
//! observed through [`launch::LaunchStatus`] snapshots.

use std::future::Future;
use std::pin::Pin;

pub mod access;
pub mod app;
pub mod archive;
pub mod auth;
pub mod game;
pub mod launch;
pub mod locks;
pub mod logging;
pub mod manager;
pub mod modpack;
pub mod runtime;
pub mod settings;

/// Boxed future returned by the object-safe service traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use app::{AppConfig, ErrorKind, LaunchOptions, Launcher, LauncherError, LauncherResult};
