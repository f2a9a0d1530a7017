//! CLI command implementations.

pub mod auth;
pub mod content;
pub mod play;
pub mod settings;
