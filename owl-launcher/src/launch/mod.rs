//! Launch Orchestrator: argument composition, process start and the
//! per-operation status state machine.

mod args;
mod config;
mod error;
mod orchestrator;
mod status;

pub use args::{
    build_classpath, classpath_separator, compose, placeholder_values, redact, substitute,
    LAUNCHER_NAME,
};
pub use config::{IdentityClaims, LaunchConfiguration, Resolution};
pub use error::{LaunchError, LaunchResult};
pub use orchestrator::{GameProcess, LaunchOrchestrator};
pub use status::{LaunchStatus, Phase, StatusError, StatusHandle, StatusRegistry};
