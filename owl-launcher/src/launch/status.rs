//! Launch Status: one observable state machine per active operation.
//!
//! ```text
//! idle → checking → downloading → launching → running → idle
//!            │            │            │          │
//!            └────────────┴─── error ──┴──────────┘ → idle (acknowledged)
//! ```
//!
//! `checking` and `downloading` may also finish straight back to `idle`
//! (a sync with nothing left to launch).

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::app::ErrorKind;

use super::error::{LaunchError, LaunchResult};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Checking,
    Downloading,
    Launching,
    Running,
    Error,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Launching => "launching",
            Self::Running => "running",
            Self::Error => "error",
        }
    }

    /// Whether an operation in this phase holds its key.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle | Self::Error)
    }

    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Idle, Checking) => true,
            (Checking, Checking | Downloading | Launching | Idle) => true,
            (Downloading, Downloading | Launching | Idle) => true,
            (Launching, Running) => true,
            (Running, Idle) => true,
            (Error, Idle) => true,
            (from, Error) => from.is_active(),
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure details carried by an `error` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Snapshot pushed to observers on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchStatus {
    pub operation: String,
    pub phase: Phase,
    /// 0–100.
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StatusError>,
}

impl LaunchStatus {
    pub fn idle(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            phase: Phase::Idle,
            progress: 0,
            message: String::new(),
            error: None,
        }
    }
}

/// All operations' statuses, plus a broadcast of every change.
pub struct StatusRegistry {
    entries: DashMap<String, Arc<watch::Sender<LaunchStatus>>>,
    events: broadcast::Sender<LaunchStatus>,
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: DashMap::new(),
            events,
        }
    }

    fn sender(&self, operation: &str) -> Arc<watch::Sender<LaunchStatus>> {
        self.entries
            .entry(operation.to_string())
            .or_insert_with(|| Arc::new(watch::channel(LaunchStatus::idle(operation)).0))
            .clone()
    }

    /// Start `operation`: `idle` (or an unacknowledged `error`) → `checking`.
    ///
    /// # Errors
    ///
    /// [`LaunchError::AlreadyRunning`] if the operation is active; its
    /// status is left untouched.
    pub fn begin(&self, operation: &str) -> LaunchResult<StatusHandle> {
        let sender = self.sender(operation);
        let mut busy = None;
        sender.send_if_modified(|status| {
            if status.phase.is_active() {
                busy = Some(status.phase);
                return false;
            }
            *status = LaunchStatus {
                phase: Phase::Checking,
                message: "Checking".to_string(),
                ..LaunchStatus::idle(operation)
            };
            true
        });

        if let Some(phase) = busy {
            return Err(LaunchError::AlreadyRunning {
                operation: operation.to_string(),
                phase,
            });
        }

        let handle = StatusHandle {
            sender,
            events: self.events.clone(),
        };
        handle.publish();
        Ok(handle)
    }

    pub fn current(&self, operation: &str) -> LaunchStatus {
        self.entries
            .get(operation)
            .map(|sender| sender.borrow().clone())
            .unwrap_or_else(|| LaunchStatus::idle(operation))
    }

    /// Statuses of every operation that is not idle.
    pub fn active(&self) -> Vec<LaunchStatus> {
        self.entries
            .iter()
            .map(|entry| entry.value().borrow().clone())
            .filter(|status| status.phase != Phase::Idle)
            .collect()
    }

    /// Observe one operation.
    pub fn watch(&self, operation: &str) -> watch::Receiver<LaunchStatus> {
        self.sender(operation).subscribe()
    }

    /// Observe every change of every operation.
    pub fn subscribe(&self) -> broadcast::Receiver<LaunchStatus> {
        self.events.subscribe()
    }

    /// Clear an `error` status back to `idle`.
    pub fn acknowledge(&self, operation: &str) {
        if let Some(sender) = self.entries.get(operation) {
            let changed = sender.send_if_modified(|status| {
                if status.phase == Phase::Error {
                    *status = LaunchStatus::idle(operation);
                    true
                } else {
                    false
                }
            });
            if changed {
                let _ = self.events.send(sender.borrow().clone());
            }
        }
    }
}

/// Write access to one operation's status, held by whoever runs it.
#[derive(Clone)]
pub struct StatusHandle {
    sender: Arc<watch::Sender<LaunchStatus>>,
    events: broadcast::Sender<LaunchStatus>,
}

impl fmt::Debug for StatusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusHandle")
            .field("status", &*self.sender.borrow())
            .finish()
    }
}

impl StatusHandle {
    pub fn current(&self) -> LaunchStatus {
        self.sender.borrow().clone()
    }

    pub fn operation(&self) -> String {
        self.sender.borrow().operation.clone()
    }

    fn publish(&self) {
        let snapshot = self.current();
        debug!(
            operation = %snapshot.operation,
            phase = %snapshot.phase,
            progress = snapshot.progress,
            "Status changed"
        );
        // No subscribers is fine.
        let _ = self.events.send(snapshot);
    }

    /// Move to `phase` with a progress value and message.
    ///
    /// # Errors
    ///
    /// [`LaunchError::InvalidTransition`] if the state machine forbids it.
    pub fn advance(&self, phase: Phase, progress: u8, message: impl Into<String>) -> LaunchResult<()> {
        let message = message.into();
        let mut rejected = None;
        let changed = self.sender.send_if_modified(|status| {
            if !status.phase.can_transition_to(phase) {
                rejected = Some(status.phase);
                return false;
            }
            let updated = LaunchStatus {
                operation: status.operation.clone(),
                phase,
                progress: progress.min(100),
                message,
                error: None,
            };
            if *status == updated {
                return false;
            }
            *status = updated;
            true
        });

        if let Some(from) = rejected {
            return Err(LaunchError::InvalidTransition { from, to: phase });
        }
        if changed {
            self.publish();
        }
        Ok(())
    }

    /// Update progress within the current phase.
    pub fn progress(&self, progress: u8, message: impl Into<String>) {
        let phase = self.sender.borrow().phase;
        if let Err(e) = self.advance(phase, progress, message) {
            debug!(error = %e, "Progress update ignored");
        }
    }

    /// Terminal failure. Ignored if the operation is no longer active.
    pub fn fail(&self, kind: ErrorKind, message: impl Into<String>) {
        let message = message.into();
        let changed = self.sender.send_if_modified(|status| {
            if !status.phase.is_active() {
                return false;
            }
            status.phase = Phase::Error;
            status.message = message.clone();
            status.error = Some(StatusError {
                kind,
                message: message.clone(),
            });
            true
        });
        if changed {
            warn!(operation = %self.operation(), ?kind, message = %message, "Operation failed");
            self.publish();
        }
    }

    /// Finish successfully, returning to `idle`.
    pub fn complete(&self, message: impl Into<String>) {
        let message = message.into();
        if let Err(e) = self.advance(Phase::Idle, 100, message) {
            debug!(error = %e, "Completion ignored");
        }
    }
}
