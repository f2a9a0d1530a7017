//! Outstanding login attempts awaiting their callback.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct PendingLogin {
    verifier: String,
    created_at: Instant,
}

/// State token → verifier map with expiry and single consumption.
#[derive(Debug)]
pub struct PendingLogins {
    entries: Mutex<HashMap<String, PendingLogin>>,
    ttl: Duration,
}

impl PendingLogins {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a new attempt. Expired attempts are purged on the way in.
    pub fn insert(&self, state: String, verifier: String) {
        let mut entries = self.entries.lock();
        let ttl = self.ttl;
        entries.retain(|_, p| p.created_at.elapsed() < ttl);
        entries.insert(
            state,
            PendingLogin {
                verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Remove and return the verifier for `state`.
    ///
    /// Returns `None` if the state is unknown, was already taken, or has
    /// expired. Two racing callers can never both receive the verifier.
    pub fn take(&self, state: &str) -> Option<String> {
        let pending = self.entries.lock().remove(state)?;
        if pending.created_at.elapsed() >= self.ttl {
            return None;
        }
        Some(pending.verifier)
    }

    /// Number of attempts still held (including expired ones not yet purged).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
