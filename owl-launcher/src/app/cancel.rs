//! Per-operation cancellation.
//!
//! Every long operation (a modpack sync, a launch, a Java install) runs under
//! a token scoped to its operation key. Cancelling one key stops only that
//! operation, and the next operation on the same key starts with a fresh
//! token.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Slot {
    token: CancellationToken,
    generation: u64,
    users: usize,
}

/// Cancellation tokens keyed by operation.
#[derive(Debug, Default)]
pub struct OperationTokens {
    slots: DashMap<String, Slot>,
}

impl OperationTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key` and get its live token.
    ///
    /// Concurrent callers on one key share a token. A cancelled token is
    /// never handed out again.
    pub fn begin(&self, key: &str) -> OperationScope<'_> {
        let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            token: CancellationToken::new(),
            generation: 0,
            users: 0,
        });
        if slot.token.is_cancelled() {
            slot.token = CancellationToken::new();
            slot.generation += 1;
            slot.users = 0;
        }
        slot.users += 1;
        OperationScope {
            owner: self,
            key: key.to_string(),
            generation: slot.generation,
            token: slot.token.clone(),
        }
    }

    /// Cancel the operation running under `key`. Returns false when nothing
    /// was running.
    pub fn cancel(&self, key: &str) -> bool {
        match self.slots.get(key) {
            Some(slot) => {
                slot.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running operation.
    pub fn cancel_all(&self) {
        for slot in self.slots.iter() {
            slot.token.cancel();
        }
    }

    /// Number of operations currently holding a token.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn release(&self, key: &str, generation: u64) {
        if let Entry::Occupied(mut entry) = self.slots.entry(key.to_string()) {
            let slot = entry.get_mut();
            if slot.generation != generation {
                return;
            }
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                entry.remove();
            }
        }
    }
}

/// A running operation's hold on its token. Releases the key on drop.
#[derive(Debug)]
pub struct OperationScope<'a> {
    owner: &'a OperationTokens,
    key: String,
    generation: u64,
    token: CancellationToken,
}

impl OperationScope<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for OperationScope<'_> {
    fn drop(&mut self) {
        self.owner.release(&self.key, self.generation);
    }
}
