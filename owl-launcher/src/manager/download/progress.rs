//! Progress aggregation for concurrent downloads.
//!
//! Workers store their byte counts into per-job atomic slots; a reporter task
//! samples the counters on an interval and hands snapshots to a callback.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Interval between progress snapshots.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Callback receiving progress snapshots.
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Point-in-time view of a download batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub files_done: usize,
    pub files_total: usize,
}

impl ProgressSnapshot {
    /// Completion in percent.
    ///
    /// Byte based when sizes are known, file-count based otherwise.
    pub fn percent(&self) -> u8 {
        let ratio = if self.bytes_total > 0 {
            self.bytes_done.min(self.bytes_total) as f64 / self.bytes_total as f64
        } else if self.files_total > 0 {
            self.files_done as f64 / self.files_total as f64
        } else {
            1.0
        };
        (ratio * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// Shared counters for one batch.
#[derive(Debug)]
pub struct ProgressCounters {
    slots: Vec<AtomicU64>,
    files_done: AtomicUsize,
    bytes_total: u64,
}

impl ProgressCounters {
    pub fn new(files: usize, bytes_total: u64) -> Self {
        Self {
            slots: (0..files).map(|_| AtomicU64::new(0)).collect(),
            files_done: AtomicUsize::new(0),
            bytes_total,
        }
    }

    /// Record the bytes currently on disk for a job.
    pub fn set_bytes(&self, slot: usize, bytes: u64) {
        if let Some(counter) = self.slots.get(slot) {
            counter.store(bytes, Ordering::Relaxed);
        }
    }

    pub fn mark_completed(&self, slot: usize, final_bytes: u64) {
        self.set_bytes(slot, final_bytes);
        self.files_done.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_done: self.slots.iter().map(|s| s.load(Ordering::Relaxed)).sum(),
            bytes_total: self.bytes_total,
            files_done: self.files_done.load(Ordering::SeqCst),
            files_total: self.slots.len(),
        }
    }
}

/// Background task pushing snapshots until stopped.
pub struct ProgressReporter {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(
        counters: Arc<ProgressCounters>,
        interval: Duration,
        callback: ProgressCallback,
    ) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut last = None;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = counters.snapshot();
                        if last != Some(snapshot) {
                            callback(snapshot);
                            last = Some(snapshot);
                        }
                    }
                }
            }
            // Always end on the final numbers.
            let snapshot = counters.snapshot();
            if last != Some(snapshot) {
                callback(snapshot);
            }
        });
        Self { stop, handle }
    }

    /// Stop the reporter after it has emitted the final snapshot.
    pub async fn finish(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
