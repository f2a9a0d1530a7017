//! Download engine.
//!
//! - [`HttpDownloader`]: one resumable HTTP transfer into a `.part` file
//! - [`DownloadEngine`]: bounded-concurrency batches with retry, digest
//!   verification, atomic promotion and optional unpacking
//! - [`ProgressCounters`] / [`ProgressReporter`]: byte-level progress

mod http;
mod job;
mod orchestrator;
mod policy;
mod progress;

pub use http::{HttpDownloader, DEFAULT_TIMEOUT_SECS};
pub use job::{CompletedDownload, DownloadJob, UnpackTarget};
pub use orchestrator::{unpack_beside, DownloadEngine, DEFAULT_CONCURRENCY};
pub use policy::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use progress::{
    ProgressCallback, ProgressCounters, ProgressReporter, ProgressSnapshot,
    DEFAULT_REPORT_INTERVAL,
};
