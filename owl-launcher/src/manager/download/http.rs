//! HTTP transfer with resume support.
//!
//! Partial bytes live in the job's `.part` file. A retry sends
//! `Range: bytes=<len>-`; a `206` answer appends, a `200` answer restarts the
//! file from zero, and a `416` discards the partial.

use std::path::Path;
use std::time::Duration;

use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::job::DownloadJob;
use super::progress::ProgressCounters;
use crate::manager::error::{ManagerError, ManagerResult};

/// Default timeout for connecting and for each read, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Buffer size for writing downloaded data (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// How to treat the partial file given the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Append,
    Truncate,
    DiscardPartial,
    Fail,
}

pub(crate) fn write_mode(status: StatusCode, existing: u64) -> WriteMode {
    match status {
        StatusCode::PARTIAL_CONTENT if existing > 0 => WriteMode::Append,
        StatusCode::OK => WriteMode::Truncate,
        StatusCode::RANGE_NOT_SATISFIABLE if existing > 0 => WriteMode::DiscardPartial,
        _ => WriteMode::Fail,
    }
}

/// Streaming HTTP downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> ManagerResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ManagerError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Size of a remote file via HEAD. `None` when unknown.
    pub async fn content_length(&self, url: &str) -> Option<u64> {
        let response = tokio::time::timeout(self.timeout, self.client.head(url).send())
            .await
            .ok()?
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|len| *len > 0)
    }

    /// Fetch `job` into its staging file, resuming when possible.
    ///
    /// Returns the final size of the staging file.
    pub async fn fetch(
        &self,
        job: &DownloadJob,
        counters: &ProgressCounters,
        slot: usize,
        cancel: &CancellationToken,
    ) -> ManagerResult<u64> {
        let staging = &job.staging_path;
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ManagerError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let existing = fs::metadata(staging).await.map(|m| m.len()).unwrap_or(0);
        let mut request = self.client.get(&job.url);
        if existing > 0 {
            request = request.header(RANGE, format!("bytes={}-", existing));
        }

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ManagerError::Cancelled),
            sent = tokio::time::timeout(self.timeout, request.send()) => sent
                .map_err(|_| self.timeout_error(&job.url))?
                .map_err(|e| transport_error(&job.url, e))?,
        };

        let status = response.status();
        let (file, mut written) = match write_mode(status, existing) {
            WriteMode::Append => {
                debug!(entry = %job.label, offset = existing, "Resuming download");
                let file = OpenOptions::new()
                    .append(true)
                    .open(staging)
                    .await
                    .map_err(|e| write_error(staging, e))?;
                (file, existing)
            }
            WriteMode::Truncate => {
                let file = fs::File::create(staging)
                    .await
                    .map_err(|e| write_error(staging, e))?;
                (file, 0)
            }
            WriteMode::DiscardPartial => {
                let _ = fs::remove_file(staging).await;
                return Err(ManagerError::Transport {
                    url: job.url.clone(),
                    reason: "server rejected the resume range".to_string(),
                });
            }
            WriteMode::Fail => {
                return Err(ManagerError::HttpStatus {
                    url: job.url.clone(),
                    status: status.as_u16(),
                });
            }
        };

        counters.set_bytes(slot, written);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = writer.flush().await;
                    return Err(ManagerError::Cancelled);
                }
                next = tokio::time::timeout(self.timeout, response.chunk()) => next
                    .map_err(|_| self.timeout_error(&job.url))?
                    .map_err(|e| transport_error(&job.url, e))?,
            };

            let Some(chunk) = chunk else {
                break;
            };

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| write_error(staging, e))?;
            written += chunk.len() as u64;
            counters.set_bytes(slot, written);
        }

        writer.flush().await.map_err(|e| write_error(staging, e))?;
        Ok(written)
    }

    fn timeout_error(&self, url: &str) -> ManagerError {
        ManagerError::Timeout {
            url: url.to_string(),
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> ManagerError {
    ManagerError::Transport {
        url: url.to_string(),
        reason: error.to_string(),
    }
}

fn write_error(path: &Path, error: std::io::Error) -> ManagerError {
    ManagerError::WriteFailed {
        path: path.to_path_buf(),
        source: error,
    }
}
