//! Concurrent download orchestration.
//!
//! Runs a batch of [`DownloadJob`]s with bounded concurrency. Each job is
//! fetched (with retries for transient failures), verified against its
//! declared digest, renamed into place and optionally unpacked. The first
//! hard failure aborts the batch; jobs that already completed stay completed.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::http::HttpDownloader;
use super::job::{CompletedDownload, DownloadJob, UnpackTarget};
use super::policy::RetryPolicy;
use super::progress::ProgressCounters;
use crate::archive::{self, calculate_file_checksum, ArchiveKind, HashAlgorithm};
use crate::manager::catalog::Unpack;
use crate::manager::error::{ManagerError, ManagerResult};

/// Default number of files transferred at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Bounded-concurrency download runner.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    downloader: Arc<HttpDownloader>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl DownloadEngine {
    pub fn new(downloader: Arc<HttpDownloader>, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            downloader,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn downloader(&self) -> &HttpDownloader {
        &self.downloader
    }

    /// Fill in missing size hints with HEAD requests, in parallel.
    ///
    /// Returns the total expected bytes; unknown sizes count as zero.
    pub async fn fetch_sizes(&self, jobs: &mut [DownloadJob]) -> u64 {
        let unknown: Vec<(usize, String)> = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.size_hint.is_none())
            .map(|(i, job)| (i, job.url.clone()))
            .collect();

        let sized: Vec<(usize, Option<u64>)> = stream::iter(unknown)
            .map(|(i, url)| async move { (i, self.downloader.content_length(&url).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (i, size) in sized {
            jobs[i].size_hint = size;
        }
        jobs.iter().filter_map(|j| j.size_hint).sum()
    }

    /// Run every job, calling `on_complete` as each one is promoted.
    ///
    /// Returns the number of completed jobs.
    pub async fn run<F>(
        &self,
        jobs: Vec<DownloadJob>,
        counters: Arc<ProgressCounters>,
        cancel: &CancellationToken,
        mut on_complete: F,
    ) -> ManagerResult<usize>
    where
        F: FnMut(CompletedDownload),
    {
        let batch = cancel.child_token();
        let mut results = stream::iter(jobs.into_iter().enumerate())
            .map(|(slot, job)| {
                let counters = Arc::clone(&counters);
                let batch = batch.clone();
                async move { self.download_one(job, slot, &counters, &batch).await }
            })
            .buffer_unordered(self.concurrency);

        let mut completed = 0;
        while let Some(result) = results.next().await {
            match result {
                Ok(done) => {
                    completed += 1;
                    on_complete(done);
                }
                Err(e) => {
                    batch.cancel();
                    return Err(e);
                }
            }
        }
        Ok(completed)
    }

    async fn download_one(
        &self,
        job: DownloadJob,
        slot: usize,
        counters: &ProgressCounters,
        cancel: &CancellationToken,
    ) -> ManagerResult<CompletedDownload> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.downloader.fetch(&job, counters, slot, cancel).await {
                Ok(_) => break,
                Err(ManagerError::Cancelled) => return Err(ManagerError::Cancelled),
                Err(e) if e.is_retryable() => match self.retry.delay_for_attempt(attempt) {
                    Some(delay) => {
                        warn!(entry = %job.label, attempt, error = %e, "Download failed, retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(ManagerError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => {
                        return Err(ManagerError::DownloadFailed {
                            entry: job.label.clone(),
                            reason: e.to_string(),
                        })
                    }
                },
                Err(e @ ManagerError::HttpStatus { .. }) => {
                    return Err(ManagerError::DownloadFailed {
                        entry: job.label.clone(),
                        reason: e.to_string(),
                    })
                }
                Err(e) => return Err(e),
            }
        }

        let algorithm = job.digest_algorithm();
        let (digest, size) = fingerprint(&job.staging_path, algorithm).await?;

        if let Some(expected) = &job.expected {
            if !digest.eq_ignore_ascii_case(&expected.hex) {
                let _ = tokio::fs::remove_file(&job.staging_path).await;
                return Err(ManagerError::IntegrityMismatch {
                    entry: job.label.clone(),
                    expected: expected.hex.clone(),
                    actual: digest,
                });
            }
        }

        promote(&job.staging_path, &job.final_path).await?;
        if let Some(target) = &job.unpack {
            unpack(&job.final_path, target).await?;
        }

        counters.mark_completed(slot, size);
        debug!(entry = %job.label, size, "Download verified");
        Ok(CompletedDownload {
            job,
            algorithm,
            digest,
            size,
        })
    }
}

async fn fingerprint(path: &Path, algorithm: HashAlgorithm) -> ManagerResult<(String, u64)> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || calculate_file_checksum(&owned, algorithm))
        .await
        .map_err(|e| ManagerError::ReadFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })??;
    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| ManagerError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    Ok((digest, size))
}

async fn promote(staging: &Path, target: &Path) -> ManagerResult<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::rename(staging, target)
        .await
        .map_err(|e| ManagerError::WriteFailed {
            path: target.to_path_buf(),
            source: e,
        })
}

async fn unpack(file: &Path, target: &UnpackTarget) -> ManagerResult<()> {
    let file = file.to_path_buf();
    let dest = target.dest.clone();
    let mode = target.mode;
    let joined = tokio::task::spawn_blocking(move || match mode {
        Unpack::Archive(kind) => archive::extract(&file, &dest, kind),
        Unpack::Natives => archive::extract_natives(&file, &dest),
    })
    .await
    .map_err(|e| ManagerError::ExtractionFailed {
        path: target.dest.clone(),
        reason: e.to_string(),
    })?;
    joined?;
    Ok(())
}

/// Unpack target for an archive extracted next to itself.
pub fn unpack_beside(final_path: &Path, kind: ArchiveKind) -> Option<UnpackTarget> {
    final_path.parent().map(|parent| UnpackTarget {
        mode: Unpack::Archive(kind),
        dest: parent.to_path_buf(),
    })
}
