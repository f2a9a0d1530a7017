//! Package synchronization.
//!
//! `sync` brings an instance root in line with a package manifest:
//!
//! 1. Fetch the manifest and drop entries the caller is not entitled to
//! 2. Skip entries the installed index already vouches for
//! 3. Download, verify, promote and unpack the rest
//! 4. Save the index, marking the instance complete only on full success

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::EntitlementSet;
use crate::archive::sanitize_relative_path;
use crate::auth::now_unix;
use crate::locks::KeyedLocks;

use super::catalog::{CatalogClient, FileEntry, PackageDescriptor, Unpack};
use super::download::{
    unpack_beside, DownloadEngine, DownloadJob, ProgressCallback, ProgressCounters,
    ProgressReporter, UnpackTarget, DEFAULT_REPORT_INTERVAL,
};
use super::error::ManagerResult;
use super::installed::{record_key, FileRecord, InstalledContent};

/// Directory (inside an instance root) holding partial downloads.
pub const STAGING_DIR: &str = ".staging";

/// Directory (inside an instance root) receiving native libraries.
pub const NATIVES_DIR: &str = "natives";

/// Outcome of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Synchronizes packages into instance roots.
pub struct ContentSyncer {
    catalog: CatalogClient,
    engine: DownloadEngine,
    locks: KeyedLocks,
}

impl ContentSyncer {
    pub fn new(catalog: CatalogClient, engine: DownloadEngine) -> Self {
        Self {
            catalog,
            engine,
            locks: KeyedLocks::new(),
        }
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Sync `package` into `root`.
    ///
    /// `base_entries` are installed ahead of the manifest entries (the game
    /// files the package builds on). Concurrent syncs of the same package id
    /// run one after the other; different ids run in parallel.
    pub async fn sync(
        &self,
        package: &PackageDescriptor,
        root: &Path,
        entitlements: &EntitlementSet,
        base_entries: Vec<FileEntry>,
        progress: ProgressCallback,
        cancel: &CancellationToken,
    ) -> ManagerResult<SyncReport> {
        let _guard = self.locks.lock(&package.id).await;

        let manifest = self
            .catalog
            .fetch_manifest(&package.source_ref, entitlements)
            .await?;

        let mut state = match InstalledContent::load(root).await? {
            Some(mut existing) => {
                existing.adopt(package);
                existing
            }
            None => InstalledContent::for_package(package),
        };

        let SyncPlan {
            mut jobs,
            keys,
            wanted,
            skipped,
        } = plan(root, &state, base_entries.into_iter().chain(manifest))?;

        let bytes = self.engine.fetch_sizes(&mut jobs).await;
        info!(
            package = %package.id,
            downloads = jobs.len(),
            skipped,
            bytes,
            "Sync planned"
        );

        let counters = Arc::new(ProgressCounters::new(jobs.len(), bytes));
        let reporter =
            ProgressReporter::spawn(Arc::clone(&counters), DEFAULT_REPORT_INTERVAL, progress);

        let result = self
            .engine
            .run(jobs, Arc::clone(&counters), cancel, |done| {
                if let Some(key) = keys.get(&done.job.final_path) {
                    state.record(
                        key.clone(),
                        FileRecord {
                            algorithm: done.algorithm,
                            digest: done.digest,
                            size: done.size,
                        },
                    );
                }
            })
            .await;

        reporter.finish().await;

        state.complete = result.is_ok();
        let mut dropped = Vec::new();
        if state.complete {
            state.synced_at = Some(now_unix());
            dropped = state.retain_only(&wanted);
        }
        state.save(root).await?;
        remove_dropped(root, &dropped).await;

        let downloaded = result.map_err(|e| {
            warn!(package = %package.id, error = %e, "Sync failed");
            e
        })?;

        // Every partial has been promoted; only empty directories remain.
        let _ = tokio::fs::remove_dir_all(root.join(STAGING_DIR)).await;

        info!(package = %package.id, downloaded, skipped, "Sync complete");
        Ok(SyncReport {
            downloaded,
            skipped,
            bytes,
        })
    }
}

struct SyncPlan {
    jobs: Vec<DownloadJob>,
    /// Final path → index key of every job.
    keys: HashMap<PathBuf, String>,
    /// Index keys of every entry this run covers, downloaded or skipped.
    wanted: HashSet<String>,
    skipped: usize,
}

/// Turn entries into download jobs, skipping current files and duplicates.
fn plan(
    root: &Path,
    state: &InstalledContent,
    entries: impl Iterator<Item = FileEntry>,
) -> ManagerResult<SyncPlan> {
    let staging = root.join(STAGING_DIR);
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    let mut keys = HashMap::new();
    let mut skipped = 0;

    for entry in entries {
        let relative = entry.install_path()?;
        let key = record_key(&relative);
        if !seen.insert(key.clone()) {
            continue;
        }

        let expected = entry.expected_digest()?;
        if state.is_current(root, &key, expected.as_ref()) {
            skipped += 1;
            continue;
        }

        let final_path = root.join(&relative);
        let unpack = match entry.unpack_mode() {
            Some(Unpack::Archive(kind)) => unpack_beside(&final_path, kind),
            Some(Unpack::Natives) => Some(UnpackTarget {
                mode: Unpack::Natives,
                dest: root.join(NATIVES_DIR),
            }),
            None => None,
        };

        let job = DownloadJob::new(key.clone(), entry.source_url.clone(), final_path.clone())
            .staged_in(&staging, &relative)
            .with_expected(expected)
            .with_size_hint(entry.size)
            .with_unpack(unpack);
        keys.insert(final_path, key);
        jobs.push(job);
    }

    Ok(SyncPlan {
        jobs,
        keys,
        wanted: seen,
        skipped,
    })
}

/// Delete files a previous sync installed that the current manifest no
/// longer lists.
async fn remove_dropped(root: &Path, dropped: &[String]) {
    for key in dropped {
        let Ok(relative) = sanitize_relative_path(key) else {
            warn!(entry = %key, "Skipping removal of unsafe recorded path");
            continue;
        };
        match tokio::fs::remove_file(root.join(&relative)).await {
            Ok(()) => debug!(entry = %key, "Removed file dropped from package"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(entry = %key, error = %e, "Could not remove dropped file"),
        }
    }
}
