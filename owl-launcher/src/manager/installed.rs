//! Installed content index (`content-state.json` in each instance root).
//!
//! Records which files of a package were last downloaded and verified, with
//! their digests. The syncer is the only writer and holds the package lock
//! while it mutates and saves the index.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive::HashAlgorithm;

use super::catalog::{ExpectedDigest, PackageDescriptor};
use super::error::{ManagerError, ManagerResult};

/// File name of the index inside an instance root.
pub const CONTENT_STATE_FILE: &str = "content-state.json";

/// Digest and size of one verified file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub algorithm: HashAlgorithm,
    pub digest: String,
    pub size: u64,
}

/// Index key for a relative path: forward slashes on every platform.
pub fn record_key(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

/// What is installed in one instance root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledContent {
    pub package_id: String,
    pub package_version: String,
    pub target_version: String,
    #[serde(default)]
    pub loader: String,
    #[serde(default)]
    pub loader_version: String,
    /// Set once a sync finished without error.
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub synced_at: Option<i64>,
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
}

impl InstalledContent {
    /// Fresh, empty index for `package`.
    pub fn for_package(package: &PackageDescriptor) -> Self {
        Self {
            package_id: package.id.clone(),
            package_version: package.version.clone(),
            target_version: package.target_version.clone(),
            loader: package.loader.clone(),
            loader_version: package.loader_version.clone(),
            complete: false,
            synced_at: None,
            files: BTreeMap::new(),
        }
    }

    pub fn path_in(root: &Path) -> PathBuf {
        root.join(CONTENT_STATE_FILE)
    }

    /// Load the index of `root`. A missing index is `Ok(None)`.
    pub async fn load(root: &Path) -> ManagerResult<Option<Self>> {
        let path = Self::path_in(root);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ManagerError::StateStorage {
                    path,
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ManagerError::StateStorage {
                path,
                reason: e.to_string(),
            }),
        }
    }

    /// Write the index through a temporary file and a rename.
    pub async fn save(&self, root: &Path) -> ManagerResult<()> {
        let path = Self::path_in(root);
        let storage = |e: &dyn std::fmt::Display| ManagerError::StateStorage {
            path: path.clone(),
            reason: e.to_string(),
        };

        let bytes = serde_json::to_vec_pretty(self).map_err(|e| storage(&e))?;
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| storage(&e))?;
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| storage(&e))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| storage(&e))?;
        Ok(())
    }

    /// Adopt a (possibly new) descriptor, keeping file records of the same package.
    pub fn adopt(&mut self, package: &PackageDescriptor) {
        if self.package_id != package.id {
            *self = Self::for_package(package);
            return;
        }
        self.package_version = package.version.clone();
        self.target_version = package.target_version.clone();
        self.loader = package.loader.clone();
        self.loader_version = package.loader_version.clone();
        self.complete = false;
    }

    /// Whether the file at `key` can be skipped.
    ///
    /// True when it is recorded, still on disk with the recorded size, and
    /// the recorded digest matches the declared one (if any).
    pub fn is_current(&self, root: &Path, key: &str, expected: Option<&ExpectedDigest>) -> bool {
        let Some(record) = self.files.get(key) else {
            return false;
        };
        let on_disk = std::fs::metadata(root.join(key))
            .map(|m| m.is_file() && m.len() == record.size)
            .unwrap_or(false);
        if !on_disk {
            return false;
        }
        match expected {
            Some(digest) => {
                record.algorithm == digest.algorithm && record.digest.eq_ignore_ascii_case(&digest.hex)
            }
            None => true,
        }
    }

    pub fn record(&mut self, key: String, record: FileRecord) {
        self.files.insert(key, record);
    }

    /// Recorded files missing from disk.
    pub fn missing_files(&self, root: &Path) -> Vec<String> {
        self.files
            .keys()
            .filter(|key| !root.join(key.as_str()).is_file())
            .cloned()
            .collect()
    }

    /// Drop every record whose key is not in `keep`, returning the dropped keys.
    pub fn retain_only(&mut self, keep: &HashSet<String>) -> Vec<String> {
        let dropped: Vec<String> = self
            .files
            .keys()
            .filter(|key| !keep.contains(key.as_str()))
            .cloned()
            .collect();
        for key in &dropped {
            self.files.remove(key);
        }
        dropped
    }
}
