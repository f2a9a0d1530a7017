//! Units of work for the download engine.

use std::path::{Path, PathBuf};

use crate::archive::HashAlgorithm;
use crate::manager::catalog::{ExpectedDigest, Unpack};

/// Post-processing target for a verified file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackTarget {
    pub mode: Unpack,
    pub dest: PathBuf,
}

/// One file to fetch, verify and promote.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Human-readable name used in errors and logs.
    pub label: String,
    pub url: String,
    /// Partial download location, kept between attempts for resume.
    pub staging_path: PathBuf,
    /// Where the verified file is renamed to.
    pub final_path: PathBuf,
    pub expected: Option<ExpectedDigest>,
    pub size_hint: Option<u64>,
    pub unpack: Option<UnpackTarget>,
}

impl DownloadJob {
    pub fn new(label: impl Into<String>, url: impl Into<String>, final_path: PathBuf) -> Self {
        let staging_path = part_path(&final_path);
        Self {
            label: label.into(),
            url: url.into(),
            staging_path,
            final_path,
            expected: None,
            size_hint: None,
            unpack: None,
        }
    }

    /// Stage the partial file under `staging_dir` instead of next to the target.
    pub fn staged_in(mut self, staging_dir: &Path, relative: &Path) -> Self {
        self.staging_path = part_path(&staging_dir.join(relative));
        self
    }

    pub fn with_expected(mut self, expected: Option<ExpectedDigest>) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_size_hint(mut self, size: Option<u64>) -> Self {
        self.size_hint = size;
        self
    }

    pub fn with_unpack(mut self, unpack: Option<UnpackTarget>) -> Self {
        self.unpack = unpack;
        self
    }

    /// Algorithm used to fingerprint the file after download.
    pub fn digest_algorithm(&self) -> HashAlgorithm {
        self.expected
            .as_ref()
            .map(|e| e.algorithm)
            .unwrap_or(HashAlgorithm::Sha256)
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// A job that was downloaded, verified and promoted.
#[derive(Debug, Clone)]
pub struct CompletedDownload {
    pub job: DownloadJob,
    pub algorithm: HashAlgorithm,
    pub digest: String,
    pub size: u64,
}
