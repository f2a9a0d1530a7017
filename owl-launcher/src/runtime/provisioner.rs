//! Java runtime provisioning.
//!
//! `ensure_runtime` looks for a usable runtime in this order:
//!
//! 1. The user override, when it exists and reports a compatible version
//! 2. The runtime index
//! 3. The managed install directory `jre-<major>`
//! 4. A fresh Adoptium JRE: download, verify SHA-256, extract into a
//!    scratch directory, move into place, record in the index

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveKind, HashAlgorithm};
use crate::locks::KeyedLocks;
use crate::manager::download::{
    DownloadEngine, DownloadJob, ProgressCallback, ProgressCounters, ProgressReporter,
    DEFAULT_REPORT_INTERVAL,
};
use crate::manager::{CatalogClient, ExpectedDigest};

use super::compat::{detect_java_major, required_java_major, satisfies};
use super::error::{RuntimeError, RuntimeResult};
use super::index::RuntimeIndex;
use super::platform::{find_java, AdoptiumPlatform};

pub const ADOPTIUM_API_URL: &str = "https://api.adoptium.net";

const STAGING_DIR: &str = ".staging";

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    binaries: Vec<Binary>,
}

#[derive(Debug, Deserialize)]
struct Binary {
    package: Package,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    link: String,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Finds or installs Java runtimes under a managed directory.
pub struct RuntimeProvisioner {
    catalog: CatalogClient,
    engine: DownloadEngine,
    runtimes_dir: PathBuf,
    api_base: String,
    platform: Option<AdoptiumPlatform>,
    locks: KeyedLocks,
}

impl RuntimeProvisioner {
    pub fn new(catalog: CatalogClient, engine: DownloadEngine, runtimes_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            engine,
            runtimes_dir: runtimes_dir.into(),
            api_base: ADOPTIUM_API_URL.to_string(),
            platform: AdoptiumPlatform::host(),
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_platform(mut self, platform: Option<AdoptiumPlatform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn runtimes_dir(&self) -> &Path {
        &self.runtimes_dir
    }

    /// Managed install directory for a Java major version.
    pub fn managed_dir(&self, major: u32) -> PathBuf {
        self.runtimes_dir.join(format!("jre-{major}"))
    }

    /// Path of a `java` binary able to run `game_version`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::UnsupportedHost`] or [`RuntimeError::NoAsset`] when
    /// nothing can be installed; download and install failures otherwise.
    pub async fn ensure_runtime(
        &self,
        game_version: &str,
        override_path: Option<&Path>,
        progress: ProgressCallback,
        cancel: &CancellationToken,
    ) -> RuntimeResult<PathBuf> {
        let major = required_java_major(game_version);

        if let Some(java) = override_path.filter(|p| p.is_file()) {
            match detect_java_major(java).await {
                Some(found) if satisfies(found, major) => {
                    debug!(java = %java.display(), found, major, "Using configured Java");
                    return Ok(java.to_path_buf());
                }
                found => {
                    warn!(java = %java.display(), ?found, major, "Configured Java not usable, falling back");
                }
            }
        }

        let _guard = self.locks.lock(&major.to_string()).await;

        let mut index = RuntimeIndex::load(&self.runtimes_dir).await?;
        if let Some(java) = index.lookup(major) {
            return Ok(java.to_path_buf());
        }

        let managed = self.managed_dir(major);
        if let Some((_, java)) = find_java(&managed) {
            index.record(major, java.clone());
            index.save(&self.runtimes_dir).await?;
            return Ok(java);
        }

        let java = self.install(major, progress, cancel).await?;
        index.record(major, java.clone());
        index.save(&self.runtimes_dir).await?;
        info!(major, java = %java.display(), "Java runtime installed");
        Ok(java)
    }

    async fn install(
        &self,
        major: u32,
        progress: ProgressCallback,
        cancel: &CancellationToken,
    ) -> RuntimeResult<PathBuf> {
        let platform = self.platform.ok_or_else(|| RuntimeError::UnsupportedHost {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        })?;
        let package = self.query(major, platform).await?;

        let kind = ArchiveKind::from_name(&package.name).ok_or_else(|| {
            RuntimeError::install(&self.runtimes_dir, format!("unsupported archive {}", package.name))
        })?;
        let staging = self.runtimes_dir.join(STAGING_DIR);
        let archive_path = staging.join(&package.name);

        let expected = package
            .checksum
            .as_ref()
            .map(|hex| ExpectedDigest {
                algorithm: HashAlgorithm::Sha256,
                hex: hex.to_ascii_lowercase(),
            });
        let job = DownloadJob::new(package.name.clone(), package.link.clone(), archive_path.clone())
            .with_expected(expected)
            .with_size_hint(package.size);

        let mut jobs = vec![job];
        let bytes = self.engine.fetch_sizes(&mut jobs).await;
        let counters = Arc::new(ProgressCounters::new(jobs.len(), bytes));
        let reporter =
            ProgressReporter::spawn(Arc::clone(&counters), DEFAULT_REPORT_INTERVAL, progress);
        let downloaded = self.engine.run(jobs, counters, cancel, |_| {}).await;
        reporter.finish().await;
        downloaded?;

        let result = self.unpack(major, &archive_path, kind).await;
        let _ = tokio::fs::remove_file(&archive_path).await;
        result
    }

    async fn query(&self, major: u32, platform: AdoptiumPlatform) -> RuntimeResult<Package> {
        let url = format!(
            "{}/v3/assets/feature_releases/{}/ga?architecture={}&image_type=jre&os={}&vendor=eclipse&heap_size=normal",
            self.api_base.trim_end_matches('/'),
            major,
            platform.arch,
            platform.os
        );
        let body = self.catalog.fetch_bytes(&url).await.map_err(|e| match e {
            crate::manager::ManagerError::HttpStatus { status: 404, .. } => {
                RuntimeError::NoAsset { major }
            }
            other => RuntimeError::Query {
                url: url.clone(),
                reason: other.to_string(),
            },
        })?;
        let releases: Vec<Release> =
            serde_json::from_slice(&body).map_err(|e| RuntimeError::Query {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        releases
            .into_iter()
            .flat_map(|r| r.binaries)
            .map(|b| b.package)
            .next()
            .ok_or(RuntimeError::NoAsset { major })
    }

    /// Extract into a scratch directory, then move the runtime home into place.
    async fn unpack(&self, major: u32, archive_path: &Path, kind: ArchiveKind) -> RuntimeResult<PathBuf> {
        let scratch = tempfile::tempdir_in(&self.runtimes_dir)
            .map_err(|e| RuntimeError::install(&self.runtimes_dir, e))?;

        let source = archive_path.to_path_buf();
        let dest = scratch.path().to_path_buf();
        tokio::task::spawn_blocking(move || archive::extract(&source, &dest, kind))
            .await
            .map_err(|e| RuntimeError::install(scratch.path(), e))?
            .map_err(|e| RuntimeError::install(scratch.path(), e))?;

        let (home, _) = find_java(scratch.path())
            .ok_or_else(|| RuntimeError::BinaryNotFound(scratch.path().to_path_buf()))?;

        let target = self.managed_dir(major);
        if tokio::fs::metadata(&target).await.is_ok() {
            tokio::fs::remove_dir_all(&target)
                .await
                .map_err(|e| RuntimeError::install(&target, e))?;
        }
        if home == scratch.path() {
            // Archive without a top-level folder: the scratch dir is the home.
            let scratch_path = scratch.into_path();
            tokio::fs::rename(&scratch_path, &target)
                .await
                .map_err(|e| RuntimeError::install(&target, e))?;
        } else {
            tokio::fs::rename(&home, &target)
                .await
                .map_err(|e| RuntimeError::install(&target, e))?;
        }

        find_java(&target)
            .map(|(_, java)| java)
            .ok_or(RuntimeError::BinaryNotFound(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::digest_bytes;
    use crate::manager::download::{HttpDownloader, RetryPolicy};
    use httptest::{all_of, matchers::*, responders::*, Expectation, Server};
    use std::time::Duration;
    use tempfile::TempDir;

    const LINUX_X64: AdoptiumPlatform = AdoptiumPlatform {
        os: "linux",
        arch: "x64",
    };

    fn provisioner(server: &Server, dir: &Path) -> RuntimeProvisioner {
        let timeout = Duration::from_secs(5);
        let downloader = Arc::new(HttpDownloader::new(timeout).unwrap());
        RuntimeProvisioner::new(
            CatalogClient::new(timeout).unwrap(),
            DownloadEngine::new(downloader, 2, RetryPolicy::None),
            dir,
        )
        .with_api_base(server.url_str(""))
        .with_platform(Some(LINUX_X64))
    }

    fn no_progress() -> ProgressCallback {
        Arc::new(|_| {})
    }

    #[cfg(unix)]
    fn jre_tarball(top: &str, script: &str) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{top}/bin/java"), script.as_bytes())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installs_from_adoptium_once() {
        let server = Server::run();
        let tarball = jre_tarball("jdk-17.0.9+9-jre", "#!/bin/sh\n");
        let name = "OpenJDK17U-jre_x64_linux_hotspot_17.0.9_9.tar.gz";

        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v3/assets/feature_releases/17/ga"),
                request::query(url_decoded(contains(("os", "linux")))),
                request::query(url_decoded(contains(("image_type", "jre")))),
            ])
            .times(1)
            .respond_with(json_encoded(serde_json::json!([{
                "binaries": [{"package": {
                    "name": name,
                    "link": server.url_str("/jre.tar.gz"),
                    "checksum": digest_bytes(HashAlgorithm::Sha256, &tarball),
                    "size": tarball.len()
                }}]
            }]))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/jre.tar.gz"))
                .times(1)
                .respond_with(status_code(200).body(tarball)),
        );

        let temp = TempDir::new().unwrap();
        let p = provisioner(&server, temp.path());
        let cancel = CancellationToken::new();

        let java = p
            .ensure_runtime("1.20.1", None, no_progress(), &cancel)
            .await
            .unwrap();
        assert_eq!(java, temp.path().join("jre-17/bin/java"));
        assert!(java.is_file());
        assert!(!temp.path().join(STAGING_DIR).join(name).exists());

        // Second call is served from the index.
        let again = p
            .ensure_runtime("1.19.2", None, no_progress(), &cancel)
            .await
            .unwrap();
        assert_eq!(again, java);
        let index = RuntimeIndex::load(temp.path()).await.unwrap();
        assert_eq!(index.lookup(17), Some(java.as_path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_checksum_mismatch_installs_nothing() {
        let server = Server::run();
        let tarball = jre_tarball("jdk-21.0.1+12-jre", "#!/bin/sh\n");
        server.expect(
            Expectation::matching(request::method_path("GET", "/v3/assets/feature_releases/21/ga"))
                .respond_with(json_encoded(serde_json::json!([{
                    "binaries": [{"package": {
                        "name": "OpenJDK21U-jre_x64_linux_hotspot.tar.gz",
                        "link": server.url_str("/jre.tar.gz"),
                        "checksum": "00".repeat(32),
                        "size": tarball.len()
                    }}]
                }]))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/jre.tar.gz"))
                .respond_with(status_code(200).body(tarball)),
        );

        let temp = TempDir::new().unwrap();
        let result = provisioner(&server, temp.path())
            .ensure_runtime("1.21", None, no_progress(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(RuntimeError::Download(crate::manager::ManagerError::IntegrityMismatch { .. }))
        ));
        assert!(!temp.path().join("jre-21").exists());
    }

    #[tokio::test]
    async fn test_no_asset() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/v3/assets/feature_releases/8/ga"))
                .respond_with(json_encoded(serde_json::json!([]))),
        );
        let temp = TempDir::new().unwrap();
        let err = provisioner(&server, temp.path())
            .ensure_runtime("1.12.2", None, no_progress(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoAsset { major: 8 }));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_unsupported_host() {
        let server = Server::run();
        let temp = TempDir::new().unwrap();
        let err = provisioner(&server, temp.path())
            .with_platform(None)
            .ensure_runtime("1.20.1", None, no_progress(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnsupportedHost { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_managed_dir_is_adopted() {
        let server = Server::run();
        let temp = TempDir::new().unwrap();
        let java = temp.path().join("jre-17/bin/java");
        std::fs::create_dir_all(java.parent().unwrap()).unwrap();
        std::fs::write(&java, b"#!/bin/sh\n").unwrap();

        let found = provisioner(&server, temp.path())
            .ensure_runtime("1.18.2", None, no_progress(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(found, java);
        let index = RuntimeIndex::load(temp.path()).await.unwrap();
        assert_eq!(index.lookup(17), Some(java.as_path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compatible_override_wins() {
        use std::os::unix::fs::PermissionsExt;

        let server = Server::run();
        let temp = TempDir::new().unwrap();
        let java = temp.path().join("custom-java");
        std::fs::write(
            &java,
            "#!/bin/sh\necho 'openjdk version \"21.0.1\" 2023-10-17' 1>&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = provisioner(&server, temp.path())
            .ensure_runtime("1.20.1", Some(&java), no_progress(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(found, java);
    }
}
