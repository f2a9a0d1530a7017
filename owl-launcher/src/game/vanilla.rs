//! Base game acquisition.
//!
//! Resolves a game version into the [`FileEntry`] list the content syncer
//! installs ahead of a package's own files: the client jar, the libraries
//! admitted for this host (native classifiers unpacked into `natives/`) and
//! every asset object. The version document and the asset index are written
//! directly, after their SHA-1 has been checked.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::archive::{digest_bytes, HashAlgorithm};
use crate::manager::{CatalogClient, FileEntry, ManagerError, ManagerResult, Unpack};

use super::rules::RuleContext;
use super::version::{version_json_path, Artifact, VersionDetails, VersionManifest, VERSION_MANIFEST_URL};

/// Asset object CDN.
pub const RESOURCES_BASE_URL: &str = "https://resources.download.minecraft.net";

#[derive(Debug, Deserialize)]
struct AssetIndex {
    objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
struct AssetObject {
    hash: String,
    size: u64,
}

/// Resolves game versions into installable entries.
#[derive(Debug, Clone)]
pub struct VanillaResolver {
    client: CatalogClient,
    manifest_url: String,
    resources_url: String,
}

impl VanillaResolver {
    pub fn new(client: CatalogClient) -> Self {
        Self {
            client,
            manifest_url: VERSION_MANIFEST_URL.to_string(),
            resources_url: RESOURCES_BASE_URL.to_string(),
        }
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn with_resources_url(mut self, url: impl Into<String>) -> Self {
        self.resources_url = url.into();
        self
    }

    /// Write the metadata of `version` under `root` and list its files.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::VersionNotFound`] if the manifest has no such version
    /// - [`ManagerError::IntegrityMismatch`] if a metadata document fails its SHA-1
    pub async fn resolve(
        &self,
        root: &Path,
        version: &str,
        ctx: &RuleContext,
    ) -> ManagerResult<Vec<FileEntry>> {
        let manifest_bytes = self.client.fetch_bytes(&self.manifest_url).await?;
        let manifest: VersionManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|e| ManagerError::ManifestParseFailed {
                url: self.manifest_url.clone(),
                reason: e.to_string(),
            })?;
        let reference = manifest
            .find(version)
            .ok_or_else(|| ManagerError::VersionNotFound(version.to_string()))?;

        let details_bytes = self
            .fetch_verified(&reference.url, reference.sha1.as_deref(), version)
            .await?;
        let details = VersionDetails::parse(&details_bytes, &reference.url)?;
        write_atomic(&version_json_path(root, version), &details_bytes).await?;

        let mut entries = Vec::new();
        if let Some(downloads) = &details.downloads {
            entries.push(artifact_entry(
                &downloads.client,
                &format!("versions/{version}"),
                &format!("{version}.jar"),
            ));
        }

        let libraries = library_entries(&details, ctx);
        let library_count = libraries.len();
        entries.extend(libraries);

        let mut asset_count = 0;
        if let Some(index_ref) = &details.asset_index {
            let index_bytes = self
                .fetch_verified(&index_ref.url, index_ref.sha1.as_deref(), &index_ref.id)
                .await?;
            let index: AssetIndex =
                serde_json::from_slice(&index_bytes).map_err(|e| ManagerError::ManifestParseFailed {
                    url: index_ref.url.clone(),
                    reason: e.to_string(),
                })?;
            write_atomic(
                &root
                    .join("assets")
                    .join("indexes")
                    .join(format!("{}.json", index_ref.id)),
                &index_bytes,
            )
            .await?;

            let assets = self.asset_entries(&index);
            asset_count = assets.len();
            entries.extend(assets);
        }

        info!(
            version,
            libraries = library_count,
            assets = asset_count,
            "Game version resolved"
        );
        Ok(entries)
    }

    async fn fetch_verified(
        &self,
        url: &str,
        sha1: Option<&str>,
        label: &str,
    ) -> ManagerResult<Vec<u8>> {
        let bytes = self.client.fetch_bytes(url).await?;
        if let Some(expected) = sha1 {
            let actual = digest_bytes(HashAlgorithm::Sha1, &bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ManagerError::IntegrityMismatch {
                    entry: label.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(bytes)
    }

    fn asset_entries(&self, index: &AssetIndex) -> Vec<FileEntry> {
        let base = self.resources_url.trim_end_matches('/');
        let mut seen = HashSet::new();
        index
            .objects
            .values()
            .filter(|object| {
                if !is_sha1_hex(&object.hash) {
                    warn!(hash = %object.hash, "Skipping asset with malformed hash");
                    return false;
                }
                seen.insert(object.hash.clone())
            })
            .map(|object| {
                let prefix = &object.hash[..2];
                FileEntry::new(
                    object.hash.clone(),
                    format!("{base}/{prefix}/{}", object.hash),
                    format!("assets/objects/{prefix}"),
                )
                .with_hash(HashAlgorithm::Sha1, object.hash.clone())
                .with_size(object.size)
            })
            .collect()
    }
}

/// Asset objects are addressed by their SHA-1, so anything other than 40
/// hex digits cannot name a CDN object or a safe directory.
fn is_sha1_hex(hash: &str) -> bool {
    hash.len() == 40 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Library jars and native classifiers admitted for `ctx`.
pub fn library_entries(details: &VersionDetails, ctx: &RuleContext) -> Vec<FileEntry> {
    let mut entries = Vec::new();
    for library in details.libraries.iter().filter(|l| l.applies(ctx)) {
        if let Some(artifact) = library.artifact() {
            if let Some(entry) = library_entry(&artifact, &library.name) {
                let entry = if library.is_split_natives() {
                    entry.with_unpack(Unpack::Natives)
                } else {
                    entry
                };
                entries.push(entry);
            }
        }
        if let Some(native) = library.native_artifact(ctx) {
            if let Some(entry) = library_entry(&native, &library.name) {
                entries.push(entry.with_unpack(Unpack::Natives));
            }
        }
    }
    debug!(count = entries.len(), "Library entries planned");
    entries
}

fn library_entry(artifact: &Artifact, name: &str) -> Option<FileEntry> {
    let path = artifact
        .path
        .clone()
        .or_else(|| super::version::maven_path(name))?;
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (format!("libraries/{dir}"), file.to_string()),
        None => ("libraries".to_string(), path),
    };
    Some(artifact_entry(artifact, &dir, &file))
}

fn artifact_entry(artifact: &Artifact, dir: &str, file: &str) -> FileEntry {
    let mut entry = FileEntry::new(file, artifact.url.clone(), dir);
    if let Some(sha1) = &artifact.sha1 {
        entry = entry.with_hash(HashAlgorithm::Sha1, sha1.clone());
    }
    if let Some(size) = artifact.size {
        entry = entry.with_size(size);
    }
    entry
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> ManagerResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, bytes)
        .await
        .map_err(|e| ManagerError::WriteFailed {
            path: temp.clone(),
            source: e,
        })?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| ManagerError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use std::collections::BTreeMap as Map;
    use std::time::Duration;
    use tempfile::TempDir;

    fn linux() -> RuleContext {
        RuleContext {
            os_name: "linux".into(),
            arch: "x64".into(),
            os_version: None,
            features: Map::new(),
        }
    }

    fn details_json(server: &Server, index_sha1: &str) -> String {
        serde_json::json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": [
                {"name": "com.mojang:brigadier:1.1.8",
                 "downloads": {"artifact": {"path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar",
                    "url": "https://libraries.example/brigadier.jar", "sha1": "5244ce82c3337bba4a196a3ce858bfaecc74404a", "size": 77392}}},
                {"name": "org.lwjgl:lwjgl:3.3.1:natives-linux",
                 "rules": [{"action": "allow", "os": {"name": "linux"}}],
                 "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar",
                    "url": "https://libraries.example/lwjgl-natives-linux.jar"}}},
                {"name": "org.lwjgl:lwjgl:3.3.1:natives-macos",
                 "rules": [{"action": "allow", "os": {"name": "osx"}}],
                 "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-macos.jar",
                    "url": "https://libraries.example/lwjgl-natives-macos.jar"}}}
            ],
            "downloads": {"client": {"url": "https://piston.example/client.jar", "sha1": "cc", "size": 10}},
            "assetIndex": {"id": "5", "url": server.url_str("/indexes/5.json"), "sha1": index_sha1}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_resolve_lists_client_libraries_and_assets() {
        let server = Server::run();
        let index = serde_json::json!({"objects": {
            "icons/icon_16x16.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3665},
            "icons/copy.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3665},
            "lang/de_de.json": {"hash": "0a4e4f2b5bea3d3a8ed5bfcdfa2a9c1bc8a31b3f", "size": 10}
        }})
        .to_string();
        let index_sha1 = digest_bytes(HashAlgorithm::Sha1, index.as_bytes());
        let details = details_json(&server, &index_sha1);
        let details_sha1 = digest_bytes(HashAlgorithm::Sha1, details.as_bytes());

        server.expect(
            Expectation::matching(request::method_path("GET", "/manifest.json")).respond_with(
                json_encoded(serde_json::json!({"versions": [
                    {"id": "1.20.1", "type": "release", "url": server.url_str("/1.20.1.json"), "sha1": details_sha1}
                ]})),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/1.20.1.json"))
                .respond_with(status_code(200).body(details)),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/indexes/5.json"))
                .respond_with(status_code(200).body(index)),
        );

        let temp = TempDir::new().unwrap();
        let resolver = VanillaResolver::new(CatalogClient::new(Duration::from_secs(5)).unwrap())
            .with_manifest_url(server.url_str("/manifest.json"))
            .with_resources_url("https://assets.example");
        let entries = resolver.resolve(temp.path(), "1.20.1", &linux()).await.unwrap();

        let paths: Vec<String> = entries
            .iter()
            .map(|e| e.install_path().unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(paths[0], "versions/1.20.1/1.20.1.jar");
        assert!(paths.contains(&"libraries/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar".to_string()));
        assert!(!paths.iter().any(|p| p.contains("natives-macos")));
        assert!(paths.contains(&"assets/objects/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a".to_string()));
        // One entry per distinct object hash.
        assert_eq!(paths.iter().filter(|p| p.starts_with("assets/")).count(), 2);

        let natives = entries
            .iter()
            .find(|e| e.relative_path.contains("natives-linux"))
            .unwrap();
        assert_eq!(natives.unpack_mode(), Some(Unpack::Natives));

        let asset = entries.iter().find(|e| e.relative_path.starts_with("bdf4")).unwrap();
        assert_eq!(
            asset.source_url,
            "https://assets.example/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );

        assert!(version_json_path(temp.path(), "1.20.1").exists());
        assert!(temp.path().join("assets/indexes/5.json").exists());
    }

    #[tokio::test]
    async fn test_resolve_rejects_tampered_version_document() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/manifest.json")).respond_with(
                json_encoded(serde_json::json!({"versions": [
                    {"id": "1.20.1", "url": server.url_str("/1.20.1.json"),
                     "sha1": "0000000000000000000000000000000000000000"}
                ]})),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/1.20.1.json"))
                .respond_with(status_code(200).body("{\"id\":\"1.20.1\"}")),
        );

        let temp = TempDir::new().unwrap();
        let resolver = VanillaResolver::new(CatalogClient::new(Duration::from_secs(5)).unwrap())
            .with_manifest_url(server.url_str("/manifest.json"));
        let result = resolver.resolve(temp.path(), "1.20.1", &linux()).await;

        assert!(matches!(result, Err(ManagerError::IntegrityMismatch { .. })));
        assert!(!version_json_path(temp.path(), "1.20.1").exists());
    }

    #[tokio::test]
    async fn test_unknown_version() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/manifest.json"))
                .respond_with(json_encoded(serde_json::json!({"versions": []}))),
        );
        let temp = TempDir::new().unwrap();
        let resolver = VanillaResolver::new(CatalogClient::new(Duration::from_secs(5)).unwrap())
            .with_manifest_url(server.url_str("/manifest.json"));
        let result = resolver.resolve(temp.path(), "9.9", &linux()).await;
        assert!(matches!(result, Err(ManagerError::VersionNotFound(_))));
    }

    #[test]
    fn test_malformed_asset_hashes_are_skipped() {
        let index: AssetIndex = serde_json::from_value(serde_json::json!({"objects": {
            "good.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 1},
            "multibyte.png": {"hash": "aébdf48ef6b5d0d23bbb02e17d04865216179f5", "size": 1},
            "short.png": {"hash": "ab", "size": 1},
            "traversal.png": {"hash": "..", "size": 1}
        }}))
        .unwrap();
        let resolver = VanillaResolver::new(CatalogClient::new(Duration::from_secs(5)).unwrap());

        let entries = resolver.asset_entries(&index);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "bdf48ef6b5d0d23bbb02e17d04865216179f510a");
        assert!(is_sha1_hex("BDF48EF6B5D0D23BBB02E17D04865216179F510A"));
        assert!(!is_sha1_hex("zdf48ef6b5d0d23bbb02e17d04865216179f510a"));
    }
}
