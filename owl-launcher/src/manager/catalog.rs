//! Remote catalog and file manifest types.
//!
//! The catalog (modpack list) is a JSON array of [`PackageDescriptor`]s; each
//! descriptor's `url` points at a JSON array of [`FileEntry`]s. Both are
//! filtered by the caller's entitlements before they are returned.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::access::{filter_by_scope, EntitlementSet, Scoped};
use crate::archive::{sanitize_relative_path, ArchiveKind, HashAlgorithm};

use super::error::{ManagerError, ManagerResult};

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A package offered by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(rename = "minecraft_version")]
    pub target_version: String,
    #[serde(rename = "modloader", default)]
    pub loader: String,
    #[serde(rename = "modloader_version", default)]
    pub loader_version: String,
    #[serde(rename = "image", default)]
    pub image_ref: String,
    /// URL of the package's file manifest.
    #[serde(rename = "url")]
    pub source_ref: String,
    #[serde(
        rename = "scopes",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_scopes: Vec<String>,
}

impl Scoped for PackageDescriptor {
    fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }
}

/// How a file is post-processed after it has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unpack {
    /// Extract the archive next to itself.
    Archive(ArchiveKind),
    /// Copy native libraries into the instance `natives/` directory.
    Natives,
}

/// A declared content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: HashAlgorithm,
    pub hex: String,
}

/// One file of a package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "filename")]
    pub relative_path: String,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "dir", default)]
    pub destination_dir: String,
    #[serde(rename = "hash", default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(rename = "hashformat", default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    #[serde(
        rename = "scopes",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_scopes: Vec<String>,
    /// Size in bytes when the publisher knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Set by the publisher to have an archive unpacked after download.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub extract: bool,
    #[serde(skip)]
    pub unpack: Option<Unpack>,
}

impl Scoped for FileEntry {
    fn required_scopes(&self) -> &[String] {
        &self.required_scopes
    }
}

impl FileEntry {
    /// Entry with no hash, scopes or size.
    pub fn new(
        relative_path: impl Into<String>,
        source_url: impl Into<String>,
        destination_dir: impl Into<String>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            source_url: source_url.into(),
            destination_dir: destination_dir.into(),
            content_hash: None,
            hash_algorithm: None,
            required_scopes: Vec::new(),
            size: None,
            extract: false,
            unpack: None,
        }
    }

    pub fn with_hash(mut self, algorithm: HashAlgorithm, hex: impl Into<String>) -> Self {
        self.content_hash = Some(hex.into());
        self.hash_algorithm = Some(algorithm.name().to_string());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_unpack(mut self, unpack: Unpack) -> Self {
        self.unpack = Some(unpack);
        self
    }

    /// Path of the file relative to the instance root.
    ///
    /// # Errors
    ///
    /// [`ManagerError::PathTraversal`] if `dir` or `filename` would leave the
    /// instance root, or the filename is empty.
    pub fn install_path(&self) -> ManagerResult<PathBuf> {
        let traversal = || ManagerError::PathTraversal {
            entry: format!("{}/{}", self.destination_dir, self.relative_path),
        };
        let dir = sanitize_relative_path(&self.destination_dir).map_err(|_| traversal())?;
        let file = sanitize_relative_path(&self.relative_path).map_err(|_| traversal())?;
        if file.as_os_str().is_empty() {
            return Err(traversal());
        }
        Ok(dir.join(file))
    }

    /// The declared digest, if any.
    ///
    /// The algorithm comes from `hashformat`, or is inferred from the digest
    /// length when that field is absent.
    pub fn expected_digest(&self) -> ManagerResult<Option<ExpectedDigest>> {
        let Some(hex) = self
            .content_hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
        else {
            return Ok(None);
        };

        let algorithm = match self.hash_algorithm.as_deref() {
            Some(name) => HashAlgorithm::parse(name),
            None => HashAlgorithm::infer(hex),
        }
        .ok_or_else(|| {
            ManagerError::InvalidConfig(format!(
                "{}: unsupported hash format {:?}",
                self.relative_path, self.hash_algorithm
            ))
        })?;

        Ok(Some(ExpectedDigest {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        }))
    }

    /// Post-processing for this entry. An archive is only unpacked when the
    /// entry asks for it; a plain `.zip` in a manifest is installed as is.
    pub fn unpack_mode(&self) -> Option<Unpack> {
        if self.unpack.is_some() {
            return self.unpack;
        }
        if self.extract {
            ArchiveKind::from_name(&self.relative_path).map(Unpack::Archive)
        } else {
            None
        }
    }
}

/// Fetches catalogs and manifests over HTTP.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    timeout: Duration,
}

impl CatalogClient {
    pub fn new(timeout: Duration) -> ManagerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ManagerError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    /// Fetch the package list and keep the packages visible to `entitlements`.
    pub async fn fetch_catalog(
        &self,
        list_url: &str,
        entitlements: &EntitlementSet,
    ) -> ManagerResult<Vec<PackageDescriptor>> {
        let packages: Vec<PackageDescriptor> = self
            .fetch_json(list_url)
            .await
            .map_err(|e| match e {
                FetchError::Transport(reason) => ManagerError::CatalogFetchFailed {
                    url: list_url.to_string(),
                    reason,
                },
                FetchError::Parse(reason) => ManagerError::CatalogParseFailed {
                    url: list_url.to_string(),
                    reason,
                },
            })?;

        let total = packages.len();
        let visible = filter_by_scope(packages, entitlements);
        debug!(url = list_url, total, visible = visible.len(), "Catalog fetched");
        Ok(visible)
    }

    /// Fetch a package's file manifest and keep the entries visible to `entitlements`.
    pub async fn fetch_manifest(
        &self,
        manifest_url: &str,
        entitlements: &EntitlementSet,
    ) -> ManagerResult<Vec<FileEntry>> {
        let entries: Vec<FileEntry> = self
            .fetch_json(manifest_url)
            .await
            .map_err(|e| match e {
                FetchError::Transport(reason) => ManagerError::ManifestFetchFailed {
                    url: manifest_url.to_string(),
                    reason,
                },
                FetchError::Parse(reason) => ManagerError::ManifestParseFailed {
                    url: manifest_url.to_string(),
                    reason,
                },
            })?;

        let total = entries.len();
        let visible = filter_by_scope(entries, entitlements);
        debug!(url = manifest_url, total, visible = visible.len(), "Manifest fetched");
        Ok(visible)
    }

    /// GET a URL and return the raw body.
    pub async fn fetch_bytes(&self, url: &str) -> ManagerResult<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ManagerError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                ManagerError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ManagerError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let bytes = self
            .fetch_bytes(url)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

enum FetchError {
    Transport(String),
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    const CATALOG: &str = r#"[
        {
            "id": "p1",
            "name": "Beta Pack",
            "description": "Testing",
            "version": "1.0.0",
            "minecraft_version": "1.20.1",
            "modloader": "fabric",
            "modloader_version": "0.15.0",
            "image": "https://cdn.test/p1.png",
            "url": "https://cdn.test/p1.json",
            "scopes": ["beta"]
        },
        {
            "id": "p2",
            "name": "Public Pack",
            "description": "",
            "version": "2.0.0",
            "minecraft_version": "1.21",
            "modloader": "vanilla",
            "modloader_version": "",
            "image": "",
            "url": "https://cdn.test/p2.json",
            "scopes": null
        }
    ]"#;

    #[test]
    fn test_descriptor_wire_names() {
        let packages: Vec<PackageDescriptor> = serde_json::from_str(CATALOG).unwrap();
        assert_eq!(packages[0].target_version, "1.20.1");
        assert_eq!(packages[0].loader, "fabric");
        assert_eq!(packages[0].source_ref, "https://cdn.test/p1.json");
        assert_eq!(packages[0].required_scopes, vec!["beta".to_string()]);
        assert!(packages[1].required_scopes.is_empty());
    }

    #[test]
    fn test_file_entry_wire_names_and_digest() {
        let entry: FileEntry = serde_json::from_str(
            r#"{"filename":"sodium.jar","url":"https://cdn.test/sodium.jar","dir":"mods",
                "hash":"ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789ABCDEF0123456789",
                "hashformat":"sha256"}"#,
        )
        .unwrap();

        assert_eq!(entry.install_path().unwrap(), PathBuf::from("mods/sodium.jar"));
        let digest = entry.expected_digest().unwrap().unwrap();
        assert_eq!(digest.algorithm, HashAlgorithm::Sha256);
        assert_eq!(
            digest.hex,
            "abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789"
        );
        assert!(entry.unpack_mode().is_none());
    }

    #[test]
    fn test_digest_algorithm_inferred_from_length() {
        let entry = FileEntry {
            content_hash: Some("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".into()),
            ..FileEntry::new("a.jar", "https://cdn.test/a.jar", "mods")
        };
        let digest = entry.expected_digest().unwrap().unwrap();
        assert_eq!(digest.algorithm, HashAlgorithm::Sha1);

        let unhashed = FileEntry::new("b.jar", "https://cdn.test/b.jar", "mods");
        assert!(unhashed.expected_digest().unwrap().is_none());
    }

    #[test]
    fn test_install_path_rejects_traversal() {
        let entry = FileEntry::new("evil.jar", "https://cdn.test/e.jar", "../../outside");
        assert!(matches!(
            entry.install_path(),
            Err(ManagerError::PathTraversal { .. })
        ));

        let entry = FileEntry::new("", "https://cdn.test/e.jar", "mods");
        assert!(entry.install_path().is_err());
    }

    #[test]
    fn test_archives_stay_packed_unless_requested() {
        let entry = FileEntry::new("resources.zip", "https://cdn.test/resources.zip", "resourcepacks");
        assert!(entry.unpack_mode().is_none());

        let entry: FileEntry = serde_json::from_str(
            r#"{"filename":"config.zip","url":"https://cdn.test/config.zip","extract":true}"#,
        )
        .unwrap();
        assert_eq!(entry.unpack_mode(), Some(Unpack::Archive(ArchiveKind::Zip)));

        let entry = FileEntry::new("lwjgl.jar", "https://cdn.test/lwjgl.jar", "libraries")
            .with_unpack(Unpack::Natives);
        assert_eq!(entry.unpack_mode(), Some(Unpack::Natives));
    }

    #[tokio::test]
    async fn test_fetch_catalog_filters_by_scope() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/modpacks.json"))
                .times(2)
                .respond_with(status_code(200).body(CATALOG)),
        );
        let client = CatalogClient::new(Duration::from_secs(5)).unwrap();
        let url = server.url_str("/modpacks.json");

        let default_only = client
            .fetch_catalog(&url, &EntitlementSet::default())
            .await
            .unwrap();
        assert_eq!(
            default_only.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["p2"]
        );

        let beta = EntitlementSet::from_groups(["beta"]);
        let all = client.fetch_catalog(&url, &beta).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_catalog_parse_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/modpacks.json"))
                .respond_with(status_code(200).body("<html>")),
        );
        let client = CatalogClient::new(Duration::from_secs(5)).unwrap();

        let result = client
            .fetch_catalog(&server.url_str("/modpacks.json"), &EntitlementSet::default())
            .await;
        assert!(matches!(result, Err(ManagerError::CatalogParseFailed { .. })));
    }
}
