//! Mod loader version lookup.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::manager::{CatalogClient, ManagerError, ManagerResult};

pub const FABRIC_META_URL: &str = "https://meta.fabricmc.net/v2/versions/loader";
pub const FORGE_PROMOTIONS_URL: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";
pub const NEOFORGE_METADATA_URL: &str =
    "https://maven.neoforged.net/releases/net/neoforged/neoforge/maven-metadata.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderKind {
    Vanilla,
    Fabric,
    Forge,
    NeoForge,
}

impl LoaderKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vanilla => "vanilla",
            Self::Fabric => "fabric",
            Self::Forge => "forge",
            Self::NeoForge => "neoforge",
        }
    }

    /// Id of the version profile a loader install adds under `versions/`.
    pub fn profile_id(&self, game_version: &str, loader_version: &str) -> Option<String> {
        match self {
            Self::Vanilla => None,
            Self::Fabric => Some(format!("fabric-loader-{loader_version}-{game_version}")),
            Self::Forge => Some(format!("{game_version}-forge-{loader_version}")),
            Self::NeoForge => Some(format!("neoforge-{loader_version}")),
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LoaderKind {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "vanilla" | "none" => Ok(Self::Vanilla),
            "fabric" => Ok(Self::Fabric),
            "forge" => Ok(Self::Forge),
            "neoforge" => Ok(Self::NeoForge),
            other => Err(ManagerError::InvalidConfig(format!(
                "unknown mod loader '{other}'"
            ))),
        }
    }
}

/// NeoForge versions drop the leading `1.` of the game version: 1.20.4 → `20.4.`.
pub fn neoforge_prefix(game_version: &str) -> Option<String> {
    let rest = game_version.strip_prefix("1.")?;
    let mut parts = rest.split('.');
    let minor = parts.next().filter(|p| !p.is_empty())?;
    let patch = parts.next().unwrap_or("0");
    Some(format!("{minor}.{patch}."))
}

/// Finds the newest loader build for a game version.
#[derive(Debug, Clone)]
pub struct LoaderResolver {
    client: CatalogClient,
    fabric_url: String,
    forge_url: String,
    neoforge_url: String,
}

impl LoaderResolver {
    pub fn new(client: CatalogClient) -> Self {
        Self {
            client,
            fabric_url: FABRIC_META_URL.to_string(),
            forge_url: FORGE_PROMOTIONS_URL.to_string(),
            neoforge_url: NEOFORGE_METADATA_URL.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        fabric: impl Into<String>,
        forge: impl Into<String>,
        neoforge: impl Into<String>,
    ) -> Self {
        self.fabric_url = fabric.into();
        self.forge_url = forge.into();
        self.neoforge_url = neoforge.into();
        self
    }

    /// Latest `kind` version for `game_version`. Empty for vanilla.
    pub async fn latest(&self, kind: LoaderKind, game_version: &str) -> ManagerResult<String> {
        let version = match kind {
            LoaderKind::Vanilla => return Ok(String::new()),
            LoaderKind::Fabric => self.latest_fabric(game_version).await?,
            LoaderKind::Forge => self.latest_forge(game_version).await?,
            LoaderKind::NeoForge => self.latest_neoforge(game_version).await?,
        };
        debug!(loader = %kind, game_version, version = %version, "Loader version resolved");
        Ok(version)
    }

    async fn latest_fabric(&self, game_version: &str) -> ManagerResult<String> {
        let url = format!("{}/{}", self.fabric_url.trim_end_matches('/'), game_version);
        let listing = self.fetch_json(&url).await?;
        listing
            .as_array()
            .and_then(|builds| builds.first())
            .and_then(|build| build["loader"]["version"].as_str())
            .map(str::to_string)
            .ok_or_else(|| not_found(LoaderKind::Fabric, game_version))
    }

    async fn latest_forge(&self, game_version: &str) -> ManagerResult<String> {
        let promotions = self.fetch_json(&self.forge_url).await?;
        let promos = &promotions["promos"];
        promos[format!("{game_version}-recommended")]
            .as_str()
            .or_else(|| promos[format!("{game_version}-latest")].as_str())
            .map(str::to_string)
            .ok_or_else(|| not_found(LoaderKind::Forge, game_version))
    }

    async fn latest_neoforge(&self, game_version: &str) -> ManagerResult<String> {
        let prefix = neoforge_prefix(game_version)
            .ok_or_else(|| not_found(LoaderKind::NeoForge, game_version))?;
        let bytes = self.client.fetch_bytes(&self.neoforge_url).await?;
        let xml = String::from_utf8_lossy(&bytes);
        latest_matching(&xml, &prefix).ok_or_else(|| not_found(LoaderKind::NeoForge, game_version))
    }

    async fn fetch_json(&self, url: &str) -> ManagerResult<Value> {
        let bytes = self.client.fetch_bytes(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| ManagerError::ManifestParseFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Last `<version>` in maven metadata starting with `prefix`, preferring stable builds.
fn latest_matching(xml: &str, prefix: &str) -> Option<String> {
    let re = Regex::new(r"<version>\s*([^<\s]+)\s*</version>").ok()?;
    let candidates: Vec<&str> = re
        .captures_iter(xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|v| v.starts_with(prefix))
        .collect();
    candidates
        .iter()
        .rev()
        .find(|v| !v.contains('-'))
        .or_else(|| candidates.last())
        .map(|v| v.to_string())
}

fn not_found(kind: LoaderKind, game_version: &str) -> ManagerError {
    ManagerError::VersionNotFound(format!("{kind} for {game_version}"))
}
