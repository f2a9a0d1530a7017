//! Locally configured modpacks (`modpacks.json`), with built-in defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::LoaderKind;
use crate::settings::{SettingsError, SettingsResult};

pub const MODPACKS_FILE: &str = "modpacks.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    pub id: String,
    pub name: String,
    pub version: String,
    pub required: bool,
    pub download_url: String,
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modpack {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub minecraft_version: String,
    #[serde(default)]
    pub forge_version: Option<String>,
    #[serde(default)]
    pub fabric_version: Option<String>,
    #[serde(default)]
    pub neoforge_version: Option<String>,
    pub image: String,
    #[serde(default)]
    pub mods: Vec<Mod>,
    pub last_updated: String,
    #[serde(default)]
    pub changelog: Option<String>,
}

impl Modpack {
    /// The loader this pack runs on and its pinned version.
    pub fn loader(&self) -> (LoaderKind, Option<&str>) {
        if let Some(v) = &self.neoforge_version {
            (LoaderKind::NeoForge, Some(v.as_str()))
        } else if let Some(v) = &self.forge_version {
            (LoaderKind::Forge, Some(v.as_str()))
        } else if let Some(v) = &self.fabric_version {
            (LoaderKind::Fabric, Some(v.as_str()))
        } else {
            (LoaderKind::Vanilla, None)
        }
    }
}

pub fn default_modpacks() -> Vec<Modpack> {
    vec![
        Modpack {
            id: "vanilla".into(),
            name: "Vanilla".into(),
            description: "Minecraft Vanilla, no mods.".into(),
            version: "1.20.1".into(),
            minecraft_version: "1.20.1".into(),
            forge_version: None,
            fabric_version: None,
            neoforge_version: None,
            image: "/images/WOLOGO.png".into(),
            mods: Vec::new(),
            last_updated: "2024-03-20".into(),
            changelog: None,
        },
        Modpack {
            id: "opti".into(),
            name: "Vanilla+".into(),
            description: "Enhanced Vanilla experience with OptiFine and QoL mods.".into(),
            version: "1.20.1".into(),
            minecraft_version: "1.20.1".into(),
            forge_version: Some("47.2.0".into()),
            fabric_version: None,
            neoforge_version: None,
            image: "/images/WOLOGO.png".into(),
            mods: vec![Mod {
                id: "optifine".into(),
                name: "OptiFine".into(),
                version: "HD_U_I7".into(),
                required: true,
                download_url: "https://optifine.net/download?f=OptiFine_1.20.1_HD_U_I7.jar".into(),
                hash: None,
            }],
            last_updated: "2024-03-20".into(),
            changelog: None,
        },
    ]
}

/// Packs listed in `path`, or the defaults when the file does not exist.
pub async fn load_modpacks(path: &Path) -> SettingsResult<Vec<Modpack>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| SettingsError::Format {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No modpack list, using defaults");
            Ok(default_modpacks())
        }
        Err(source) => Err(SettingsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let packs = load_modpacks(&temp.path().join(MODPACKS_FILE)).await.unwrap();
        let ids: Vec<&str> = packs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["vanilla", "opti"]);
        assert_eq!(packs[1].loader(), (LoaderKind::Forge, Some("47.2.0")));
        assert_eq!(packs[0].loader(), (LoaderKind::Vanilla, None));
    }

    #[tokio::test]
    async fn test_reads_camel_case_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MODPACKS_FILE);
        std::fs::write(
            &path,
            r#"[{"id": "fab", "name": "Fab", "description": "", "version": "2",
                 "minecraftVersion": "1.21", "fabricVersion": "0.16.0", "image": "",
                 "mods": [{"id": "sodium", "name": "Sodium", "version": "0.5", "required": false,
                           "downloadUrl": "https://example.invalid/sodium.jar"}],
                 "lastUpdated": "2024-06-01"}]"#,
        )
        .unwrap();

        let packs = load_modpacks(&path).await.unwrap();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].loader(), (LoaderKind::Fabric, Some("0.16.0")));
        assert_eq!(packs[0].mods[0].download_url, "https://example.invalid/sodium.jar");
    }

    #[tokio::test]
    async fn test_bad_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MODPACKS_FILE);
        std::fs::write(&path, "{").unwrap();
        assert!(load_modpacks(&path).await.is_err());
    }
}
