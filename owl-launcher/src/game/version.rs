//! Game version metadata.
//!
//! The version manifest lists every release; each release has a details
//! document with the main class, argument templates, libraries, client jar
//! and asset index. Loader profiles are details documents that name a parent
//! through `inheritsFrom`; [`load_details`] merges the chain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::manager::{ManagerError, ManagerResult};

use super::rules::{rules_allow, Rule, RuleContext};

/// Official version manifest.
pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Deepest `inheritsFrom` chain followed.
const MAX_INHERITANCE_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRef {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub versions: Vec<VersionRef>,
}

impl VersionManifest {
    pub fn find(&self, id: &str) -> Option<&VersionRef> {
        self.versions.iter().find(|v| v.id == id)
    }
}

/// A downloadable file as described by version documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    /// Maven coordinate, `group:artifact:version[:classifier]`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    /// OS name to classifier, e.g. `linux` → `natives-linux`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    /// Maven repository base for libraries without `downloads` (loader profiles).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Library {
    pub fn applies(&self, ctx: &RuleContext) -> bool {
        rules_allow(&self.rules, ctx)
    }

    /// Path under `libraries/` of the main jar, if the library has one.
    pub fn artifact_path(&self) -> Option<String> {
        match self.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            Some(artifact) => artifact.path.clone().or_else(|| maven_path(&self.name)),
            None if self.natives.is_none() => maven_path(&self.name),
            None => None,
        }
    }

    /// The main jar as a download, synthesizing one from the maven base when needed.
    pub fn artifact(&self) -> Option<Artifact> {
        if let Some(artifact) = self.downloads.as_ref().and_then(|d| d.artifact.clone()) {
            return Some(artifact);
        }
        if self.natives.is_some() {
            return None;
        }
        let path = maven_path(&self.name)?;
        let base = self.url.as_deref()?;
        Some(Artifact {
            url: format!("{}/{}", base.trim_end_matches('/'), path),
            path: Some(path),
            sha1: None,
            size: None,
        })
    }

    /// The host's native classifier artifact, for legacy `natives` libraries.
    pub fn native_artifact(&self, ctx: &RuleContext) -> Option<Artifact> {
        let classifier = self
            .natives
            .as_ref()?
            .get(ctx.natives_key())?
            .replace("${arch}", ctx.arch_bits());
        let artifact = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?
            .clone();
        Some(artifact)
    }

    /// Whether this is a split natives library (`...:natives-<os>`).
    pub fn is_split_natives(&self) -> bool {
        self.name
            .rsplit(':')
            .next()
            .is_some_and(|classifier| classifier.starts_with("natives-"))
            && self.name.matches(':').count() >= 3
    }
}

/// `group:artifact:version[:classifier]` → `group/path/artifact/version/artifact-version[-classifier].jar`.
pub fn maven_path(coordinate: &str) -> Option<String> {
    let (coordinate, extension) = match coordinate.split_once('@') {
        Some((c, ext)) => (c, ext),
        None => (coordinate, "jar"),
    };
    let parts: Vec<&str> = coordinate.split(':').collect();
    let (group, artifact, version, classifier) = match parts.as_slice() {
        [g, a, v] => (*g, *a, *v, None),
        [g, a, v, c] => (*g, *a, *v, Some(*c)),
        _ => return None,
    };
    if [group, artifact, version].iter().any(|p| p.is_empty()) {
        return None;
    }
    let file = match classifier {
        Some(c) => format!("{artifact}-{version}-{c}.{extension}"),
        None => format!("{artifact}-{version}.{extension}"),
    };
    Some(format!(
        "{}/{artifact}/{version}/{file}",
        group.replace('.', "/")
    ))
}

/// A string argument, or one guarded by rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl Argument {
    /// The argument's strings if its rules admit it.
    pub fn resolve(&self, ctx: &RuleContext) -> Vec<&str> {
        match self {
            Self::Plain(s) => vec![s.as_str()],
            Self::Conditional { rules, value } if rules_allow(rules, ctx) => match value {
                ArgumentValue::One(s) => vec![s.as_str()],
                ArgumentValue::Many(v) => v.iter().map(String::as_str).collect(),
            },
            Self::Conditional { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDownloads {
    pub client: Artifact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetails {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(default)]
    pub main_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<ClientDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl VersionDetails {
    pub fn parse(bytes: &[u8], source: &str) -> ManagerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ManagerError::ManifestParseFailed {
            url: source.to_string(),
            reason: e.to_string(),
        })
    }

    /// Layer `self` (a loader profile) over its parent.
    ///
    /// The child's main class and game arguments win; libraries and JVM
    /// arguments accumulate, child first.
    pub fn merge_onto(self, parent: VersionDetails) -> VersionDetails {
        let arguments = match (self.arguments, parent.arguments) {
            (Some(child), Some(parent)) => Some(Arguments {
                game: parent.game.into_iter().chain(child.game).collect(),
                jvm: parent.jvm.into_iter().chain(child.jvm).collect(),
            }),
            (child, parent) => child.or(parent),
        };

        let mut libraries = self.libraries;
        libraries.extend(parent.libraries);

        VersionDetails {
            id: self.id,
            inherits_from: parent.inherits_from,
            main_class: if self.main_class.is_empty() {
                parent.main_class
            } else {
                self.main_class
            },
            minecraft_arguments: self.minecraft_arguments.or(parent.minecraft_arguments),
            arguments,
            libraries,
            downloads: self.downloads.or(parent.downloads),
            asset_index: self.asset_index.or(parent.asset_index),
            assets: self.assets.or(parent.assets),
            kind: self.kind.or(parent.kind),
        }
    }

    /// Asset index id used for `${assets_index_name}`.
    pub fn asset_index_id(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or(&self.id)
    }
}

pub fn version_dir(root: &Path, id: &str) -> PathBuf {
    root.join("versions").join(id)
}

pub fn version_json_path(root: &Path, id: &str) -> PathBuf {
    version_dir(root, id).join(format!("{id}.json"))
}

pub fn version_jar_path(root: &Path, id: &str) -> PathBuf {
    version_dir(root, id).join(format!("{id}.jar"))
}

/// Read `versions/<id>/<id>.json` under `root`, merging any `inheritsFrom` chain.
///
/// Also returns the id of the jar to launch: the deepest ancestor with a
/// client download, or `id` itself.
pub async fn load_details(root: &Path, id: &str) -> ManagerResult<(VersionDetails, String)> {
    let mut details = read_details(root, id).await?;
    let mut jar_id = id.to_string();
    let mut depth = 0;

    while let Some(parent_id) = details.inherits_from.clone() {
        depth += 1;
        if depth > MAX_INHERITANCE_DEPTH {
            return Err(ManagerError::InvalidConfig(format!(
                "{id}: inheritsFrom chain deeper than {MAX_INHERITANCE_DEPTH}"
            )));
        }
        let parent = read_details(root, &parent_id).await?;
        if details.downloads.is_none() {
            jar_id = parent_id;
        }
        details = details.merge_onto(parent);
    }

    Ok((details, jar_id))
}

async fn read_details(root: &Path, id: &str) -> ManagerResult<VersionDetails> {
    let path = version_json_path(root, id);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ManagerError::VersionNotFound(id.to_string())
        } else {
            ManagerError::ReadFailed {
                path: path.clone(),
                source: e,
            }
        }
    })?;
    VersionDetails::parse(&bytes, &path.display().to_string())
}
