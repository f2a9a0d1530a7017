//! `runtimes.json`: Java major version → installed binary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{RuntimeError, RuntimeResult};

pub const RUNTIME_INDEX_FILE: &str = "runtimes.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeIndex {
    #[serde(default)]
    pub runtimes: BTreeMap<u32, PathBuf>,
}

impl RuntimeIndex {
    /// Load from `dir`; a missing file is an empty index.
    pub async fn load(dir: &Path) -> RuntimeResult<Self> {
        let path = dir.join(RUNTIME_INDEX_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| RuntimeError::Index {
                path,
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(RuntimeError::Index {
                path,
                reason: e.to_string(),
            }),
        }
    }

    pub async fn save(&self, dir: &Path) -> RuntimeResult<()> {
        let path = dir.join(RUNTIME_INDEX_FILE);
        let index_error = |reason: String| RuntimeError::Index {
            path: path.clone(),
            reason,
        };
        let json = serde_json::to_vec_pretty(self).map_err(|e| index_error(e.to_string()))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| index_error(e.to_string()))?;
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| index_error(e.to_string()))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| index_error(e.to_string()))
    }

    /// Recorded binary for `major`, if it is still on disk.
    pub fn lookup(&self, major: u32) -> Option<&Path> {
        self.runtimes
            .get(&major)
            .map(PathBuf::as_path)
            .filter(|path| path.is_file())
    }

    pub fn record(&mut self, major: u32, java: PathBuf) {
        self.runtimes.insert(major, java);
    }
}
