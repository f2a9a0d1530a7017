//! Persistent session records (`tokens.json`).
//!
//! One record per subject. Reads are served from memory; every mutation
//! rewrites the file through a temporary sibling and a rename so a crash never
//! leaves a truncated store behind.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{AuthError, AuthResult};
use super::session::SessionToken;

/// File-backed token store keyed by subject id.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    records: DashMap<String, SessionToken>,
    write_lock: Mutex<()>,
}

impl TokenStore {
    /// Open the store at `path`, loading existing records.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is a
    /// [`AuthError::Storage`] fault.
    pub async fn open(path: impl Into<PathBuf>) -> AuthResult<Self> {
        let path = path.into();
        let records = DashMap::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let stored: BTreeMap<String, SessionToken> = serde_json::from_slice(&bytes)
                    .map_err(|e| AuthError::storage(&path, e))?;
                for (subject, token) in stored {
                    records.insert(subject, token);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(AuthError::storage(&path, e)),
        }

        debug!(path = %path.display(), records = records.len(), "Token store opened");
        Ok(Self {
            path,
            records,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, subject: &str) -> Option<SessionToken> {
        self.records.get(subject).map(|r| r.value().clone())
    }

    /// Insert or replace the record for the token's subject.
    pub async fn put(&self, token: SessionToken) -> AuthResult<()> {
        self.records.insert(token.uuid.clone(), token);
        self.persist().await
    }

    /// Remove a subject's record. Removing an absent record is not an error.
    pub async fn remove(&self, subject: &str) -> AuthResult<()> {
        if self.records.remove(subject).is_some() {
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&self) -> AuthResult<()> {
        let _guard = self.write_lock.lock().await;

        let snapshot: BTreeMap<String, SessionToken> = self
            .records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        let bytes =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| AuthError::storage(&self.path, e))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::storage(parent, e))?;
        }

        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| AuthError::storage(&temp, e))?;
        restrict_permissions(&temp).await?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| AuthError::storage(&self.path, e))?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> AuthResult<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| AuthError::storage(path, e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> AuthResult<()> {
    Ok(())
}
