//! Starts the game and follows the process until it exits.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::game::{load_details, version_jar_path, RuleContext};
use crate::manager::{InstalledContent, ManagerError};

use super::args::{compose, redact};
use super::config::LaunchConfiguration;
use super::error::{LaunchError, LaunchResult};
use super::status::{Phase, StatusHandle, StatusRegistry};

/// A started game. The process is observed, not owned: dropping this does
/// not stop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProcess {
    pub operation: String,
    pub pid: Option<u32>,
}

pub struct LaunchOrchestrator {
    registry: Arc<StatusRegistry>,
}

impl LaunchOrchestrator {
    pub fn new(registry: Arc<StatusRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<StatusRegistry> {
        &self.registry
    }

    /// Launch under `operation`, which must not already be active.
    pub async fn launch(
        &self,
        operation: &str,
        config: LaunchConfiguration,
    ) -> LaunchResult<GameProcess> {
        let handle = self.registry.begin(operation)?;
        self.launch_with(handle, config).await
    }

    /// Launch on a status the caller already moved out of `idle` (for
    /// example after syncing content under the same operation).
    pub async fn launch_with(
        &self,
        handle: StatusHandle,
        config: LaunchConfiguration,
    ) -> LaunchResult<GameProcess> {
        match self.start(&handle, config).await {
            Ok(process) => Ok(process),
            Err(e) => {
                handle.fail(e.kind(), e.to_string());
                Err(e)
            }
        }
    }

    async fn start(
        &self,
        handle: &StatusHandle,
        config: LaunchConfiguration,
    ) -> LaunchResult<GameProcess> {
        config.validate()?;
        let root = config.content_root.clone();
        handle.progress(10, "Checking installed content");

        let (details, jar_id) = load_details(&root, &config.version_id)
            .await
            .map_err(|e| match e {
                ManagerError::VersionNotFound(id) => {
                    LaunchError::ContentIncomplete(format!("version {id} is not installed"))
                }
                other => LaunchError::Metadata(other),
            })?;

        let installed = InstalledContent::load(&root).await?.ok_or_else(|| {
            LaunchError::ContentIncomplete(format!("nothing installed in {}", root.display()))
        })?;
        if !installed.complete {
            return Err(LaunchError::ContentIncomplete(format!(
                "last sync of {} did not finish",
                installed.package_id
            )));
        }
        let missing = installed.missing_files(&root);
        if let Some(first) = missing.first() {
            return Err(LaunchError::ContentIncomplete(format!(
                "{} file(s) missing, e.g. {first}",
                missing.len()
            )));
        }
        let jar = version_jar_path(&root, &jar_id);
        if !jar.is_file() {
            return Err(LaunchError::ContentIncomplete(format!(
                "game jar {} is missing",
                jar.display()
            )));
        }

        handle.advance(Phase::Launching, 50, "Preparing launch")?;

        let ctx = RuleContext::host().with_custom_resolution(config.resolution.is_some());
        let args = compose(&config, &details, &jar_id, &ctx, &package_jars(&installed, &root));
        info!(
            operation = %handle.operation(),
            program = %config.runtime_path.display(),
            version = %config.version_id,
            "Starting game"
        );
        debug!(args = ?redact(&args, &[config.identity.access_token.as_str()]), "Game arguments");

        let mut child = Command::new(&config.runtime_path)
            .args(&args)
            .current_dir(&root)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: config.runtime_path.clone(),
                source,
            })?;
        let pid = child.id();

        handle.advance(Phase::Running, 100, "Running")?;

        let watcher = handle.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(operation = %watcher.operation(), "Game exited");
                }
                Ok(status) => {
                    warn!(operation = %watcher.operation(), code = ?status.code(), "Game exited with failure");
                }
                Err(e) => {
                    warn!(operation = %watcher.operation(), error = %e, "Lost track of game process");
                }
            }
            watcher.complete("Game closed");
        });

        Ok(GameProcess {
            operation: handle.operation(),
            pid,
        })
    }
}

/// Jars a package installed under `libraries/`, natives excluded.
fn package_jars(installed: &InstalledContent, root: &std::path::Path) -> Vec<PathBuf> {
    installed
        .files
        .keys()
        .filter(|key| key.starts_with("libraries/") && key.ends_with(".jar"))
        .filter(|key| !key.contains("-natives-"))
        .map(|key| root.join(key.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ErrorKind;
    use crate::launch::config::IdentityClaims;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const VERSION_JSON: &str = r#"{
        "id": "1.20.1",
        "mainClass": "net.minecraft.client.main.Main",
        "minecraftArguments": "--username ${auth_player_name}",
        "downloads": {"client": {"url": "https://x/client.jar"}},
        "assets": "5"
    }"#;

    fn write(path: &Path, contents: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn install(root: &Path, complete: bool) {
        write(&root.join("versions/1.20.1/1.20.1.json"), VERSION_JSON.as_bytes());
        write(&root.join("versions/1.20.1/1.20.1.jar"), b"jar");
        write(&root.join("libraries/net/extra/extra-1.0.jar"), b"lib");
        let state = serde_json::json!({
            "package_id": "pack",
            "package_version": "1",
            "target_version": "1.20.1",
            "complete": complete,
            "files": {
                "libraries/net/extra/extra-1.0.jar": {"algorithm": "sha1", "digest": "00", "size": 3}
            }
        });
        write(&root.join("content-state.json"), state.to_string().as_bytes());
    }

    fn config(root: &Path, java: PathBuf) -> LaunchConfiguration {
        LaunchConfiguration {
            runtime_path: java,
            max_memory: 2048,
            min_memory: 1024,
            resolution: None,
            content_root: root.to_path_buf(),
            version_id: "1.20.1".into(),
            identity: IdentityClaims {
                access_token: "tok".into(),
                subject_id: "uuid-1".into(),
                display_name: "Steve".into(),
            },
        }
    }

    #[test]
    fn test_package_jars() {
        let installed: InstalledContent = serde_json::from_value(serde_json::json!({
            "package_id": "p", "package_version": "1", "target_version": "1.20.1",
            "files": {
                "libraries/a/a.jar": {"algorithm": "sha1", "digest": "0", "size": 1},
                "libraries/b/b-natives-linux.jar": {"algorithm": "sha1", "digest": "0", "size": 1},
                "mods/m.jar": {"algorithm": "sha1", "digest": "0", "size": 1}
            }
        }))
        .unwrap();
        let jars = package_jars(&installed, Path::new("/i"));
        assert_eq!(jars, vec![PathBuf::from("/i/libraries/a/a.jar")]);
    }

    #[tokio::test]
    async fn test_incomplete_content_fails_status() {
        let temp = TempDir::new().unwrap();
        let java = temp.path().join("java");
        write(&java, b"");
        install(temp.path(), false);

        let registry = Arc::new(StatusRegistry::new());
        let orchestrator = LaunchOrchestrator::new(registry.clone());
        let err = orchestrator
            .launch("pack", config(temp.path(), java))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::ContentIncomplete(_)));

        let status = registry.current("pack");
        assert_eq!(status.phase, Phase::Error);
        assert_eq!(status.error.unwrap().kind, ErrorKind::ContentIncomplete);
    }

    #[tokio::test]
    async fn test_missing_version_is_content_incomplete() {
        let temp = TempDir::new().unwrap();
        let java = temp.path().join("java");
        write(&java, b"");

        let orchestrator = LaunchOrchestrator::new(Arc::new(StatusRegistry::new()));
        let err = orchestrator
            .launch("pack", config(temp.path(), java))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::ContentIncomplete(_)));
    }

    #[tokio::test]
    async fn test_not_authenticated() {
        let temp = TempDir::new().unwrap();
        let java = temp.path().join("java");
        write(&java, b"");
        let mut cfg = config(temp.path(), java);
        cfg.identity.access_token.clear();

        let orchestrator = LaunchOrchestrator::new(Arc::new(StatusRegistry::new()));
        let err = orchestrator.launch("pack", cfg).await.unwrap_err();
        assert!(matches!(err, LaunchError::NotAuthenticated));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_running_until_exit_and_second_launch_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        install(temp.path(), true);
        let java = temp.path().join("java");
        write(&java, b"#!/bin/sh\nsleep 1\n");
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

        let registry = Arc::new(StatusRegistry::new());
        let orchestrator = LaunchOrchestrator::new(registry.clone());
        let mut watch = registry.watch("pack");

        let process = orchestrator
            .launch("pack", config(temp.path(), java.clone()))
            .await
            .unwrap();
        assert!(process.pid.is_some());
        assert_eq!(registry.current("pack").phase, Phase::Running);

        let err = orchestrator
            .launch("pack", config(temp.path(), java))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::AlreadyRunning {
                phase: Phase::Running,
                ..
            }
        ));
        assert_eq!(registry.current("pack").phase, Phase::Running);

        tokio::time::timeout(
            Duration::from_secs(10),
            watch.wait_for(|status| status.phase == Phase::Idle),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
