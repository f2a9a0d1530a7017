//! The command facade the UI talks to.
//!
//! Each method is one UI command. Long operations report through Launch
//! Status snapshots keyed by the modpack id; callers observe them with
//! [`Launcher::subscribe`] or [`Launcher::watch`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{AccessResolver, AclSource, EntitlementSet, HttpAclSource, StaticAclSource};
use crate::auth::{
    parse_callback, AuthError, AuthToken, IdentityManager, IdentityProvider, MicrosoftProvider,
    TokenStore,
};
use crate::game::{version_json_path, LoaderKind, LoaderResolver, RuleContext, VanillaResolver};
use crate::launch::{
    GameProcess, IdentityClaims, LaunchConfiguration, LaunchError, LaunchOrchestrator,
    LaunchStatus, Phase, Resolution, StatusHandle, StatusRegistry,
};
use crate::manager::download::{DownloadEngine, HttpDownloader, ProgressCallback, ProgressSnapshot};
use crate::manager::{CatalogClient, ContentSyncer, InstalledContent, PackageDescriptor, SyncReport};
use crate::modpack::{load_modpacks, Modpack};
use crate::runtime::RuntimeProvisioner;
use crate::settings::{Settings, SettingsStore};

use super::cancel::OperationTokens;
use super::config::AppConfig;
use super::error::LauncherResult;

/// A package as offered by the online catalog.
pub type OnlineModpack = PackageDescriptor;

/// Login URL handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrosoftAuthUrl {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinecraftVersionRequest {
    pub minecraft_version: String,
}

/// Launch request as sent by the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    pub modpack_id: String,
    pub game_dir: PathBuf,
    #[serde(default)]
    pub java_path: Option<String>,
    #[serde(default)]
    pub max_memory: Option<u32>,
    #[serde(default)]
    pub min_memory: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Owns every pipeline component.
pub struct Launcher {
    config: AppConfig,
    settings: SettingsStore,
    identity: Arc<IdentityManager>,
    access: AccessResolver,
    catalog: CatalogClient,
    syncer: ContentSyncer,
    vanilla: VanillaResolver,
    loaders: LoaderResolver,
    runtime: RuntimeProvisioner,
    orchestrator: LaunchOrchestrator,
    registry: Arc<StatusRegistry>,
    operations: OperationTokens,
}

impl Launcher {
    /// Build a launcher talking to the real Microsoft and ACL endpoints.
    pub async fn start(config: AppConfig) -> LauncherResult<Self> {
        let provider = Arc::new(MicrosoftProvider::new(
            config.microsoft.clone(),
            config.http_timeout,
        )?);
        let acl: Arc<dyn AclSource> = match &config.acl_url {
            Some(url) => match HttpAclSource::new(url.clone(), config.http_timeout) {
                Ok(source) => Arc::new(source),
                Err(e) => {
                    warn!(error = %e, "ACL client unavailable, using default group only");
                    Arc::new(StaticAclSource::default())
                }
            },
            None => Arc::new(StaticAclSource::default()),
        };
        Self::with_sources(config, provider, acl).await
    }

    /// Build a launcher with explicit identity and ACL sources.
    pub async fn with_sources(
        config: AppConfig,
        provider: Arc<dyn IdentityProvider>,
        acl: Arc<dyn AclSource>,
    ) -> LauncherResult<Self> {
        let store = TokenStore::open(config.tokens_path()).await?;
        let identity = Arc::new(IdentityManager::new(
            provider,
            store,
            config.pending_login_ttl,
            config.http_timeout,
        ));

        let catalog = CatalogClient::new(config.http_timeout)?;
        let downloader = Arc::new(HttpDownloader::new(config.http_timeout)?);
        let engine = DownloadEngine::new(
            downloader,
            config.download_concurrency,
            config.retry.clone(),
        );
        let registry = Arc::new(StatusRegistry::new());

        Ok(Self {
            settings: SettingsStore::new(config.settings_path(), config.default_game_directory()),
            identity,
            access: AccessResolver::new(acl),
            syncer: ContentSyncer::new(catalog.clone(), engine.clone()),
            vanilla: VanillaResolver::new(catalog.clone())
                .with_manifest_url(config.version_manifest_url.clone()),
            loaders: LoaderResolver::new(catalog.clone()),
            runtime: RuntimeProvisioner::new(catalog.clone(), engine, config.runtimes_dir.clone())
                .with_api_base(config.adoptium_api.clone()),
            orchestrator: LaunchOrchestrator::new(registry.clone()),
            catalog,
            registry,
            operations: OperationTokens::new(),
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn identity(&self) -> &Arc<IdentityManager> {
        &self.identity
    }

    /// Replace the vanilla metadata resolver (alternate mirrors, tests).
    pub fn with_vanilla(mut self, vanilla: VanillaResolver) -> Self {
        self.vanilla = vanilla;
        self
    }

    pub fn with_loaders(mut self, loaders: LoaderResolver) -> Self {
        self.loaders = loaders;
        self
    }

    // Local data

    pub async fn get_modpacks(&self) -> LauncherResult<Vec<Modpack>> {
        Ok(load_modpacks(&self.config.modpacks_path()).await?)
    }

    pub async fn get_settings(&self) -> LauncherResult<Settings> {
        Ok(self.settings.load().await?)
    }

    pub async fn save_settings(&self, settings: &Settings) -> LauncherResult<()> {
        settings.validate()?;
        Ok(self.settings.save(settings).await?)
    }

    // Identity

    pub fn get_microsoft_auth_url(&self) -> MicrosoftAuthUrl {
        let request = self.identity.begin_login();
        MicrosoftAuthUrl {
            url: request.authorization_url,
            state: request.state,
        }
    }

    pub async fn handle_microsoft_callback(
        &self,
        code: &str,
        state: &str,
    ) -> LauncherResult<AuthToken> {
        let token = self.identity.complete_login(code, state).await?;
        Ok(token.to_public())
    }

    /// Complete a login from a raw deep-link URI.
    pub async fn handle_callback_uri(&self, uri: &str) -> LauncherResult<AuthToken> {
        let params = parse_callback(uri)?;
        self.handle_microsoft_callback(&params.code, &params.state)
            .await
    }

    pub async fn get_auth_token(&self, subject: &str) -> LauncherResult<Option<AuthToken>> {
        let session = self.identity.get_session(subject).await?;
        Ok(session.map(|s| s.to_public()))
    }

    pub async fn logout_user(&self, subject: &str) -> LauncherResult<()> {
        Ok(self.identity.logout(subject).await?)
    }

    /// Groups `subject` belongs to. Never fails.
    pub async fn resolve_groups(&self, subject: &str) -> EntitlementSet {
        self.access.resolve(subject).await
    }

    // Content

    pub async fn fetch_modpack_list(
        &self,
        list_url: &str,
        user_groups: &[String],
    ) -> LauncherResult<Vec<OnlineModpack>> {
        let entitlements = EntitlementSet::from_groups(user_groups.iter().cloned());
        Ok(self.catalog.fetch_catalog(list_url, &entitlements).await?)
    }

    /// Instance directory a modpack installs into.
    pub async fn instance_root(&self, modpack_id: &str) -> LauncherResult<PathBuf> {
        let settings = self.settings.load().await?;
        Ok(settings.game_directory.join(modpack_id))
    }

    /// Install or update `modpack` into its instance directory.
    ///
    /// Progress is published on the modpack id's status.
    pub async fn download_modpack_with_groups(
        &self,
        modpack: &OnlineModpack,
        user_groups: &[String],
    ) -> LauncherResult<SyncReport> {
        let handle = self.registry.begin(&modpack.id)?;
        let scope = self.operations.begin(&modpack.id);
        let result = self
            .sync_with(&handle, modpack, user_groups, scope.token())
            .await;
        match &result {
            Ok(report) => handle.complete(format!(
                "{} files downloaded, {} up to date",
                report.downloaded, report.skipped
            )),
            Err(e) => handle.fail(e.kind(), e.to_string()),
        }
        result
    }

    async fn sync_with(
        &self,
        handle: &StatusHandle,
        modpack: &OnlineModpack,
        user_groups: &[String],
        cancel: &CancellationToken,
    ) -> LauncherResult<SyncReport> {
        let root = self.instance_root(&modpack.id).await?;
        let entitlements = EntitlementSet::from_groups(user_groups.iter().cloned());

        let mut package = modpack.clone();
        let loader: LoaderKind = package.loader.parse()?;
        if loader != LoaderKind::Vanilla && package.loader_version.trim().is_empty() {
            handle.progress(2, format!("Looking up {loader} version"));
            package.loader_version = self.loaders.latest(loader, &package.target_version).await?;
        }

        handle.progress(5, format!("Resolving Minecraft {}", package.target_version));
        let ctx = RuleContext::host();
        let base = self
            .vanilla
            .resolve(&root, &package.target_version, &ctx)
            .await?;

        handle.advance(Phase::Downloading, 0, "Downloading")?;
        let report = self
            .syncer
            .sync(
                &package,
                &root,
                &entitlements,
                base,
                status_progress(handle.clone(), "Downloading"),
                cancel,
            )
            .await?;
        info!(
            modpack = %package.id,
            downloaded = report.downloaded,
            skipped = report.skipped,
            "Modpack synced"
        );
        Ok(report)
    }

    // Runtime

    pub async fn ensure_java_installed_for_mc(
        &self,
        request: &MinecraftVersionRequest,
    ) -> LauncherResult<PathBuf> {
        let settings = self.settings.load().await?;
        let scope = self
            .operations
            .begin(&java_operation(&request.minecraft_version));
        let progress: ProgressCallback = Arc::new(|snapshot: ProgressSnapshot| {
            debug!(percent = snapshot.percent(), "Java download progress");
        });
        let java = self
            .runtime
            .ensure_runtime(
                &request.minecraft_version,
                settings.java_override().as_deref(),
                progress,
                scope.token(),
            )
            .await?;
        Ok(java)
    }

    // Launch

    pub async fn launch_minecraft(&self, options: &LaunchOptions) -> LauncherResult<GameProcess> {
        let handle = self.registry.begin(&options.modpack_id)?;
        let scope = self.operations.begin(&options.modpack_id);
        match self.prepare_launch(&handle, options, scope.token()).await {
            Ok(config) => Ok(self.orchestrator.launch_with(handle, config).await?),
            Err(e) => {
                handle.fail(e.kind(), e.to_string());
                Err(e)
            }
        }
    }

    async fn prepare_launch(
        &self,
        handle: &StatusHandle,
        options: &LaunchOptions,
        cancel: &CancellationToken,
    ) -> LauncherResult<LaunchConfiguration> {
        let settings = self.settings.load().await?;
        let root = if options.game_dir.as_os_str().is_empty() {
            settings.game_directory.join(&options.modpack_id)
        } else {
            options.game_dir.clone()
        };

        let installed = InstalledContent::load(&root).await?.ok_or_else(|| {
            LaunchError::ContentIncomplete(format!("{} is not installed", options.modpack_id))
        })?;
        let version_id = launch_version_id(&root, &installed);

        let identity = self.identity_for(options).await?;

        handle.progress(5, "Checking Java");
        let java_override = options
            .java_path
            .as_deref()
            .map(PathBuf::from)
            .filter(|p| p.is_file())
            .or_else(|| settings.java_override());
        let runtime_path = self
            .runtime
            .ensure_runtime(
                &installed.target_version,
                java_override.as_deref(),
                status_progress(handle.clone(), "Downloading Java"),
                cancel,
            )
            .await?;

        let resolution = match (options.width, options.height) {
            (Some(width), Some(height)) => Resolution { width, height },
            _ => settings.game_resolution,
        };

        Ok(LaunchConfiguration {
            runtime_path,
            max_memory: options.max_memory.unwrap_or(settings.max_memory),
            min_memory: options.min_memory.unwrap_or(settings.min_memory),
            resolution: Some(resolution),
            content_root: root,
            version_id,
            identity,
        })
    }

    /// Identity claims from the verified stored session of `options.uuid`.
    ///
    /// A token supplied with the options is never used on its own: it must
    /// match the session the identity manager vouches for.
    async fn identity_for(&self, options: &LaunchOptions) -> LauncherResult<IdentityClaims> {
        let subject = options
            .uuid
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(LaunchError::NotAuthenticated)?;

        let session = match self.identity.get_session(subject).await {
            Ok(session) => session,
            Err(e @ AuthError::Storage { .. }) => return Err(e.into()),
            Err(e) => {
                warn!(uuid = %subject, error = %e, "Session lookup failed");
                None
            }
        };
        let session = session.ok_or(LaunchError::NotAuthenticated)?;

        if let Some(token) = options.access_token.as_deref().filter(|t| !t.is_empty()) {
            if token != session.access_token {
                warn!(uuid = %subject, "Supplied access token does not match the session");
                return Err(LaunchError::NotAuthenticated.into());
            }
        }

        Ok(IdentityClaims {
            access_token: session.access_token,
            subject_id: session.uuid,
            display_name: session.name,
        })
    }

    // Status

    pub fn status(&self, operation: &str) -> LaunchStatus {
        self.registry.current(operation)
    }

    pub fn watch(&self, operation: &str) -> watch::Receiver<LaunchStatus> {
        self.registry.watch(operation)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LaunchStatus> {
        self.registry.subscribe()
    }

    /// Clear an `error` status so the operation can be retried.
    pub fn acknowledge(&self, operation: &str) {
        self.registry.acknowledge(operation);
    }

    /// Stop the downloads of one operation: a modpack id, or
    /// `java-<minecraft version>` for a standalone Java install. Verified
    /// files stay recorded and the next run on the key starts fresh.
    pub fn cancel(&self, operation: &str) -> bool {
        self.operations.cancel(operation)
    }

    /// Stop every in-flight operation.
    pub fn cancel_all(&self) {
        self.operations.cancel_all();
    }
}

/// Version profile to start: the loader's profile when its JSON is
/// installed, else the game version itself.
fn launch_version_id(root: &Path, installed: &InstalledContent) -> String {
    let loader = installed.loader.parse::<LoaderKind>().unwrap_or(LoaderKind::Vanilla);
    loader
        .profile_id(&installed.target_version, &installed.loader_version)
        .filter(|id| version_json_path(root, id).is_file())
        .unwrap_or_else(|| installed.target_version.clone())
}

/// Operation key of a standalone Java install.
pub fn java_operation(minecraft_version: &str) -> String {
    format!("java-{minecraft_version}")
}

fn status_progress(handle: StatusHandle, label: &'static str) -> ProgressCallback {
    Arc::new(move |snapshot: ProgressSnapshot| {
        handle.progress(
            snapshot.percent(),
            format!("{label} {}/{} files", snapshot.files_done, snapshot.files_total),
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::CONTENT_STATE_FILE;
    use tempfile::TempDir;

    fn installed(loader: &str, loader_version: &str) -> InstalledContent {
        serde_json::from_value(serde_json::json!({
            "package_id": "p",
            "package_version": "1",
            "target_version": "1.20.1",
            "loader": loader,
            "loader_version": loader_version,
            "complete": true
        }))
        .unwrap()
    }

    #[test]
    fn test_launch_options_wire_shape() {
        let options: LaunchOptions = serde_json::from_str(
            r#"{"modpackId": "opti", "gameDir": "/games/opti", "maxMemory": 6144,
                "width": 1920, "height": 1080, "uuid": "u-1", "username": "Steve"}"#,
        )
        .unwrap();
        assert_eq!(options.modpack_id, "opti");
        assert_eq!(options.max_memory, Some(6144));
        assert_eq!(options.java_path, None);
        assert_eq!(options.username.as_deref(), Some("Steve"));
    }

    #[test]
    fn test_version_request_wire_shape() {
        let request: MinecraftVersionRequest =
            serde_json::from_str(r#"{"minecraftVersion": "1.20.4"}"#).unwrap();
        assert_eq!(request.minecraft_version, "1.20.4");
    }

    #[test]
    fn test_launch_version_prefers_installed_profile() {
        let temp = TempDir::new().unwrap();
        let forge = installed("forge", "47.2.0");
        assert_eq!(launch_version_id(temp.path(), &forge), "1.20.1");

        let profile = version_json_path(temp.path(), "1.20.1-forge-47.2.0");
        std::fs::create_dir_all(profile.parent().unwrap()).unwrap();
        std::fs::write(&profile, "{}").unwrap();
        assert_eq!(launch_version_id(temp.path(), &forge), "1.20.1-forge-47.2.0");

        assert_eq!(launch_version_id(temp.path(), &installed("", "")), "1.20.1");
    }

    async fn offline_launcher(temp: &TempDir) -> Launcher {
        let config = AppConfig::with_dirs(temp.path().join("cfg"), temp.path().join("data"));
        Launcher::with_sources(
            config,
            Arc::new(crate::auth::MicrosoftProvider::new(
                crate::auth::MicrosoftConfig::default(),
                std::time::Duration::from_secs(1),
            )
            .unwrap()),
            Arc::new(StaticAclSource::default()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_launch_without_content_sets_error_status() {
        let temp = TempDir::new().unwrap();
        let launcher = offline_launcher(&temp).await;

        let options = LaunchOptions {
            modpack_id: "vanilla".into(),
            game_dir: temp.path().join("instance"),
            uuid: Some("u-1".into()),
            ..LaunchOptions::default()
        };
        let err = launcher.launch_minecraft(&options).await.unwrap_err();
        assert_eq!(err.kind(), crate::app::ErrorKind::ContentIncomplete);
        assert!(!temp.path().join("instance").join(CONTENT_STATE_FILE).exists());

        let status = launcher.status("vanilla");
        assert_eq!(status.phase, Phase::Error);

        launcher.acknowledge("vanilla");
        assert_eq!(launcher.status("vanilla").phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_launch_rejects_caller_token_without_session() {
        let temp = TempDir::new().unwrap();
        let launcher = offline_launcher(&temp).await;
        let root = temp.path().join("instance");
        installed("", "").save(&root).await.unwrap();

        let options = LaunchOptions {
            modpack_id: "vanilla".into(),
            game_dir: root,
            uuid: Some("u-1".into()),
            access_token: Some("forged".into()),
            username: Some("Steve".into()),
            ..LaunchOptions::default()
        };
        let err = launcher.launch_minecraft(&options).await.unwrap_err();
        assert_eq!(err.kind(), crate::app::ErrorKind::NotAuthenticated);
        assert_eq!(launcher.status("vanilla").phase, Phase::Error);
    }

    #[tokio::test]
    async fn test_cancel_without_running_operation_is_noop() {
        let temp = TempDir::new().unwrap();
        let launcher = offline_launcher(&temp).await;

        assert!(!launcher.cancel("vanilla"));
        assert!(!launcher.cancel(&java_operation("1.20.1")));
        launcher.cancel_all();
        assert!(launcher.operations.is_empty());
    }
}
