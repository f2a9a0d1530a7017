//! Java provisioning and game launch commands.

use std::path::PathBuf;

use owl_launcher::app::MinecraftVersionRequest;
use owl_launcher::launch::Phase;
use owl_launcher::{LaunchOptions, Launcher};

use crate::error::CliError;
use crate::progress::describe;

/// Arguments for the launch command.
pub struct LaunchArgs {
    pub modpack_id: String,
    pub uuid: String,
    pub game_dir: Option<PathBuf>,
    pub java: Option<String>,
    pub max_memory: Option<u32>,
    pub min_memory: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl LaunchArgs {
    fn into_options(self) -> LaunchOptions {
        LaunchOptions {
            modpack_id: self.modpack_id,
            game_dir: self.game_dir.unwrap_or_default(),
            java_path: self.java,
            max_memory: self.max_memory,
            min_memory: self.min_memory,
            width: self.width,
            height: self.height,
            uuid: Some(self.uuid),
            ..LaunchOptions::default()
        }
    }
}

/// Run the java command: make sure a runtime for `minecraft_version` exists.
pub async fn java(launcher: &Launcher, minecraft_version: &str) -> Result<(), CliError> {
    println!("Checking Java for Minecraft {}...", minecraft_version);
    let java = launcher
        .ensure_java_installed_for_mc(&MinecraftVersionRequest {
            minecraft_version: minecraft_version.to_string(),
        })
        .await?;
    println!("Java: {}", java.display());
    Ok(())
}

/// Run the launch command and wait for the game to exit.
pub async fn launch(launcher: &Launcher, args: LaunchArgs) -> Result<(), CliError> {
    let options = args.into_options();
    println!("Launching {}...", options.modpack_id);

    let process = launcher.launch_minecraft(&options).await?;
    match process.pid {
        Some(pid) => println!("Game started (pid {})", pid),
        None => println!("Game started"),
    }
    println!("Waiting for the game to exit. Press Ctrl+C to detach.");

    let mut status = launcher.watch(&process.operation);
    let final_status = status
        .wait_for(|s| !matches!(s.phase, Phase::Running | Phase::Launching))
        .await
        .map(|s| s.clone())
        .unwrap_or_else(|_| launcher.status(&process.operation));

    println!("{}", describe(&final_status));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_map_to_options() {
        let options = LaunchArgs {
            modpack_id: "opti".into(),
            uuid: "5f1e0c2a".into(),
            game_dir: None,
            java: Some("/usr/bin/java".into()),
            max_memory: Some(6144),
            min_memory: None,
            width: Some(1280),
            height: Some(720),
        }
        .into_options();

        assert_eq!(options.modpack_id, "opti");
        assert!(options.game_dir.as_os_str().is_empty());
        assert_eq!(options.uuid.as_deref(), Some("5f1e0c2a"));
        assert_eq!(options.access_token, None);
        assert_eq!(options.max_memory, Some(6144));
        assert_eq!(options.width, Some(1280));
    }
}
