//! Modpack listing and installation commands.

use owl_launcher::app::OnlineModpack;
use owl_launcher::Launcher;

use crate::error::CliError;
use crate::progress::{describe, StatusBar};

/// Groups for catalog filtering: the signed-in user's, or the default group.
async fn groups_for(launcher: &Launcher, uuid: Option<&str>) -> Vec<String> {
    match uuid {
        Some(uuid) => launcher
            .resolve_groups(uuid)
            .await
            .iter()
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Run the modpacks command: the locally configured modpack list.
pub async fn local(launcher: &Launcher) -> Result<(), CliError> {
    let modpacks = launcher.get_modpacks().await?;
    for modpack in &modpacks {
        let (loader, version) = modpack.loader();
        println!(
            "{:<12} {:<24} {} {}{}",
            modpack.id,
            modpack.name,
            modpack.minecraft_version,
            loader,
            version.map(|v| format!(" {}", v)).unwrap_or_default()
        );
    }
    Ok(())
}

/// Run the list command: the online catalog as visible to `uuid`.
pub async fn list(launcher: &Launcher, catalog: &str, uuid: Option<&str>) -> Result<(), CliError> {
    let groups = groups_for(launcher, uuid).await;
    let modpacks = launcher.fetch_modpack_list(catalog, &groups).await?;
    if modpacks.is_empty() {
        println!("No modpacks available.");
        return Ok(());
    }
    for modpack in &modpacks {
        print_online(modpack);
    }
    Ok(())
}

fn print_online(modpack: &OnlineModpack) {
    let loader = if modpack.loader.is_empty() {
        "vanilla"
    } else {
        modpack.loader.as_str()
    };
    println!(
        "{:<12} {:<24} v{:<8} {} {} {}",
        console::style(&modpack.id).bold(),
        modpack.name,
        modpack.version,
        modpack.target_version,
        loader,
        modpack.loader_version
    );
    if !modpack.description.is_empty() {
        println!("             {}", console::style(&modpack.description).dim());
    }
}

/// Run the sync command: install or update one catalog modpack.
pub async fn sync(
    launcher: &Launcher,
    catalog: &str,
    modpack_id: &str,
    uuid: Option<&str>,
) -> Result<(), CliError> {
    let groups = groups_for(launcher, uuid).await;
    let modpack = launcher
        .fetch_modpack_list(catalog, &groups)
        .await?
        .into_iter()
        .find(|m| m.id == modpack_id)
        .ok_or_else(|| CliError::Usage(format!("modpack '{}' is not in the catalog", modpack_id)))?;

    println!(
        "Syncing {} {} (Minecraft {})",
        modpack.name, modpack.version, modpack.target_version
    );

    let bar = StatusBar::follow(launcher.watch(&modpack.id));
    match launcher.download_modpack_with_groups(&modpack, &groups).await {
        Ok(report) => {
            bar.finish(format!(
                "{} files downloaded, {} up to date",
                report.downloaded, report.skipped
            ));
            println!(
                "Installed into {}",
                launcher.instance_root(&modpack.id).await?.display()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon(describe(&launcher.status(&modpack.id)));
            Err(e.into())
        }
    }
}
