//! Settings commands.

use std::path::PathBuf;

use clap::Subcommand;
use owl_launcher::settings::Settings;
use owl_launcher::Launcher;

use crate::error::CliError;

/// Settings action subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Show the current settings
    Show,
    /// Change one or more settings
    Set {
        /// Java executable used instead of a managed runtime
        #[arg(long)]
        java_path: Option<String>,
        /// Maximum heap in MB
        #[arg(long)]
        max_memory: Option<u32>,
        /// Initial heap in MB
        #[arg(long)]
        min_memory: Option<u32>,
        /// Window width in pixels
        #[arg(long)]
        width: Option<u32>,
        /// Window height in pixels
        #[arg(long)]
        height: Option<u32>,
        /// Directory that holds one folder per modpack
        #[arg(long)]
        game_directory: Option<PathBuf>,
    },
}

/// Run a settings subcommand.
pub async fn run(launcher: &Launcher, action: SettingsAction) -> Result<(), CliError> {
    let mut settings = launcher.get_settings().await?;

    match action {
        SettingsAction::Show => {}
        SettingsAction::Set {
            java_path,
            max_memory,
            min_memory,
            width,
            height,
            game_directory,
        } => {
            if let Some(java_path) = java_path {
                settings.java_path = java_path;
            }
            if let Some(max) = max_memory {
                settings.max_memory = max;
            }
            if let Some(min) = min_memory {
                settings.min_memory = min;
            }
            if let Some(width) = width {
                settings.game_resolution.width = width;
            }
            if let Some(height) = height {
                settings.game_resolution.height = height;
            }
            if let Some(dir) = game_directory {
                settings.game_directory = dir;
            }
            launcher.save_settings(&settings).await?;
            println!("Settings saved.");
            println!();
        }
    }

    print_settings(&settings);
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("Java:           {}", settings.java_path);
    println!(
        "Memory:         {} MB min, {} MB max",
        settings.min_memory, settings.max_memory
    );
    println!(
        "Resolution:     {}x{}",
        settings.game_resolution.width, settings.game_resolution.height
    );
    println!("Game directory: {}", settings.game_directory.display());
}
