//! Owl Launcher CLI - Command-line interface
//!
//! Drives the launcher library from a terminal: sign in, browse and install
//! modpacks, then start the game.

mod commands;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use owl_launcher::{AppConfig, Launcher};
use tracing::{debug, error};

use commands::play::LaunchArgs;
use commands::settings::SettingsAction;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "owl-launcher", version, about = "Sign in, sync modpacks and start the game")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in with a Microsoft account
    Login,
    /// Show the stored session for an account
    Whoami {
        #[arg(long, env = "OWL_LAUNCHER_UUID")]
        uuid: String,
    },
    /// Forget the stored session for an account
    Logout {
        #[arg(long, env = "OWL_LAUNCHER_UUID")]
        uuid: String,
    },
    /// List the locally configured modpacks
    Modpacks,
    /// List modpacks offered by the online catalog
    List {
        /// URL of the catalog JSON
        #[arg(long, env = "OWL_LAUNCHER_CATALOG")]
        catalog: String,
        /// Account whose groups unlock restricted modpacks
        #[arg(long, env = "OWL_LAUNCHER_UUID")]
        uuid: Option<String>,
    },
    /// Install or update a modpack from the catalog
    Sync {
        /// Modpack id as listed in the catalog
        modpack: String,
        #[arg(long, env = "OWL_LAUNCHER_CATALOG")]
        catalog: String,
        #[arg(long, env = "OWL_LAUNCHER_UUID")]
        uuid: Option<String>,
    },
    /// Make sure a Java runtime for a Minecraft version is installed
    Java {
        /// Minecraft version, e.g. 1.20.1
        minecraft_version: String,
    },
    /// Start an installed modpack
    Launch {
        modpack: String,
        #[arg(long, env = "OWL_LAUNCHER_UUID")]
        uuid: String,
        /// Instance directory (defaults to <game directory>/<modpack>)
        #[arg(long)]
        game_dir: Option<PathBuf>,
        /// Java executable to use instead of the managed runtime
        #[arg(long)]
        java: Option<String>,
        /// Maximum heap in MB
        #[arg(long)]
        max_memory: Option<u32>,
        /// Initial heap in MB
        #[arg(long)]
        min_memory: Option<u32>,
        #[arg(long, requires = "height")]
        width: Option<u32>,
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let _ = std::fs::create_dir_all(config.log_dir());
    let _log_guard = owl_launcher::logging::init(&config.log_dir(), cli.verbose);
    debug!(data_dir = %config.data_dir.display(), "Starting");

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = ?e.kind(), "{}", e);
            eprintln!("{} {}", console::style("error:").red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(command: Commands, config: AppConfig) -> Result<(), CliError> {
    let launcher = Arc::new(Launcher::start(config).await?);

    let on_interrupt = Arc::clone(&launcher);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            eprintln!("Interrupted, stopping downloads...");
            on_interrupt.cancel_all();
        }
    });

    match command {
        Commands::Login => commands::auth::login(&launcher).await,
        Commands::Whoami { uuid } => commands::auth::whoami(&launcher, &uuid).await,
        Commands::Logout { uuid } => commands::auth::logout(&launcher, &uuid).await,
        Commands::Modpacks => commands::content::local(&launcher).await,
        Commands::List { catalog, uuid } => {
            commands::content::list(&launcher, &catalog, uuid.as_deref()).await
        }
        Commands::Sync {
            modpack,
            catalog,
            uuid,
        } => commands::content::sync(&launcher, &catalog, &modpack, uuid.as_deref()).await,
        Commands::Java { minecraft_version } => {
            commands::play::java(&launcher, &minecraft_version).await
        }
        Commands::Launch {
            modpack,
            uuid,
            game_dir,
            java,
            max_memory,
            min_memory,
            width,
            height,
        } => {
            commands::play::launch(
                &launcher,
                LaunchArgs {
                    modpack_id: modpack,
                    uuid,
                    game_dir,
                    java,
                    max_memory,
                    min_memory,
                    width,
                    height,
                },
            )
            .await
        }
        Commands::Settings { action } => commands::settings::run(&launcher, action).await,
    }
}
