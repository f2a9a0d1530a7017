//! Logging setup shared by the CLI and any embedding UI.

use std::path::Path;

use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix of the daily log files.
pub const LOG_FILE_PREFIX: &str = "owl-launcher.log";

const DEFAULT_FILTER: &str = "owl_launcher=info";
const VERBOSE_FILTER: &str = "owl_launcher=debug";

/// Install the global subscriber: console output plus a daily rolling file
/// in `log_dir`.
///
/// `RUST_LOG` overrides the level. Keep the returned guard alive for the
/// life of the process or buffered file output is lost. Returns `None` if a
/// subscriber was already installed.
pub fn init(log_dir: &Path, verbose: bool) -> Option<WorkerGuard> {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console = fmt::layer()
        .with_timer(timer.clone())
        .with_target(false)
        .with_writer(std::io::stderr);
    let file = fmt::layer()
        .with_timer(timer)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .ok()
        .map(|_| guard)
}
