//! Game version → Java major version.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

/// Java used when a game version cannot be classified.
pub const FALLBACK_JAVA_MAJOR: u32 = 21;

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Java major version a game release needs.
///
/// | game version        | Java |
/// |---------------------|------|
/// | ≤ 1.16              | 8    |
/// | 1.17                | 16   |
/// | 1.18 – 1.20.4       | 17   |
/// | ≥ 1.20.5            | 21   |
///
/// Snapshots and anything unparseable get [`FALLBACK_JAVA_MAJOR`].
pub fn required_java_major(game_version: &str) -> u32 {
    let mut parts = game_version.trim().split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    let patch = parts
        .next()
        .map(|p| p.split(|c: char| !c.is_ascii_digit()).next().unwrap_or(""))
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    match (major, minor) {
        (Some(1), Some(minor)) => match minor {
            0..=16 => 8,
            17 => 16,
            18 | 19 => 17,
            20 if patch <= 4 => 17,
            _ => 21,
        },
        _ => FALLBACK_JAVA_MAJOR,
    }
}

/// Whether an installed Java `found` can run a game needing `required`.
///
/// Java 8 and 16 games want exactly that release; from 17 on, newer
/// runtimes are accepted.
pub fn satisfies(found: u32, required: u32) -> bool {
    found == required || (required >= 17 && found >= required)
}

/// Major version from `java -version` output (`1.8.0_392` → 8, `17.0.9` → 17).
pub fn parse_java_version(output: &str) -> Option<u32> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r#"version "(\d+)(?:\.(\d+))?"#).ok())
        .as_ref()?;
    let caps = re.captures(output)?;
    let first: u32 = caps.get(1)?.as_str().parse().ok()?;
    if first == 1 {
        caps.get(2)?.as_str().parse().ok()
    } else {
        Some(first)
    }
}

/// Run `java -version` and read its major version.
pub async fn detect_java_major(java: &Path) -> Option<u32> {
    let output = tokio::time::timeout(
        VERSION_CHECK_TIMEOUT,
        tokio::process::Command::new(java)
            .arg("-version")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .ok()?
    .ok()?;
    // `java -version` writes to stderr.
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    let major = parse_java_version(&text);
    debug!(java = %java.display(), ?major, "Detected Java runtime");
    major
}
