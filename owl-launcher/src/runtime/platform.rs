//! Host naming as the Adoptium API spells it.

use std::path::{Path, PathBuf};

/// `os` and `architecture` query values for the Adoptium API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdoptiumPlatform {
    pub os: &'static str,
    pub arch: &'static str,
}

impl AdoptiumPlatform {
    /// The running host, or `None` if Adoptium publishes nothing for it.
    pub fn host() -> Option<Self> {
        let os = if cfg!(target_os = "windows") {
            "windows"
        } else if cfg!(target_os = "macos") {
            "mac"
        } else if cfg!(target_os = "linux") {
            "linux"
        } else {
            return None;
        };
        let arch = if cfg!(target_arch = "x86_64") {
            "x64"
        } else if cfg!(target_arch = "aarch64") {
            "aarch64"
        } else {
            return None;
        };
        Some(Self { os, arch })
    }
}

pub fn java_binary_name() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Locate `bin/java` inside an unpacked runtime.
///
/// Checks `dir` itself, the macOS bundle layout `Contents/Home`, then the
/// same two layouts one directory down (archives carry a top-level folder).
/// Returns the runtime home and the binary.
pub fn find_java(dir: &Path) -> Option<(PathBuf, PathBuf)> {
    if let Some(found) = java_in(dir) {
        return Some(found);
    }
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    children.sort();
    children.iter().find_map(|child| java_in(child))
}

fn java_in(dir: &Path) -> Option<(PathBuf, PathBuf)> {
    let direct = dir.join("bin").join(java_binary_name());
    if direct.is_file() {
        return Some((dir.to_path_buf(), direct));
    }
    let home = dir.join("Contents").join("Home");
    let bundled = home.join("bin").join(java_binary_name());
    bundled.is_file().then(|| (dir.to_path_buf(), bundled))
}
