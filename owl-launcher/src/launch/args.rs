//! Process arguments for a game start.
//!
//! The invocation is `java <jvm args> <main class> <game args>`. JVM and
//! game arguments come from the version details (rule-filtered for the
//! host) with `${placeholder}` values substituted; versions with only the
//! legacy `minecraftArguments` string get a default JVM section.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::game::{version_jar_path, RuleContext, VersionDetails};

use super::config::LaunchConfiguration;

pub const LAUNCHER_NAME: &str = "owl-launcher";

const REDACTED: &str = "<redacted>";

pub fn classpath_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

/// Classpath entries: libraries present on disk, the version jar, then
/// extra package jars not already listed.
pub fn build_classpath(
    root: &Path,
    details: &VersionDetails,
    jar_id: &str,
    ctx: &RuleContext,
    package_jars: &[PathBuf],
) -> Vec<PathBuf> {
    let libraries = root.join("libraries");
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for library in details.libraries.iter().filter(|l| l.applies(ctx)) {
        if library.is_split_natives() {
            continue;
        }
        let Some(path) = library.artifact_path() else {
            continue;
        };
        let full = libraries.join(path);
        if full.is_file() && seen.insert(full.clone()) {
            entries.push(full);
        }
    }

    let jar = version_jar_path(root, jar_id);
    if seen.insert(jar.clone()) {
        entries.push(jar);
    }

    for extra in package_jars {
        if seen.insert(extra.clone()) {
            entries.push(extra.clone());
        }
    }
    entries
}

/// Replace every known `${name}`; unknown placeholders are kept verbatim.
pub fn substitute(template: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match values.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Placeholder values for one launch.
pub fn placeholder_values(
    config: &LaunchConfiguration,
    details: &VersionDetails,
    classpath: &str,
) -> HashMap<&'static str, String> {
    let root = &config.content_root;
    let resolution = config.resolution.unwrap_or_default();
    let identity = &config.identity;
    let mut values = HashMap::new();

    values.insert("natives_directory", display(&root.join("natives")));
    values.insert("library_directory", display(&root.join("libraries")));
    values.insert("classpath", classpath.to_string());
    values.insert("classpath_separator", classpath_separator().to_string());
    values.insert("launcher_name", LAUNCHER_NAME.to_string());
    values.insert("launcher_version", env!("CARGO_PKG_VERSION").to_string());
    values.insert("version_name", config.version_id.clone());
    values.insert(
        "version_type",
        details.kind.clone().unwrap_or_else(|| "release".to_string()),
    );
    values.insert("game_directory", display(root));
    values.insert("assets_root", display(&root.join("assets")));
    values.insert("game_assets", display(&root.join("assets")));
    values.insert("assets_index_name", details.asset_index_id().to_string());
    values.insert("auth_player_name", identity.display_name.clone());
    values.insert("auth_uuid", identity.subject_id.clone());
    values.insert("auth_access_token", identity.access_token.clone());
    values.insert(
        "auth_session",
        format!("token:{}:{}", identity.access_token, identity.subject_id),
    );
    values.insert("auth_xuid", String::new());
    values.insert("clientid", String::new());
    values.insert("user_type", "msa".to_string());
    values.insert("user_properties", "{}".to_string());
    values.insert("resolution_width", resolution.width.to_string());
    values.insert("resolution_height", resolution.height.to_string());
    values
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Full argument list (without the program) for `config`.
pub fn compose(
    config: &LaunchConfiguration,
    details: &VersionDetails,
    jar_id: &str,
    ctx: &RuleContext,
    package_jars: &[PathBuf],
) -> Vec<String> {
    let classpath = build_classpath(&config.content_root, details, jar_id, ctx, package_jars)
        .iter()
        .map(|p| display(p))
        .collect::<Vec<_>>()
        .join(classpath_separator());
    let values = placeholder_values(config, details, &classpath);

    let mut args = vec![
        format!("-Xmx{}M", config.max_memory),
        format!("-Xms{}M", config.min_memory),
    ];

    let jvm_templates: Vec<&str> = details
        .arguments
        .as_ref()
        .map(|a| a.jvm.iter().flat_map(|arg| arg.resolve(ctx)).collect())
        .unwrap_or_default();

    if !jvm_templates.iter().any(|t| t.starts_with("-Djava.library.path=")) {
        args.push("-Djava.library.path=${natives_directory}".to_string());
    }
    args.extend(jvm_templates.iter().map(|t| t.to_string()));
    if !jvm_templates.iter().any(|t| t.contains("${classpath}")) {
        args.push("-cp".to_string());
        args.push("${classpath}".to_string());
    }
    let mut args: Vec<String> = args.iter().map(|a| substitute(a, &values)).collect();

    args.push(details.main_class.clone());

    match details.arguments.as_ref().filter(|a| !a.game.is_empty()) {
        Some(arguments) => {
            args.extend(
                arguments
                    .game
                    .iter()
                    .flat_map(|arg| arg.resolve(ctx))
                    .map(|t| substitute(t, &values)),
            );
        }
        None => {
            if let Some(legacy) = &details.minecraft_arguments {
                args.extend(legacy.split_whitespace().map(|t| substitute(t, &values)));
            }
            if let Some(resolution) = config.resolution {
                args.extend([
                    "--width".to_string(),
                    resolution.width.to_string(),
                    "--height".to_string(),
                    resolution.height.to_string(),
                ]);
            }
        }
    }
    args
}

/// Copy of `args` safe to log.
pub fn redact(args: &[String], secrets: &[&str]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            secrets
                .iter()
                .filter(|s| !s.is_empty())
                .fold(arg.clone(), |acc, secret| acc.replace(secret, REDACTED))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::config::{IdentityClaims, Resolution};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn linux() -> RuleContext {
        RuleContext {
            os_name: "linux".into(),
            arch: "x64".into(),
            os_version: None,
            features: BTreeMap::new(),
        }
    }

    fn config(root: &Path) -> LaunchConfiguration {
        LaunchConfiguration {
            runtime_path: root.join("java"),
            max_memory: 4096,
            min_memory: 1024,
            resolution: Some(Resolution {
                width: 1920,
                height: 1080,
            }),
            content_root: root.to_path_buf(),
            version_id: "1.20.1".into(),
            identity: IdentityClaims {
                access_token: "tok-123".into(),
                subject_id: "uuid-1".into(),
                display_name: "Steve".into(),
            },
        }
    }

    fn modern() -> VersionDetails {
        serde_json::from_value(serde_json::json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": ["--username", "${auth_player_name}", "--uuid", "${auth_uuid}",
                         "--accessToken", "${auth_access_token}", "--assetIndex", "${assets_index_name}",
                         {"rules": [{"action": "allow", "features": {"has_custom_resolution": true}}],
                          "value": ["--width", "${resolution_width}", "--height", "${resolution_height}"]},
                         {"rules": [{"action": "allow", "features": {"is_demo_user": true}}], "value": "--demo"}],
                "jvm": [{"rules": [{"action": "allow", "os": {"name": "osx"}}], "value": ["-XstartOnFirstThread"]},
                        "-Djava.library.path=${natives_directory}",
                        "-cp", "${classpath}"]
            },
            "libraries": [
                {"name": "com.mojang:brigadier:1.1.8",
                 "downloads": {"artifact": {"path": "com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar", "url": "https://x/b.jar"}}},
                {"name": "com.mojang:missing:1.0",
                 "downloads": {"artifact": {"path": "com/mojang/missing/1.0/missing-1.0.jar", "url": "https://x/m.jar"}}},
                {"name": "org.lwjgl:lwjgl:3.3.1:natives-linux",
                 "downloads": {"artifact": {"path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar", "url": "https://x/n.jar"}}}
            ],
            "assetIndex": {"id": "5", "url": "https://x/5.json"}
        }))
        .unwrap()
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_substitute() {
        let mut values = HashMap::new();
        values.insert("a", "1".to_string());
        assert_eq!(substitute("x${a}y${a}", &values), "x1y1");
        assert_eq!(substitute("${unknown}", &values), "${unknown}");
        assert_eq!(substitute("tail ${a", &values), "tail ${a");
        assert_eq!(substitute("plain", &values), "plain");
    }

    #[test]
    fn test_classpath_skips_missing_and_natives() {
        let temp = TempDir::new().unwrap();
        let brigadier = temp
            .path()
            .join("libraries/com/mojang/brigadier/1.1.8/brigadier-1.1.8.jar");
        touch(&brigadier);
        touch(&temp.path().join("libraries/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar"));
        let extra = temp.path().join("libraries/net/extra/extra.jar");

        let cp = build_classpath(temp.path(), &modern(), "1.20.1", &linux(), &[extra.clone(), brigadier.clone()]);
        assert_eq!(
            cp,
            vec![
                brigadier,
                temp.path().join("versions/1.20.1/1.20.1.jar"),
                extra
            ]
        );
    }

    #[test]
    fn test_compose_modern() {
        let temp = TempDir::new().unwrap();
        let cfg = config(temp.path());
        let ctx = linux().with_custom_resolution(true);
        let args = compose(&cfg, &modern(), "1.20.1", &ctx, &[]);

        assert_eq!(&args[..2], &["-Xmx4096M".to_string(), "-Xms1024M".to_string()]);
        assert!(!args.contains(&"-XstartOnFirstThread".to_string()));
        assert!(!args.contains(&"--demo".to_string()));
        assert_eq!(
            args.iter().filter(|a| a.starts_with("-Djava.library.path=")).count(),
            1
        );
        assert_eq!(args.iter().filter(|a| *a == "-cp").count(), 1);

        let main = args
            .iter()
            .position(|a| a == "net.minecraft.client.main.Main")
            .unwrap();
        let game = &args[main + 1..];
        assert_eq!(
            game,
            &[
                "--username", "Steve", "--uuid", "uuid-1", "--accessToken", "tok-123",
                "--assetIndex", "5", "--width", "1920", "--height", "1080"
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_compose_legacy() {
        let temp = TempDir::new().unwrap();
        let details: VersionDetails = serde_json::from_value(serde_json::json!({
            "id": "1.12.2",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name} --session ${auth_session} --gameDir ${game_directory}",
            "assets": "1.12"
        }))
        .unwrap();
        let mut cfg = config(temp.path());
        cfg.version_id = "1.12.2".into();

        let args = compose(&cfg, &details, "1.12.2", &linux(), &[]);
        let natives = format!("-Djava.library.path={}", temp.path().join("natives").display());
        assert!(args.contains(&natives));
        let cp = args.iter().position(|a| a == "-cp").unwrap();
        assert!(args[cp + 1].ends_with("1.12.2.jar"));
        assert!(args.contains(&"token:tok-123:uuid-1".to_string()));
        assert_eq!(&args[args.len() - 4..], &["--width", "1920", "--height", "1080"].map(String::from));
    }

    #[test]
    fn test_redact() {
        let args = vec!["--accessToken".to_string(), "tok-123".to_string(), "token:tok-123:u".to_string()];
        let safe = redact(&args, &["tok-123", ""]);
        assert_eq!(safe, vec!["--accessToken", "<redacted>", "token:<redacted>:u"]);
    }
}
