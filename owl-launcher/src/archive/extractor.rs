//! Archive extraction with containment checks.
//!
//! Every entry name is sanitized before anything touches the filesystem: an
//! entry that is absolute or climbs out of the destination aborts the whole
//! extraction with [`ArchiveError::PathTraversal`].

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use super::error::{ArchiveError, ArchiveResult};

/// File extensions treated as native libraries inside library jars.
const NATIVE_EXTENSIONS: &[&str] = &["so", "dll", "dylib", "jnilib"];

/// Archive formats the launcher can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    /// Detect the archive kind from a file name.
    ///
    /// Jars are zip files but are never unpacked implicitly, so they are not
    /// recognised here.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Turn an untrusted relative path into a safe relative [`PathBuf`].
///
/// Both `/` and `\` are accepted as separators. `.` segments are dropped;
/// absolute paths, drive prefixes and `..` segments are rejected.
pub fn sanitize_relative_path(raw: &str) -> ArchiveResult<PathBuf> {
    let traversal = || ArchiveError::PathTraversal {
        entry: raw.to_string(),
    };

    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(traversal());
    }

    let mut clean = PathBuf::new();
    for segment in raw.split(|c| c == '/' || c == '\\') {
        match segment {
            "" | "." => continue,
            ".." => return Err(traversal()),
            s if s.contains(':') => return Err(traversal()),
            s => clean.push(s),
        }
    }

    // Guard against platform-specific components slipping through.
    if clean
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(traversal());
    }

    Ok(clean)
}

/// Extract an archive into `dest`, creating it if needed.
///
/// # Returns
///
/// The number of regular files written.
pub fn extract(archive: &Path, dest: &Path, kind: ArchiveKind) -> ArchiveResult<usize> {
    fs::create_dir_all(dest).map_err(|e| ArchiveError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
    }
}

/// Copy native libraries out of a library jar into a flat directory.
///
/// Only files with a native library extension are extracted; `META-INF` is
/// skipped. Returns the number of libraries written.
pub fn extract_natives(jar: &Path, dest: &Path) -> ArchiveResult<usize> {
    fs::create_dir_all(dest).map_err(|e| ArchiveError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut zip = open_zip(jar)?;
    let mut count = 0;

    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(|e| zip_error(jar, e))?;
        if file.is_dir() || file.name().starts_with("META-INF") {
            continue;
        }

        let relative = sanitize_relative_path(file.name())?;
        let Some(file_name) = relative.file_name() else {
            continue;
        };
        let is_native = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| NATIVE_EXTENSIONS.contains(&ext));
        if !is_native {
            continue;
        }

        let target = dest.join(file_name);
        write_entry(&mut file, &target)?;
        count += 1;
    }

    Ok(count)
}

fn open_zip(archive: &Path) -> ArchiveResult<ZipArchive<BufReader<File>>> {
    let file = File::open(archive).map_err(|e| ArchiveError::ReadFailed {
        path: archive.to_path_buf(),
        source: e,
    })?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(archive, e))
}

fn zip_error(archive: &Path, error: zip::result::ZipError) -> ArchiveError {
    ArchiveError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: error.to_string(),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> ArchiveResult<usize> {
    let mut zip = open_zip(archive)?;

    // Validate every name up front so a hostile entry late in the archive
    // does not leave a half-extracted tree behind.
    for index in 0..zip.len() {
        let file = zip.by_index(index).map_err(|e| zip_error(archive, e))?;
        sanitize_relative_path(file.name())?;
    }

    let mut count = 0;
    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(|e| zip_error(archive, e))?;
        let relative = sanitize_relative_path(file.name())?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);

        if file.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ArchiveError::CreateDirFailed {
                path: target.clone(),
                source: e,
            })?;
            continue;
        }

        write_entry(&mut file, &target)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777)).map_err(
                |e| ArchiveError::WriteFailed {
                    path: target.clone(),
                    source: e,
                },
            )?;
        }

        count += 1;
    }

    Ok(count)
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> ArchiveResult<usize> {
    let open = || -> ArchiveResult<Archive<GzDecoder<BufReader<File>>>> {
        let file = File::open(archive).map_err(|e| ArchiveError::ReadFailed {
            path: archive.to_path_buf(),
            source: e,
        })?;
        Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
    };
    let tar_error = |e: io::Error| ArchiveError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    };

    // First pass: names only.
    let mut listing = open()?;
    for entry in listing.entries().map_err(tar_error)? {
        let entry = entry.map_err(tar_error)?;
        let raw = entry.path_bytes();
        sanitize_relative_path(&String::from_utf8_lossy(&raw))?;
    }

    let mut tar = open()?;
    let mut count = 0;
    for entry in tar.entries().map_err(tar_error)? {
        let mut entry = entry.map_err(tar_error)?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let is_file = entry.header().entry_type().is_file();

        if !entry.unpack_in(dest).map_err(tar_error)? {
            return Err(ArchiveError::PathTraversal { entry: name });
        }
        if is_file {
            count += 1;
        }
    }

    Ok(count)
}

fn write_entry(reader: &mut impl io::Read, target: &Path) -> ArchiveResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| ArchiveError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut out = File::create(target).map_err(|e| ArchiveError::WriteFailed {
        path: target.to_path_buf(),
        source: e,
    })?;
    io::copy(reader, &mut out).map_err(|e| ArchiveError::WriteFailed {
        path: target.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn build_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            // Write the raw name so hostile entries can be constructed.
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..name.len()].copy_from_slice(name.as_bytes());
            header.set_cksum();
            builder.append(&header, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_archive_kind_from_name() {
        assert_eq!(ArchiveKind::from_name("jre.tar.gz"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("pack.TGZ"), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_name("config.zip"), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_name("mod.jar"), None);
    }

    #[test]
    fn test_sanitize_accepts_nested_paths() {
        assert_eq!(
            sanitize_relative_path("config/./sub\\file.toml").unwrap(),
            PathBuf::from("config").join("sub").join("file.toml")
        );
        assert_eq!(sanitize_relative_path("").unwrap(), PathBuf::new());
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        for raw in ["../evil", "a/../../b", "/etc/passwd", "\\windows", "C:\\x"] {
            assert!(
                matches!(
                    sanitize_relative_path(raw),
                    Err(ArchiveError::PathTraversal { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pack.zip");
        build_zip(&archive, &[("config/a.txt", b"alpha"), ("b.txt", b"beta")]);

        let dest = temp.path().join("out");
        let count = extract(&archive, &dest, ArchiveKind::Zip).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read(dest.join("config/a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn test_extract_zip_rejects_traversal_and_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        build_zip(&archive, &[("ok.txt", b"fine"), ("../escape.txt", b"bad")]);

        let dest = temp.path().join("out");
        let result = extract(&archive, &dest, ArchiveKind::Zip);

        assert!(matches!(result, Err(ArchiveError::PathTraversal { .. })));
        assert!(!temp.path().join("escape.txt").exists());
        assert!(!dest.join("ok.txt").exists());
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("jre.tar.gz");
        build_tar_gz(&archive, &[("jdk/bin/java", b"#!/bin/sh\n")]);

        let dest = temp.path().join("out");
        let count = extract(&archive, &dest, ArchiveKind::TarGz).unwrap();

        assert_eq!(count, 1);
        assert!(dest.join("jdk/bin/java").is_file());
    }

    #[test]
    fn test_extract_tar_gz_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.tar.gz");
        build_tar_gz(&archive, &[("../../escape.txt", b"bad")]);

        let dest = temp.path().join("nested").join("out");
        let result = extract(&archive, &dest, ArchiveKind::TarGz);

        assert!(matches!(result, Err(ArchiveError::PathTraversal { .. })));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let result = extract(&archive, &temp.path().join("out"), ArchiveKind::Zip);
        assert!(matches!(result, Err(ArchiveError::ExtractionFailed { .. })));
    }

    #[test]
    fn test_extract_natives_flattens_libraries() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("lwjgl-natives.jar");
        build_zip(
            &jar,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
                ("linux/x64/org/lwjgl/liblwjgl.so", b"elf"),
                ("org/lwjgl/Version.class", b"class"),
            ],
        );

        let natives = temp.path().join("natives");
        let count = extract_natives(&jar, &natives).unwrap();

        assert_eq!(count, 1);
        assert!(natives.join("liblwjgl.so").is_file());
        assert!(!natives.join("Version.class").exists());
    }
}
