//! Digest calculation for file verification.
//!
//! Game artifacts publish SHA-1 digests while modpack manifests and runtime
//! distributions use SHA-256, so both algorithms share one streaming API.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::error::{ArchiveError, ArchiveResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Parse an algorithm name as it appears in manifests (`sha1`, `SHA-256`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Guess the algorithm from the length of a hex digest.
    pub fn infer(hex_digest: &str) -> Option<Self> {
        match hex_digest.trim().len() {
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Incremental digest over either supported algorithm.
pub enum StreamingDigest {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamingDigest {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Consume the digest and return lowercase hex.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => format!("{:x}", h.finalize()),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Digest an in-memory buffer.
pub fn digest_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut digest = StreamingDigest::new(algorithm);
    digest.update(data);
    digest.finalize_hex()
}

/// Calculate the digest of a file.
///
/// # Returns
///
/// The lowercase hexadecimal digest of the file contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn calculate_file_checksum(path: &Path, algorithm: HashAlgorithm) -> ArchiveResult<String> {
    let mut file = File::open(path).map_err(|e| ArchiveError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut digest = StreamingDigest::new(algorithm);
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ArchiveError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        digest.update(&buffer[..bytes_read]);
    }

    Ok(digest.finalize_hex())
}

/// Verify that a file matches an expected digest.
///
/// The comparison ignores case and surrounding whitespace. Returns the actual
/// digest on success so callers can record it.
pub fn verify_checksum(
    path: &Path,
    algorithm: HashAlgorithm,
    expected: &str,
) -> ArchiveResult<String> {
    let actual = calculate_file_checksum(path, algorithm)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(ArchiveError::ChecksumMismatch {
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn test_calculate_checksum_sha256() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let checksum = calculate_file_checksum(file.path(), HashAlgorithm::Sha256).unwrap();
        assert_eq!(checksum, HELLO_SHA256);
    }

    #[test]
    fn test_calculate_checksum_sha1() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let checksum = calculate_file_checksum(file.path(), HashAlgorithm::Sha1).unwrap();
        assert_eq!(checksum, HELLO_SHA1);
    }

    #[test]
    fn test_calculate_checksum_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let checksum = calculate_file_checksum(file.path(), HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            checksum,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_calculate_checksum_missing_file() {
        let result = calculate_file_checksum(Path::new("/nonexistent/file"), HashAlgorithm::Sha1);
        assert!(matches!(result, Err(ArchiveError::ReadFailed { .. })));
    }

    #[test]
    fn test_verify_checksum_ignores_case() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let upper = HELLO_SHA1.to_ascii_uppercase();
        let actual = verify_checksum(file.path(), HashAlgorithm::Sha1, &upper).unwrap();
        assert_eq!(actual, HELLO_SHA1);
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let result = verify_checksum(file.path(), HashAlgorithm::Sha256, "wrong");
        match result {
            Err(ArchiveError::ChecksumMismatch { actual, .. }) => {
                assert_eq!(actual, HELLO_SHA256)
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_digest_bytes_matches_file_digest() {
        assert_eq!(digest_bytes(HashAlgorithm::Sha256, b"hello world"), HELLO_SHA256);
        assert_eq!(digest_bytes(HashAlgorithm::Sha1, b"hello world"), HELLO_SHA1);
    }

    #[test]
    fn test_parse_and_infer_algorithm() {
        assert_eq!(HashAlgorithm::parse("SHA-256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::parse("sha1"), Some(HashAlgorithm::Sha1));
        assert_eq!(HashAlgorithm::parse("md5"), None);
        assert_eq!(HashAlgorithm::infer(HELLO_SHA1), Some(HashAlgorithm::Sha1));
        assert_eq!(HashAlgorithm::infer(HELLO_SHA256), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::infer("abc"), None);
    }
}
