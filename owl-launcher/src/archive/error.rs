//! Error types for checksum and archive operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised while hashing or unpacking files.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Failed to read a file.
    #[error("Failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Digest did not match the declared value.
    #[error("Checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// An entry would resolve outside the destination directory.
    #[error("Archive entry escapes destination: {entry}")]
    PathTraversal { entry: String },

    /// The archive itself is corrupt or could not be decoded.
    #[error("Failed to extract {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// File name does not map to a known archive format.
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),
}
