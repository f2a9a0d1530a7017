//! Checksum and archive utilities.
//!
//! Pure helpers shared by the download engine and the runtime provisioner:
//!
//! - Streaming SHA-1 / SHA-256 digests of files and byte slices
//! - Zip and tar.gz extraction that refuses entries escaping the destination
//! - Relative path sanitization for paths supplied by remote manifests

mod checksum;
mod error;
mod extractor;

pub use checksum::{
    calculate_file_checksum, digest_bytes, verify_checksum, HashAlgorithm, StreamingDigest,
};
pub use error::{ArchiveError, ArchiveResult};
pub use extractor::{extract, extract_natives, sanitize_relative_path, ArchiveKind};
