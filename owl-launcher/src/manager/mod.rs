//! Package content management.
//!
//! Fetches the package catalog and per-package file manifests, then
//! synchronizes an instance directory with them through the download engine.
//! Each instance root keeps a `content-state.json` index of verified files so
//! repeat syncs only transfer what changed.

mod catalog;
pub mod download;
mod error;
mod installed;
mod syncer;

pub use catalog::{CatalogClient, ExpectedDigest, FileEntry, PackageDescriptor, Unpack};
pub use error::{ManagerError, ManagerResult};
pub use installed::{record_key, FileRecord, InstalledContent, CONTENT_STATE_FILE};
pub use syncer::{ContentSyncer, SyncReport, NATIVES_DIR, STAGING_DIR};
