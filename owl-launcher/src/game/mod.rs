//! Game metadata: versions, host rules, base game files and mod loaders.

mod loader;
pub mod rules;
mod vanilla;
pub mod version;

pub use loader::{neoforge_prefix, LoaderKind, LoaderResolver};
pub use rules::{rules_allow, RuleContext};
pub use vanilla::{library_entries, VanillaResolver, RESOURCES_BASE_URL};
pub use version::{
    load_details, version_jar_path, version_json_path, Library, VersionDetails,
    VERSION_MANIFEST_URL,
};
