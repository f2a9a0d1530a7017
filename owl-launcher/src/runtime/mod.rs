//! Java runtime selection and installation.

mod compat;
mod error;
mod index;
mod platform;
mod provisioner;

pub use compat::{
    parse_java_version, detect_java_major, required_java_major, satisfies, FALLBACK_JAVA_MAJOR,
};
pub use error::{RuntimeError, RuntimeResult};
pub use index::{RuntimeIndex, RUNTIME_INDEX_FILE};
pub use platform::{find_java, java_binary_name, AdoptiumPlatform};
pub use provisioner::{RuntimeProvisioner, ADOPTIUM_API_URL};
