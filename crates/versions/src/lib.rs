//! Version manager for agent binaries.
//!
//! Each (agent, version) pair owns a directory under `versions/` holding
//! the installed npm distribution and a private `home/` that acts as the
//! agent's HOME when launched through the shim. Installedness is derived
//! from filesystem presence of the binary at its deterministic path; the
//! meta document only records the globally selected default per agent.

#![deny(unsafe_code)]

/// Error type for version operations.
pub type Error = anyhow::Error;
/// Result type for version operations.
pub type Result<T> = std::result::Result<T, Error>;

mod install;
mod link;
mod manager;
mod shim;
mod spec;

pub use install::{InstallError, NpmInstaller, PackageInstaller};
pub use link::sync_resources_to_version;
pub use manager::{compare_versions, VersionManager};
pub use shim::{create_shim, path_instructions, remove_shim, shims_in_path};
pub use spec::parse_spec;
