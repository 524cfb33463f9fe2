//! Shared vocabulary for the corral workspace.
//!
//! This crate defines the types every other corral crate speaks in:
//! - The closed set of managed agents and their static descriptors.
//! - The repo source DSL (`gh:owner/repo`, URLs, local paths).
//! - The `agents.yaml` manifest schema.
//! - Markdown → TOML command conversion for TOML-format agents.
//! - Text utilities (content normalization, slugs, timestamp ids).

#![deny(unsafe_code)]

/// Error type for core operations.
pub type Error = anyhow::Error;
/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

pub mod agent;
pub mod convert;
pub mod manifest;
pub mod source;
pub mod text;

pub use agent::{AgentDescriptor, AgentId, Capabilities, CommandFormat, SHARED_INSTRUCTIONS_FILE};
pub use convert::command_to_toml;
pub use manifest::{
    find_project_manifest, DriveDecl, InstallMethod, Manifest, ManifestDefaults, ManifestScope,
    McpEntry, McpScope, McpTransport, MANIFEST_FILE, PROJECT_MANIFEST_DIR,
};
pub use source::RepoRef;
pub use text::{
    content_matches, expand_tilde, hash_content, normalize_content, slugify, timestamp_id,
};
