//! Sync engine for corral.
//!
//! Takes a clone of a config repo and reconciles its declared contents
//! with the local install across six resource categories: commands,
//! skills, hooks, memory files, MCP registrations, jobs, and drives.
//!
//! The flow is discovery → classification (new / in-sync / drifted) →
//! per-conflict decision → apply. New items install before conflict
//! resolution; errors are collected per resource and the sync proceeds
//! across the rest.

#![deny(unsafe_code)]

/// Error type for sync operations.
pub type Error = anyhow::Error;
/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

pub mod apply;
pub mod bootstrap;
pub mod classify;
pub mod decision;
pub mod discovery;
pub mod git;
pub mod mcp;

pub use apply::{SyncEngine, SyncOptions, SyncOutcome};
pub use bootstrap::{ensure_repo, DEFAULT_SYSTEM_SOURCE};
pub use classify::{classify_against_file, classify_content, classify_directory, SyncStatus};
pub use decision::{AutoAdapter, Decision, InteractiveAdapter};
pub use discovery::{
    discover, DiscoveredCommand, DiscoveredDrive, DiscoveredHook, DiscoveredJob,
    DiscoveredMemory, DiscoveredSkill, RepoContents, SkillMetadata,
};
pub use git::{GitCli, GitTransport};
pub use mcp::{registered_mcp_names, register_mcp, unregister_mcp, CommandRunner, SystemRunner};
