//! State store for corral.
//!
//! Owns the single persisted metadata document (`meta.yaml`) under the
//! agents home directory and the fixed layout rooted there. Reading is
//! total: absent files yield an empty document, and two legacy formats
//! are migrated transparently on first read.

#![deny(unsafe_code)]

/// Error type for state operations.
pub type Error = anyhow::Error;
/// Result type for state operations.
pub type Result<T> = std::result::Result<T, Error>;

mod meta;
mod migrate;
mod store;

pub use meta::{
    Meta, RegistryEntry, RegistryKind, RepoRecord, SLOT_PROJECT, SLOT_SYSTEM, SLOT_USER,
};
pub use store::{corral_home, home_dir, Store};
