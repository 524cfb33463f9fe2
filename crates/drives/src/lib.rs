//! Context drives.
//!
//! A drive is a markdown knowledge store: either a single file with YAML
//! front matter or a directory of markdown documents (plus `notes/`).
//! This crate owns the drive library on disk and the stdio MCP server
//! that exposes it to agents through three tools: `get_context`,
//! `get_section`, and `add_note`.

#![deny(unsafe_code)]

/// Error type for drive operations.
pub type Error = anyhow::Error;
/// Result type for drive operations.
pub type Result<T> = std::result::Result<T, Error>;

pub mod mq;
pub mod note;
pub mod section;
pub mod server;
pub mod store;

pub use note::add_note;
pub use section::extract_section;
pub use server::{serve_stdio, DriveService};
pub use store::{Drive, DriveFrontMatter, DriveKind, DriveStore, Resolution};
