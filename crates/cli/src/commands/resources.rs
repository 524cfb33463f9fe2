//! Handlers for the central store listings (`commands`, `skills`,
//! `hooks`, `memory`) and the manifest-backed `mcp list`.

use corral_core::{McpTransport, RepoRef};
use corral_state::Store;
use std::fs;
use std::path::Path;

use crate::cli::{McpCommands, ResourceCommands};
use crate::Result;

pub fn commands(command: ResourceCommands) -> Result<i32> {
    let ResourceCommands::List = command;
    let store = Store::open()?;
    list_files(&store.commands_dir(), "commands")
}

pub fn hooks(command: ResourceCommands) -> Result<i32> {
    let ResourceCommands::List = command;
    let store = Store::open()?;
    list_files(&store.hooks_dir(), "hooks")
}

pub fn memory(command: ResourceCommands) -> Result<i32> {
    let ResourceCommands::List = command;
    let store = Store::open()?;
    list_files(&store.memory_dir(), "memory files")
}

pub fn skills(command: ResourceCommands) -> Result<i32> {
    let ResourceCommands::List = command;
    let store = Store::open()?;
    let Ok(entries) = fs::read_dir(store.skills_dir()) else {
        println!("no skills installed");
        return Ok(0);
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    if names.is_empty() {
        println!("no skills installed");
    }
    for name in names {
        println!("{name}");
    }
    Ok(0)
}

pub fn mcp(command: McpCommands) -> Result<i32> {
    let McpCommands::List = command;
    let store = Store::open()?;
    let meta = store.read_meta();
    let Some((slot, record)) = meta.highest_priority_repo() else {
        println!("no repo configured");
        return Ok(0);
    };
    // Reuse the existing clone; `pull` keeps it current.
    let repo_dir = store.repo_dir(slot);
    if !repo_dir.exists() {
        println!(
            "repo slot '{slot}' ({}) has never been pulled",
            RepoRef::parse(&record.source)
                .map(|r| r.url())
                .unwrap_or_else(|_| record.source.clone())
        );
        return Ok(0);
    }
    let Some(manifest) = corral_core::Manifest::load_from_repo(&repo_dir)? else {
        println!("repo declares no MCP servers");
        return Ok(0);
    };
    if manifest.mcp.is_empty() {
        println!("repo declares no MCP servers");
        return Ok(0);
    }
    for (name, entry) in &manifest.mcp {
        let transport = match &entry.transport {
            McpTransport::Stdio { command, .. } => format!("stdio ({command})"),
            // HTTP entries pass through unregistered.
            McpTransport::Http { url, .. } => format!("http ({url}, not registered)"),
        };
        let agents = if entry.agents.is_empty() {
            "all mcp-capable agents".to_string()
        } else {
            entry
                .agents
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("{name:<20} {transport:<40} -> {agents}");
    }
    Ok(0)
}

fn list_files(dir: &Path, what: &str) -> Result<i32> {
    let Ok(entries) = fs::read_dir(dir) else {
        println!("no {what} installed");
        return Ok(0);
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    if names.is_empty() {
        println!("no {what} installed");
    }
    for name in names {
        println!("{name}");
    }
    Ok(0)
}
