//! Per-version resource linking.
//!
//! Each isolated `home/` surfaces the central `commands/`, `skills/`,
//! `hooks/`, and `memory/` stores as if they were installed directly
//! under `home/.{agent}/`. Directories are symlinked wholesale, with two
//! exceptions: TOML-format agents get freshly generated per-file command
//! conversions instead of a symlink, and memory files are linked
//! file-by-file so the shared `AGENTS.md` can take the agent's own
//! instructions file name.

use corral_core::{command_to_toml, AgentId, CommandFormat, SHARED_INSTRUCTIONS_FILE};
use corral_state::Store;
use std::fs;
use std::path::Path;

use crate::Result;

/// Materializes the central resources into one version's isolated home.
///
/// A failed link is skipped (and logged) so a later run can recover.
pub fn sync_resources_to_version(store: &Store, agent: AgentId, version: &str) -> Result<()> {
    let desc = agent.descriptor();
    let config = store
        .version_dir(agent, version)
        .join("home")
        .join(desc.config_dir);
    fs::create_dir_all(&config)?;

    // Commands: symlink, or fan out TOML conversions.
    let commands_target = config.join(desc.commands_subdir);
    match desc.command_format {
        CommandFormat::Markdown => {
            relink(&store.commands_dir(), &commands_target);
        }
        CommandFormat::Toml => {
            write_toml_commands(&store.commands_dir(), &commands_target)?;
        }
    }

    if desc.capabilities.skills {
        relink(&store.skills_dir(), &config.join("skills"));
    }
    if desc.capabilities.hooks {
        relink(&store.hooks_dir(), &config.join("hooks"));
    }

    link_memory_files(store, agent, &config)?;

    tracing::debug!(agent = %agent, version, "resources linked into isolated home");
    Ok(())
}

/// Removes whatever sits at `target` and symlinks it to `source`.
fn relink(source: &Path, target: &Path) {
    remove_existing(target);
    if let Err(err) = symlink(source, target) {
        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            error = %err,
            "skipping failed resource link"
        );
    }
}

/// Generates one TOML command file per central markdown command.
fn write_toml_commands(commands_dir: &Path, target: &Path) -> Result<()> {
    remove_existing(target);
    fs::create_dir_all(target)?;
    let Ok(entries) = fs::read_dir(commands_dir) else {
        return Ok(());
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let markdown = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping unreadable command");
                continue;
            }
        };
        let toml = command_to_toml(name, &markdown)?;
        fs::write(target.join(format!("{name}.toml")), toml)?;
    }
    Ok(())
}

/// Links memory files one by one, renaming the shared instructions file
/// to the agent's own name.
fn link_memory_files(store: &Store, agent: AgentId, config: &Path) -> Result<()> {
    let desc = agent.descriptor();
    let Ok(entries) = fs::read_dir(store.memory_dir()) else {
        return Ok(());
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let link_name = if name == SHARED_INSTRUCTIONS_FILE {
            desc.instructions_file
        } else {
            name
        };
        let target = config.join(link_name);
        remove_existing(&target);
        if let Err(err) = symlink(&path, &target) {
            tracing::debug!(target = %target.display(), error = %err, "skipping failed memory link");
        }
    }
    Ok(())
}

fn remove_existing(target: &Path) {
    // symlink_metadata also sees dangling links, which exists() misses.
    if fs::symlink_metadata(target).is_ok() {
        if target.is_dir() && fs::read_link(target).is_err() {
            let _ = fs::remove_dir_all(target);
        } else {
            let _ = fs::remove_file(target);
        }
    }
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    // No symlink support: fall back to copying. Resync detects staleness
    // by rewriting on every run.
    if source.is_dir() {
        copy_tree(source, target)
    } else {
        fs::copy(source, target).map(|_| ())
    }
}

#[cfg(not(unix))]
fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
