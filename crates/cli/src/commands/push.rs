//! Handler for the `push` command: export local resources into the
//! config repo clone and push.

use anyhow::{bail, Context};
use corral_state::Store;
use corral_sync::{GitCli, GitTransport};
use std::fs;
use std::path::Path;

use crate::Result;

pub fn handle(scope: Option<String>, export_only: bool, message: Option<String>) -> Result<i32> {
    let store = Store::open()?;
    let meta = store.read_meta();

    let slot = match scope {
        Some(slot) => slot,
        None => match meta.highest_priority_repo() {
            Some((slot, _)) => slot.to_string(),
            None => bail!("no repo configured; run `corral pull <source>` first"),
        },
    };
    let record = meta
        .repos
        .get(&slot)
        .with_context(|| format!("repo slot '{slot}' is not configured"))?;
    if record.readonly {
        bail!("repo slot '{slot}' is readonly");
    }

    let repo_dir = store.repo_dir(&slot);
    if !repo_dir.exists() {
        bail!("repo slot '{slot}' has never been pulled");
    }

    let exported = export_store(&store, &repo_dir)?;
    println!("exported {exported} files into {}", repo_dir.display());
    if export_only {
        return Ok(0);
    }

    let git = GitCli;
    if git.status(&repo_dir)?.trim().is_empty() {
        println!("nothing to push");
        return Ok(0);
    }
    git.add_all(&repo_dir)?;
    git.commit(
        &repo_dir,
        message.as_deref().unwrap_or("corral: export local resources"),
    )?;
    git.push(&repo_dir)?;
    println!("pushed slot '{slot}' ({})", record.source);
    Ok(0)
}

/// Mirrors the central store into the repo's fixed layout. Returns the
/// number of files written.
fn export_store(store: &Store, repo_dir: &Path) -> Result<usize> {
    let mut written = 0;
    written += copy_dir_files(&store.commands_dir(), &repo_dir.join("shared/commands"))?;
    written += copy_tree_children(&store.skills_dir(), &repo_dir.join("skills"))?;
    written += copy_dir_files(&store.hooks_dir(), &repo_dir.join("hooks"))?;
    written += copy_dir_files(&store.memory_dir(), &repo_dir.join("memory"))?;
    // Only the job spec files; overlay homes under jobs/{name}/ are
    // directories and stay out of the export.
    written += copy_dir_files(&store.jobs_dir(), &repo_dir.join("jobs"))?;
    written += copy_drives(store, &repo_dir.join("drives"))?;
    Ok(written)
}

fn copy_dir_files(source: &Path, target: &Path) -> Result<usize> {
    let Ok(entries) = fs::read_dir(source) else {
        return Ok(0);
    };
    fs::create_dir_all(target)?;
    let mut written = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        if !entry.path().is_file() {
            continue;
        }
        fs::copy(entry.path(), target.join(entry.file_name()))?;
        written += 1;
    }
    Ok(written)
}

fn copy_tree_children(source: &Path, target: &Path) -> Result<usize> {
    let Ok(entries) = fs::read_dir(source) else {
        return Ok(0);
    };
    let mut written = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        if entry.path().is_dir() {
            written += copy_tree(&entry.path(), &target.join(entry.file_name()))?;
        }
    }
    Ok(written)
}

fn copy_tree(source: &Path, target: &Path) -> Result<usize> {
    fs::create_dir_all(target)?;
    let mut written = 0;
    for entry in fs::read_dir(source)?.filter_map(|e| e.ok()) {
        let dest = target.join(entry.file_name());
        if entry.path().is_dir() {
            written += copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
            written += 1;
        }
    }
    Ok(written)
}

fn copy_drives(store: &Store, target: &Path) -> Result<usize> {
    let Ok(entries) = fs::read_dir(store.drives_dir()) else {
        return Ok(0);
    };
    fs::create_dir_all(target)?;
    let mut written = 0;
    for entry in entries.filter_map(|e| e.ok()) {
        let dest = target.join(entry.file_name());
        if entry.path().is_dir() {
            written += copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
            written += 1;
        }
    }
    Ok(written)
}
