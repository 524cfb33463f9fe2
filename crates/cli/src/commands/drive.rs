//! Handlers for the `drive` subtree.

use anyhow::{bail, Context};
use corral_drives::{add_note, serve_stdio, DriveKind, DriveService, DriveStore};
use corral_state::Store;
use std::fs;
use std::path::Path;

use crate::cli::DriveCommands;
use crate::Result;

pub fn handle(command: DriveCommands) -> Result<i32> {
    match command {
        DriveCommands::List => list(),
        DriveCommands::Add { path } => add(&path),
        DriveCommands::Note {
            drive,
            title,
            content,
        } => note(&drive, &title, &content),
        DriveCommands::Serve => serve(),
    }
}

fn list() -> Result<i32> {
    let drives = DriveStore::open()?.list();
    if drives.is_empty() {
        println!("no drives installed");
        return Ok(0);
    }
    for drive in drives {
        let kind = match drive.kind {
            DriveKind::File => "file",
            DriveKind::Directory => "dir",
        };
        println!(
            "{:<20} [{kind}] {}",
            drive.name,
            drive.front.description.as_deref().unwrap_or("")
        );
    }
    Ok(0)
}

fn add(path: &Path) -> Result<i32> {
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    let store = Store::open()?;
    store.ensure_layout()?;
    let name = path
        .file_name()
        .context("drive path has no file name")?
        .to_string_lossy()
        .into_owned();
    let target = store.drives_dir().join(&name);

    if path.is_dir() {
        copy_tree(path, &target)?;
    } else {
        fs::copy(path, &target)?;
    }
    println!("installed drive from {}", path.display());
    Ok(0)
}

fn note(drive_name: &str, title: &str, content: &str) -> Result<i32> {
    let store = DriveStore::open()?;
    let drive = store
        .get(drive_name)
        .with_context(|| format!("no drive named '{drive_name}'"))?;
    let path = add_note(&drive, title, content)?;
    println!("note written to {}", path.display());
    Ok(0)
}

fn serve() -> Result<i32> {
    serve_stdio(DriveService::open()?)?;
    Ok(0)
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)?.filter_map(|e| e.ok()) {
        let dest = target.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
