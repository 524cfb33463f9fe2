//! Note creation, including file→directory drive promotion.

use corral_core::{slugify, timestamp_id};
use std::fs;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::store::{Drive, DriveKind};
use crate::Result;

/// Appends a note to a drive.
///
/// A file drive is first promoted to a directory drive: the file moves
/// to `{drive}/overview.md`. The note lands at
/// `{drive}/notes/{timestamp}-{slug}.md` with `title`/`created` front
/// matter.
pub fn add_note(drive: &Drive, title: &str, content: &str) -> Result<PathBuf> {
    let dir = match drive.kind {
        DriveKind::Directory => drive.path.clone(),
        DriveKind::File => promote(drive)?,
    };

    let now = OffsetDateTime::now_utc();
    let slug = slugify(title);
    let file_name = if slug.is_empty() {
        format!("{}.md", timestamp_id(now))
    } else {
        format!("{}-{}.md", timestamp_id(now), slug)
    };
    let notes_dir = dir.join("notes");
    fs::create_dir_all(&notes_dir)?;

    let created = now.format(&Rfc3339)?;
    let note = format!("---\ntitle: {title}\ncreated: {created}\n---\n\n{content}\n");
    let path = notes_dir.join(file_name);
    fs::write(&path, note)?;
    tracing::debug!(drive = %drive.name, note = %path.display(), "note added");
    Ok(path)
}

/// Turns a file drive into a directory drive, returning the directory.
fn promote(drive: &Drive) -> Result<PathBuf> {
    let dir = drive.path.with_extension("");
    fs::create_dir_all(&dir)?;
    fs::rename(&drive.path, dir.join("overview.md"))?;
    tracing::info!(drive = %drive.name, "promoted file drive to directory");
    Ok(dir)
}
