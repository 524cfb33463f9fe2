//! New / in-sync / drifted classification.

use corral_core::{command_to_toml, content_matches, hash_content, CommandFormat};
use std::fs;
use std::path::Path;

use crate::Result;

/// Classification of one (resource, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Target does not exist locally.
    New,
    /// Target exists and its normalized content matches the source.
    InSync,
    /// Target exists and differs.
    Drifted,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::New => "new",
            SyncStatus::InSync => "in sync",
            SyncStatus::Drifted => "drifted",
        }
    }
}

/// Classifies source content against existing target content.
///
/// For TOML-format targets receiving a markdown source, the comparison is
/// against the post-conversion TOML.
pub fn classify_content(
    name: &str,
    source: &str,
    existing: Option<&str>,
    target_format: CommandFormat,
) -> Result<SyncStatus> {
    let Some(existing) = existing else {
        return Ok(SyncStatus::New);
    };
    let effective_source = match target_format {
        CommandFormat::Markdown => source.to_string(),
        CommandFormat::Toml => command_to_toml(name, source)?,
    };
    if content_matches(&effective_source, existing) {
        Ok(SyncStatus::InSync)
    } else {
        Ok(SyncStatus::Drifted)
    }
}

/// Classifies a source file against a target path on disk.
pub fn classify_against_file(
    name: &str,
    source: &Path,
    target: &Path,
    target_format: CommandFormat,
) -> Result<SyncStatus> {
    if !target.exists() {
        return Ok(SyncStatus::New);
    }
    // Identical bytes are in sync for every format; skip the
    // normalization and conversion work.
    if target_format == CommandFormat::Markdown {
        let (source_bytes, target_bytes) = (fs::read(source)?, fs::read(target)?);
        if hash_content(&source_bytes) == hash_content(&target_bytes) {
            return Ok(SyncStatus::InSync);
        }
    }
    let source_text = fs::read_to_string(source)?;
    let target_text = fs::read_to_string(target)?;
    classify_content(name, &source_text, Some(&target_text), target_format)
}

/// Classifies a directory pair by comparing every file on either side.
/// Any missing or differing file makes the pair drifted.
pub fn classify_directory(source: &Path, target: &Path) -> Result<SyncStatus> {
    if !target.exists() {
        return Ok(SyncStatus::New);
    }
    if dir_matches(source, target)? && dir_matches(target, source)? {
        Ok(SyncStatus::InSync)
    } else {
        Ok(SyncStatus::Drifted)
    }
}

fn dir_matches(a: &Path, b: &Path) -> Result<bool> {
    for entry in walkdir::WalkDir::new(a)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(a)
            .expect("walkdir yields children of its root");
        let counterpart = b.join(rel);
        if !counterpart.exists() {
            return Ok(false);
        }
        let left = fs::read_to_string(entry.path()).unwrap_or_default();
        let right = fs::read_to_string(&counterpart).unwrap_or_default();
        if !content_matches(&left, &right) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_only_difference_is_in_sync() {
        let status =
            classify_content("debug", "A\n", Some("A\r\n"), CommandFormat::Markdown).unwrap();
        assert_eq!(status, SyncStatus::InSync);
    }

    #[test]
    fn different_content_is_drifted() {
        let status =
            classify_content("debug", "A\n", Some("B"), CommandFormat::Markdown).unwrap();
        assert_eq!(status, SyncStatus::Drifted);
    }

    #[test]
    fn missing_target_is_new() {
        let status = classify_content("debug", "A\n", None, CommandFormat::Markdown).unwrap();
        assert_eq!(status, SyncStatus::New);
    }

    #[test]
    fn toml_target_compares_against_converted_source() {
        let md = "---\ndescription: d\n---\nbody\n";
        let converted = command_to_toml("cmd", md).unwrap();

        let in_sync =
            classify_content("cmd", md, Some(&converted), CommandFormat::Toml).unwrap();
        assert_eq!(in_sync, SyncStatus::InSync);

        let drifted =
            classify_content("cmd", md, Some("prompt = \"other\"\n"), CommandFormat::Toml)
                .unwrap();
        assert_eq!(drifted, SyncStatus::Drifted);
    }

    #[test]
    fn directory_classification_sees_both_sides() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::create_dir_all(a.join("rules")).unwrap();
        fs::write(a.join("SKILL.md"), "skill\n").unwrap();
        fs::write(a.join("rules/one.md"), "one\n").unwrap();

        assert_eq!(classify_directory(&a, &b).unwrap(), SyncStatus::New);

        fs::create_dir_all(b.join("rules")).unwrap();
        fs::write(b.join("SKILL.md"), "skill\r\n").unwrap();
        fs::write(b.join("rules/one.md"), "one\n").unwrap();
        assert_eq!(classify_directory(&a, &b).unwrap(), SyncStatus::InSync);

        // An extra file on the target side drifts the pair.
        fs::write(b.join("rules/extra.md"), "extra\n").unwrap();
        assert_eq!(classify_directory(&a, &b).unwrap(), SyncStatus::Drifted);
    }
}
