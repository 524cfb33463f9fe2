//! The drive library on disk.

use anyhow::Context;
use corral_core::{convert::split_front_matter, expand_tilde};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// A single file drive larger than this is "large".
pub const LARGE_FILE_BYTES: u64 = 50 * 1024;
/// A directory drive with more markdown files than this is "large".
pub const LARGE_DIR_FILES: usize = 20;

/// Front matter carried by a drive's representative document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DriveFrontMatter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project path this drive belongs to (may start with `~`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// File or directory drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveKind {
    File,
    Directory,
}

/// One drive in the library.
#[derive(Debug, Clone)]
pub struct Drive {
    pub name: String,
    pub path: PathBuf,
    pub kind: DriveKind,
    pub front: DriveFrontMatter,
}

impl Drive {
    /// The document holding the drive's front matter: the file itself,
    /// or `overview.md` (else the first markdown file by sort order) for
    /// directory drives.
    pub fn representative_doc(&self) -> Option<PathBuf> {
        match self.kind {
            DriveKind::File => Some(self.path.clone()),
            DriveKind::Directory => {
                let overview = self.path.join("overview.md");
                if overview.is_file() {
                    return Some(overview);
                }
                markdown_files(&self.path).into_iter().next()
            }
        }
    }

    /// Markdown files of a directory drive (just the file for file
    /// drives), sorted.
    pub fn documents(&self) -> Vec<PathBuf> {
        match self.kind {
            DriveKind::File => vec![self.path.clone()],
            DriveKind::Directory => markdown_files(&self.path),
        }
    }

    /// Whether the large-content path applies.
    pub fn is_large(&self) -> bool {
        match self.kind {
            DriveKind::File => fs::metadata(&self.path)
                .map(|m| m.len() > LARGE_FILE_BYTES)
                .unwrap_or(false),
            DriveKind::Directory => self.documents().len() > LARGE_DIR_FILES,
        }
    }

    /// Full content: the file's body, or every document concatenated
    /// with `## {basename}` prefixes.
    pub fn content(&self) -> Result<String> {
        match self.kind {
            DriveKind::File => {
                let text = fs::read_to_string(&self.path)?;
                let (_front, body) = split_front_matter(&text);
                Ok(body)
            }
            DriveKind::Directory => {
                let mut out = String::new();
                for doc in self.documents() {
                    let basename = doc
                        .file_name()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let text = fs::read_to_string(&doc)?;
                    let (_front, body) = split_front_matter(&text);
                    out.push_str(&format!("## {basename}\n\n{body}\n\n"));
                }
                Ok(out.trim_end().to_string())
            }
        }
    }

    /// The serialized front-matter header emitted before content.
    pub fn header(&self) -> String {
        let front = DriveFrontMatter {
            name: Some(self.name.clone()),
            ..self.front.clone()
        };
        let yaml = serde_yaml::to_string(&front).unwrap_or_default();
        format!("---\n{yaml}---\n")
    }
}

/// Outcome of resolving a `project` argument to a drive.
#[derive(Debug)]
pub enum Resolution {
    Found(Drive),
    /// No match; the caller showed these drive names as suggestions.
    Suggestions(Vec<String>),
}

/// The drive library rooted at `drives/` under the agents home.
#[derive(Debug, Clone)]
pub struct DriveStore {
    drives_dir: PathBuf,
    home: PathBuf,
}

impl DriveStore {
    pub fn new(drives_dir: PathBuf, home: PathBuf) -> Self {
        Self { drives_dir, home }
    }

    /// Opens the library under the default agents home.
    pub fn open() -> Result<Self> {
        let store = corral_state::Store::open()?;
        Ok(Self::new(store.drives_dir(), corral_state::home_dir()?))
    }

    pub fn drives_dir(&self) -> &Path {
        &self.drives_dir
    }

    /// Every drive, sorted by name.
    pub fn list(&self) -> Vec<Drive> {
        let Ok(entries) = fs::read_dir(&self.drives_dir) else {
            return Vec::new();
        };
        let mut drives: Vec<Drive> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| self.load_entry(&e.path()))
            .collect();
        drives.sort_by(|a, b| a.name.cmp(&b.name));
        drives
    }

    /// Looks a drive up by name. Names are bare identifiers; anything
    /// path-like falls through to project-path resolution instead.
    pub fn get(&self, name: &str) -> Option<Drive> {
        if name.contains('/') || name.contains('\\') {
            return None;
        }
        let dir = self.drives_dir.join(name);
        if dir.is_dir() {
            return self.load_entry(&dir);
        }
        let file = self.drives_dir.join(format!("{name}.md"));
        if file.is_file() {
            return self.load_entry(&file);
        }
        None
    }

    /// Resolves the `project` argument per the `get_context` contract.
    pub fn resolve(&self, project: Option<&str>, cwd: &Path) -> Resolution {
        if let Some(project) = project {
            if let Some(drive) = self.get(project) {
                return Resolution::Found(drive);
            }
            if let Some(drive) = self.find_by_project_path(Path::new(project)) {
                return Resolution::Found(drive);
            }
            return Resolution::Suggestions(
                self.list().into_iter().map(|d| d.name).collect(),
            );
        }
        match self.find_by_project_path(cwd) {
            Some(drive) => Resolution::Found(drive),
            None => Resolution::Suggestions(
                self.list().into_iter().map(|d| d.name).collect(),
            ),
        }
    }

    /// Finds the drive whose front-matter `project` resolves to the same
    /// absolute path.
    fn find_by_project_path(&self, path: &Path) -> Option<Drive> {
        let wanted = absolutize(path);
        self.list().into_iter().find(|drive| {
            drive.front.project.as_deref().is_some_and(|p| {
                let declared = expand_tilde(p, &self.home);
                absolutize(&declared) == wanted
            })
        })
    }

    fn load_entry(&self, path: &Path) -> Option<Drive> {
        let (kind, name) = if path.is_dir() {
            (DriveKind::Directory, path.file_name()?.to_str()?.to_string())
        } else if path.extension().is_some_and(|e| e == "md") {
            (DriveKind::File, path.file_stem()?.to_str()?.to_string())
        } else {
            return None;
        };

        let mut drive = Drive {
            name,
            path: path.to_path_buf(),
            kind,
            front: DriveFrontMatter::default(),
        };
        if let Some(doc) = drive.representative_doc() {
            if let Ok(text) = fs::read_to_string(doc) {
                let (front, _body) = split_front_matter(&text);
                if let Some(yaml) = front {
                    if let Ok(parsed) = serde_yaml::from_str::<DriveFrontMatter>(&yaml) {
                        drive.front = parsed;
                    }
                }
            }
        }
        if let Some(declared) = &drive.front.name {
            if !declared.is_empty() {
                drive.name = declared.clone();
            }
        }
        Some(drive)
    }

    /// Reads one named document of a drive.
    pub fn read_document(&self, drive: &Drive, file: &str) -> Result<String> {
        let path = match drive.kind {
            DriveKind::File => drive.path.clone(),
            DriveKind::Directory => drive.path.join(file),
        };
        fs::read_to_string(&path)
            .with_context(|| format!("no file '{file}' in drive '{}'", drive.name))
    }
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "md"))
        .collect();
    files.sort();
    files
}

fn absolutize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
