//! The `agents.yaml` manifest schema.
//!
//! A manifest appears in two places: at the root of a config repo, and as
//! a per-project pin file under `.agents/agents.yaml` in a working tree.
//! Both use the same schema; the project variant usually carries only the
//! flat `agents` mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::agent::AgentId;
use crate::Result;

/// Manifest file name at a repo root.
pub const MANIFEST_FILE: &str = "agents.yaml";
/// Directory holding the per-project manifest.
pub const PROJECT_MANIFEST_DIR: &str = ".agents";

/// Per-repo declarative document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Agent → pinned version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<AgentId, String>,
    /// MCP server declarations by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mcp: BTreeMap<String, McpEntry>,
    /// Optional defaults applied to sync operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ManifestDefaults>,
    /// Drive declarations by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub drives: BTreeMap<String, DriveDecl>,
}

/// Sync defaults declared by a repo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<InstallMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ManifestScope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentId>,
}

/// How resources are materialized into agent homes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    Symlink,
    Copy,
}

/// Where a repo's resources apply by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestScope {
    Global,
    Project,
}

/// An MCP server declaration.
///
/// Stdio entries are registered with agents; HTTP entries are carried
/// through and listed but never registered here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpEntry {
    #[serde(flatten)]
    pub transport: McpTransport,
    #[serde(default)]
    pub scope: McpScope,
    /// Agents this entry targets; empty means every MCP-capable agent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentId>,
    /// Environment overrides passed to the server process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Transport variant of an MCP entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpTransport {
    Stdio {
        command: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<String>,
    },
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
}

/// Registration scope of an MCP entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpScope {
    #[default]
    User,
    Project,
}

/// A drive declared by a repo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project path this drive is associated with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Manifest {
    /// Loads a manifest from a YAML file.
    pub fn load(path: &Path) -> Result<Manifest> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Loads the manifest at a repo root, if present.
    pub fn load_from_repo(repo_root: &Path) -> Result<Option<Manifest>> {
        let path = repo_root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Serializes back to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Walks upward from `cwd` looking for `.agents/agents.yaml`.
///
/// Returns the manifest and the directory it was found in. Absence is
/// normal and returns `None`.
pub fn find_project_manifest(cwd: &Path) -> Option<(Manifest, PathBuf)> {
    let mut dir = Some(cwd);
    while let Some(d) = dir {
        let candidate = d.join(PROJECT_MANIFEST_DIR).join(MANIFEST_FILE);
        if candidate.is_file() {
            if let Ok(manifest) = Manifest::load(&candidate) {
                return Some((manifest, d.to_path_buf()));
            }
        }
        dir = d.parent();
    }
    None
}
