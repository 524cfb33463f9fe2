//! The persisted metadata document.

use corral_core::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reserved repo slot holding the bootstrap config repo. Readonly.
pub const SLOT_SYSTEM: &str = "system";
/// Reserved repo slot for the user's own config repo.
pub const SLOT_USER: &str = "user";
/// Reserved repo slot for the current project's config repo.
pub const SLOT_PROJECT: &str = "project";

/// Root persisted document. One per installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    /// Agent → globally selected version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<AgentId, String>,
    /// Named repo slots.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub repos: BTreeMap<String, RepoRecord>,
    /// Registry type → registry name → endpoint record.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub registries: BTreeMap<RegistryKind, BTreeMap<String, RegistryEntry>>,
    /// Agents sharing the central resources, when restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<BTreeSet<AgentId>>,
}

/// One repo slot's persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoRecord {
    /// Source string as the user gave it.
    pub source: String,
    /// Branch or tag tracked.
    pub branch: String,
    /// Last known short commit, once cloned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// ISO-8601 timestamp of the last sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    /// Resolution priority; higher overrides lower.
    pub priority: u32,
    /// Readonly slots reject writes outside the bootstrap path.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub readonly: bool,
}

impl RepoRecord {
    /// A fresh record with no clone yet.
    pub fn new(source: impl Into<String>, branch: impl Into<String>, priority: u32) -> Self {
        Self {
            source: source.into(),
            branch: branch.into(),
            commit: None,
            last_sync: None,
            priority,
            readonly: false,
        }
    }
}

/// Kind of external package registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// MCP server registry.
    Mcp,
    /// Skill registry.
    Skill,
}

/// One registry endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Meta {
    /// Fixed priority for a reserved slot, or `None` for named slots.
    pub fn reserved_priority(slot: &str) -> Option<u32> {
        match slot {
            SLOT_SYSTEM => Some(0),
            SLOT_USER => Some(10),
            SLOT_PROJECT => Some(100),
            _ => None,
        }
    }

    /// Priority a new slot would receive: fixed for reserved names, else
    /// 20 + the count of existing non-reserved slots.
    pub fn next_priority(&self, slot: &str) -> u32 {
        if let Some(p) = Self::reserved_priority(slot) {
            return p;
        }
        let extras = self
            .repos
            .keys()
            .filter(|k| Self::reserved_priority(k).is_none())
            .count() as u32;
        20 + extras
    }

    /// Slots ordered by ascending priority (name breaks ties).
    pub fn repos_by_priority(&self) -> Vec<(&str, &RepoRecord)> {
        let mut slots: Vec<(&str, &RepoRecord)> = self
            .repos
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        slots.sort_by(|a, b| a.1.priority.cmp(&b.1.priority).then(a.0.cmp(b.0)));
        slots
    }

    /// The slot that wins when a command names no repo.
    pub fn highest_priority_repo(&self) -> Option<(&str, &RepoRecord)> {
        self.repos_by_priority().into_iter().next_back()
    }
}
