//! Legacy metadata migrations.
//!
//! Two superseded formats are recognized:
//!
//! 1. An older YAML where repo slots lived under a `scopes` key and the
//!    global default versions under `versions.{agent}.default`.
//! 2. An older single-repo JSON `state.json`, from before slots existed.
//!
//! Both are consumed once: the caller writes the migrated document in the
//! current format and the legacy file is removed or overwritten. Any
//! error during migration yields `None` and the caller starts empty.

use corral_core::AgentId;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::meta::{Meta, RepoRecord, SLOT_USER};

/// Cheap detection of the legacy YAML shape.
pub(crate) fn looks_legacy_yaml(text: &str) -> bool {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(text) else {
        return false;
    };
    let Some(map) = value.as_mapping() else {
        return false;
    };
    map.contains_key("scopes")
        || map
            .get("versions")
            .is_some_and(|v| v.is_mapping())
}

#[derive(Debug, Default, Deserialize)]
struct LegacyYaml {
    #[serde(default)]
    scopes: BTreeMap<String, RepoRecord>,
    #[serde(default)]
    repos: BTreeMap<String, RepoRecord>,
    #[serde(default)]
    versions: BTreeMap<AgentId, LegacyVersions>,
    #[serde(default)]
    agents: BTreeMap<AgentId, String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyVersions {
    #[serde(default)]
    default: Option<String>,
}

/// Migrates the legacy YAML shape: `scopes` → `repos`,
/// `versions.{agent}.default` → `agents.{agent}`.
pub(crate) fn from_legacy_yaml(text: &str) -> Option<Meta> {
    let legacy: LegacyYaml = serde_yaml::from_str(text).ok()?;

    let mut meta = Meta {
        agents: legacy.agents,
        repos: legacy.repos,
        ..Meta::default()
    };
    // `scopes` entries fill gaps; a coexisting `repos` key wins.
    for (slot, record) in legacy.scopes {
        meta.repos.entry(slot).or_insert(record);
    }
    for (agent, versions) in legacy.versions {
        if let Some(default) = versions.default {
            meta.agents.entry(agent).or_insert(default);
        }
    }
    tracing::info!("migrated legacy yaml metadata");
    Some(meta)
}

#[derive(Debug, Deserialize)]
struct LegacyJsonState {
    repo: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    last_sync: Option<String>,
}

/// Migrates the pre-slot JSON state file into a single `user` record.
pub(crate) fn from_legacy_json(path: &Path) -> Option<Meta> {
    let text = fs::read_to_string(path).ok()?;
    let legacy: LegacyJsonState = serde_json::from_str(&text).ok()?;

    let mut record = RepoRecord::new(
        legacy.repo,
        legacy.branch.unwrap_or_else(|| "main".to_string()),
        Meta::reserved_priority(SLOT_USER).unwrap_or(10),
    );
    record.commit = legacy.commit;
    record.last_sync = legacy.last_sync;

    let mut meta = Meta::default();
    meta.repos.insert(SLOT_USER.to_string(), record);
    tracing::info!("migrated legacy json state file");
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_legacy_scopes_key() {
        assert!(looks_legacy_yaml(
            "scopes:\n  user:\n    source: gh:a/b\n    branch: main\n    priority: 10\n"
        ));
        assert!(looks_legacy_yaml(
            "versions:\n  claude:\n    default: 1.0.0\n"
        ));
        assert!(!looks_legacy_yaml("agents:\n  claude: 1.0.0\n"));
        assert!(!looks_legacy_yaml("not: [valid"));
    }

    #[test]
    fn legacy_yaml_scopes_become_repos() {
        let text = "\
scopes:
  user:
    source: gh:me/cfg
    branch: main
    priority: 10
versions:
  claude:
    default: 1.0.0
  codex: {}
";
        let meta = from_legacy_yaml(text).unwrap();
        assert_eq!(meta.repos[SLOT_USER].source, "gh:me/cfg");
        assert_eq!(meta.agents[&AgentId::Claude], "1.0.0");
        assert!(!meta.agents.contains_key(&AgentId::Codex));
    }

    #[test]
    fn legacy_json_synthesizes_user_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(
            &path,
            r#"{"repo":"https://github.com/me/cfg.git","branch":"dev","commit":"abc1234"}"#,
        )
        .unwrap();

        let meta = from_legacy_json(&path).unwrap();
        let record = &meta.repos[SLOT_USER];
        assert_eq!(record.source, "https://github.com/me/cfg.git");
        assert_eq!(record.branch, "dev");
        assert_eq!(record.commit.as_deref(), Some("abc1234"));
        assert_eq!(record.priority, 10);
    }

    #[test]
    fn malformed_legacy_json_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        fs::write(&path, "{nope").unwrap();
        assert!(from_legacy_json(&path).is_none());
    }
}
