//! Repo discovery: typed resource listings per category.
//!
//! A config repo has a fixed layout:
//!
//! ```text
//! agents.yaml
//! shared/commands/*.md
//! {agent}/{commands_subdir}/*.md      agent-specific command overrides
//! skills/{name}/SKILL.md [rules/...]
//! hooks/[{agent}/]*.json
//! memory/*.md
//! jobs/*.yml
//! drives/{name}.md | drives/{name}/...
//! ```
//!
//! An agent-specific command wins over a shared one of the same name when
//! resolving the install source for that agent; for presentation the
//! shared entry is listed first and not duplicated.

use corral_core::{convert::split_front_matter, AgentId, Manifest};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Result;

/// A command declared by the repo.
#[derive(Debug, Clone)]
pub struct DiscoveredCommand {
    /// File stem.
    pub name: String,
    /// One-line description from front matter, when present.
    pub description: Option<String>,
    pub source: PathBuf,
    /// `None` for `shared/commands/`, the agent for overrides.
    pub agent: Option<AgentId>,
    /// Front-matter validation failure, when any.
    pub validation: Option<String>,
}

/// Front-matter metadata of a skill.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A skill directory declared by the repo.
#[derive(Debug, Clone)]
pub struct DiscoveredSkill {
    pub name: String,
    /// The skill's directory.
    pub source: PathBuf,
    pub metadata: SkillMetadata,
    /// Number of files under `rules/`.
    pub rule_count: usize,
}

/// A hook declared by the repo.
#[derive(Debug, Clone)]
pub struct DiscoveredHook {
    pub name: String,
    pub source: PathBuf,
    /// Agent scope when the hook lives under an agent subdirectory.
    pub agent: Option<AgentId>,
}

/// A memory file declared by the repo.
#[derive(Debug, Clone)]
pub struct DiscoveredMemory {
    pub file_name: String,
    pub source: PathBuf,
    /// The agent whose instructions file this is; `None` for the shared
    /// `AGENTS.md` and free-form files.
    pub agent: Option<AgentId>,
}

/// A job spec file declared by the repo.
#[derive(Debug, Clone)]
pub struct DiscoveredJob {
    pub name: String,
    pub source: PathBuf,
}

/// A drive declared by the repo: a single markdown file or a directory.
#[derive(Debug, Clone)]
pub struct DiscoveredDrive {
    pub name: String,
    pub source: PathBuf,
    pub is_dir: bool,
}

/// Everything a repo declares, in stable discovery order.
#[derive(Debug, Default)]
pub struct RepoContents {
    pub manifest: Option<Manifest>,
    pub commands: Vec<DiscoveredCommand>,
    pub skills: Vec<DiscoveredSkill>,
    pub hooks: Vec<DiscoveredHook>,
    pub memory: Vec<DiscoveredMemory>,
    pub jobs: Vec<DiscoveredJob>,
    pub drives: Vec<DiscoveredDrive>,
}

impl RepoContents {
    /// Resolves the install source for a command targeting an agent,
    /// applying the agent-over-shared override rule.
    pub fn command_source(&self, name: &str, agent: AgentId) -> Option<&DiscoveredCommand> {
        self.commands
            .iter()
            .find(|c| c.name == name && c.agent == Some(agent))
            .or_else(|| {
                self.commands
                    .iter()
                    .find(|c| c.name == name && c.agent.is_none())
            })
    }

    /// Distinct command names, shared entries first.
    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for cmd in &self.commands {
            if !names.contains(&cmd.name.as_str()) {
                names.push(&cmd.name);
            }
        }
        names
    }
}

/// Scans a repo clone into typed listings.
pub fn discover(repo_root: &Path) -> Result<RepoContents> {
    let mut contents = RepoContents {
        manifest: Manifest::load_from_repo(repo_root)?,
        ..Default::default()
    };

    discover_commands(repo_root, &mut contents.commands);
    discover_skills(repo_root, &mut contents.skills);
    discover_hooks(repo_root, &mut contents.hooks);
    discover_memory(repo_root, &mut contents.memory);
    discover_jobs(repo_root, &mut contents.jobs);
    discover_drives(repo_root, &mut contents.drives);

    Ok(contents)
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

fn command_from_file(path: PathBuf, agent: Option<AgentId>) -> Option<DiscoveredCommand> {
    let name = path.file_stem()?.to_str()?.to_string();
    let (description, validation) = match fs::read_to_string(&path) {
        Ok(text) => {
            let (front, _body) = split_front_matter(&text);
            match front {
                Some(yaml) => match serde_yaml::from_str::<serde_yaml::Value>(&yaml) {
                    Ok(value) => (
                        value
                            .get("description")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        None,
                    ),
                    Err(err) => (None, Some(format!("invalid front matter: {err}"))),
                },
                None => (None, None),
            }
        }
        Err(err) => (None, Some(format!("unreadable: {err}"))),
    };
    Some(DiscoveredCommand {
        name,
        description,
        source: path,
        agent,
        validation,
    })
}

fn discover_commands(repo_root: &Path, out: &mut Vec<DiscoveredCommand>) {
    // Shared first, so presentation order matches the override rule.
    for path in markdown_files(&repo_root.join("shared/commands")) {
        if let Some(cmd) = command_from_file(path, None) {
            out.push(cmd);
        }
    }
    for agent in AgentId::ALL {
        let dir = repo_root
            .join(agent.as_str())
            .join(agent.descriptor().commands_subdir);
        for path in markdown_files(&dir) {
            if let Some(cmd) = command_from_file(path, Some(agent)) {
                out.push(cmd);
            }
        }
    }
}

fn discover_skills(repo_root: &Path, out: &mut Vec<DiscoveredSkill>) {
    let skills_dir = repo_root.join("skills");
    let Ok(entries) = fs::read_dir(&skills_dir) else {
        return;
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    for dir in dirs {
        let Some(name) = dir.file_name().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        let metadata = fs::read_to_string(dir.join("SKILL.md"))
            .ok()
            .and_then(|text| {
                let (front, _) = split_front_matter(&text);
                front.and_then(|yaml| serde_yaml::from_str::<SkillMetadata>(&yaml).ok())
            })
            .unwrap_or_default();
        let rule_count = WalkDir::new(dir.join("rules"))
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();
        out.push(DiscoveredSkill {
            name,
            source: dir,
            metadata,
            rule_count,
        });
    }
}

fn discover_hooks(repo_root: &Path, out: &mut Vec<DiscoveredHook>) {
    let hooks_dir = repo_root.join("hooks");
    if !hooks_dir.is_dir() {
        return;
    }
    for entry in WalkDir::new(&hooks_dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        // hooks/{agent}/foo.json scopes the hook to that agent.
        let agent = path
            .parent()
            .filter(|p| *p != hooks_dir)
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .and_then(AgentId::parse);
        out.push(DiscoveredHook {
            name,
            source: path,
            agent,
        });
    }
}

fn discover_memory(repo_root: &Path, out: &mut Vec<DiscoveredMemory>) {
    for path in markdown_files(&repo_root.join("memory")) {
        let Some(file_name) = path.file_name().and_then(|s| s.to_str()).map(String::from)
        else {
            continue;
        };
        let agent = AgentId::ALL
            .into_iter()
            .find(|a| a.descriptor().instructions_file == file_name && file_name != "AGENTS.md");
        out.push(DiscoveredMemory {
            file_name,
            source: path,
            agent,
        });
    }
}

fn discover_jobs(repo_root: &Path, out: &mut Vec<DiscoveredJob>) {
    let jobs_dir = repo_root.join("jobs");
    let Ok(entries) = fs::read_dir(&jobs_dir) else {
        return;
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file() && p.extension().is_some_and(|e| e == "yml" || e == "yaml")
        })
        .collect();
    files.sort();
    for path in files {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        out.push(DiscoveredJob { name, source: path });
    }
}

fn discover_drives(repo_root: &Path, out: &mut Vec<DiscoveredDrive>) {
    let drives_dir = repo_root.join("drives");
    let Ok(entries) = fs::read_dir(&drives_dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();
    for path in paths {
        let is_dir = path.is_dir();
        if !is_dir && path.extension().is_none_or(|e| e != "md") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        out.push(DiscoveredDrive {
            name,
            source: path,
            is_dir,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_repo(root: &Path) {
        fs::create_dir_all(root.join("shared/commands")).unwrap();
        fs::write(
            root.join("shared/commands/review.md"),
            "---\ndescription: Review a diff\n---\nReview.\n",
        )
        .unwrap();
        fs::write(root.join("shared/commands/daily.md"), "Daily summary.\n").unwrap();
        // Agent-specific override of `review` for claude.
        fs::create_dir_all(root.join("claude/commands")).unwrap();
        fs::write(root.join("claude/commands/review.md"), "Claude review.\n").unwrap();

        fs::create_dir_all(root.join("skills/tdd/rules")).unwrap();
        fs::write(
            root.join("skills/tdd/SKILL.md"),
            "---\ndescription: Test-driven development\nauthor: alice\nkeywords: [testing]\n---\nBody\n",
        )
        .unwrap();
        fs::write(root.join("skills/tdd/rules/one.md"), "rule").unwrap();
        fs::write(root.join("skills/tdd/rules/two.md"), "rule").unwrap();

        fs::create_dir_all(root.join("hooks/claude")).unwrap();
        fs::write(root.join("hooks/pre-commit.json"), "{}").unwrap();
        fs::write(root.join("hooks/claude/on-stop.json"), "{}").unwrap();

        fs::create_dir_all(root.join("memory")).unwrap();
        fs::write(root.join("memory/AGENTS.md"), "shared").unwrap();
        fs::write(root.join("memory/CLAUDE.md"), "claude-only").unwrap();

        fs::create_dir_all(root.join("jobs")).unwrap();
        fs::write(root.join("jobs/nightly.yml"), "schedule: '0 3 * * *'\n").unwrap();

        fs::create_dir_all(root.join("drives/api")).unwrap();
        fs::write(root.join("drives/api/overview.md"), "# API\n").unwrap();
        fs::write(root.join("drives/notes.md"), "---\nname: notes\n---\n").unwrap();

        fs::write(root.join("agents.yaml"), "agents:\n  claude: 2.0.0\n").unwrap();
    }

    #[test]
    fn discovers_every_category() {
        let tmp = tempdir().unwrap();
        seed_repo(tmp.path());
        let contents = discover(tmp.path()).unwrap();

        assert!(contents.manifest.is_some());
        assert_eq!(contents.commands.len(), 3);
        assert_eq!(contents.skills.len(), 1);
        assert_eq!(contents.hooks.len(), 2);
        assert_eq!(contents.memory.len(), 2);
        assert_eq!(contents.jobs.len(), 1);
        assert_eq!(contents.drives.len(), 2);
    }

    #[test]
    fn agent_override_wins_for_that_agent_only() {
        let tmp = tempdir().unwrap();
        seed_repo(tmp.path());
        let contents = discover(tmp.path()).unwrap();

        let for_claude = contents
            .command_source("review", AgentId::Claude)
            .unwrap();
        assert_eq!(for_claude.agent, Some(AgentId::Claude));

        let for_codex = contents.command_source("review", AgentId::Codex).unwrap();
        assert_eq!(for_codex.agent, None);
    }

    #[test]
    fn presentation_lists_shared_first_without_duplicates() {
        let tmp = tempdir().unwrap();
        seed_repo(tmp.path());
        let contents = discover(tmp.path()).unwrap();
        assert_eq!(contents.command_names(), vec!["daily", "review"]);
    }

    #[test]
    fn skill_metadata_and_rule_count_are_read() {
        let tmp = tempdir().unwrap();
        seed_repo(tmp.path());
        let contents = discover(tmp.path()).unwrap();
        let skill = &contents.skills[0];
        assert_eq!(skill.name, "tdd");
        assert_eq!(
            skill.metadata.description.as_deref(),
            Some("Test-driven development")
        );
        assert_eq!(skill.metadata.author.as_deref(), Some("alice"));
        assert_eq!(skill.rule_count, 2);
    }

    #[test]
    fn hook_agent_scope_comes_from_the_subdirectory() {
        let tmp = tempdir().unwrap();
        seed_repo(tmp.path());
        let contents = discover(tmp.path()).unwrap();
        let shared = contents
            .hooks
            .iter()
            .find(|h| h.name == "pre-commit.json")
            .unwrap();
        assert_eq!(shared.agent, None);
        let scoped = contents
            .hooks
            .iter()
            .find(|h| h.name == "on-stop.json")
            .unwrap();
        assert_eq!(scoped.agent, Some(AgentId::Claude));
    }

    #[test]
    fn memory_attribution_by_instructions_file_name() {
        let tmp = tempdir().unwrap();
        seed_repo(tmp.path());
        let contents = discover(tmp.path()).unwrap();
        let shared = contents
            .memory
            .iter()
            .find(|m| m.file_name == "AGENTS.md")
            .unwrap();
        assert_eq!(shared.agent, None);
        let claude = contents
            .memory
            .iter()
            .find(|m| m.file_name == "CLAUDE.md")
            .unwrap();
        assert_eq!(claude.agent, Some(AgentId::Claude));
    }

    #[test]
    fn empty_repo_discovers_nothing() {
        let tmp = tempdir().unwrap();
        let contents = discover(tmp.path()).unwrap();
        assert!(contents.manifest.is_none());
        assert!(contents.commands.is_empty());
        assert!(contents.drives.is_empty());
    }

    #[test]
    fn invalid_front_matter_is_a_validation_failure_not_an_error() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("shared/commands")).unwrap();
        fs::write(
            tmp.path().join("shared/commands/bad.md"),
            "---\n[broken yaml\n---\nbody\n",
        )
        .unwrap();
        let contents = discover(tmp.path()).unwrap();
        assert_eq!(contents.commands.len(), 1);
        assert!(contents.commands[0].validation.is_some());
    }
}
