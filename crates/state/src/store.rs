//! The agents home directory: layout, meta I/O, repo slot helpers.

use anyhow::{bail, Context};
use corral_core::AgentId;
use std::fs;
use std::path::{Path, PathBuf};

use crate::meta::{Meta, RepoRecord};
use crate::migrate;
use crate::Result;

/// Meta document file name under the agents home.
const META_FILE: &str = "meta.yaml";
/// Legacy JSON state file superseded by `meta.yaml`.
const LEGACY_STATE_FILE: &str = "state.json";

const META_HEADER: &str = "# corral metadata. Managed by `corral`; edit with care.\n";

/// Top-level directories `ensure_layout` creates.
const LAYOUT: &[&str] = &[
    "repos",
    "packages",
    "versions",
    "shims",
    "commands",
    "skills",
    "hooks",
    "memory",
    "jobs",
    "runs",
    "drives",
];

/// Returns the user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().context("home directory not found")
}

/// Resolves the agents home: `$CORRAL_HOME` if set, else `~/.corral`.
pub fn corral_home() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("CORRAL_HOME") {
        return Ok(PathBuf::from(custom));
    }
    Ok(home_dir()?.join(".corral"))
}

/// Handle on the agents home directory.
///
/// Constructed once per CLI invocation and passed down; the meta document
/// is never held in memory across commands.
#[derive(Debug, Clone)]
pub struct Store {
    home: PathBuf,
}

impl Store {
    /// Opens the store at the default location.
    pub fn open() -> Result<Self> {
        Ok(Self::at(corral_home()?))
    }

    /// Opens the store at an explicit root (tests use this).
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// The agents home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    // --- Layout ---

    pub fn meta_file(&self) -> PathBuf {
        self.home.join(META_FILE)
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.home.join("repos")
    }

    pub fn repo_dir(&self, slot: &str) -> PathBuf {
        self.repos_dir().join(slot)
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.home.join("packages")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.home.join("versions")
    }

    pub fn agent_versions_dir(&self, agent: AgentId) -> PathBuf {
        self.versions_dir().join(agent.as_str())
    }

    pub fn version_dir(&self, agent: AgentId, version: &str) -> PathBuf {
        self.agent_versions_dir(agent).join(version)
    }

    pub fn shims_dir(&self) -> PathBuf {
        self.home.join("shims")
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.home.join("commands")
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.home.join("skills")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.home.join("hooks")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.home.join("memory")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.home.join("jobs")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }

    pub fn job_runs_dir(&self, job: &str) -> PathBuf {
        self.runs_dir().join(job)
    }

    pub fn run_dir(&self, job: &str, run_id: &str) -> PathBuf {
        self.job_runs_dir(job).join(run_id)
    }

    pub fn drives_dir(&self) -> PathBuf {
        self.home.join("drives")
    }

    pub fn daemon_pid_file(&self) -> PathBuf {
        self.home.join("daemon.pid")
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.home.join("daemon.log")
    }

    /// Idempotently creates every top-level directory, and performs the
    /// one-time move of the legacy `instructions/` directory into
    /// `memory/` (names already present in `memory/` win).
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in LAYOUT {
            fs::create_dir_all(self.home.join(dir))?;
        }

        let legacy = self.home.join("instructions");
        if legacy.is_dir() {
            let memory = self.memory_dir();
            for entry in fs::read_dir(&legacy)? {
                let entry = entry?;
                let target = memory.join(entry.file_name());
                if target.exists() {
                    continue;
                }
                fs::rename(entry.path(), &target)?;
            }
            fs::remove_dir_all(&legacy)?;
            tracing::info!(path = %legacy.display(), "migrated legacy instructions directory");
        }
        Ok(())
    }

    // --- Meta I/O ---

    /// Reads the meta document. Never fails for absent files; legacy
    /// formats are migrated transparently and consumed once.
    pub fn read_meta(&self) -> Meta {
        let path = self.meta_file();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(text) => return self.parse_or_migrate(&text),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read meta file; starting empty");
                    return Meta::default();
                }
            }
        }

        // No meta.yaml: an old installation may still carry state.json.
        let legacy = self.home.join(LEGACY_STATE_FILE);
        if legacy.exists() {
            if let Some(meta) = migrate::from_legacy_json(&legacy) {
                if self.write_meta(&meta).is_ok() {
                    let _ = fs::remove_file(&legacy);
                }
                return meta;
            }
        }
        Meta::default()
    }

    fn parse_or_migrate(&self, text: &str) -> Meta {
        if migrate::looks_legacy_yaml(text) {
            match migrate::from_legacy_yaml(text) {
                Some(meta) => {
                    // Superseded in place by the current format.
                    let _ = self.write_meta(&meta);
                    return meta;
                }
                None => return Meta::default(),
            }
        }
        match serde_yaml::from_str(text) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(error = %err, "meta file unreadable; starting empty");
                Meta::default()
            }
        }
    }

    /// Atomically writes the meta document (temp file + rename).
    pub fn write_meta(&self, meta: &Meta) -> Result<()> {
        fs::create_dir_all(&self.home)?;
        let body = serde_yaml::to_string(meta)?;
        let path = self.meta_file();
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, format!("{META_HEADER}{body}"))?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    // --- Repo slot helpers ---

    pub fn get_repo(&self, slot: &str) -> Option<RepoRecord> {
        self.read_meta().repos.get(slot).cloned()
    }

    /// Writes a slot record. Readonly slots reject this path; the
    /// bootstrap uses [`Store::set_repo_unchecked`].
    pub fn set_repo(&self, slot: &str, record: RepoRecord) -> Result<()> {
        let meta = self.read_meta();
        if meta.repos.get(slot).is_some_and(|r| r.readonly) {
            bail!("repo slot '{slot}' is readonly");
        }
        self.set_repo_unchecked(slot, record)
    }

    /// Writes a slot record without the readonly check. Reserved for
    /// migration and the system-slot bootstrap.
    pub fn set_repo_unchecked(&self, slot: &str, record: RepoRecord) -> Result<()> {
        let mut meta = self.read_meta();
        meta.repos.insert(slot.to_string(), record);
        self.write_meta(&meta)
    }

    pub fn remove_repo(&self, slot: &str) -> Result<Option<RepoRecord>> {
        let mut meta = self.read_meta();
        let removed = meta.repos.remove(slot);
        if removed.is_some() {
            self.write_meta(&meta)?;
        }
        Ok(removed)
    }
}
