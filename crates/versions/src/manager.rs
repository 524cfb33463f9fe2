//! Install, list, remove, and resolve agent versions.

use anyhow::{bail, Context};
use corral_core::{find_project_manifest, AgentId};
use corral_state::Store;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::install::{InstallError, NpmInstaller, PackageInstaller};
use crate::Result;

/// Manages per-(agent, version) install directories and the global
/// default selection in the meta document.
pub struct VersionManager {
    store: Store,
    installer: Box<dyn PackageInstaller>,
}

impl VersionManager {
    /// A manager backed by the real npm installer.
    pub fn new(store: Store) -> Self {
        Self::with_installer(store, Box::new(NpmInstaller))
    }

    /// A manager with a substitute installer (tests use this).
    pub fn with_installer(store: Store, installer: Box<dyn PackageInstaller>) -> Self {
        Self { store, installer }
    }

    /// The deterministic binary path for an installed version. Its
    /// existence is the single source of truth for "installed".
    pub fn binary_path(&self, agent: AgentId, version: &str) -> PathBuf {
        self.store
            .version_dir(agent, version)
            .join("node_modules/.bin")
            .join(agent.descriptor().cli_name)
    }

    /// The private HOME for a version, populated by resource linking.
    pub fn home_path(&self, agent: AgentId, version: &str) -> PathBuf {
        self.store.version_dir(agent, version).join("home")
    }

    /// Whether the version's expected binary exists.
    pub fn is_installed(&self, agent: AgentId, version: &str) -> bool {
        self.binary_path(agent, version).exists()
    }

    /// Enumerates installed versions, sorted by numeric components.
    pub fn list_installed(&self, agent: AgentId) -> Vec<String> {
        let dir = self.store.agent_versions_dir(agent);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut versions: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|v| self.is_installed(agent, v))
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// Installs a version. `latest` is resolved against the installed
    /// package metadata and the directory renamed to the real version.
    /// On any failure no partial directory is left behind.
    ///
    /// Returns the concrete version string that was installed.
    pub fn install_version(&self, agent: AgentId, version: &str) -> Result<String> {
        let desc = agent.descriptor();
        let Some(package) = desc.package else {
            return Err(InstallError::NotInstallable {
                agent: agent.to_string(),
            }
            .into());
        };

        let scratch = self.store.version_dir(agent, version);
        fs::create_dir_all(&scratch)?;

        let installed = self
            .installer
            .install(package, version, &scratch)
            .and_then(|_| self.finish_install(agent, package, version, &scratch));

        let resolved = match installed {
            Ok(v) => v,
            Err(err) => {
                let _ = fs::remove_dir_all(&scratch);
                return Err(err);
            }
        };

        fs::create_dir_all(self.home_path(agent, &resolved))?;

        // First install becomes the global default.
        let mut meta = self.store.read_meta();
        if !meta.agents.contains_key(&agent) {
            meta.agents.insert(agent, resolved.clone());
            self.store.write_meta(&meta)?;
        }
        tracing::info!(agent = %agent, version = %resolved, "installed");
        Ok(resolved)
    }

    fn finish_install(
        &self,
        agent: AgentId,
        package: &str,
        version: &str,
        scratch: &Path,
    ) -> Result<String> {
        if !self.is_installed(agent, version) && version != "latest" {
            bail!(
                "install of {agent}@{version} completed but binary is missing at {}",
                self.binary_path(agent, version).display()
            );
        }
        if version != "latest" {
            return Ok(version.to_string());
        }

        let real = installed_package_version(scratch, package)?;
        let target = self.store.version_dir(agent, &real);
        if target.exists() {
            // Real version already installed; the scratch install is redundant.
            fs::remove_dir_all(scratch)?;
            return Ok(real);
        }
        fs::rename(scratch, &target)?;
        if !self.is_installed(agent, &real) {
            bail!(
                "install of {agent}@latest produced no binary at {}",
                self.binary_path(agent, &real).display()
            );
        }
        Ok(real)
    }

    /// Removes a version directory. If it was the global default, the
    /// highest remaining installed version takes over (or the default is
    /// cleared).
    pub fn remove_version(&self, agent: AgentId, version: &str) -> Result<()> {
        let dir = self.store.version_dir(agent, version);
        if !dir.exists() {
            bail!("{agent}@{version} is not installed");
        }
        fs::remove_dir_all(&dir)?;

        let mut meta = self.store.read_meta();
        if meta.agents.get(&agent).map(String::as_str) == Some(version) {
            match self.list_installed(agent).into_iter().next_back() {
                Some(next) => {
                    tracing::info!(agent = %agent, version = %next, "default reselected");
                    meta.agents.insert(agent, next);
                }
                None => {
                    meta.agents.remove(&agent);
                }
            }
            self.store.write_meta(&meta)?;
        }
        Ok(())
    }

    /// Removes every installed version and clears the default.
    pub fn remove_all_versions(&self, agent: AgentId) -> Result<()> {
        let dir = self.store.agent_versions_dir(agent);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        let mut meta = self.store.read_meta();
        if meta.agents.remove(&agent).is_some() {
            self.store.write_meta(&meta)?;
        }
        Ok(())
    }

    /// Sets the global default. The version must be installed.
    pub fn use_version(&self, agent: AgentId, version: &str) -> Result<()> {
        if !self.is_installed(agent, version) {
            bail!("{agent}@{version} is not installed");
        }
        let mut meta = self.store.read_meta();
        meta.agents.insert(agent, version.to_string());
        self.store.write_meta(&meta)
    }

    /// The globally selected default version, if any.
    pub fn default_version(&self, agent: AgentId) -> Option<String> {
        self.store.read_meta().agents.get(&agent).cloned()
    }

    /// Resolves the version to run from `cwd`: the nearest project
    /// manifest's pin wins, else the global default.
    pub fn resolve_version(&self, agent: AgentId, cwd: &Path) -> Option<String> {
        if let Some((manifest, _root)) = find_project_manifest(cwd) {
            if let Some(pinned) = manifest.agents.get(&agent) {
                return Some(pinned.clone());
            }
        }
        self.default_version(agent)
    }

    /// The store this manager operates on.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Reads the real version string from the installed package's metadata.
fn installed_package_version(prefix: &Path, package: &str) -> Result<String> {
    let manifest = prefix.join("node_modules").join(package).join("package.json");
    let text = fs::read_to_string(&manifest)
        .with_context(|| format!("missing package metadata at {}", manifest.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    value
        .get("version")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .context("package.json has no version field")
}

/// Compares dot-separated versions by numeric components, padding the
/// shorter with zeros. Non-numeric components compare as strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parts_a: Vec<&str> = a.split('.').collect();
    let parts_b: Vec<&str> = b.split('.').collect();
    let len = parts_a.len().max(parts_b.len());
    for i in 0..len {
        let pa = parts_a.get(i).copied().unwrap_or("0");
        let pb = parts_b.get(i).copied().unwrap_or("0");
        let ord = match (pa.parse::<u64>(), pb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => pa.cmp(pb),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
