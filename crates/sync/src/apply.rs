//! The applier: installs a repo's resources into the central store.

use corral_core::{AgentId, CommandFormat, McpEntry};
use corral_jobs::{daemon, JobSpec};
use corral_state::Store;
use corral_versions::{sync_resources_to_version, VersionManager};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::{classify_against_file, classify_directory, SyncStatus};
use crate::decision::{AutoAdapter, Decision, InteractiveAdapter};
use crate::discovery::{discover, RepoContents};
use crate::mcp::{register_mcp, registered_mcp_names, unregister_mcp, CommandRunner};
use crate::Result;

/// Flags controlling one sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Overwrite every drifted item without asking.
    pub force: bool,
    /// Keep every drifted item without asking.
    pub yes: bool,
    /// Classify and report, change nothing.
    pub dry_run: bool,
    /// Unregister MCP names absent from the manifest.
    pub clean: bool,
    /// Skip agent version installs requested by the manifest.
    pub skip_clis: bool,
    /// Skip MCP registration entirely.
    pub skip_mcp: bool,
}

/// What one sync run did.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Freshly installed items.
    pub installed: Vec<String>,
    /// Drifted items overwritten by decision.
    pub updated: Vec<String>,
    /// Drifted items kept local by decision.
    pub skipped: Vec<String>,
    /// Items already in sync.
    pub in_sync: usize,
    /// Per-resource failures; the run continues across them.
    pub errors: Vec<String>,
    /// True when a cancel-all aborted the conflict loop.
    pub cancelled: bool,
}

impl SyncOutcome {
    fn record(&mut self, label: &str, result: Result<()>, bucket: Bucket) {
        match result {
            Ok(()) => match bucket {
                Bucket::Installed => self.installed.push(label.to_string()),
                Bucket::Updated => self.updated.push(label.to_string()),
            },
            Err(err) => self.errors.push(format!("{label}: {err:#}")),
        }
    }
}

enum Bucket {
    Installed,
    Updated,
}

/// One plannable unit of work.
struct PlanItem {
    label: String,
    status: SyncStatus,
    action: Action,
}

enum Action {
    CopyFile { source: PathBuf, target: PathBuf },
    CopyTree { source: PathBuf, target: PathBuf },
    InstallJob { source: PathBuf, target: PathBuf },
}

/// Reconciles a repo clone with the local install.
pub struct SyncEngine<'a> {
    store: &'a Store,
    runner: &'a dyn CommandRunner,
}

impl<'a> SyncEngine<'a> {
    pub fn new(store: &'a Store, runner: &'a dyn CommandRunner) -> Self {
        Self { store, runner }
    }

    /// Runs the full sync flow against a repo clone.
    pub fn sync_repo(
        &self,
        repo_root: &Path,
        opts: SyncOptions,
        adapter: &mut dyn InteractiveAdapter,
    ) -> Result<SyncOutcome> {
        self.store.ensure_layout()?;
        let contents = discover(repo_root)?;
        let mut outcome = SyncOutcome::default();

        let plan = self.build_plan(&contents, &mut outcome)?;
        if opts.dry_run {
            for item in &plan {
                tracing::info!(item = %item.label, status = item.status.label(), "dry run");
                match item.status {
                    SyncStatus::New => outcome.installed.push(item.label.clone()),
                    SyncStatus::InSync => outcome.in_sync += 1,
                    SyncStatus::Drifted => outcome.skipped.push(item.label.clone()),
                }
            }
            return Ok(outcome);
        }

        // New items install before conflict resolution.
        let mut drifted = Vec::new();
        for item in plan {
            match item.status {
                SyncStatus::New => {
                    let result = self.apply(&item.action);
                    outcome.record(&item.label, result, Bucket::Installed);
                }
                SyncStatus::InSync => outcome.in_sync += 1,
                SyncStatus::Drifted => drifted.push(item),
            }
        }

        // Conflict loop, serialized in discovery order.
        let mut auto_force = AutoAdapter::overwrite_all();
        let mut auto_yes = AutoAdapter::skip_all();
        let chooser: &mut dyn InteractiveAdapter = if opts.force {
            &mut auto_force
        } else if opts.yes {
            &mut auto_yes
        } else {
            adapter
        };
        for item in drifted {
            match chooser.resolve_conflict(&item.label)? {
                Decision::Overwrite => {
                    let result = self.apply(&item.action);
                    outcome.record(&item.label, result, Bucket::Updated);
                }
                Decision::Skip => outcome.skipped.push(item.label),
                Decision::CancelAll => {
                    outcome.cancelled = true;
                    return Ok(outcome);
                }
            }
        }

        if !opts.skip_mcp {
            self.apply_mcp(&contents, opts.clean, &mut outcome);
        }

        self.fan_out(&contents, &mut outcome);
        Ok(outcome)
    }

    fn build_plan(
        &self,
        contents: &RepoContents,
        outcome: &mut SyncOutcome,
    ) -> Result<Vec<PlanItem>> {
        let mut plan = Vec::new();

        // Central command storage is always markdown; the shared variant
        // wins for the central copy, agent overrides apply at fan-out.
        for name in contents.command_names() {
            let cmd = contents
                .commands
                .iter()
                .find(|c| c.name == name && c.agent.is_none())
                .or_else(|| contents.commands.iter().find(|c| c.name == name))
                .expect("name came from this listing");
            if let Some(problem) = &cmd.validation {
                outcome
                    .errors
                    .push(format!("command '{name}': {problem}"));
                continue;
            }
            let target = self.store.commands_dir().join(format!("{name}.md"));
            plan.push(PlanItem {
                label: format!("command '{name}'"),
                status: classify_against_file(name, &cmd.source, &target, CommandFormat::Markdown)?,
                action: Action::CopyFile {
                    source: cmd.source.clone(),
                    target,
                },
            });
        }

        for skill in &contents.skills {
            let target = self.store.skills_dir().join(&skill.name);
            plan.push(PlanItem {
                label: format!("skill '{}'", skill.name),
                status: classify_directory(&skill.source, &target)?,
                action: Action::CopyTree {
                    source: skill.source.clone(),
                    target,
                },
            });
        }

        for hook in &contents.hooks {
            // The central hooks store is flat regardless of agent scope.
            let target = self.store.hooks_dir().join(&hook.name);
            plan.push(PlanItem {
                label: format!("hook '{}'", hook.name),
                status: classify_against_file(
                    &hook.name,
                    &hook.source,
                    &target,
                    CommandFormat::Markdown,
                )?,
                action: Action::CopyFile {
                    source: hook.source.clone(),
                    target,
                },
            });
        }

        for memory in &contents.memory {
            let target = self.store.memory_dir().join(&memory.file_name);
            plan.push(PlanItem {
                label: format!("memory '{}'", memory.file_name),
                status: classify_against_file(
                    &memory.file_name,
                    &memory.source,
                    &target,
                    CommandFormat::Markdown,
                )?,
                action: Action::CopyFile {
                    source: memory.source.clone(),
                    target,
                },
            });
        }

        for job in &contents.jobs {
            let target = self.store.jobs_dir().join(format!("{}.yml", job.name));
            plan.push(PlanItem {
                label: format!("job '{}'", job.name),
                status: classify_against_file(
                    &job.name,
                    &job.source,
                    &target,
                    CommandFormat::Markdown,
                )?,
                action: Action::InstallJob {
                    source: job.source.clone(),
                    target,
                },
            });
        }

        for drive in &contents.drives {
            let (status, action) = if drive.is_dir {
                let target = self.store.drives_dir().join(&drive.name);
                (
                    classify_directory(&drive.source, &target)?,
                    Action::CopyTree {
                        source: drive.source.clone(),
                        target,
                    },
                )
            } else {
                let target = self.store.drives_dir().join(format!("{}.md", drive.name));
                (
                    classify_against_file(
                        &drive.name,
                        &drive.source,
                        &target,
                        CommandFormat::Markdown,
                    )?,
                    Action::CopyFile {
                        source: drive.source.clone(),
                        target,
                    },
                )
            };
            plan.push(PlanItem {
                label: format!("drive '{}'", drive.name),
                status,
                action,
            });
        }

        Ok(plan)
    }

    fn apply(&self, action: &Action) -> Result<()> {
        match action {
            Action::CopyFile { source, target } => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(source, target)?;
                Ok(())
            }
            Action::CopyTree { source, target } => {
                if target.exists() {
                    fs::remove_dir_all(target)?;
                }
                copy_tree(source, target)
            }
            Action::InstallJob { source, target } => {
                // A job with any validation error is rejected for write.
                let spec = JobSpec::load(source)?;
                let problems = spec.validate();
                if !problems.is_empty() {
                    anyhow::bail!("invalid job: {}", problems.join("; "));
                }
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(source, target)?;
                // A running daemon picks the change up via SIGHUP.
                let _ = daemon::signal_reload(self.store);
                Ok(())
            }
        }
    }

    /// Registers manifest MCP entries per target agent. Failures for one
    /// (agent, entry) pair do not stop the others.
    fn apply_mcp(&self, contents: &RepoContents, clean: bool, outcome: &mut SyncOutcome) {
        let Some(manifest) = &contents.manifest else {
            return;
        };
        let manager = VersionManager::new(self.store.clone());
        let meta = self.store.read_meta();

        for (name, entry) in &manifest.mcp {
            for agent in mcp_targets(entry, &meta) {
                // Version-managed agents register into the isolated home;
                // unmanaged ones into the real home.
                let home = match manager.default_version(agent) {
                    Some(version) => manager.home_path(agent, &version),
                    None => match corral_state::home_dir() {
                        Ok(home) => home,
                        Err(err) => {
                            outcome.errors.push(format!("mcp '{name}' ({agent}): {err:#}"));
                            continue;
                        }
                    },
                };
                if let Err(err) = register_mcp(agent, &home, name, entry, self.runner) {
                    outcome
                        .errors
                        .push(format!("mcp '{name}' ({agent}): {err:#}"));
                } else {
                    outcome.installed.push(format!("mcp '{name}' ({agent})"));
                }
            }
        }

        if clean {
            for agent in AgentId::ALL {
                let Some(version) = manager.default_version(agent) else {
                    continue;
                };
                let home = manager.home_path(agent, &version);
                for stale in registered_mcp_names(agent, &home) {
                    if manifest.mcp.contains_key(&stale) {
                        continue;
                    }
                    if let Err(err) = unregister_mcp(agent, &home, &stale, self.runner) {
                        outcome
                            .errors
                            .push(format!("mcp remove '{stale}' ({agent}): {err:#}"));
                    }
                }
            }
        }
    }

    /// Re-materializes each selected (agent, version) isolated home so the
    /// freshly installed central resources appear there.
    fn fan_out(&self, contents: &RepoContents, outcome: &mut SyncOutcome) {
        let manager = VersionManager::new(self.store.clone());
        let meta = self.store.read_meta();

        let mut targets: BTreeSet<(AgentId, String)> = meta
            .agents
            .iter()
            .map(|(agent, version)| (*agent, version.clone()))
            .collect();
        if let Some(manifest) = &contents.manifest {
            for (agent, version) in &manifest.agents {
                if version != "latest" && manager.is_installed(*agent, version) {
                    targets.insert((*agent, version.clone()));
                }
            }
        }

        for (agent, version) in targets {
            if !manager.is_installed(agent, &version) {
                continue;
            }
            if let Err(err) = sync_resources_to_version(self.store, agent, &version) {
                outcome
                    .errors
                    .push(format!("link {agent}@{version}: {err:#}"));
            }
        }
    }
}

/// Agents an MCP entry targets: its explicit list, else every
/// MCP-capable agent (narrowed by the meta `sync` set when present).
fn mcp_targets(entry: &McpEntry, meta: &corral_state::Meta) -> Vec<AgentId> {
    if !entry.agents.is_empty() {
        return entry.agents.clone();
    }
    AgentId::ALL
        .into_iter()
        .filter(|a| a.descriptor().capabilities.mcp)
        .filter(|a| meta.sync.as_ref().is_none_or(|set| set.contains(a)))
        .collect()
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
