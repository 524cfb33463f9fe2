//! Handler for the `pull` command: clone/pull the config repo and sync.

use anyhow::{bail, Context};
use corral_core::{AgentId, RepoRef};
use corral_state::{RepoRecord, Store};
use corral_sync::{
    ensure_repo, AutoAdapter, GitCli, GitTransport, InteractiveAdapter, SyncEngine, SyncOptions,
    SystemRunner,
};
use corral_versions::VersionManager;
use std::path::PathBuf;

use crate::prompt::InquirePrompt;
use crate::Result;

pub struct PullArgs {
    pub source: Option<String>,
    pub agent: Option<String>,
    pub yes: bool,
    pub force: bool,
    pub dry_run: bool,
    pub clean: bool,
    pub skip_clis: bool,
    pub skip_mcp: bool,
    pub scope: Option<String>,
}

pub fn handle(args: PullArgs) -> Result<i32> {
    let store = Store::open()?;
    store.ensure_layout()?;
    let git = GitCli;

    let agent_filter = match &args.agent {
        Some(name) => Some(AgentId::parse(name).with_context(|| format!("unknown agent '{name}'"))?),
        None => None,
    };

    let (slot, repo_dir) = resolve_repo(&store, &git, args.source.as_deref(), args.scope.as_deref())?;
    println!("syncing from repo slot '{slot}'");

    if !args.skip_clis {
        install_manifest_versions(&store, &repo_dir, agent_filter)?;
    }

    let runner = SystemRunner;
    let engine = SyncEngine::new(&store, &runner);
    let opts = SyncOptions {
        force: args.force,
        yes: args.yes,
        dry_run: args.dry_run,
        clean: args.clean,
        skip_clis: args.skip_clis,
        skip_mcp: args.skip_mcp,
    };

    let mut prompt = InquirePrompt;
    let mut auto = AutoAdapter::skip_all();
    let adapter: &mut dyn InteractiveAdapter = if args.yes || args.force || args.dry_run {
        &mut auto
    } else {
        &mut prompt
    };

    let outcome = engine.sync_repo(&repo_dir, opts, adapter)?;

    if args.dry_run {
        println!(
            "dry run: {} new, {} in sync, {} drifted",
            outcome.installed.len(),
            outcome.in_sync,
            outcome.skipped.len()
        );
        return Ok(0);
    }

    for item in &outcome.installed {
        println!("installed {item}");
    }
    for item in &outcome.updated {
        println!("updated {item}");
    }
    for item in &outcome.skipped {
        println!("kept local {item}");
    }
    if outcome.in_sync > 0 {
        println!("{} already in sync", outcome.in_sync);
    }
    for err in &outcome.errors {
        eprintln!("warning: {err}");
    }
    if outcome.cancelled {
        println!("Cancelled");
        return Ok(0);
    }

    // Stamp the sync time on the slot record.
    if let Some(mut record) = store.get_repo(&slot) {
        record.last_sync = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .ok();
        store.set_repo_unchecked(&slot, record)?;
    }
    Ok(0)
}

/// Picks the repo to sync: an explicit source updates (or creates) a
/// slot, an explicit scope selects one, and otherwise the
/// highest-priority slot (bootstrapping the system slot if nothing is
/// configured).
fn resolve_repo(
    store: &Store,
    git: &dyn GitTransport,
    source: Option<&str>,
    scope: Option<&str>,
) -> Result<(String, PathBuf)> {
    if let Some(source) = source {
        let parsed = RepoRef::parse(source)?;
        let slot = scope.unwrap_or(corral_state::SLOT_USER).to_string();
        let meta = store.read_meta();
        if meta.repos.get(&slot).is_some_and(|r| r.readonly) {
            bail!("repo slot '{slot}' is readonly");
        }
        let target = store.repo_dir(&slot);
        let (commit, is_new) = git.clone_or_pull(&parsed, &target)?;
        let mut record = meta.repos.get(&slot).cloned().unwrap_or_else(|| {
            RepoRecord::new(source, parsed.reference(), meta.next_priority(&slot))
        });
        record.source = source.to_string();
        record.branch = parsed.reference().to_string();
        record.commit = Some(commit);
        store.set_repo(&slot, record)?;
        if is_new {
            println!("cloned {source} into slot '{slot}'");
        }
        return Ok((slot, target));
    }

    if let Some(scope) = scope {
        let record = store
            .get_repo(scope)
            .with_context(|| format!("repo slot '{scope}' is not configured"))?;
        let parsed = RepoRef::parse(&record.source)?;
        let target = store.repo_dir(scope);
        let (commit, _) = git.clone_or_pull(&parsed, &target)?;
        let mut updated = record;
        updated.commit = Some(commit);
        store.set_repo_unchecked(scope, updated)?;
        return Ok((scope.to_string(), target));
    }

    ensure_repo(store, git)
}

/// Installs agent versions the repo manifest pins and that are missing
/// locally.
fn install_manifest_versions(
    store: &Store,
    repo_dir: &std::path::Path,
    filter: Option<AgentId>,
) -> Result<()> {
    let Some(manifest) = corral_core::Manifest::load_from_repo(repo_dir)? else {
        return Ok(());
    };
    let manager = VersionManager::new(store.clone());
    let exe = std::env::current_exe()?;

    for (agent, version) in &manifest.agents {
        if filter.is_some_and(|f| f != *agent) {
            continue;
        }
        if version != "latest" && manager.is_installed(*agent, version) {
            continue;
        }
        println!("installing {agent}@{version} (declared by the repo)");
        match manager.install_version(*agent, version) {
            Ok(resolved) => {
                corral_versions::create_shim(store, *agent, &exe)?;
                corral_versions::sync_resources_to_version(store, *agent, &resolved)?;
            }
            Err(err) => eprintln!("warning: install {agent}@{version}: {err:#}"),
        }
    }
    Ok(())
}
