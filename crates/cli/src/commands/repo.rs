//! Handlers for `repo`, `registry`, `search`, and `install`.

use anyhow::{bail, Context};
use corral_core::RepoRef;
use corral_state::{Meta, RegistryEntry, RegistryKind, RepoRecord, Store};
use corral_sync::{GitCli, GitTransport};
use std::collections::BTreeMap;

use crate::cli::{RegistryCommands, RepoCommands};
use crate::registry::{HttpRegistryClient, RegistryClient};
use crate::Result;

pub fn handle(command: RepoCommands) -> Result<i32> {
    let store = Store::open()?;
    match command {
        RepoCommands::List => {
            let meta = store.read_meta();
            if meta.repos.is_empty() {
                println!("no repos configured");
                return Ok(0);
            }
            for (slot, record) in meta.repos_by_priority() {
                println!(
                    "{:<12} prio {:<4} {} @{}{}",
                    slot,
                    record.priority,
                    record.source,
                    record.branch,
                    if record.readonly { " [readonly]" } else { "" }
                );
            }
            Ok(0)
        }
        RepoCommands::Add { slot, source } => {
            let parsed = RepoRef::parse(&source)?;
            let meta = store.read_meta();
            let mut record = meta.repos.get(&slot).cloned().unwrap_or_else(|| {
                RepoRecord::new(&source, parsed.reference(), meta.next_priority(&slot))
            });
            record.source = source.clone();
            record.branch = parsed.reference().to_string();
            store.set_repo(&slot, record)?;
            println!("repo slot '{slot}' -> {}", parsed.url());
            Ok(0)
        }
        RepoCommands::Remove { slot } => {
            let record = store
                .get_repo(&slot)
                .with_context(|| format!("repo slot '{slot}' is not configured"))?;
            if record.readonly {
                bail!("repo slot '{slot}' is readonly");
            }
            store.remove_repo(&slot)?;
            let clone = store.repo_dir(&slot);
            if clone.exists() {
                std::fs::remove_dir_all(&clone)?;
            }
            println!("removed repo slot '{slot}'");
            Ok(0)
        }
    }
}

fn parse_kind(kind: &str) -> Result<RegistryKind> {
    match kind {
        "mcp" => Ok(RegistryKind::Mcp),
        "skill" => Ok(RegistryKind::Skill),
        other => bail!("unknown registry type '{other}' (expected mcp or skill)"),
    }
}

/// Seeds the default registries the first time `registry` is touched.
fn with_defaults(mut meta: Meta) -> Meta {
    for (kind, url) in [
        (RegistryKind::Mcp, "https://registry.modelcontextprotocol.io"),
        (RegistryKind::Skill, "https://skills.corral.dev"),
    ] {
        meta.registries.entry(kind).or_insert_with(|| {
            BTreeMap::from([(
                "default".to_string(),
                RegistryEntry {
                    url: url.to_string(),
                    enabled: true,
                    api_key: None,
                },
            )])
        });
    }
    meta
}

pub fn registry(command: RegistryCommands) -> Result<i32> {
    let store = Store::open()?;
    match command {
        RegistryCommands::List => {
            let meta = with_defaults(store.read_meta());
            store.write_meta(&meta)?;
            for (kind, entries) in &meta.registries {
                for (name, entry) in entries {
                    println!(
                        "{:<6} {:<16} {} [{}]",
                        format!("{kind:?}").to_lowercase(),
                        name,
                        entry.url,
                        if entry.enabled { "enabled" } else { "disabled" }
                    );
                }
            }
            Ok(0)
        }
        RegistryCommands::Add { r#type, name, url } => {
            let kind = parse_kind(&r#type)?;
            let mut meta = with_defaults(store.read_meta());
            meta.registries.entry(kind).or_default().insert(
                name.clone(),
                RegistryEntry {
                    url,
                    enabled: true,
                    api_key: None,
                },
            );
            store.write_meta(&meta)?;
            println!("registry '{name}' added");
            Ok(0)
        }
        RegistryCommands::Enable { r#type, name } => set_enabled(&store, &r#type, &name, true),
        RegistryCommands::Disable { r#type, name } => set_enabled(&store, &r#type, &name, false),
    }
}

fn set_enabled(store: &Store, kind: &str, name: &str, enabled: bool) -> Result<i32> {
    let kind = parse_kind(kind)?;
    let mut meta = with_defaults(store.read_meta());
    let entry = meta
        .registries
        .get_mut(&kind)
        .and_then(|m| m.get_mut(name))
        .with_context(|| format!("no registry named '{name}'"))?;
    entry.enabled = enabled;
    store.write_meta(&meta)?;
    println!(
        "registry '{name}' {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(0)
}

pub fn search(query: &str, kind: &str) -> Result<i32> {
    let kind = parse_kind(kind)?;
    let store = Store::open()?;
    let meta = with_defaults(store.read_meta());
    let client = HttpRegistryClient;

    let mut any = false;
    for (name, entry) in meta.registries.get(&kind).into_iter().flatten() {
        if !entry.enabled {
            continue;
        }
        match client.search(entry, query) {
            Ok(hits) => {
                for hit in hits {
                    any = true;
                    println!(
                        "{:<24} {:<10} {}",
                        hit.name,
                        hit.version.as_deref().unwrap_or("-"),
                        hit.description.as_deref().unwrap_or("")
                    );
                }
            }
            Err(err) => eprintln!("warning: registry '{name}': {err:#}"),
        }
    }
    if !any {
        println!("no results for '{query}'");
    }
    Ok(0)
}

/// Installs `skill:<name>` into the central skill store, or prints the
/// manifest entry for `mcp:<name>`.
pub fn install(package: &str) -> Result<i32> {
    let Some((kind, name)) = package.split_once(':') else {
        bail!("expected skill:<name> or mcp:<name>");
    };
    let registry_kind = parse_kind(kind)?;
    let store = Store::open()?;
    store.ensure_layout()?;
    let meta = with_defaults(store.read_meta());
    let client = HttpRegistryClient;

    let entry = meta
        .registries
        .get(&registry_kind)
        .into_iter()
        .flatten()
        .find(|(_, e)| e.enabled)
        .map(|(_, e)| e.clone())
        .context("no enabled registry for this type")?;
    let descriptor = client.resolve(&entry, name)?;

    match registry_kind {
        RegistryKind::Skill => {
            let source = RepoRef::parse(&descriptor.source)?;
            let scratch = store.packages_dir().join(&descriptor.name);
            GitCli.clone_or_pull(&source, &scratch)?;
            let target = store.skills_dir().join(&descriptor.name);
            if target.exists() {
                std::fs::remove_dir_all(&target)?;
            }
            copy_skill(&scratch, &target)?;
            println!("installed skill '{}'", descriptor.name);
        }
        RegistryKind::Mcp => {
            println!("add this to your repo's agents.yaml and run `corral pull`:");
            println!();
            println!("mcp:");
            println!("  {}:", descriptor.name);
            println!("    type: stdio");
            println!("    command: {}", descriptor.source);
        }
    }
    Ok(0)
}

fn copy_skill(source: &std::path::Path, target: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(target)?;
    for entry in std::fs::read_dir(source)?.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let dest = target.join(&name);
        if entry.path().is_dir() {
            copy_skill(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
