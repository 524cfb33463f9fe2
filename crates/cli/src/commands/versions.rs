//! Handlers for version management (`add`, `remove`, `use`, `list`) and
//! the hidden `_shim` exec dispatcher.

use anyhow::{bail, Context};
use corral_core::{AgentId, Manifest, MANIFEST_FILE, PROJECT_MANIFEST_DIR};
use corral_state::Store;
use corral_versions::{
    create_shim, parse_spec, path_instructions, remove_shim, shims_in_path,
    sync_resources_to_version, VersionManager,
};
use std::fs;

use crate::Result;

pub fn add(spec: &str, project: bool) -> Result<i32> {
    let (agent, version) = parse_spec(spec).context("invalid spec; expected <agent>[@<version>]")?;
    let store = Store::open()?;
    store.ensure_layout()?;

    if project {
        pin_project(agent, &version)?;
        println!("pinned {agent}@{version} in ./{PROJECT_MANIFEST_DIR}/{MANIFEST_FILE}");
        return Ok(0);
    }

    let manager = VersionManager::new(store.clone());
    let resolved = manager.install_version(agent, &version)?;
    create_shim(&store, agent, &std::env::current_exe()?)?;
    sync_resources_to_version(&store, agent, &resolved)?;
    println!("installed {agent}@{resolved}");

    if !shims_in_path(&store) {
        println!("\n{}", path_instructions(&store)?);
    }
    Ok(0)
}

pub fn remove(spec: &str, all: bool) -> Result<i32> {
    let (agent, version) = parse_spec(spec).context("invalid spec; expected <agent>[@<version>]")?;
    let store = Store::open()?;
    let manager = VersionManager::new(store.clone());

    if all {
        manager.remove_all_versions(agent)?;
        remove_shim(&store, agent)?;
        println!("removed every version of {agent}");
        return Ok(0);
    }
    if version == "latest" {
        bail!("name the version to remove, or pass --all");
    }
    manager.remove_version(agent, &version)?;
    if manager.list_installed(agent).is_empty() {
        remove_shim(&store, agent)?;
    }
    println!("removed {agent}@{version}");
    match manager.default_version(agent) {
        Some(default) => println!("default is now {agent}@{default}"),
        None => println!("{agent} has no installed versions left"),
    }
    Ok(0)
}

pub fn use_version(spec: &str, project: bool) -> Result<i32> {
    let Some((agent, version)) = parse_spec(spec) else {
        bail!("invalid spec; expected <agent>@<version>");
    };
    if version == "latest" {
        bail!("name a concrete version, e.g. {agent}@1.2.3");
    }

    if project {
        pin_project(agent, &version)?;
        println!("pinned {agent}@{version} in ./{PROJECT_MANIFEST_DIR}/{MANIFEST_FILE}");
        return Ok(0);
    }

    let store = Store::open()?;
    let manager = VersionManager::new(store);
    manager.use_version(agent, &version)?;
    println!("default set to {agent}@{version}");
    Ok(0)
}

pub fn list(agent: Option<String>) -> Result<i32> {
    let store = Store::open()?;
    let manager = VersionManager::new(store);

    let agents: Vec<AgentId> = match agent {
        Some(name) => match AgentId::parse(&name) {
            Some(agent) => vec![agent],
            None => bail!("unknown agent '{name}'"),
        },
        None => AgentId::ALL.to_vec(),
    };

    for agent in agents {
        let installed = manager.list_installed(agent);
        if installed.is_empty() {
            println!("{agent}: (none)");
            continue;
        }
        let default = manager.default_version(agent);
        let rendered: Vec<String> = installed
            .into_iter()
            .map(|v| {
                if default.as_deref() == Some(v.as_str()) {
                    format!("{v}*")
                } else {
                    v
                }
            })
            .collect();
        println!("{agent}: {}", rendered.join(", "));
    }
    Ok(0)
}

/// Writes (or updates) the project pin file in the current directory.
fn pin_project(agent: AgentId, version: &str) -> Result<()> {
    let dir = std::env::current_dir()?.join(PROJECT_MANIFEST_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(MANIFEST_FILE);
    let mut manifest = if path.exists() {
        Manifest::load(&path)?
    } else {
        Manifest::default()
    };
    manifest.agents.insert(agent, version.to_string());
    fs::write(&path, manifest.to_yaml()?)?;
    Ok(())
}

/// The shim target: resolve the active version, point HOME at its
/// isolated home, and exec the real binary.
pub fn shim_exec(agent_name: &str, args: &[String]) -> Result<i32> {
    let agent = AgentId::parse(agent_name)
        .with_context(|| format!("unknown agent '{agent_name}'"))?;
    let store = Store::open()?;
    let manager = VersionManager::new(store);

    let cwd = std::env::current_dir()?;
    let version = manager
        .resolve_version(agent, &cwd)
        .with_context(|| format!("no version of {agent} is installed; run `corral add {agent}`"))?;
    let binary = manager.binary_path(agent, &version);
    if !binary.exists() {
        bail!(
            "{agent}@{version} is selected but not installed; run `corral add {agent}@{version}`"
        );
    }
    let home = manager.home_path(agent, &version);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = std::process::Command::new(&binary)
            .args(args)
            .env("HOME", &home)
            .exec();
        Err(err).context("failed to exec agent binary")
    }
    #[cfg(not(unix))]
    {
        let status = std::process::Command::new(&binary)
            .args(args)
            .env("HOME", &home)
            .status()?;
        Ok(status.code().unwrap_or(1))
    }
}
