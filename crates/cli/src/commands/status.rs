//! Handler for the `status` command.

use anyhow::bail;
use corral_core::AgentId;
use corral_jobs::daemon;
use corral_state::Store;
use corral_versions::{shims_in_path, VersionManager};

use crate::update_check;
use crate::Result;

pub fn handle(agent: Option<String>) -> Result<i32> {
    let store = Store::open()?;
    store.ensure_layout()?;
    let manager = VersionManager::new(store.clone());

    let agents: Vec<AgentId> = match agent {
        Some(name) => match AgentId::parse(&name) {
            Some(agent) => vec![agent],
            None => bail!("unknown agent '{name}'"),
        },
        None => AgentId::ALL.to_vec(),
    };

    println!("agents:");
    for agent in agents {
        let installed = manager.list_installed(agent);
        let default = manager.default_version(agent);
        let marker = match &default {
            Some(v) => format!("default {v}"),
            None => "no default".to_string(),
        };
        println!(
            "  {:<8} {:<12} installed: {}",
            agent.to_string(),
            marker,
            if installed.is_empty() {
                "-".to_string()
            } else {
                installed.join(", ")
            }
        );
    }

    let meta = store.read_meta();
    if meta.repos.is_empty() {
        println!("repos: none configured (run `corral pull` to bootstrap)");
    } else {
        println!("repos:");
        for (slot, record) in meta.repos_by_priority() {
            println!(
                "  {:<10} {} @{} {}{}",
                slot,
                record.source,
                record.branch,
                record.commit.as_deref().unwrap_or("(never pulled)"),
                if record.readonly { " [readonly]" } else { "" }
            );
        }
    }

    println!(
        "daemon: {}",
        if daemon::is_running(&store) {
            "running"
        } else {
            "not running"
        }
    );

    if !shims_in_path(&store) {
        println!("note: shims directory is not on PATH (run `corral add <agent>` for setup instructions)");
    }
    if let Some(newer) = update_check::newer_release(&store) {
        println!("update available: corral {newer}");
    }
    Ok(0)
}
