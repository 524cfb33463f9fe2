//! MCP registration strategies.
//!
//! Registration is per (agent, home): version-managed agents register
//! into the version's isolated home, unmanaged ones into the real home.
//! Claude and Gemini register through their own `mcp add` subcommand;
//! the remaining agents get their configuration file written directly.
//! Only stdio entries are registered; HTTP entries pass through.

use anyhow::{bail, Context};
use corral_core::{AgentId, McpEntry, McpScope, McpTransport};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::Result;

/// Spawns an agent binary. A seam so tests can record invocations.
pub trait CommandRunner {
    /// Runs `binary args...` with `HOME` set to `home`. Returns stderr on
    /// failure.
    fn run(&self, binary: &str, args: &[String], home: &Path) -> Result<()>;
}

/// The real runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, binary: &str, args: &[String], home: &Path) -> Result<()> {
        let output = Command::new(binary)
            .args(args)
            .env("HOME", home)
            .output()
            .with_context(|| format!("failed to run {binary}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{binary} {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(())
    }
}

/// How one agent takes MCP registrations.
enum Strategy {
    /// `<agent> mcp add <name> [--scope ...] -- <command> [args...]`
    Subcommand,
    /// `[mcp_servers.<name>]` tables in `config.toml`.
    ConfigToml,
    /// `mcpServers` object in `mcp.json`.
    ConfigJson,
}

fn strategy_for(agent: AgentId) -> Strategy {
    match agent {
        AgentId::Claude | AgentId::Gemini => Strategy::Subcommand,
        AgentId::Codex => Strategy::ConfigToml,
        AgentId::Copilot | AgentId::Cursor => Strategy::ConfigJson,
    }
}

fn config_toml_path(agent: AgentId, home: &Path) -> PathBuf {
    home.join(agent.descriptor().config_dir).join("config.toml")
}

fn config_json_path(agent: AgentId, home: &Path) -> PathBuf {
    home.join(agent.descriptor().config_dir).join("mcp.json")
}

/// Registers one stdio MCP entry with an agent. HTTP entries are a no-op.
pub fn register_mcp(
    agent: AgentId,
    home: &Path,
    name: &str,
    entry: &McpEntry,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let McpTransport::Stdio { command, args } = &entry.transport else {
        tracing::debug!(name, "http entry passed through unregistered");
        return Ok(());
    };

    match strategy_for(agent) {
        Strategy::Subcommand => {
            let mut argv = vec!["mcp".to_string(), "add".to_string()];
            if entry.scope == McpScope::Project {
                argv.push("--scope".into());
                argv.push("project".into());
            }
            for (key, value) in &entry.env {
                argv.push("--env".into());
                argv.push(format!("{key}={value}"));
            }
            argv.push(name.to_string());
            argv.push("--".into());
            argv.push(command.clone());
            argv.extend(args.iter().cloned());
            runner.run(agent.descriptor().cli_name, &argv, home)
        }
        Strategy::ConfigToml => {
            let path = config_toml_path(agent, home);
            let mut root: toml::Table = match fs::read_to_string(&path) {
                Ok(text) => toml::from_str(&text).unwrap_or_default(),
                Err(_) => toml::Table::new(),
            };
            let servers = root
                .entry("mcp_servers")
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            let Some(servers) = servers.as_table_mut() else {
                bail!("mcp_servers in {} is not a table", path.display());
            };
            let mut table = toml::Table::new();
            table.insert("command".into(), toml::Value::String(command.clone()));
            if !args.is_empty() {
                table.insert(
                    "args".into(),
                    toml::Value::Array(
                        args.iter().cloned().map(toml::Value::String).collect(),
                    ),
                );
            }
            if !entry.env.is_empty() {
                let mut env = toml::Table::new();
                for (key, value) in &entry.env {
                    env.insert(key.clone(), toml::Value::String(value.clone()));
                }
                table.insert("env".into(), toml::Value::Table(env));
            }
            servers.insert(name.to_string(), toml::Value::Table(table));
            write_config(&path, &toml::to_string_pretty(&root)?)
        }
        Strategy::ConfigJson => {
            let path = config_json_path(agent, home);
            let mut root: serde_json::Value = match fs::read_to_string(&path) {
                Ok(text) => serde_json::from_str(&text).unwrap_or_else(|_| json!({})),
                Err(_) => json!({}),
            };
            let servers = root
                .as_object_mut()
                .context("mcp.json root is not an object")?
                .entry("mcpServers")
                .or_insert_with(|| json!({}));
            let env: BTreeMap<&String, &String> = entry.env.iter().collect();
            servers
                .as_object_mut()
                .context("mcpServers is not an object")?
                .insert(
                    name.to_string(),
                    json!({ "command": command, "args": args, "env": env }),
                );
            write_config(&path, &serde_json::to_string_pretty(&root)?)
        }
    }
}

/// Unregisters a name (for `--clean`).
pub fn unregister_mcp(
    agent: AgentId,
    home: &Path,
    name: &str,
    runner: &dyn CommandRunner,
) -> Result<()> {
    match strategy_for(agent) {
        Strategy::Subcommand => {
            let argv = vec!["mcp".to_string(), "remove".to_string(), name.to_string()];
            runner.run(agent.descriptor().cli_name, &argv, home)
        }
        Strategy::ConfigToml => {
            let path = config_toml_path(agent, home);
            let Ok(text) = fs::read_to_string(&path) else {
                return Ok(());
            };
            let mut root: toml::Table = toml::from_str(&text).unwrap_or_default();
            if let Some(servers) = root.get_mut("mcp_servers").and_then(|v| v.as_table_mut()) {
                servers.remove(name);
            }
            write_config(&path, &toml::to_string_pretty(&root)?)
        }
        Strategy::ConfigJson => {
            let path = config_json_path(agent, home);
            let Ok(text) = fs::read_to_string(&path) else {
                return Ok(());
            };
            let mut root: serde_json::Value =
                serde_json::from_str(&text).unwrap_or_else(|_| json!({}));
            if let Some(servers) = root.get_mut("mcpServers").and_then(|v| v.as_object_mut()) {
                servers.remove(name);
            }
            write_config(&path, &serde_json::to_string_pretty(&root)?)
        }
    }
}

/// Names currently registered in a config-file agent's home. Subcommand
/// agents cannot be enumerated here and return an empty set.
pub fn registered_mcp_names(agent: AgentId, home: &Path) -> Vec<String> {
    match strategy_for(agent) {
        Strategy::Subcommand => Vec::new(),
        Strategy::ConfigToml => fs::read_to_string(config_toml_path(agent, home))
            .ok()
            .and_then(|text| toml::from_str::<toml::Table>(&text).ok())
            .and_then(|root| {
                root.get("mcp_servers")
                    .and_then(|v| v.as_table())
                    .map(|t| t.keys().cloned().collect())
            })
            .unwrap_or_default(),
        Strategy::ConfigJson => fs::read_to_string(config_json_path(agent, home))
            .ok()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|root| {
                root.get("mcpServers")
                    .and_then(|v| v.as_object())
                    .map(|o| o.keys().cloned().collect())
            })
            .unwrap_or_default(),
    }
}

fn write_config(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
