//! Overlay HOME preparation and spawn environment filtering.
//!
//! The overlay is destroyed and rebuilt at the start of every run: it
//! contains only the generated per-agent permission config and symlinks
//! for the job's allowed directories. This is filesystem visibility plus
//! env filtering, not a security boundary.

use corral_core::{expand_tilde, AgentId};
use corral_state::Store;
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::spec::{JobMode, JobSpec};
use crate::Result;

/// Env vars copied into a job child when present.
const SAFE_ENV_VARS: &[&str] = &[
    "PATH", "SHELL", "TERM", "LANG", "LC_ALL", "LC_CTYPE", "USER", "LOGNAME", "TMPDIR", "TZ",
    "COLORTERM",
];

/// Claude permission names for the closed tool-allowlist table.
fn claude_tool_permission(tool: &str) -> String {
    match tool {
        "web_search" => "WebSearch(*)".to_string(),
        "web_fetch" => "WebFetch(*)".to_string(),
        "bash" => "Bash(*)".to_string(),
        "read" => "Read(*)".to_string(),
        "write" => "Write(*)".to_string(),
        "edit" => "Edit(*)".to_string(),
        "glob" => "Glob(*)".to_string(),
        "grep" => "Grep(*)".to_string(),
        "notebook_edit" => "NotebookEdit(*)".to_string(),
        other => other.to_string(),
    }
}

/// Builds the overlay HOME for one run and returns its path.
pub fn prepare_home(store: &Store, job: &JobSpec, real_home: &Path) -> Result<PathBuf> {
    let overlay = store.jobs_dir().join(&job.name).join("home");
    if overlay.exists() {
        fs::remove_dir_all(&overlay)?;
    }
    fs::create_dir_all(&overlay)?;

    match job.agent {
        AgentId::Claude => write_claude_settings(&overlay, job, real_home)?,
        AgentId::Codex => write_codex_config(&overlay, job)?,
        AgentId::Gemini => write_gemini_settings(&overlay, job)?,
        // Unsupported agents are rejected earlier by validation.
        _ => {}
    }

    link_allowed_dirs(&overlay, job, real_home)?;
    Ok(overlay)
}

fn write_claude_settings(overlay: &Path, job: &JobSpec, real_home: &Path) -> Result<()> {
    let mut allow: Vec<String> = job
        .allow
        .tools
        .iter()
        .map(|t| claude_tool_permission(t))
        .collect();
    for dir in &job.allow.dirs {
        let resolved = expand_tilde(dir, real_home);
        let resolved = resolved.display();
        allow.push(format!("Read({resolved}/**)"));
        if job.mode == JobMode::Edit {
            allow.push(format!("Write({resolved}/**)"));
            allow.push(format!("Edit({resolved}/**)"));
        }
    }

    let settings = json!({
        "permissions": {
            "allow": allow,
            "deny": [],
        }
    });
    let dir = overlay.join(".claude");
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("settings.json"),
        serde_json::to_string_pretty(&settings)?,
    )?;
    Ok(())
}

fn write_codex_config(overlay: &Path, job: &JobSpec) -> Result<()> {
    let mut table = toml::Table::new();
    let approval = match job.mode {
        JobMode::Plan => "suggest",
        JobMode::Edit => "full-auto",
    };
    table.insert(
        "approval_mode".into(),
        toml::Value::String(approval.to_string()),
    );
    for (key, value) in &job.config {
        // Scalar passthrough: strings quoted, booleans and numbers bare.
        let toml_value = match value {
            serde_yaml::Value::Bool(b) => toml::Value::Boolean(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    toml::Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    toml::Value::Float(f)
                } else {
                    continue;
                }
            }
            serde_yaml::Value::String(s) => toml::Value::String(s.clone()),
            _ => continue,
        };
        table.insert(key.clone(), toml_value);
    }

    let dir = overlay.join(".codex");
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("config.toml"), toml::to_string_pretty(&table)?)?;
    Ok(())
}

fn write_gemini_settings(overlay: &Path, job: &JobSpec) -> Result<()> {
    let mut settings = serde_json::Map::new();
    for (key, value) in &job.config {
        settings.insert(key.clone(), serde_json::to_value(value)?);
    }
    let dir = overlay.join(".gemini");
    fs::create_dir_all(&dir)?;
    fs::write(
        dir.join("settings.json"),
        serde_json::to_string_pretty(&serde_json::Value::Object(settings))?,
    )?;
    Ok(())
}

/// Symlinks each allowed dir that falls inside the real HOME into the
/// overlay at the same relative path. Dirs outside HOME are skipped.
fn link_allowed_dirs(overlay: &Path, job: &JobSpec, real_home: &Path) -> Result<()> {
    for dir in &job.allow.dirs {
        let resolved = expand_tilde(dir, real_home);
        let Ok(relative) = resolved.strip_prefix(real_home) else {
            tracing::debug!(dir = %resolved.display(), "allowed dir outside HOME, not linked");
            continue;
        };
        let link = overlay.join(relative);
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(err) = symlink(&resolved, &link) {
            tracing::debug!(link = %link.display(), error = %err, "failed to link allowed dir");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn symlink(_source: &Path, _target: &Path) -> std::io::Result<()> {
    Err(std::io::Error::other("symlinks unsupported on this platform"))
}

/// The filtered environment for a job child: safe vars from the current
/// environment plus `HOME` pointing at the overlay. Credentials
/// (ANTHROPIC_API_KEY, AWS_*, OPENAI_API_KEY, SSH_AUTH_SOCK, ...) never
/// pass the allowlist.
pub fn build_spawn_env(overlay: &Path) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for key in SAFE_ENV_VARS {
        if let Ok(value) = std::env::var(key) {
            env.insert((*key).to_string(), value);
        }
    }
    env.insert("HOME".to_string(), overlay.display().to_string());
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn job(yaml: &str) -> JobSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn claude_settings_map_tools_through_the_closed_table() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path().join("corral"));
        let home = tmp.path().join("realhome");
        fs::create_dir_all(&home).unwrap();
        let j = job(
            "name: j\nschedule: \"0 3 * * *\"\nagent: claude\nprompt: p\nallow:\n  tools: [web_search, bash, Custom(*)]\n",
        );

        let overlay = prepare_home(&store, &j, &home).unwrap();
        let settings: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(overlay.join(".claude/settings.json")).unwrap(),
        )
        .unwrap();
        let allow = settings["permissions"]["allow"].as_array().unwrap();
        let allow: Vec<&str> = allow.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(allow, vec!["WebSearch(*)", "Bash(*)", "Custom(*)"]);
        assert_eq!(settings["permissions"]["deny"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn claude_allowed_dirs_grant_read_always_write_in_edit_mode() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path().join("corral"));
        let home = tmp.path().join("realhome");
        fs::create_dir_all(home.join("notes")).unwrap();

        let plan = job(
            "name: j\nschedule: \"0 3 * * *\"\nagent: claude\nprompt: p\nallow:\n  dirs: [~/notes]\n",
        );
        let overlay = prepare_home(&store, &plan, &home).unwrap();
        let text = fs::read_to_string(overlay.join(".claude/settings.json")).unwrap();
        assert!(text.contains(&format!("Read({}/notes/**)", home.display())));
        assert!(!text.contains("Write("));

        let edit = job(
            "name: j\nschedule: \"0 3 * * *\"\nagent: claude\nmode: edit\nprompt: p\nallow:\n  dirs: [~/notes]\n",
        );
        let overlay = prepare_home(&store, &edit, &home).unwrap();
        let text = fs::read_to_string(overlay.join(".claude/settings.json")).unwrap();
        assert!(text.contains("Write("));
        assert!(text.contains("Edit("));
    }

    #[test]
    fn codex_config_carries_approval_mode_and_scalars() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path().join("corral"));
        let home = tmp.path().join("realhome");
        fs::create_dir_all(&home).unwrap();
        let j = job(
            "name: j\nschedule: \"0 3 * * *\"\nagent: codex\nmode: edit\nprompt: p\nconfig:\n  model: o4-mini\n  sandbox: true\n  retries: 3\n",
        );

        let overlay = prepare_home(&store, &j, &home).unwrap();
        let text = fs::read_to_string(overlay.join(".codex/config.toml")).unwrap();
        let table: toml::Table = toml::from_str(&text).unwrap();
        assert_eq!(table["approval_mode"].as_str().unwrap(), "full-auto");
        assert_eq!(table["model"].as_str().unwrap(), "o4-mini");
        assert_eq!(table["sandbox"].as_bool().unwrap(), true);
        assert_eq!(table["retries"].as_integer().unwrap(), 3);
    }

    #[test]
    fn gemini_settings_merge_the_full_config() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path().join("corral"));
        let home = tmp.path().join("realhome");
        fs::create_dir_all(&home).unwrap();
        let j = job(
            "name: j\nschedule: \"0 3 * * *\"\nagent: gemini\nprompt: p\nconfig:\n  model: gemini-pro\n  temperature: 0.2\n",
        );

        let overlay = prepare_home(&store, &j, &home).unwrap();
        let settings: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(overlay.join(".gemini/settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["model"].as_str().unwrap(), "gemini-pro");
        assert!((settings["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-9);
    }

    #[cfg(unix)]
    #[test]
    fn dirs_inside_home_are_linked_outside_skipped() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path().join("corral"));
        let home = tmp.path().join("realhome");
        fs::create_dir_all(home.join("work/project")).unwrap();
        let j = job(&format!(
            "name: j\nschedule: \"0 3 * * *\"\nagent: claude\nprompt: p\nallow:\n  dirs: [~/work/project, /outside/home]\n",
        ));

        let overlay = prepare_home(&store, &j, &home).unwrap();
        let link = overlay.join("work/project");
        assert_eq!(fs::read_link(&link).unwrap(), home.join("work/project"));
        assert!(!overlay.join("outside").exists());
    }

    #[test]
    fn overlay_is_destroyed_and_rebuilt() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path().join("corral"));
        let home = tmp.path().join("realhome");
        fs::create_dir_all(&home).unwrap();
        let j = job("name: j\nschedule: \"0 3 * * *\"\nagent: codex\nprompt: p\n");

        let overlay = prepare_home(&store, &j, &home).unwrap();
        fs::write(overlay.join("leftover.txt"), "stale").unwrap();
        let overlay = prepare_home(&store, &j, &home).unwrap();
        assert!(!overlay.join("leftover.txt").exists());
    }

    #[test]
    fn spawn_env_is_an_allowlist_with_overlay_home() {
        let tmp = tempdir().unwrap();
        std::env::set_var("CORRAL_TEST_SECRET_XYZ", "leak");
        let env = build_spawn_env(tmp.path());
        std::env::remove_var("CORRAL_TEST_SECRET_XYZ");

        assert_eq!(env.get("HOME").unwrap(), &tmp.path().display().to_string());
        assert!(!env.contains_key("CORRAL_TEST_SECRET_XYZ"));
        assert!(!env.contains_key("ANTHROPIC_API_KEY"));
        assert!(!env.contains_key("SSH_AUTH_SOCK"));
        for key in env.keys() {
            assert!(
                key == "HOME" || SAFE_ENV_VARS.contains(&key.as_str()),
                "unexpected env var {key}"
            );
        }
    }
}
