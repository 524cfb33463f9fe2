//! Full run lifecycle against a fake agent binary.
//!
//! The fake binary is a shell script placed at the managed install path,
//! so `execute_job` resolves and spawns it like a real agent.

#![cfg(unix)]

use corral_core::AgentId;
use corral_jobs::{
    execute_job, execute_job_detached, execute_job_with_timeout, read_run_meta, JobSpec,
    RunStatus,
};
use corral_state::Store;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

// Tests in this file spawn children whose env is derived from the
// process env; serialize so the PATH-mutating test cannot race them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn install_fake_agent(store: &Store, agent: AgentId, version: &str, script: &str) {
    let bin_dir = store
        .version_dir(agent, version)
        .join("node_modules/.bin");
    fs::create_dir_all(&bin_dir).unwrap();
    let bin = bin_dir.join(agent.descriptor().cli_name);
    fs::write(&bin, format!("#!/bin/sh\n{script}\n")).unwrap();
    fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

    let mut meta = store.read_meta();
    meta.agents.insert(agent, version.to_string());
    store.write_meta(&meta).unwrap();
}

fn job(yaml: &str) -> JobSpec {
    serde_yaml::from_str(yaml).unwrap()
}

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::at(tmp.path().join("corral"));
    store.ensure_layout().unwrap();
    (tmp, store)
}

#[tokio::test]
async fn successful_run_completes_and_extracts_a_report() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    install_fake_agent(
        &store,
        AgentId::Claude,
        "1.0.0",
        r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}'
echo '{"type":"tool_use"}'
echo '{"type":"assistant","message":{"content":[{"type":"tool_use"},{"type":"text","text":"done"}]}}'"#,
    );

    let j = job("name: daily\nschedule: \"0 9 * * *\"\nagent: claude\nprompt: go\n");
    let meta = execute_job(&store, &j).await.unwrap();

    assert_eq!(meta.status, RunStatus::Completed);
    assert_eq!(meta.exit_code, Some(0));
    assert!(meta.pid.is_some());
    assert!(meta.completed_at.is_some());
    assert!(meta.completed_at.as_ref().unwrap() >= &meta.started_at);

    let run_dir = store.run_dir("daily", &meta.run_id);
    assert!(run_dir.join("stdout.log").exists());
    assert_eq!(fs::read_to_string(run_dir.join("report.md")).unwrap(), "done");
    assert_eq!(read_run_meta(&run_dir).unwrap(), meta);
}

#[tokio::test]
async fn failing_run_records_exit_code_without_a_report() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    install_fake_agent(&store, AgentId::Claude, "1.0.0", "exit 3");

    let j = job("name: daily\nschedule: \"0 9 * * *\"\nagent: claude\nprompt: go\n");
    let meta = execute_job(&store, &j).await.unwrap();

    assert_eq!(meta.status, RunStatus::Failed);
    assert_eq!(meta.exit_code, Some(3));
    assert!(!store
        .run_dir("daily", &meta.run_id)
        .join("report.md")
        .exists());
}

#[tokio::test]
async fn hanging_run_times_out_with_null_exit_code() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    install_fake_agent(&store, AgentId::Claude, "1.0.0", "sleep 600");

    let j = job("name: hang\nschedule: \"0 9 * * *\"\nagent: claude\nprompt: go\n");
    let meta = execute_job_with_timeout(&store, &j, Duration::from_millis(300))
        .await
        .unwrap();

    assert_eq!(meta.status, RunStatus::Timeout);
    assert_eq!(meta.exit_code, None);
    assert!(meta.completed_at.is_some());
    assert!(!store
        .run_dir("hang", &meta.run_id)
        .join("report.md")
        .exists());
}

#[tokio::test]
async fn spawn_failure_transitions_to_failed() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    // No fake agent installed and no real `claude` on PATH inside the
    // filtered env: point the default at a missing install.
    let mut meta = store.read_meta();
    meta.agents.insert(AgentId::Claude, "9.9.9".into());
    store.write_meta(&meta).unwrap();

    let j = job(
        "name: broken\nschedule: \"0 9 * * *\"\nagent: claude\nprompt: go\nversion: 9.9.9\n",
    );
    // The binary path for 9.9.9 does not exist, so resolution falls back
    // to PATH; make PATH resolution fail by using an empty PATH.
    let old_path = std::env::var_os("PATH");
    std::env::set_var("PATH", "");
    let result = execute_job(&store, &j).await;
    match old_path {
        Some(p) => std::env::set_var("PATH", p),
        None => std::env::remove_var("PATH"),
    }
    assert!(result.is_err());

    // The single run directory holds a failed meta.
    let runs: Vec<_> = fs::read_dir(store.job_runs_dir("broken"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(runs.len(), 1);
    let meta = read_run_meta(&runs[0].path()).unwrap();
    assert_eq!(meta.status, RunStatus::Failed);
    assert!(meta.completed_at.is_some());
}

#[tokio::test]
async fn detached_run_returns_before_the_child_exits() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    install_fake_agent(
        &store,
        AgentId::Gemini,
        "0.9.0",
        r#"sleep 0.3
echo '{"type":"text","text":"late result"}'"#,
    );

    let j = job("name: bg\nschedule: \"0 9 * * *\"\nagent: gemini\nprompt: go\n");
    let run_id = execute_job_detached(&store, &j).await.unwrap();

    // Immediately after return the meta is on disk and still running.
    let run_dir = store.run_dir("bg", &run_id);
    let meta = read_run_meta(&run_dir).unwrap();
    assert_eq!(meta.status, RunStatus::Running);
    assert!(meta.pid.is_some());

    // Supervision finishes in the background.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let meta = read_run_meta(&run_dir).unwrap();
    assert_eq!(meta.status, RunStatus::Completed);
    assert_eq!(
        fs::read_to_string(run_dir.join("report.md")).unwrap(),
        "late result"
    );
}

#[tokio::test]
async fn run_ids_order_lexicographically_with_time() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    install_fake_agent(&store, AgentId::Claude, "1.0.0", "exit 0");
    let j = job("name: seq\nschedule: \"0 9 * * *\"\nagent: claude\nprompt: go\n");

    let first = execute_job(&store, &j).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = execute_job(&store, &j).await.unwrap();

    assert!(first.run_id < second.run_id);
}

#[tokio::test]
async fn child_sees_the_overlay_home_and_filtered_env() {
    let _guard = env_guard();
    let (_tmp, store) = test_store();
    std::env::set_var("CORRAL_E2E_SECRET", "leak-me");
    install_fake_agent(
        &store,
        AgentId::Claude,
        "1.0.0",
        r#"printf '{"type":"assistant","message":{"content":[{"type":"text","text":"%s %s"}]}}\n' "$HOME" "${CORRAL_E2E_SECRET:-clean}""#,
    );

    let j = job("name: env\nschedule: \"0 9 * * *\"\nagent: claude\nprompt: go\n");
    let meta = execute_job(&store, &j).await.unwrap();
    std::env::remove_var("CORRAL_E2E_SECRET");

    let report = fs::read_to_string(store.run_dir("env", &meta.run_id).join("report.md")).unwrap();
    let overlay = store.jobs_dir().join("env/home");
    assert_eq!(report, format!("{} clean", overlay.display()));
    // The overlay got claude's generated settings.
    assert!(overlay.join(".claude/settings.json").exists());
}
