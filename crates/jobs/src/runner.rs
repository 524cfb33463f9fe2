//! Job execution: spawn, supervise, record.

use anyhow::Context;
use corral_core::{timestamp_id, AgentId};
use corral_state::Store;
use corral_versions::VersionManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::command::build_command;
use crate::report::extract_report;
use crate::sandbox::{build_spawn_env, prepare_home};
use crate::spec::{parse_timeout, JobSpec};
use crate::template::render_prompt;
use crate::Result;

/// Terminal grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Status of one run. Transitions are monotonic: `Running` moves to
/// exactly one terminal state and is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

/// Per-invocation record stored at `{runs}/{job}/{run_id}/meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMeta {
    pub job_name: String,
    pub run_id: String,
    pub agent: AgentId,
    pub pid: Option<u32>,
    pub status: RunStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub exit_code: Option<i32>,
}

/// Writes a run's `meta.json`.
pub fn write_run_meta(run_dir: &std::path::Path, meta: &RunMeta) -> Result<()> {
    fs::create_dir_all(run_dir)?;
    fs::write(
        run_dir.join("meta.json"),
        serde_json::to_string_pretty(meta)?,
    )?;
    Ok(())
}

/// Reads a run's `meta.json`.
pub fn read_run_meta(run_dir: &std::path::Path) -> Result<RunMeta> {
    let text = fs::read_to_string(run_dir.join("meta.json"))
        .with_context(|| format!("no run meta in {}", run_dir.display()))?;
    serde_json::from_str(&text).map_err(Into::into)
}

struct StartedRun {
    job: JobSpec,
    run_dir: PathBuf,
    meta: RunMeta,
    child: tokio::process::Child,
    timeout: Duration,
}

/// Executes a job and waits for its terminal state.
pub async fn execute_job(store: &Store, job: &JobSpec) -> Result<RunMeta> {
    let run = start_run(store, job, None).await?;
    Ok(supervise(run).await)
}

/// Like [`execute_job`] with an explicit timeout override. The daemon's
/// monitor tests and short-timeout scenarios use this.
pub async fn execute_job_with_timeout(
    store: &Store,
    job: &JobSpec,
    timeout: Duration,
) -> Result<RunMeta> {
    let run = start_run(store, job, Some(timeout)).await?;
    Ok(supervise(run).await)
}

/// Starts a job and returns its run id immediately after the initial
/// meta (with pid) is on disk; supervision continues in the background.
pub async fn execute_job_detached(store: &Store, job: &JobSpec) -> Result<String> {
    let run = start_run(store, job, None).await?;
    let run_id = run.meta.run_id.clone();
    tokio::spawn(async move {
        let meta = supervise(run).await;
        tracing::info!(
            job = %meta.job_name,
            run_id = %meta.run_id,
            status = ?meta.status,
            "detached run finished"
        );
    });
    Ok(run_id)
}

async fn start_run(
    store: &Store,
    job: &JobSpec,
    timeout_override: Option<Duration>,
) -> Result<StartedRun> {
    let now = OffsetDateTime::now_utc();
    let run_id = timestamp_id(now);
    let run_dir = store.run_dir(&job.name, &run_id);
    fs::create_dir_all(&run_dir)?;

    let mut meta = RunMeta {
        job_name: job.name.clone(),
        run_id,
        agent: job.agent,
        pid: None,
        status: RunStatus::Running,
        started_at: now.format(&Rfc3339)?,
        completed_at: None,
        exit_code: None,
    };
    write_run_meta(&run_dir, &meta)?;

    let spawned = spawn_child(store, job, &run_dir, now);
    let child = match spawned {
        Ok(child) => child,
        Err(err) => {
            meta.status = RunStatus::Failed;
            meta.completed_at = Some(OffsetDateTime::now_utc().format(&Rfc3339)?);
            write_run_meta(&run_dir, &meta)?;
            return Err(err);
        }
    };

    meta.pid = child.id();
    write_run_meta(&run_dir, &meta)?;

    let timeout = timeout_override
        .or_else(|| parse_timeout(&job.timeout).ok())
        .unwrap_or(Duration::from_secs(1800));

    Ok(StartedRun {
        job: job.clone(),
        run_dir,
        meta,
        child,
        timeout,
    })
}

fn spawn_child(
    store: &Store,
    job: &JobSpec,
    run_dir: &std::path::Path,
    now: OffsetDateTime,
) -> Result<tokio::process::Child> {
    let real_home = corral_state::home_dir()?;
    let prompt = render_prompt(store, job, now);
    let argv = build_command(job, &prompt, &real_home)?;
    let overlay = prepare_home(store, job, &real_home)?;
    let env = build_spawn_env(&overlay);
    let binary = resolve_binary(store, job, &argv[0]);

    let log = fs::File::create(run_dir.join("stdout.log"))?;
    let mut cmd = std::process::Command::new(&binary);
    cmd.args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log))
        .env_clear()
        .envs(&env);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New session so signals reach the whole descendant tree.
        cmd.process_group(0);
    }

    tokio::process::Command::from(cmd)
        .spawn()
        .with_context(|| format!("failed to spawn {}", binary.display()))
}

/// The binary to run: the managed install when one is pinned or
/// defaulted, else the bare CLI name resolved through PATH.
fn resolve_binary(store: &Store, job: &JobSpec, cli_name: &str) -> PathBuf {
    let manager = VersionManager::new(store.clone());
    let version = job
        .version
        .clone()
        .or_else(|| manager.default_version(job.agent));
    if let Some(version) = version {
        if manager.is_installed(job.agent, &version) {
            return manager.binary_path(job.agent, &version);
        }
    }
    PathBuf::from(cli_name)
}

async fn supervise(mut run: StartedRun) -> RunMeta {
    match tokio::time::timeout(run.timeout, run.child.wait()).await {
        Ok(Ok(status)) => {
            run.meta.exit_code = status.code();
            run.meta.status = if status.success() {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            };
        }
        Ok(Err(err)) => {
            tracing::error!(job = %run.meta.job_name, error = %err, "wait failed");
            run.meta.status = RunStatus::Failed;
        }
        Err(_elapsed) => {
            tracing::warn!(
                job = %run.meta.job_name,
                timeout = ?run.timeout,
                "run exceeded its timeout"
            );
            if let Some(pid) = run.meta.pid {
                signal_group(pid, libc::SIGTERM);
                if tokio::time::timeout(KILL_GRACE, run.child.wait())
                    .await
                    .is_err()
                {
                    signal_group(pid, libc::SIGKILL);
                    let _ = run.child.wait().await;
                }
            }
            run.meta.status = RunStatus::Timeout;
            run.meta.exit_code = None;
        }
    }

    run.meta.completed_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    if let Err(err) = write_run_meta(&run.run_dir, &run.meta) {
        tracing::error!(error = %err, "failed to write terminal run meta");
    }

    // A timed-out or failed run still gets a report when output exists.
    if let Ok(log) = fs::read_to_string(run.run_dir.join("stdout.log")) {
        if let Some(report) = extract_report(run.job.agent, &log) {
            let _ = fs::write(run.run_dir.join("report.md"), report);
        }
    }
    run.meta
}

/// Signals a whole process group.
#[allow(unsafe_code)]
pub(crate) fn signal_group(pid: u32, signal: i32) {
    // SAFETY: kill(2) with a negative pid signals the process group; no
    // memory is touched.
    unsafe {
        libc::kill(-(pid as i32), signal);
    }
}

/// Signals a single process.
#[allow(unsafe_code)]
pub(crate) fn signal_pid(pid: u32, signal: i32) -> bool {
    // SAFETY: plain kill(2); no memory is touched.
    unsafe { libc::kill(pid as i32, signal) == 0 }
}

/// Whether a pid refers to a live process (`kill(pid, 0)`).
pub(crate) fn pid_alive(pid: u32) -> bool {
    signal_pid(pid, 0)
}
