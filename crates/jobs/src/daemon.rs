//! Daemon lifecycle: PID file, supervision loop, signals.
//!
//! The daemon is a detached child (or a platform service) running the
//! CLI's hidden `daemon _run` subcommand. It owns a scheduler whose
//! callback launches detached runs, reloads on SIGHUP, and sweeps for
//! orphaned runs once a minute.

use anyhow::Context;
use corral_state::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::report::extract_report;
use crate::runner::{self, read_run_meta, write_run_meta, RunStatus};
use crate::scheduler::Scheduler;
use crate::service::{platform_host, DetachedProcess, ServiceHost};
use crate::Result;

/// How long `start` waits for the PID file to appear.
const START_WAIT: Duration = Duration::from_secs(3);
/// Grace period between SIGTERM and SIGKILL on `stop`.
const STOP_GRACE: Duration = Duration::from_secs(5);
/// Orphan sweep interval inside `run`.
const MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Reads the daemon pid, if the PID file exists and parses.
pub fn daemon_pid(store: &Store) -> Option<u32> {
    let text = fs::read_to_string(store.daemon_pid_file()).ok()?;
    text.trim().parse().ok()
}

/// Whether the daemon is alive. A stale PID file (no live process) is
/// cleaned up on the way.
pub fn is_running(store: &Store) -> bool {
    let Some(pid) = daemon_pid(store) else {
        return false;
    };
    if runner::pid_alive(pid) {
        true
    } else {
        tracing::debug!(pid, "removing stale daemon pid file");
        let _ = fs::remove_file(store.daemon_pid_file());
        false
    }
}

/// Starts the daemon: tries the platform service host first, falls back
/// to a detached child, then waits up to 3 s for the PID file.
pub fn start(store: &Store, exe: &Path) -> Result<()> {
    if is_running(store) {
        anyhow::bail!("daemon is already running");
    }
    let real_home = corral_state::home_dir()?;
    let hosted = match platform_host(&real_home, &store.daemon_log_file()) {
        Some(host) => host.install(exe).and_then(|_| host.start()).is_ok(),
        None => false,
    };
    if !hosted {
        tracing::debug!("service host unavailable, spawning detached daemon");
        DetachedProcess::spawn(exe)?;
    }

    let deadline = std::time::Instant::now() + START_WAIT;
    while std::time::Instant::now() < deadline {
        if is_running(store) {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    anyhow::bail!("daemon did not come up within {START_WAIT:?}");
}

/// Stops the daemon: best-effort service teardown, then SIGTERM with a
/// 5 s escalation to SIGKILL, then PID file removal.
pub fn stop(store: &Store) -> Result<()> {
    let real_home = corral_state::home_dir()?;
    if let Some(host) = platform_host(&real_home, &store.daemon_log_file()) {
        let _ = host.stop();
    }

    if let Some(pid) = daemon_pid(store) {
        if runner::pid_alive(pid) {
            runner::signal_pid(pid, libc::SIGTERM);
            let deadline = std::time::Instant::now() + STOP_GRACE;
            while std::time::Instant::now() < deadline && runner::pid_alive(pid) {
                std::thread::sleep(Duration::from_millis(100));
            }
            if runner::pid_alive(pid) {
                runner::signal_pid(pid, libc::SIGKILL);
            }
        }
    }
    let _ = fs::remove_file(store.daemon_pid_file());
    Ok(())
}

/// Sends SIGHUP so a running daemon reimports its job set.
pub fn signal_reload(store: &Store) -> Result<()> {
    let pid = daemon_pid(store).context("daemon is not running")?;
    if !runner::pid_alive(pid) {
        let _ = fs::remove_file(store.daemon_pid_file());
        anyhow::bail!("daemon is not running");
    }
    runner::signal_pid(pid, libc::SIGHUP);
    Ok(())
}

/// The daemon entry point; runs until SIGTERM/SIGINT.
pub async fn run(store: Store) -> Result<()> {
    store.ensure_layout()?;
    fs::write(store.daemon_pid_file(), std::process::id().to_string())?;
    tracing::info!(pid = std::process::id(), "daemon started");

    let callback_store = store.clone();
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        Arc::new(move |spec| {
            let store = callback_store.clone();
            tokio::spawn(async move {
                if let Err(err) = runner::execute_job_detached(&store, &spec).await {
                    tracing::error!(job = %spec.name, error = %err, "failed to launch job");
                }
            });
        }),
    ));
    let loaded = scheduler.load_all()?;
    tracing::info!(jobs = loaded, "schedules imported");

    let monitor_store = store.clone();
    let monitor = tokio::spawn(async move {
        let mut tick = tokio::time::interval(MONITOR_INTERVAL);
        tick.tick().await; // skip the immediate tick
        loop {
            tick.tick().await;
            if let Err(err) = monitor_running_jobs(&monitor_store) {
                tracing::warn!(error = %err, "monitor sweep failed");
            }
        }
    });

    wait_for_shutdown(&store, &scheduler).await;

    monitor.abort();
    let _ = fs::remove_file(store.daemon_pid_file());
    tracing::info!("daemon stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(_store: &Store, scheduler: &Arc<Scheduler>) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hups = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "cannot install SIGHUP handler");
            return;
        }
    };
    let mut terms = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "cannot install SIGTERM handler");
            return;
        }
    };
    loop {
        tokio::select! {
            _ = hups.recv() => {
                match scheduler.reload_all() {
                    Ok(count) => tracing::info!(jobs = count, "reloaded on SIGHUP"),
                    Err(err) => tracing::error!(error = %err, "reload failed"),
                }
            }
            _ = terms.recv() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_store: &Store, _scheduler: &Arc<Scheduler>) {
    let _ = tokio::signal::ctrl_c().await;
}

/// Sweeps every run directory for `running` metas whose pid is gone;
/// transitions them to `failed` and salvages any report.
pub fn monitor_running_jobs(store: &Store) -> Result<usize> {
    let runs_dir = store.runs_dir();
    let Ok(jobs) = fs::read_dir(&runs_dir) else {
        return Ok(0);
    };

    let mut repaired = 0;
    for job_entry in jobs.filter_map(|e| e.ok()) {
        if !job_entry.path().is_dir() {
            continue;
        }
        let Ok(runs) = fs::read_dir(job_entry.path()) else {
            continue;
        };
        for run_entry in runs.filter_map(|e| e.ok()) {
            let run_dir = run_entry.path();
            let Ok(mut meta) = read_run_meta(&run_dir) else {
                continue;
            };
            if meta.status != RunStatus::Running {
                continue;
            }
            let alive = meta.pid.is_some_and(runner::pid_alive);
            if alive {
                continue;
            }

            meta.status = RunStatus::Failed;
            meta.completed_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
            write_run_meta(&run_dir, &meta)?;
            repaired += 1;
            tracing::warn!(
                job = %meta.job_name,
                run_id = %meta.run_id,
                "orphaned run marked failed"
            );

            if let Ok(log) = fs::read_to_string(run_dir.join("stdout.log")) {
                if !run_dir.join("report.md").exists() {
                    if let Some(report) = extract_report(meta.agent, &log) {
                        let _ = fs::write(run_dir.join("report.md"), report);
                    }
                }
            }
        }
    }
    Ok(repaired)
}
