//! Handlers for the `jobs` subtree.

use anyhow::{bail, Context};
use corral_jobs::{
    daemon, execute_job, next_occurrence, read_run_meta, JobSpec, RunStatus,
};
use corral_state::Store;
use std::fs;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

use crate::cli::JobCommands;
use crate::Result;

pub fn handle(command: JobCommands) -> Result<i32> {
    let store = Store::open()?;
    store.ensure_layout()?;
    match command {
        JobCommands::List => list(&store),
        JobCommands::Add { file } => add(&store, &file),
        JobCommands::Remove { name } => remove(&store, &name),
        JobCommands::Run { name } => run(&store, &name),
        JobCommands::Enable { name } => set_enabled(&store, &name, true),
        JobCommands::Disable { name } => set_enabled(&store, &name, false),
        JobCommands::Runs { name } => runs(&store, &name),
        JobCommands::Report { name } => report(&store, &name),
    }
}

fn job_path(store: &Store, name: &str) -> std::path::PathBuf {
    store.jobs_dir().join(format!("{name}.yml"))
}

fn load(store: &Store, name: &str) -> Result<JobSpec> {
    let path = job_path(store, name);
    if !path.exists() {
        bail!("no job named '{name}'");
    }
    JobSpec::load(&path)
}

fn list(store: &Store) -> Result<i32> {
    let Ok(entries) = fs::read_dir(store.jobs_dir()) else {
        println!("no jobs installed");
        return Ok(0);
    };
    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "yml" || e == "yaml"))
        .collect();
    files.sort();
    if files.is_empty() {
        println!("no jobs installed");
        return Ok(0);
    }

    for path in files {
        match JobSpec::load(&path) {
            Ok(job) => {
                let next = if job.enabled {
                    next_occurrence(&job.schedule)
                        .and_then(|t| t.format(&Rfc3339).ok())
                        .unwrap_or_else(|| "-".to_string())
                } else {
                    "disabled".to_string()
                };
                println!(
                    "{:<20} {:<16} {:<8} next: {next}",
                    job.name, job.schedule, job.agent
                );
            }
            Err(err) => eprintln!("warning: {}: {err:#}", path.display()),
        }
    }
    Ok(0)
}

fn add(store: &Store, file: &Path) -> Result<i32> {
    let job = JobSpec::load(file)?;
    // Accumulated validation errors reject the write.
    job.save(&store.jobs_dir())?;
    println!("installed job '{}'", job.name);
    if daemon::is_running(store) {
        let _ = daemon::signal_reload(store);
        println!("daemon reloaded");
    }
    Ok(0)
}

fn remove(store: &Store, name: &str) -> Result<i32> {
    let path = job_path(store, name);
    if !path.exists() {
        bail!("no job named '{name}'");
    }
    fs::remove_file(&path)?;
    println!("removed job '{name}'");
    if daemon::is_running(store) {
        let _ = daemon::signal_reload(store);
    }
    Ok(0)
}

fn run(store: &Store, name: &str) -> Result<i32> {
    let job = load(store, name)?;
    let problems = job.validate();
    if !problems.is_empty() {
        bail!("job '{name}' is invalid: {}", problems.join("; "));
    }

    println!("running '{name}' ({})", job.agent);
    let rt = tokio::runtime::Runtime::new()?;
    let meta = rt.block_on(execute_job(store, &job))?;

    let run_dir = store.run_dir(name, &meta.run_id);
    match meta.status {
        RunStatus::Completed => println!("completed (exit 0)"),
        RunStatus::Failed => println!("failed (exit {:?})", meta.exit_code),
        RunStatus::Timeout => println!("timed out after {}", job.timeout),
        RunStatus::Running => unreachable!("execute_job returns terminal states"),
    }
    if run_dir.join("report.md").exists() {
        println!("report: {}", run_dir.join("report.md").display());
    }
    Ok(if meta.status == RunStatus::Completed { 0 } else { 1 })
}

fn set_enabled(store: &Store, name: &str, enabled: bool) -> Result<i32> {
    let mut job = load(store, name)?;
    job.enabled = enabled;
    job.save(&store.jobs_dir())?;
    println!(
        "job '{name}' {}",
        if enabled { "enabled" } else { "disabled" }
    );
    if daemon::is_running(store) {
        let _ = daemon::signal_reload(store);
    }
    Ok(0)
}

fn runs(store: &Store, name: &str) -> Result<i32> {
    let Ok(entries) = fs::read_dir(store.job_runs_dir(name)) else {
        println!("no runs for '{name}'");
        return Ok(0);
    };
    let mut run_dirs: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    run_dirs.sort();
    if run_dirs.is_empty() {
        println!("no runs for '{name}'");
        return Ok(0);
    }

    for dir in run_dirs {
        match read_run_meta(&dir) {
            Ok(meta) => println!(
                "{:<28} {:<10} exit: {}",
                meta.run_id,
                format!("{:?}", meta.status).to_lowercase(),
                meta.exit_code.map_or("-".to_string(), |c| c.to_string())
            ),
            Err(err) => eprintln!("warning: {}: {err:#}", dir.display()),
        }
    }
    Ok(0)
}

fn report(store: &Store, name: &str) -> Result<i32> {
    let runs_dir = store.job_runs_dir(name);
    let mut run_ids: Vec<String> = fs::read_dir(&runs_dir)
        .ok()
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    run_ids.sort();

    let report = run_ids
        .iter()
        .rev()
        .find_map(|id| fs::read_to_string(runs_dir.join(id).join("report.md")).ok())
        .with_context(|| format!("no report for job '{name}'"))?;
    println!("{report}");
    Ok(0)
}
