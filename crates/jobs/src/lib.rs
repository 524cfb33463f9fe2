//! Job runner and scheduler daemon.
//!
//! Declarative job specs (`jobs/*.yml`) run agents on cron schedules
//! inside an overlay HOME with generated permission configs and a
//! filtered environment. Each invocation gets its own run directory with
//! `stdout.log`, `meta.json`, and (when the agent produced output) an
//! extracted `report.md`. The daemon supervises schedules and orphaned
//! runs from a detached background process.

#![deny(unsafe_code)]

/// Error type for job operations.
pub type Error = anyhow::Error;
/// Result type for job operations.
pub type Result<T> = std::result::Result<T, Error>;

pub mod command;
pub mod daemon;
pub mod report;
pub mod runner;
pub mod sandbox;
pub mod scheduler;
pub mod service;
pub mod spec;
pub mod template;

pub use command::build_command;
pub use report::extract_report;
pub use runner::{
    execute_job, execute_job_detached, execute_job_with_timeout, read_run_meta, write_run_meta,
    RunMeta, RunStatus,
};
pub use sandbox::{build_spawn_env, prepare_home};
pub use scheduler::Scheduler;
pub use service::{platform_host, DetachedProcess, LaunchdHost, ServiceHost, SystemdUserHost};
pub use spec::{next_occurrence, parse_schedule, parse_timeout, Allow, Effort, JobMode, JobSpec};
pub use template::render_prompt;
