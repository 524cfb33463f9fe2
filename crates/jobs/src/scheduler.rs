//! The cron scheduler.
//!
//! One trigger task per job name. Scheduling a name that already has a
//! trigger stops the old one first, so there is never more than one
//! trigger per name. When a trigger fires, the configured callback runs;
//! a panicking callback is logged and does not stop the scheduler.

use chrono::Utc;
use corral_state::Store;
use std::collections::HashMap;
use std::fs;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

use crate::spec::{parse_schedule, JobSpec};
use crate::Result;

/// Invoked with the job when its trigger fires.
pub type JobCallback = Arc<dyn Fn(JobSpec) + Send + Sync>;

struct Trigger {
    spec: JobSpec,
    schedule: cron::Schedule,
    handle: tokio::task::JoinHandle<()>,
}

/// Maps job names to single cron triggers.
pub struct Scheduler {
    store: Store,
    callback: JobCallback,
    triggers: Arc<Mutex<HashMap<String, Trigger>>>,
}

impl Scheduler {
    pub fn new(store: Store, callback: JobCallback) -> Self {
        Self {
            store,
            callback,
            triggers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Imports every enabled job from the jobs directory.
    pub fn load_all(&self) -> Result<usize> {
        let jobs_dir = self.store.jobs_dir();
        let Ok(entries) = fs::read_dir(&jobs_dir) else {
            return Ok(0);
        };
        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file() && p.extension().is_some_and(|e| e == "yml" || e == "yaml")
            })
            .collect();
        files.sort();

        let mut loaded = 0;
        for path in files {
            let spec = match JobSpec::load(&path) {
                Ok(spec) => spec,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable job");
                    continue;
                }
            };
            if !spec.enabled {
                continue;
            }
            match self.schedule(spec) {
                Ok(()) => loaded += 1,
                Err(err) => tracing::warn!(error = %err, "skipping unschedulable job"),
            }
        }
        Ok(loaded)
    }

    /// Installs (or replaces) the trigger for a job.
    pub fn schedule(&self, spec: JobSpec) -> Result<()> {
        let schedule = parse_schedule(&spec.schedule)?;
        let name = spec.name.clone();

        let callback = self.callback.clone();
        let task_schedule = schedule.clone();
        let task_spec = spec.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = task_schedule.upcoming(Utc).next() else {
                    tracing::warn!(job = %task_spec.name, "schedule has no upcoming firings");
                    return;
                };
                let wait = (next - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tokio::time::sleep(wait).await;
                tracing::debug!(job = %task_spec.name, "trigger fired");
                let spec = task_spec.clone();
                let cb = callback.clone();
                // A panicking callback must not take the trigger loop down.
                if let Err(panic) =
                    std::panic::catch_unwind(AssertUnwindSafe(move || cb(spec)))
                {
                    tracing::error!(job = %task_spec.name, ?panic, "job callback panicked");
                }
            }
        });

        let mut triggers = self.triggers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = triggers.insert(
            name.clone(),
            Trigger {
                spec,
                schedule,
                handle,
            },
        ) {
            previous.handle.abort();
            tracing::debug!(job = %name, "replaced existing trigger");
        }
        Ok(())
    }

    /// Stops and removes a trigger. Unknown names are a no-op.
    pub fn unschedule(&self, name: &str) {
        let mut triggers = self.triggers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(trigger) = triggers.remove(name) {
            trigger.handle.abort();
        }
    }

    /// Full stop-and-reimport.
    pub fn reload_all(&self) -> Result<usize> {
        {
            let mut triggers = self.triggers.lock().unwrap_or_else(|e| e.into_inner());
            for (_name, trigger) in triggers.drain() {
                trigger.handle.abort();
            }
        }
        self.load_all()
    }

    /// The next scheduled instant for a job, if scheduled.
    pub fn next_run(&self, name: &str) -> Option<OffsetDateTime> {
        let triggers = self.triggers.lock().unwrap_or_else(|e| e.into_inner());
        let trigger = triggers.get(name)?;
        let next = trigger.schedule.upcoming(Utc).next()?;
        OffsetDateTime::from_unix_timestamp(next.timestamp()).ok()
    }

    /// Snapshot of every scheduled job with its next firing.
    pub fn list_scheduled(&self) -> Vec<(String, Option<OffsetDateTime>)> {
        let names: Vec<String> = {
            let triggers = self.triggers.lock().unwrap_or_else(|e| e.into_inner());
            triggers.keys().cloned().collect()
        };
        let mut out: Vec<(String, Option<OffsetDateTime>)> = names
            .into_iter()
            .map(|name| {
                let next = self.next_run(&name);
                (name, next)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of installed triggers.
    pub fn scheduled_count(&self) -> usize {
        self.triggers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// The job spec currently scheduled under a name.
    pub fn scheduled_spec(&self, name: &str) -> Option<JobSpec> {
        self.triggers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|t| t.spec.clone())
    }
}
