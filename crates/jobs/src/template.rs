//! Prompt templating.
//!
//! Placeholders: `{day}`, `{date}`, `{time}`, `{job_name}`, and
//! `{last_report}` (the most recent run's extracted report, else a
//! literal marker).

use corral_state::Store;
use std::fs;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::spec::JobSpec;

/// Placeholder used when no previous report exists.
pub const NO_PREVIOUS_REPORT: &str = "(no previous report)";

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[hour]:[minute]:[second]");

/// Renders a job's prompt template at an instant.
pub fn render_prompt(store: &Store, job: &JobSpec, now: OffsetDateTime) -> String {
    let day = now.weekday().to_string();
    let date = now.format(&DATE_FORMAT).unwrap_or_default();
    let time = now.format(&TIME_FORMAT).unwrap_or_default();
    let last_report =
        last_report(store, &job.name).unwrap_or_else(|| NO_PREVIOUS_REPORT.to_string());

    job.prompt
        .replace("{day}", &day)
        .replace("{date}", &date)
        .replace("{time}", &time)
        .replace("{job_name}", &job.name)
        .replace("{last_report}", &last_report)
}

/// The newest run's `report.md` for a job, scanning backwards so a run
/// that produced no report does not hide the one before it.
fn last_report(store: &Store, job_name: &str) -> Option<String> {
    let runs_dir = store.job_runs_dir(job_name);
    let mut run_ids: Vec<String> = fs::read_dir(&runs_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    // Run ids are timestamp-derived, so lexicographic order is real-time
    // order.
    run_ids.sort();
    run_ids
        .iter()
        .rev()
        .find_map(|id| fs::read_to_string(runs_dir.join(id).join("report.md")).ok())
}
