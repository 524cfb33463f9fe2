//! Job spec file I/O and validation.

use anyhow::Context;
use corral_core::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::Result;

/// Planning/editing axis of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// Read-only / suggest.
    #[default]
    Plan,
    /// Mutating / auto-approve.
    Edit,
}

/// Informational effort hint, mapped by command builders where an agent
/// supports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Fast,
    #[default]
    Default,
    Detailed,
}

/// Tools, sites, and directories a job is allowed to touch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allow {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sites: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dirs: Vec<String>,
}

impl Allow {
    fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.sites.is_empty() && self.dirs.is_empty()
    }
}

/// One declarative scheduled job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique within the jobs directory.
    pub name: String,
    /// Standard five-field cron expression.
    pub schedule: String,
    pub agent: AgentId,
    #[serde(default, skip_serializing_if = "is_default_mode")]
    pub mode: JobMode,
    #[serde(default, skip_serializing_if = "is_default_effort")]
    pub effort: Effort,
    /// Duration string: `NhNm`, either or both units, non-zero.
    #[serde(default = "default_timeout", skip_serializing_if = "is_default_timeout")]
    pub timeout: String,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enabled: bool,
    /// Prompt with template placeholders.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Allow::is_empty")]
    pub allow: Allow,
    /// Free-form agent-specific keys (model, reasoning effort, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_yaml::Value>,
    /// Optional pinned agent version for this job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn default_timeout() -> String {
    "30m".to_string()
}

fn is_default_timeout(t: &String) -> bool {
    t == "30m"
}

fn default_true() -> bool {
    true
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_default_mode(m: &JobMode) -> bool {
    *m == JobMode::Plan
}

fn is_default_effort(e: &Effort) -> bool {
    *e == Effort::Default
}

impl JobSpec {
    /// Strictly typed parse from a YAML file; defaults fill absent fields.
    pub fn load(path: &Path) -> Result<JobSpec> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read job file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("invalid job file {}", path.display()))
    }

    /// Serializes, omitting fields that equal their defaults.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes to `{jobs}/{name}.yml`. Rejects specs with validation
    /// errors.
    pub fn save(&self, jobs_dir: &Path) -> Result<()> {
        let problems = self.validate();
        if !problems.is_empty() {
            anyhow::bail!("invalid job '{}': {}", self.name, problems.join("; "));
        }
        fs::create_dir_all(jobs_dir)?;
        fs::write(jobs_dir.join(format!("{}.yml", self.name)), self.to_yaml()?)?;
        Ok(())
    }

    /// Accumulates every validation error; an empty vec means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        } else if self
            .name
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
        {
            problems.push(format!("name '{}' contains unsafe characters", self.name));
        }
        if let Err(err) = parse_schedule(&self.schedule) {
            problems.push(format!("schedule '{}' is invalid: {err}", self.schedule));
        }
        if !self.agent.supports_jobs() {
            problems.push(format!(
                "agent '{}' is not supported for daemon jobs",
                self.agent
            ));
        }
        if let Err(err) = parse_timeout(&self.timeout) {
            problems.push(format!("timeout '{}' is invalid: {err}", self.timeout));
        }
        if self.prompt.trim().is_empty() {
            problems.push("prompt must not be empty".to_string());
        }
        problems
    }
}

/// Parses a five-field cron expression.
///
/// The `cron` crate wants a seconds field; it is pinned to `0` so jobs
/// fire at most once per minute.
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        anyhow::bail!("expected 5 fields, got {fields}");
    }
    cron::Schedule::from_str(&format!("0 {expr}")).map_err(Into::into)
}

/// The next instant a five-field cron expression fires, if any.
pub fn next_occurrence(expr: &str) -> Option<time::OffsetDateTime> {
    let schedule = parse_schedule(expr).ok()?;
    let next = schedule.upcoming(chrono::Utc).next()?;
    time::OffsetDateTime::from_unix_timestamp(next.timestamp()).ok()
}

/// Parses an `NhNm` duration string: either or both units, non-zero.
///
/// ```
/// use corral_jobs::parse_timeout;
/// use std::time::Duration;
///
/// assert_eq!(parse_timeout("30m").unwrap(), Duration::from_secs(1800));
/// assert_eq!(parse_timeout("1h30m").unwrap(), Duration::from_secs(5400));
/// assert!(parse_timeout("0m").is_err());
/// ```
pub fn parse_timeout(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration");
    }
    let mut total_secs: u64 = 0;
    let mut digits = String::new();
    let mut seen_unit = false;
    for ch in s.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            'h' | 'm' => {
                if digits.is_empty() {
                    anyhow::bail!("unit '{ch}' without a number");
                }
                let n: u64 = digits.parse()?;
                total_secs += match ch {
                    'h' => n * 3600,
                    _ => n * 60,
                };
                digits.clear();
                seen_unit = true;
            }
            other => anyhow::bail!("unexpected character '{other}'"),
        }
    }
    if !digits.is_empty() {
        anyhow::bail!("trailing number without a unit");
    }
    if !seen_unit {
        anyhow::bail!("no duration unit");
    }
    if total_secs == 0 {
        anyhow::bail!("duration must be non-zero");
    }
    Ok(Duration::from_secs(total_secs))
}
