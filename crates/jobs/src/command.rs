//! Per-agent command assembly.
//!
//! Each job agent has a base argv template with a `{prompt}` slot; the
//! builder then appends mode flags, allowed directories (claude only),
//! and the model from `config`.

use anyhow::bail;
use corral_core::{expand_tilde, AgentId};
use std::path::Path;

use crate::spec::{JobMode, JobSpec};
use crate::Result;

/// Assembles the argv (binary first) for one job invocation.
pub fn build_command(job: &JobSpec, prompt: &str, real_home: &Path) -> Result<Vec<String>> {
    let mut argv: Vec<String> = match job.agent {
        AgentId::Claude => vec![
            "claude".into(),
            "-p".into(),
            prompt.into(),
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ],
        AgentId::Codex => vec!["codex".into(), "exec".into(), "--json".into(), prompt.into()],
        AgentId::Gemini => vec![
            "gemini".into(),
            "--prompt".into(),
            prompt.into(),
            "--output-format".into(),
            "stream-json".into(),
        ],
        other => bail!("{other} is not supported for daemon jobs"),
    };

    match (job.agent, job.mode) {
        (AgentId::Claude, JobMode::Plan) => {
            argv.extend(["--permission-mode".into(), "plan".into()]);
        }
        (AgentId::Claude, JobMode::Edit) => {
            argv.extend(["--permission-mode".into(), "acceptEdits".into()]);
        }
        (AgentId::Codex, JobMode::Edit) => argv.push("--full-auto".into()),
        (AgentId::Gemini, JobMode::Edit) => argv.push("--yolo".into()),
        _ => {}
    }

    if job.agent == AgentId::Claude {
        for dir in &job.allow.dirs {
            argv.push("--add-dir".into());
            argv.push(expand_tilde(dir, real_home).display().to_string());
        }
    }

    if let Some(model) = job.config.get("model").and_then(|v| v.as_str()) {
        argv.extend(["--model".into(), model.to_string()]);
    }

    Ok(argv)
}
