//! Optional `mq` helper integration.
//!
//! When the external `mq` markdown-query tool is on PATH, large drives
//! are summarized through it instead of dumping full content. Calls are
//! bounded by a 10 s timeout; any failure surfaces as an error the
//! caller turns into a fallback or an error string.

use anyhow::{bail, Context};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::Result;

const MQ_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether `mq` is on PATH.
pub fn mq_available() -> bool {
    Command::new("mq")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// The structural outline of a document or drive directory.
pub fn mq_outline(path: &Path) -> Result<String> {
    run_mq(&[&path.to_string_lossy(), ".tree(\"full\")"])
}

/// One section's text via `mq`.
pub fn mq_section(path: &Path, section: &str) -> Result<String> {
    let query = format!(".section(\"{}\") | .text", section.replace('"', "\\\""));
    run_mq(&[&path.to_string_lossy(), &query])
}

fn run_mq(args: &[&str]) -> Result<String> {
    let mut child = Command::new("mq")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to run mq")?;

    let deadline = Instant::now() + MQ_TIMEOUT;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let output = child.wait_with_output()?;
                if !status.success() {
                    bail!(
                        "mq failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                bail!("mq timed out after {MQ_TIMEOUT:?}");
            }
            None => std::thread::sleep(Duration::from_millis(50)),
        }
    }
}
