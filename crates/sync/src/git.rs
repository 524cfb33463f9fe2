//! Git transport seam.
//!
//! The engine only needs a handful of porcelain operations; they are
//! behind a trait so tests can substitute a transport that copies a local
//! fixture instead of talking to the network.

use anyhow::{bail, Context};
use corral_core::RepoRef;
use std::path::Path;
use std::process::Command;

use crate::Result;

/// Porcelain git operations the sync engine consumes.
pub trait GitTransport {
    /// Clones `source` into `target` (or pulls if already cloned).
    /// Returns the short HEAD commit and whether this was a fresh clone.
    fn clone_or_pull(&self, source: &RepoRef, target: &Path) -> Result<(String, bool)>;

    /// `git status --porcelain` output.
    fn status(&self, repo: &Path) -> Result<String>;

    /// Stages everything.
    fn add_all(&self, repo: &Path) -> Result<()>;

    /// Commits staged changes.
    fn commit(&self, repo: &Path, message: &str) -> Result<()>;

    /// Pushes the current branch.
    fn push(&self, repo: &Path) -> Result<()>;

    /// The `origin` remote URL, if set.
    fn get_remote(&self, repo: &Path) -> Result<Option<String>>;

    /// Sets the `origin` remote URL.
    fn set_remote(&self, repo: &Path, url: &str) -> Result<()>;
}

/// The real transport: shells out to `git`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd.args(args).output().context("failed to run git")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitTransport for GitCli {
    fn clone_or_pull(&self, source: &RepoRef, target: &Path) -> Result<(String, bool)> {
        let is_new = !target.join(".git").exists();
        if is_new {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let url = source.url();
            let target_str = target.to_string_lossy();
            self.run(
                None,
                &[
                    "clone",
                    "--branch",
                    source.reference(),
                    "--single-branch",
                    &url,
                    &target_str,
                ],
            )?;
        } else {
            // Fetch hiccups are common on flaky networks; retry once.
            if self.run(Some(target), &["pull", "--ff-only"]).is_err() {
                self.run(Some(target), &["pull", "--ff-only"])?;
            }
        }
        let commit = self.run(Some(target), &["rev-parse", "--short", "HEAD"])?;
        Ok((commit.trim().to_string(), is_new))
    }

    fn status(&self, repo: &Path) -> Result<String> {
        self.run(Some(repo), &["status", "--porcelain"])
    }

    fn add_all(&self, repo: &Path) -> Result<()> {
        self.run(Some(repo), &["add", "-A"]).map(|_| ())
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.run(Some(repo), &["commit", "-m", message]).map(|_| ())
    }

    fn push(&self, repo: &Path) -> Result<()> {
        self.run(Some(repo), &["push"]).map(|_| ())
    }

    fn get_remote(&self, repo: &Path) -> Result<Option<String>> {
        match self.run(Some(repo), &["remote", "get-url", "origin"]) {
            Ok(url) => Ok(Some(url.trim().to_string())),
            Err(_) => Ok(None),
        }
    }

    fn set_remote(&self, repo: &Path, url: &str) -> Result<()> {
        if self.get_remote(repo)?.is_some() {
            self.run(Some(repo), &["remote", "set-url", "origin", url])
                .map(|_| ())
        } else {
            self.run(Some(repo), &["remote", "add", "origin", url])
                .map(|_| ())
        }
    }
}
