//! The repo source DSL.
//!
//! Every way a user can name a config repo maps to exactly one `RepoRef`
//! variant or a parse error. The canonical string form is the normalized
//! clone URL (or the absolute path for local repos), so
//! `parse(s).url()` round-trips to the same value for every spelling of
//! the same repo.

use anyhow::bail;
use std::path::{Path, PathBuf};

use crate::Result;

/// Default branch assumed when a source carries no `@ref` suffix.
pub const DEFAULT_REF: &str = "main";

/// A parsed repo source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRef {
    /// A GitHub-hosted repo, however it was spelled.
    GitHub {
        owner: String,
        repo: String,
        reference: Option<String>,
    },
    /// A non-GitHub git URL, passed through with `.git` appended if absent.
    Url {
        url: String,
        reference: Option<String>,
    },
    /// An existing local path, stored absolute.
    Local { path: PathBuf },
}

impl RepoRef {
    /// Parses a source string. Total: every input maps to one variant or
    /// an error.
    ///
    /// ```
    /// use corral_core::RepoRef;
    ///
    /// let r = RepoRef::parse("gh:alice/cfg@dev").unwrap();
    /// assert_eq!(r.url(), "https://github.com/alice/cfg.git");
    /// assert_eq!(r.reference(), "dev");
    /// ```
    pub fn parse(input: &str) -> Result<RepoRef> {
        let input = input.trim();
        if input.is_empty() {
            bail!("empty repo source");
        }

        let (body, reference) = split_ref(input);

        // gh: shorthand
        if let Some(rest) = body.strip_prefix("gh:") {
            let (owner, repo) = split_owner_repo(rest)?;
            return Ok(RepoRef::GitHub {
                owner,
                repo,
                reference,
            });
        }

        // SSH github spelling
        if let Some(rest) = body.strip_prefix("git@github.com:") {
            let (owner, repo) = split_owner_repo(trim_git_suffix(rest))?;
            return Ok(RepoRef::GitHub {
                owner,
                repo,
                reference,
            });
        }

        // Host-prefixed spellings without a scheme
        for prefix in ["github.com:", "github.com/"] {
            if let Some(rest) = body.strip_prefix(prefix) {
                let (owner, repo) = split_owner_repo(trim_git_suffix(rest))?;
                return Ok(RepoRef::GitHub {
                    owner,
                    repo,
                    reference,
                });
            }
        }

        // Full URLs
        if body.starts_with("http://") || body.starts_with("https://") {
            if let Some(rest) = body
                .strip_prefix("https://github.com/")
                .or_else(|| body.strip_prefix("http://github.com/"))
            {
                let (owner, repo) = split_owner_repo(trim_git_suffix(rest))?;
                return Ok(RepoRef::GitHub {
                    owner,
                    repo,
                    reference,
                });
            }
            let url = if body.ends_with(".git") {
                body.to_string()
            } else {
                format!("{body}.git")
            };
            return Ok(RepoRef::Url { url, reference });
        }

        // Existing local path (checked against the raw input: a path may
        // legitimately contain '@').
        let as_path = Path::new(input);
        if as_path.exists() {
            let path = as_path
                .canonicalize()
                .unwrap_or_else(|_| as_path.to_path_buf());
            return Ok(RepoRef::Local { path });
        }

        // Bare OWNER/REPO: exactly one slash, no dots, no colons.
        if !body.contains('.') && !body.contains(':') {
            if let Ok((owner, repo)) = split_owner_repo(body) {
                return Ok(RepoRef::GitHub {
                    owner,
                    repo,
                    reference,
                });
            }
        }

        bail!("unrecognized repo source: {input}");
    }

    /// Canonical clone URL, or the absolute path for local repos.
    pub fn url(&self) -> String {
        match self {
            RepoRef::GitHub { owner, repo, .. } => {
                format!("https://github.com/{owner}/{repo}.git")
            }
            RepoRef::Url { url, .. } => url.clone(),
            RepoRef::Local { path } => path.display().to_string(),
        }
    }

    /// The requested branch or tag, defaulting to `main`.
    pub fn reference(&self) -> &str {
        match self {
            RepoRef::GitHub { reference, .. } | RepoRef::Url { reference, .. } => {
                reference.as_deref().unwrap_or(DEFAULT_REF)
            }
            RepoRef::Local { .. } => DEFAULT_REF,
        }
    }

    /// True for local-path sources.
    pub fn is_local(&self) -> bool {
        matches!(self, RepoRef::Local { .. })
    }
}

/// Splits a trailing `@ref` suffix off `input`.
///
/// The suffix is only split when it follows the last `@`, the prefix is
/// not an SSH git URL, and the prefix contains no `://`.
fn split_ref(input: &str) -> (&str, Option<String>) {
    let Some(at) = input.rfind('@') else {
        return (input, None);
    };
    let (prefix, suffix) = (&input[..at], &input[at + 1..]);
    if prefix.is_empty() || suffix.is_empty() {
        return (input, None);
    }
    if prefix.starts_with("git@") || prefix.contains("://") {
        return (input, None);
    }
    // `git@github.com:...` keeps its `@` as part of the SSH user spec.
    if prefix == "git" {
        return (input, None);
    }
    (prefix, Some(suffix.to_string()))
}

fn trim_git_suffix(s: &str) -> &str {
    s.strip_suffix(".git").unwrap_or(s)
}

fn split_owner_repo(s: &str) -> Result<(String, String)> {
    let mut parts = s.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("expected OWNER/REPO, got: {s}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "https://github.com/alice/cfg.git";

    #[test]
    fn all_github_spellings_normalize_to_one_url() {
        let spellings = [
            "gh:alice/cfg",
            "git@github.com:alice/cfg.git",
            "git@github.com:alice/cfg",
            "github.com:alice/cfg",
            "github.com/alice/cfg",
            "https://github.com/alice/cfg",
            "https://github.com/alice/cfg.git",
            "alice/cfg",
        ];
        for s in spellings {
            let parsed = RepoRef::parse(s).unwrap();
            assert_eq!(parsed.url(), CANONICAL, "spelling: {s}");
            assert_eq!(parsed.reference(), "main", "spelling: {s}");
        }
    }

    #[test]
    fn ref_suffix_is_split_off() {
        let parsed = RepoRef::parse("gh:alice/cfg@dev").unwrap();
        assert_eq!(parsed.url(), CANONICAL);
        assert_eq!(parsed.reference(), "dev");

        let parsed = RepoRef::parse("alice/cfg@v2").unwrap();
        assert_eq!(parsed.reference(), "v2");
    }

    #[test]
    fn ssh_user_at_is_not_a_ref() {
        let parsed = RepoRef::parse("git@github.com:alice/cfg.git").unwrap();
        assert_eq!(parsed.reference(), "main");
    }

    #[test]
    fn scheme_urls_keep_embedded_at() {
        let parsed = RepoRef::parse("https://token@example.com/team/cfg").unwrap();
        match &parsed {
            RepoRef::Url { url, .. } => {
                assert_eq!(url, "https://token@example.com/team/cfg.git")
            }
            other => panic!("expected Url, got {other:?}"),
        }
    }

    #[test]
    fn non_github_urls_pass_through_with_git_suffix() {
        let parsed = RepoRef::parse("https://gitlab.com/team/cfg").unwrap();
        assert_eq!(parsed.url(), "https://gitlab.com/team/cfg.git");
        let parsed = RepoRef::parse("https://gitlab.com/team/cfg.git").unwrap();
        assert_eq!(parsed.url(), "https://gitlab.com/team/cfg.git");
    }

    #[test]
    fn existing_path_is_local() {
        let tmp = tempfile::tempdir().unwrap();
        let s = tmp.path().to_str().unwrap();
        let parsed = RepoRef::parse(s).unwrap();
        assert!(parsed.is_local());
        assert_eq!(parsed.url(), tmp.path().canonicalize().unwrap().display().to_string());
    }

    #[test]
    fn relative_existing_path_resolves_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("local")).unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(tmp.path()).unwrap();
        let parsed = RepoRef::parse("./local");
        std::env::set_current_dir(prev).unwrap();
        let parsed = parsed.unwrap();
        match parsed {
            RepoRef::Local { path } => {
                assert!(path.is_absolute());
                assert!(path.ends_with("local"));
            }
            other => panic!("expected Local, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(RepoRef::parse("").is_err());
        assert!(RepoRef::parse("not a repo at all").is_err());
        assert!(RepoRef::parse("./does-not-exist-anywhere").is_err());
        assert!(RepoRef::parse("owner/repo/extra").is_err());
    }
}
