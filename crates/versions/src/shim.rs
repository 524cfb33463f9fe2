//! PATH shims.
//!
//! A shim is a two-line shell script on PATH named after the agent's CLI.
//! It execs the `corral` binary's hidden `_shim` subcommand, which
//! resolves the active version (project pin, then global default), sets
//! HOME to that version's private home, and execs the real binary. All
//! resolution logic therefore lives in one place.

use corral_core::AgentId;
use corral_state::Store;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Creates (or refreshes) the shim for an agent.
///
/// `corral_exe` is the path of the corral binary the shim dispatches to,
/// normally `std::env::current_exe()`.
pub fn create_shim(store: &Store, agent: AgentId, corral_exe: &Path) -> Result<PathBuf> {
    let dir = store.shims_dir();
    fs::create_dir_all(&dir)?;
    let path = dir.join(agent.descriptor().cli_name);
    let script = format!(
        "#!/bin/sh\n# generated by corral; do not edit\nexec \"{}\" _shim {} \"$@\"\n",
        corral_exe.display(),
        agent.as_str(),
    );
    fs::write(&path, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(path)
}

/// Deletes the shim if present.
pub fn remove_shim(store: &Store, agent: AgentId) -> Result<()> {
    let path = store.shims_dir().join(agent.descriptor().cli_name);
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// Whether the shims directory is on the current PATH.
pub fn shims_in_path(store: &Store) -> bool {
    let shims = store.shims_dir();
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|p| p == shims)
}

/// Platform-appropriate PATH setup instructions for the user's shell.
pub fn path_instructions(store: &Store) -> Result<String> {
    let shims = store.shims_dir();
    let shell = std::env::var("SHELL").unwrap_or_default();
    let shell_name = Path::new(&shell)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("sh");

    let line = match shell_name {
        "fish" => format!("fish_add_path {}", shims.display()),
        _ => format!("export PATH=\"{}:$PATH\"", shims.display()),
    };
    let rc_file = match shell_name {
        "fish" => "~/.config/fish/config.fish",
        "zsh" => "~/.zshrc",
        "bash" => "~/.bashrc",
        _ => "your shell profile",
    };
    Ok(format!(
        "Add the corral shims directory to your PATH:\n\n    {line}\n\nAppend that line to {rc_file}, then restart your shell."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn shim_script_execs_the_dispatcher() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path());
        let path = create_shim(&store, AgentId::Codex, Path::new("/usr/local/bin/corral")).unwrap();

        assert_eq!(path.file_name().unwrap(), "codex");
        let script = fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("_shim codex \"$@\""));
        assert!(script.contains("/usr/local/bin/corral"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111, "shim must be executable");
        }
    }

    #[test]
    fn cursor_shim_uses_the_cli_name_not_the_agent_key() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path());
        let path = create_shim(&store, AgentId::Cursor, Path::new("/bin/corral")).unwrap();
        assert_eq!(path.file_name().unwrap(), "cursor-agent");
    }

    #[test]
    fn remove_shim_is_idempotent() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path());
        create_shim(&store, AgentId::Claude, Path::new("/bin/corral")).unwrap();
        remove_shim(&store, AgentId::Claude).unwrap();
        remove_shim(&store, AgentId::Claude).unwrap();
        assert!(!store.shims_dir().join("claude").exists());
    }

    #[test]
    fn shims_in_path_detects_the_directory() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path());
        let original = std::env::var_os("PATH");

        let joined = std::env::join_paths(
            std::iter::once(store.shims_dir())
                .chain(original.iter().flat_map(std::env::split_paths)),
        )
        .unwrap();
        std::env::set_var("PATH", &joined);
        let detected = shims_in_path(&store);
        match original {
            Some(p) => std::env::set_var("PATH", p),
            None => std::env::remove_var("PATH"),
        }
        assert!(detected);
    }
}
