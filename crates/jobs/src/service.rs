//! Platform service hosting for the daemon.
//!
//! A single `ServiceHost` abstraction with a launchd backend (macOS), a
//! systemd user-unit backend (Linux), and a detached-process fallback.
//! Every backend invokes the CLI's hidden `daemon _run` subcommand and
//! restarts it on failure.

use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::Result;

/// Reverse-DNS label used for the launchd plist.
pub const LAUNCHD_LABEL: &str = "dev.corral.daemon";
/// Unit name used for the systemd user service.
pub const SYSTEMD_UNIT: &str = "corral-daemon";

/// Installs, starts, and stops the daemon under a platform service
/// manager.
pub trait ServiceHost {
    /// Writes the service descriptor invoking `exe daemon _run`.
    fn install(&self, exe: &Path) -> Result<()>;
    /// Removes the descriptor.
    fn uninstall(&self) -> Result<()>;
    /// Asks the service manager to start the daemon.
    fn start(&self) -> Result<()>;
    /// Asks the service manager to stop the daemon.
    fn stop(&self) -> Result<()>;
}

/// The platform's native host, when one exists.
pub fn platform_host(home: &Path, log_file: &Path) -> Option<Box<dyn ServiceHost>> {
    if cfg!(target_os = "macos") {
        Some(Box::new(LaunchdHost::new(home, log_file)))
    } else if cfg!(target_os = "linux") {
        Some(Box::new(SystemdUserHost::new(home)))
    } else {
        None
    }
}

/// launchd backend: a plist under `~/Library/LaunchAgents/`.
pub struct LaunchdHost {
    home: PathBuf,
    log_file: PathBuf,
}

impl LaunchdHost {
    pub fn new(home: &Path, log_file: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            log_file: log_file.to_path_buf(),
        }
    }

    fn plist_path(&self) -> PathBuf {
        self.home
            .join("Library/LaunchAgents")
            .join(format!("{LAUNCHD_LABEL}.plist"))
    }

    /// The plist body for a given executable.
    pub fn render_plist(&self, exe: &Path) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>daemon</string>
        <string>_run</string>
    </array>
    <key>KeepAlive</key>
    <dict>
        <key>SuccessfulExit</key>
        <false/>
    </dict>
    <key>StandardOutPath</key>
    <string>{log}</string>
    <key>StandardErrorPath</key>
    <string>{log}</string>
</dict>
</plist>
"#,
            label = LAUNCHD_LABEL,
            exe = exe.display(),
            log = self.log_file.display(),
        )
    }
}

impl ServiceHost for LaunchdHost {
    fn install(&self, exe: &Path) -> Result<()> {
        let path = self.plist_path();
        fs::create_dir_all(path.parent().context("plist path has no parent")?)?;
        fs::write(&path, self.render_plist(exe))?;
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let path = self.plist_path();
        if path.exists() {
            let _ = run_quiet("launchctl", &["unload", &path.to_string_lossy()]);
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn start(&self) -> Result<()> {
        run_quiet("launchctl", &["load", &self.plist_path().to_string_lossy()])
    }

    fn stop(&self) -> Result<()> {
        run_quiet(
            "launchctl",
            &["unload", &self.plist_path().to_string_lossy()],
        )
    }
}

/// systemd user-unit backend: a unit under `~/.config/systemd/user/`.
pub struct SystemdUserHost {
    home: PathBuf,
}

impl SystemdUserHost {
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }

    fn unit_path(&self) -> PathBuf {
        self.home
            .join(".config/systemd/user")
            .join(format!("{SYSTEMD_UNIT}.service"))
    }

    /// The unit body for a given executable.
    pub fn render_unit(&self, exe: &Path) -> String {
        format!(
            "[Unit]\nDescription=corral job scheduler daemon\n\n[Service]\nExecStart={} daemon _run\nRestart=on-failure\nRestartSec=5\n\n[Install]\nWantedBy=default.target\n",
            exe.display()
        )
    }
}

impl ServiceHost for SystemdUserHost {
    fn install(&self, exe: &Path) -> Result<()> {
        let path = self.unit_path();
        fs::create_dir_all(path.parent().context("unit path has no parent")?)?;
        fs::write(&path, self.render_unit(exe))?;
        let _ = run_quiet("systemctl", &["--user", "daemon-reload"]);
        Ok(())
    }

    fn uninstall(&self) -> Result<()> {
        let _ = self.stop();
        let path = self.unit_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let _ = run_quiet("systemctl", &["--user", "daemon-reload"]);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        run_quiet("systemctl", &["--user", "start", SYSTEMD_UNIT])
    }

    fn stop(&self) -> Result<()> {
        run_quiet("systemctl", &["--user", "stop", SYSTEMD_UNIT])
    }
}

/// Fallback when no service manager is usable: a detached child.
pub struct DetachedProcess;

impl DetachedProcess {
    /// Spawns `exe daemon _run` detached from the current terminal.
    pub fn spawn(exe: &Path) -> Result<u32> {
        let mut cmd = Command::new(exe);
        cmd.args(["daemon", "_run"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let child = cmd.spawn().context("failed to spawn detached daemon")?;
        Ok(child.id())
    }
}

fn run_quiet(binary: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(binary)
        .args(args)
        .output()
        .with_context(|| format!("failed to run {binary}"))?;
    if !output.status.success() {
        bail!(
            "{binary} {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
