//! The package-installer seam.
//!
//! Installation shells out to `npm`; tests substitute a fake that lays
//! down the expected files without network access.

use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

use crate::Result;

/// Errors from the upstream package installer.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The installer executable could not be spawned.
    #[error("failed to run npm: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },

    /// The installer exited non-zero.
    #[error("npm install of {package}@{version} failed: {stderr}")]
    Failed {
        package: String,
        version: String,
        stderr: String,
    },

    /// The agent has no upstream package (not npm-distributed).
    #[error("{agent} is not installable from a package registry")]
    NotInstallable { agent: String },
}

/// Installs an upstream package into a prefix directory.
pub trait PackageInstaller {
    /// Installs `package@version` under `prefix` (its `node_modules/`).
    fn install(&self, package: &str, version: &str, prefix: &Path) -> Result<()>;
}

/// The real installer: `npm install --prefix <dir> <package>@<version>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmInstaller;

impl PackageInstaller for NpmInstaller {
    fn install(&self, package: &str, version: &str, prefix: &Path) -> Result<()> {
        let output = Command::new("npm")
            .arg("install")
            .arg("--prefix")
            .arg(prefix)
            .arg("--no-fund")
            .arg("--no-audit")
            .arg(format!("{package}@{version}"))
            .output()
            .map_err(|source| InstallError::Spawn { source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // npm is chatty; keep the tail, which carries the actual error.
            let brief = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(InstallError::Failed {
                package: package.to_string(),
                version: version.to_string(),
                stderr: brief,
            }
            .into());
        }
        Ok(())
    }
}
