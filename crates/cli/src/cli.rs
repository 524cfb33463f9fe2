//! Command-line surface for `corral`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Unified manager for AI coding agent CLIs.
#[derive(Debug, Parser)]
#[command(
    name = "corral",
    about = "Manage agent CLIs: versions, config sync, scheduled jobs, context drives",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available `corral` commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Shows installed agents, versions, repos, and the daemon state.
    Status {
        /// Limit output to one agent.
        agent: Option<String>,
    },
    /// Pulls the config repo and syncs its resources into the install.
    Pull {
        /// Repo source (defaults to the highest-priority configured repo).
        source: Option<String>,
        /// Limit the sync to one agent.
        agent: Option<String>,
        /// Keep every drifted item without asking.
        #[arg(long)]
        yes: bool,
        /// Overwrite every drifted item without asking.
        #[arg(long)]
        force: bool,
        /// Classify and report without changing anything.
        #[arg(long)]
        dry_run: bool,
        /// Unregister MCP servers absent from the manifest.
        #[arg(long)]
        clean: bool,
        /// Skip agent version installs requested by the manifest.
        #[arg(long)]
        skip_clis: bool,
        /// Skip MCP registration.
        #[arg(long)]
        skip_mcp: bool,
        /// Repo slot to pull (system, user, project, or a named slot).
        #[arg(long)]
        scope: Option<String>,
    },
    /// Exports local resources into the config repo and pushes.
    Push {
        /// Repo slot to push to.
        #[arg(long)]
        scope: Option<String>,
        /// Export into the clone without committing or pushing.
        #[arg(long)]
        export_only: bool,
        /// Commit message.
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Installs an agent version (`<agent>[@<version>]`).
    Add {
        spec: String,
        /// Pin in the project manifest instead of the global default.
        #[arg(short, long)]
        project: bool,
    },
    /// Removes an installed agent version (`<agent>[@<version>]`).
    Remove {
        spec: String,
        /// Remove every installed version of the agent.
        #[arg(long)]
        all: bool,
    },
    /// Selects the default version (`<agent>@<version>`).
    Use {
        spec: String,
        /// Pin in the project manifest instead of the global default.
        #[arg(short, long)]
        project: bool,
    },
    /// Lists installed versions.
    List {
        /// Limit output to one agent.
        agent: Option<String>,
    },
    /// Central command store operations.
    Commands {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Central skill store operations.
    Skills {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Central hook store operations.
    Hooks {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// MCP registrations declared by the active repo.
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
    /// Central memory file operations.
    Memory {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// Context drive operations.
    Drive {
        #[command(subcommand)]
        command: DriveCommands,
    },
    /// Scheduled job operations.
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Scheduler daemon control.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
    /// Repo slot management.
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Package registry management.
    Registry {
        #[command(subcommand)]
        command: RegistryCommands,
    },
    /// Searches the enabled registries.
    Search {
        query: String,
        /// Registry type to search: mcp or skill.
        #[arg(long, default_value = "skill")]
        registry: String,
    },
    /// Installs a package from a registry (`skill:<name>` or `mcp:<name>`).
    Install { package: String },
    /// Version-resolving exec dispatcher behind the PATH shims.
    #[command(name = "_shim", hide = true)]
    Shim {
        agent: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ResourceCommands {
    /// Lists the central store's entries.
    List,
}

#[derive(Debug, Subcommand)]
pub enum McpCommands {
    /// Lists MCP entries declared by the active repo manifest.
    List,
}

#[derive(Debug, Subcommand)]
pub enum DriveCommands {
    /// Lists installed drives.
    List,
    /// Installs a markdown file or directory as a drive.
    Add { path: PathBuf },
    /// Appends a note to a drive.
    Note {
        drive: String,
        title: String,
        content: String,
    },
    /// Runs the drive MCP server over stdio.
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum JobCommands {
    /// Lists jobs with their schedules.
    List,
    /// Validates and installs a job file.
    Add { file: PathBuf },
    /// Removes a job.
    Remove { name: String },
    /// Runs a job immediately, ignoring its schedule.
    Run { name: String },
    /// Enables a job.
    Enable { name: String },
    /// Disables a job.
    Disable { name: String },
    /// Lists a job's runs.
    Runs { name: String },
    /// Prints the newest report of a job.
    Report { name: String },
}

#[derive(Debug, Subcommand)]
pub enum DaemonCommands {
    /// Starts the scheduler daemon.
    Start,
    /// Stops the scheduler daemon.
    Stop,
    /// Shows whether the daemon is running.
    Status,
    /// Asks a running daemon to reload its job set.
    Reload,
    /// Daemon main loop (invoked by the service descriptor).
    #[command(name = "_run", hide = true)]
    Run,
}

#[derive(Debug, Subcommand)]
pub enum RepoCommands {
    /// Lists repo slots by priority.
    List,
    /// Adds or updates a repo slot.
    Add { slot: String, source: String },
    /// Removes a repo slot.
    Remove { slot: String },
}

#[derive(Debug, Subcommand)]
pub enum RegistryCommands {
    /// Lists configured registries.
    List,
    /// Adds a registry (`type` is mcp or skill).
    Add {
        r#type: String,
        name: String,
        url: String,
    },
    /// Enables a registry.
    Enable { r#type: String, name: String },
    /// Disables a registry.
    Disable { r#type: String, name: String },
}
