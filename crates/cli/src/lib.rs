//! The corral CLI: argument surface, handlers, and the interactive
//! shell around the core crates.

#![deny(unsafe_code)]

use clap::Parser;

/// Error type for CLI operations.
pub type Error = anyhow::Error;
/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

pub mod cli;
mod commands;
mod prompt;
mod registry;
mod update_check;

use cli::{Cli, Commands};

/// Parses arguments, runs the selected command, and returns the process
/// exit code.
pub fn run() -> i32 {
    let args = Cli::parse();
    init_tracing();

    let outcome = match args.command {
        Commands::Status { agent } => commands::status::handle(agent),
        Commands::Pull {
            source,
            agent,
            yes,
            force,
            dry_run,
            clean,
            skip_clis,
            skip_mcp,
            scope,
        } => commands::pull::handle(commands::pull::PullArgs {
            source,
            agent,
            yes,
            force,
            dry_run,
            clean,
            skip_clis,
            skip_mcp,
            scope,
        }),
        Commands::Push {
            scope,
            export_only,
            message,
        } => commands::push::handle(scope, export_only, message),
        Commands::Add { spec, project } => commands::versions::add(&spec, project),
        Commands::Remove { spec, all } => commands::versions::remove(&spec, all),
        Commands::Use { spec, project } => commands::versions::use_version(&spec, project),
        Commands::List { agent } => commands::versions::list(agent),
        Commands::Commands { command } => commands::resources::commands(command),
        Commands::Skills { command } => commands::resources::skills(command),
        Commands::Hooks { command } => commands::resources::hooks(command),
        Commands::Memory { command } => commands::resources::memory(command),
        Commands::Mcp { command } => commands::resources::mcp(command),
        Commands::Drive { command } => commands::drive::handle(command),
        Commands::Jobs { command } => commands::jobs::handle(command),
        Commands::Daemon { command } => commands::daemon::handle(command),
        Commands::Repo { command } => commands::repo::handle(command),
        Commands::Registry { command } => commands::repo::registry(command),
        Commands::Search { query, registry } => commands::repo::search(&query, &registry),
        Commands::Install { package } => commands::repo::install(&package),
        Commands::Shim { agent, args } => commands::versions::shim_exec(&agent, &args),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("CORRAL_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
