//! Handlers for the `daemon` subtree, including the hidden `_run` main
//! loop.

use corral_jobs::daemon;
use corral_state::Store;
use std::fs::OpenOptions;

use crate::cli::DaemonCommands;
use crate::Result;

pub fn handle(command: DaemonCommands) -> Result<i32> {
    let store = Store::open()?;
    store.ensure_layout()?;
    match command {
        DaemonCommands::Start => {
            daemon::start(&store, &std::env::current_exe()?)?;
            println!("daemon started");
            Ok(0)
        }
        DaemonCommands::Stop => {
            if !daemon::is_running(&store) {
                println!("not running");
                return Ok(0);
            }
            daemon::stop(&store)?;
            println!("daemon stopped");
            Ok(0)
        }
        DaemonCommands::Status => {
            match daemon::daemon_pid(&store).filter(|_| daemon::is_running(&store)) {
                Some(pid) => println!("running (pid {pid})"),
                None => println!("not running"),
            }
            Ok(0)
        }
        DaemonCommands::Reload => {
            daemon::signal_reload(&store)?;
            println!("reload signalled");
            Ok(0)
        }
        DaemonCommands::Run => run_loop(store),
    }
}

/// The `daemon _run` entry: log to the daemon log file and run the
/// supervision loop until signalled.
fn run_loop(store: Store) -> Result<i32> {
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(store.daemon_log_file())?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CORRAL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log))
        .with_ansi(false)
        .try_init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(daemon::run(store))?;
    Ok(0)
}
