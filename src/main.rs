mod actor;
mod application;
mod catalog;
mod config;
mod daemon;
mod error;
mod gui;
mod input;
mod ipc;
mod launcher;
mod manager;
mod payload;
mod protocol;
mod registry;
mod settings;
mod socket_client;
mod socket_server;
mod window;
mod window_stack;

use anyhow::{Context, Result};
use config::{Command, Config};
use daemon::Daemon;
use ipc::IpcCommand;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

/// Get the path to the pidfile
fn get_pidfile_path() -> Result<PathBuf> {
    // Try to use XDG_RUNTIME_DIR, fall back to ~/.cache
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("appmgr.pid"))
}

/// Check if another instance is already running
fn check_pidfile() -> Result<()> {
    let pidfile = get_pidfile_path()?;

    if pidfile.exists() {
        let pid_str = fs::read_to_string(&pidfile).context("Failed to read pidfile")?;
        let pid: u32 = pid_str.trim().parse().context("Invalid PID in pidfile")?;

        if process_exists(pid) {
            anyhow::bail!(
                "Another instance of appmgr is already running (PID: {}). \
                 If this is incorrect, remove the pidfile at: {}",
                pid,
                pidfile.display()
            );
        } else {
            // Stale pidfile, remove it
            info!("Removing stale pidfile (PID {} not found)", pid);
            if let Err(e) = fs::remove_file(&pidfile) {
                tracing::warn!("Failed to remove stale pidfile: {}", e);
            }
        }
    }

    Ok(())
}

/// Check if a process with the given PID exists
fn process_exists(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Signal 0 performs the permission and existence checks only
    let alive = unsafe { libc::kill(pid, 0) } == 0;
    alive || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Create the pidfile
fn create_pidfile() -> Result<PidfileGuard> {
    let pidfile = get_pidfile_path()?;
    let pid = std::process::id();

    fs::write(&pidfile, pid.to_string()).context("Failed to write pidfile")?;

    info!("Created pidfile at {} with PID {}", pidfile.display(), pid);

    Ok(PidfileGuard { path: pidfile })
}

/// Guard that removes the pidfile when dropped
struct PidfileGuard {
    path: PathBuf,
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            error!("Failed to remove pidfile: {}", e);
        } else {
            info!("Removed pidfile at {}", self.path.display());
        }
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logging
    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let command = match config.command() {
        Command::Daemon => return run_daemon(config),
        Command::Switch { app, window } => IpcCommand::Switch { app, window },
        Command::Launch { app } => IpcCommand::Launch { app },
        Command::Back => IpcCommand::Back,
        Command::Key { key, long } => IpcCommand::Key { key, long },
        Command::Language { language } => IpcCommand::Language { language },
        Command::Status => IpcCommand::Status,
        Command::Shutdown => IpcCommand::Shutdown,
    };
    socket_client::send_command_and_exit(command)
}

fn run_daemon(config: Config) -> Result<()> {
    info!("Starting appmgr daemon (home: {})", config.home);

    // Check if another instance is already running
    check_pidfile()?;

    // Create pidfile (will be automatically removed when the guard is dropped)
    let _pidfile_guard = create_pidfile()?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    match runtime.block_on(Daemon::new(config).run()) {
        Ok(()) => {
            info!("Daemon exited normally");
            Ok(())
        }
        Err(e) => {
            error!("Daemon error: {:#}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_exists() {
        assert!(process_exists(std::process::id()));
    }

    #[test]
    fn test_out_of_range_pid_does_not_exist() {
        assert!(!process_exists(u32::MAX));
    }

    #[test]
    fn test_pidfile_path() {
        assert!(get_pidfile_path().unwrap().ends_with("appmgr.pid"));
    }
}
