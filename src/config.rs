use crate::manager::ManagerConfig;
use crate::protocol::KeyCode;
use crate::settings::{self, Language};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run as daemon (default if no command specified)
    Daemon,
    /// Give an application focus, optionally on a given window
    Switch { app: String, window: Option<String> },
    /// Start an application in background
    Launch { app: String },
    /// Return to the previous application
    Back,
    /// Press a key in the focused application
    Key {
        key: KeyCode,
        /// Hold the key long enough to count as a long press
        #[arg(long)]
        long: bool,
    },
    /// Change the interface language
    Language {
        #[arg(value_enum)]
        language: Language,
    },
    /// Query daemon status
    Status,
    /// Close every application and stop the daemon
    Shutdown,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "appmgr")]
#[command(
    about = "Application lifecycle manager with focus hand-off between applications",
    long_about = None
)]
pub struct Config {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Home application: focused at boot and the fallback for "back"
    #[arg(long, default_value = "desktop")]
    pub home: String,

    /// Period of the shutdown close sweep
    #[arg(long, default_value_t = 500)]
    pub sweep_interval_ms: u64,

    /// Deadline for each handshake step, 0 disables it
    #[arg(long, default_value_t = 5000)]
    pub handshake_timeout_ms: u64,

    /// How long an application waits for its settings during init
    #[arg(long, default_value_t = 1000)]
    pub settings_timeout_ms: u64,

    /// Hold time after which a key press counts as long
    #[arg(long, default_value_t = 1000)]
    pub long_press_ms: u64,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Daemon if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_ms > 0).then(|| Duration::from_millis(self.handshake_timeout_ms))
    }

    pub fn settings_timeout(&self) -> Duration {
        Duration::from_millis(self.settings_timeout_ms)
    }

    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        match &self.settings_file {
            Some(path) => Ok(path.clone()),
            None => settings::default_settings_path(),
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            home: self.home.clone(),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            handshake_timeout: self.handshake_timeout(),
            settings_timeout: self.settings_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("appmgr").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert!(matches!(config.command(), Command::Daemon));
        assert_eq!(config.home, "desktop");
        let manager = config.manager_config();
        assert_eq!(manager.sweep_interval, Duration::from_millis(500));
        assert_eq!(manager.handshake_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.long_press(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_disables_handshake_timeout() {
        let config = parse(&["--handshake-timeout-ms", "0"]);
        assert_eq!(config.handshake_timeout(), None);
    }

    #[test]
    fn test_switch_with_window() {
        match parse(&["switch", "messages", "thread"]).command() {
            Command::Switch { app, window } => {
                assert_eq!(app, "messages");
                assert_eq!(window.as_deref(), Some("thread"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_key_and_language() {
        assert!(matches!(
            parse(&["key", "3", "--long"]).command(),
            Command::Key { key: KeyCode::Num(3), long: true }
        ));
        assert!(matches!(
            parse(&["language", "german"]).command(),
            Command::Language { language: Language::German }
        ));
        assert!(Config::try_parse_from(["appmgr", "key", "space"]).is_err());
    }

    #[test]
    fn test_settings_path_override() {
        let config = parse(&["--settings-file", "/tmp/appmgr-test.json"]);
        assert_eq!(config.settings_path().unwrap(), PathBuf::from("/tmp/appmgr-test.json"));
    }
}
