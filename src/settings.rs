//! Settings store collaborator.
//!
//! A small actor that owns the persisted settings record. Applications fetch
//! it once during init through [`SettingsClient::fetch`], the only call in the
//! lifecycle core that suspends waiting for a reply.

use crate::actor::{self, Receiver, Sender};
use crate::error::LifecycleError;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Polish,
    German,
    Spanish,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::English => "English",
            Language::Polish => "Polish",
            Language::German => "German",
            Language::Spanish => "Spanish",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub language: Language,
    pub time_format_12h: bool,
    pub lock_time_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            language: Language::English,
            time_format_12h: false,
            lock_time_ms: 30_000,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults if it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write settings file {}", path.display()))
    }
}

/// Default location of the settings file
pub fn default_settings_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine config directory")?;

    Ok(config_dir.join("appmgr").join("settings.json"))
}

#[derive(Debug)]
pub enum SettingsRequest {
    Get { reply: oneshot::Sender<Settings> },
    Update { settings: Settings },
}

/// Owns the settings record and optionally mirrors it to disk.
pub struct SettingsStore {
    settings: Settings,
    path: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new(settings: Settings, path: Option<PathBuf>) -> Self {
        SettingsStore { settings, path }
    }

    /// Spawn the store on its own task and return a client for it.
    pub fn spawn(self) -> SettingsClient {
        let (tx, rx) = actor::channel();
        tokio::spawn(self.run(rx));
        SettingsClient { tx }
    }

    async fn run(mut self, mut rx: Receiver<SettingsRequest>) {
        while let Some(request) = rx.recv().await {
            match request {
                SettingsRequest::Get { reply } => {
                    if reply.send(self.settings.clone()).is_err() {
                        debug!("Settings requester went away before the reply");
                    }
                }
                SettingsRequest::Update { settings } => {
                    self.settings = settings;
                    if let Some(path) = &self.path
                        && let Err(e) = self.settings.save(path)
                    {
                        warn!("Failed to persist settings: {:#}", e);
                    }
                }
            }
        }
        debug!("Settings store stopped");
    }
}

#[derive(Debug, Clone)]
pub struct SettingsClient {
    tx: Sender<SettingsRequest>,
}

impl SettingsClient {
    pub fn from_sender(tx: Sender<SettingsRequest>) -> Self {
        SettingsClient { tx }
    }

    /// Fetch the settings, suspending until the store answers or `timeout` elapses.
    pub async fn fetch(&self, timeout: Duration) -> Result<Settings, LifecycleError> {
        let (reply, rx) = oneshot::channel();
        if !self.tx.send(SettingsRequest::Get { reply }) {
            return Err(LifecycleError::SettingsUnavailable(
                "store is not running".to_string(),
            ));
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(settings)) => Ok(settings),
            Ok(Err(_)) => Err(LifecycleError::SettingsUnavailable(
                "request dropped".to_string(),
            )),
            Err(_) => Err(LifecycleError::SettingsUnavailable(format!(
                "no reply within {:?}",
                timeout
            ))),
        }
    }

    pub fn update(&self, settings: Settings) -> bool {
        self.tx.send(SettingsRequest::Update { settings })
    }
}
