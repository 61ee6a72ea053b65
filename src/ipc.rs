use crate::protocol::{AppSnapshot, KeyCode, ManagerStatus};
use crate::settings::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Commands sent from CLI client to daemon, one JSON object per line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum IpcCommand {
    /// Give an application focus
    Switch { app: String, window: Option<String> },
    /// Start an application in background
    Launch { app: String },
    /// Return to the previous application
    Back,
    /// Press (and release) a key in the focused application
    Key { key: KeyCode, long: bool },
    /// Change the interface language
    Language { language: Language },
    /// Query daemon status
    Status,
    /// Close every application and stop the daemon
    Shutdown,
}

/// Response from daemon to CLI client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command accepted
    Ok,
    /// Error occurred
    Error(String),
    /// Status response
    Status {
        manager: ManagerStatus,
        focused: Option<AppSnapshot>,
    },
}

/// Get the path to the Unix socket
pub fn get_socket_path() -> Result<PathBuf> {
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("appmgr.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ApplicationState, ManagerState};

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_string(&IpcCommand::Switch {
            app: "messages".to_string(),
            window: Some("thread".to_string()),
        })
        .unwrap();
        assert_eq!(json, r#"{"command":"switch","app":"messages","window":"thread"}"#);

        assert_eq!(serde_json::to_string(&IpcCommand::Back).unwrap(), r#"{"command":"back"}"#);
    }

    #[test]
    fn test_command_parsing() {
        let cmd: IpcCommand =
            serde_json::from_str(r#"{"command":"key","key":"enter","long":false}"#).unwrap();
        assert_eq!(cmd, IpcCommand::Key { key: KeyCode::Enter, long: false });

        let cmd: IpcCommand =
            serde_json::from_str(r#"{"command":"language","language":"polish"}"#).unwrap();
        assert_eq!(cmd, IpcCommand::Language { language: Language::Polish });

        assert!(serde_json::from_str::<IpcCommand>(r#"{"command":"reboot"}"#).is_err());
        assert!(serde_json::from_str::<IpcCommand>("status").is_err());
    }

    #[test]
    fn test_ipc_response_serialization() {
        let json = serde_json::to_string(&IpcResponse::Ok).unwrap();
        assert!(json.contains("ok"));

        let json = serde_json::to_string(&IpcResponse::Error("test error".to_string())).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("test error"));

        let status = IpcResponse::Status {
            manager: ManagerStatus {
                state: ManagerState::Idle,
                focus: Some("desktop".to_string()),
                previous: None,
                launching: None,
                queued: 0,
                applications: vec![],
            },
            focused: Some(AppSnapshot {
                name: "desktop".to_string(),
                state: ApplicationState::ActiveForeground,
                window_stack: vec!["main".to_string(), "menu".to_string()],
                current_window: "menu".to_string(),
            }),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"focus\":\"desktop\""));
        assert!(json.contains("\"current_window\":\"menu\""));
    }

    #[test]
    fn test_get_socket_path() {
        let path = get_socket_path().unwrap();
        assert!(path.ends_with("appmgr.sock"));
    }
}
