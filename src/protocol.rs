//! Message set exchanged between the Manager and Application actors.
//!
//! Every actor has one closed event enum. Dispatch is a `match`, so adding a
//! message means every handler has to account for it.

use crate::payload::SwitchPayload;
use crate::settings::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::oneshot;

/// Lifecycle state of one application.
///
/// The application owns the authoritative copy; the Manager keeps a mirror
/// in its registry that is updated only by handshake messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    None,
    Deactivated,
    Initializing,
    Activating,
    ActiveForeground,
    ActiveBackground,
    Deactivating,
}

impl ApplicationState {
    /// States in which the application task is considered running.
    pub fn is_started(self) -> bool {
        matches!(
            self,
            ApplicationState::ActiveForeground
                | ApplicationState::ActiveBackground
                | ApplicationState::Activating
        )
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ApplicationState::None => "NONE",
            ApplicationState::Deactivated => "DEACTIVATED",
            ApplicationState::Initializing => "INITIALIZING",
            ApplicationState::Activating => "ACTIVATING",
            ApplicationState::ActiveForeground => "ACTIVE_FOREGROUND",
            ApplicationState::ActiveBackground => "ACTIVE_BACKGROUND",
            ApplicationState::Deactivating => "DEACTIVATING",
        };
        f.pad(s)
    }
}

/// Global orchestration state of the Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Idle,
    StartingNewApp,
    WaitingNewAppRegistration,
    WaitingFocusConfirmation,
    WaitingCloseConfirmation,
    WaitingLostFocusConfirmation,
    ClosingPreviousApp,
}

impl ManagerState {
    /// States that wait on a reply from some application.
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            ManagerState::WaitingNewAppRegistration
                | ManagerState::WaitingFocusConfirmation
                | ManagerState::WaitingCloseConfirmation
                | ManagerState::WaitingLostFocusConfirmation
        )
    }
}

/// How a window is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShowMode {
    #[default]
    Init,
    Return,
}

/// How much of the display a redraw touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshMode {
    Fast,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Enter,
    Back,
    Up,
    Down,
    Left,
    Right,
    Menu,
    Num(u8),
}

/// Error returned when parsing an invalid key name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyCodeError;

impl fmt::Display for ParseKeyCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid key name")
    }
}

impl std::error::Error for ParseKeyCodeError {}

impl FromStr for KeyCode {
    type Err = ParseKeyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "enter" => Ok(KeyCode::Enter),
            "back" => Ok(KeyCode::Back),
            "up" => Ok(KeyCode::Up),
            "down" => Ok(KeyCode::Down),
            "left" => Ok(KeyCode::Left),
            "right" => Ok(KeyCode::Right),
            "menu" => Ok(KeyCode::Menu),
            digit if digit.len() == 1 => digit
                .parse::<u8>()
                .map(KeyCode::Num)
                .map_err(|_| ParseKeyCodeError),
            _ => Err(ParseKeyCodeError),
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Enter => write!(f, "enter"),
            KeyCode::Back => write!(f, "back"),
            KeyCode::Up => write!(f, "up"),
            KeyCode::Down => write!(f, "down"),
            KeyCode::Left => write!(f, "left"),
            KeyCode::Right => write!(f, "right"),
            KeyCode::Menu => write!(f, "menu"),
            KeyCode::Num(n) => write!(f, "{}", n),
        }
    }
}

/// Raw key transition as delivered by input routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub pressed: bool,
}

/// Translated input handed to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    ShortPress(KeyCode),
    LongPress(KeyCode),
}

impl InputEvent {
    pub fn code(&self) -> KeyCode {
        match self {
            InputEvent::ShortPress(code) | InputEvent::LongPress(code) => *code,
        }
    }
}

/// What an application reports about itself on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub name: String,
    pub state: ApplicationState,
    pub window_stack: Vec<String>,
    pub current_window: String,
}

/// Mailbox of an Application actor.
#[derive(Debug)]
pub enum AppEvent {
    /// Gain focus (and optionally show a window), or lose focus when both
    /// `target_window` and `payload` are empty and the app is foreground.
    Switch {
        target_app: String,
        target_window: Option<String>,
        payload: Option<SwitchPayload>,
        mode: ShowMode,
    },
    /// Same-application navigation, posted by the application to itself.
    SwitchWindow {
        window: String,
        mode: ShowMode,
        payload: Option<SwitchPayload>,
    },
    Close,
    Rebuild,
    Refresh {
        mode: RefreshMode,
    },
    Key(KeyEvent),
    /// One-shot long-press timer fired.
    LongPressTimeout {
        code: KeyCode,
        seq: u64,
    },
    Inspect {
        reply: oneshot::Sender<AppSnapshot>,
    },
}

/// Mailbox of the Application Manager.
#[derive(Debug)]
pub enum ManagerEvent {
    SwitchRequest {
        sender: String,
        target_app: String,
        target_window: Option<String>,
        payload: Option<SwitchPayload>,
    },
    SwitchPreviousRequest {
        sender: String,
        payload: Option<SwitchPayload>,
    },
    /// Start an application without giving it focus.
    LaunchRequest {
        sender: String,
        target_app: String,
    },
    ConfirmSwitch {
        sender: String,
    },
    ConfirmClose {
        sender: String,
    },
    Register {
        sender: String,
        success: bool,
        start_in_background: bool,
    },
    /// Deferred task teardown, posted by the Manager to itself.
    DelayedClose {
        target_app: String,
    },
    ChangeLanguage {
        language: Language,
    },
    /// Begin shutdown: arm the periodic close sweep.
    CloseApplications,
    CloseSweep,
    HandshakeTimeout {
        seq: u64,
    },
    Status {
        reply: oneshot::Sender<ManagerStatus>,
    },
}

/// Registry row as reported by a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    pub name: String,
    pub state: ApplicationState,
    pub closeable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub state: ManagerState,
    pub focus: Option<String>,
    pub previous: Option<String>,
    pub launching: Option<String>,
    pub queued: usize,
    pub applications: Vec<ApplicationStatus>,
}
