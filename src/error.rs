use crate::protocol::{ApplicationState, ManagerState};
use thiserror::Error;

/// Recoverable lifecycle errors. Actors log these and keep running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("unknown application: {0}")]
    UnknownApplication(String),

    #[error("unknown window {window} in application {app}")]
    UnknownWindow { app: String, window: String },

    #[error("application {0} already has focus")]
    AlreadyFocused(String),

    #[error("no previous application recorded")]
    NoPreviousApplication,

    #[error("unexpected {kind} from {sender} while {state:?}")]
    UnexpectedConfirmation {
        kind: &'static str,
        sender: String,
        state: ManagerState,
    },

    #[error("switch for {app} received outside of activation flow in state {state}")]
    UnexpectedSwitch { app: String, state: ApplicationState },

    #[error("application {0} is not running")]
    NotRunning(String),

    #[error("settings store unavailable: {0}")]
    SettingsUnavailable(String),
}
