//! Manager-side table of known applications.
//!
//! Built once from the launcher list and mutated only from the Manager's own
//! task. Entries are never removed; only the application tasks behind them
//! come and go.

use crate::launcher::Launcher;
use crate::payload::SwitchPayload;
use crate::protocol::{ApplicationState, ApplicationStatus};
use std::collections::BTreeMap;
use tracing::warn;

pub struct RegistryEntry {
    pub name: String,
    pub launcher: Box<dyn Launcher>,
    pub closeable: bool,
    /// Manager's copy of the application's own state.
    pub state: ApplicationState,
    pub pending_window: Option<String>,
    pub pending_payload: Option<SwitchPayload>,
}

impl RegistryEntry {
    pub fn new(launcher: Box<dyn Launcher>) -> Self {
        RegistryEntry {
            name: launcher.name().to_string(),
            closeable: launcher.closeable(),
            launcher,
            state: ApplicationState::Deactivated,
            pending_window: None,
            pending_payload: None,
        }
    }

    /// Hold a switch target until the application is ready for it.
    pub fn stash(&mut self, window: Option<String>, payload: Option<SwitchPayload>) {
        self.pending_window = window;
        self.pending_payload = payload;
    }

    pub fn take_pending(&mut self) -> (Option<String>, Option<SwitchPayload>) {
        (self.pending_window.take(), self.pending_payload.take())
    }

    pub fn status(&self) -> ApplicationStatus {
        ApplicationStatus {
            name: self.name.clone(),
            state: self.state,
            closeable: self.closeable,
        }
    }
}

#[derive(Default)]
pub struct Registry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new(launchers: Vec<Box<dyn Launcher>>) -> Self {
        let mut entries = BTreeMap::new();
        for launcher in launchers {
            let entry = RegistryEntry::new(launcher);
            if entries.contains_key(&entry.name) {
                warn!("Duplicate application {} ignored", entry.name);
                continue;
            }
            entries.insert(entry.name.clone(), entry);
        }
        Registry { entries }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegistryEntry> {
        self.entries.values_mut()
    }

    /// Names of the applications mirrored in the foreground.
    pub fn foreground(&self) -> Vec<&str> {
        self.iter()
            .filter(|e| e.state == ApplicationState::ActiveForeground)
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::recording::{CallLog, RecordingLauncher};

    fn registry() -> Registry {
        let log = CallLog::default();
        Registry::new(vec![
            RecordingLauncher::new("desktop", false, &log).boxed(),
            RecordingLauncher::new("messages", true, &log).boxed(),
            RecordingLauncher::new("messages", false, &log).boxed(),
        ])
    }

    #[test]
    fn test_entries_built_from_launchers() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        let messages = registry.get("messages").unwrap();
        assert!(messages.closeable, "first launcher with a name wins");
        assert_eq!(messages.state, ApplicationState::Deactivated);
        assert!(!registry.get("desktop").unwrap().closeable);
        assert!(registry.get("music").is_none());
    }

    #[test]
    fn test_stash_and_take_pending() {
        let mut registry = registry();
        let entry = registry.get_mut("messages").unwrap();
        entry.stash(Some("thread".to_string()), Some(SwitchPayload::new("sms")));
        let (window, payload) = entry.take_pending();
        assert_eq!(window.as_deref(), Some("thread"));
        assert_eq!(payload.unwrap().description(), "sms");
        let (window, payload) = entry.take_pending();
        assert!(window.is_none() && payload.is_none());
    }

    #[test]
    fn test_foreground_listing() {
        let mut registry = registry();
        assert!(registry.foreground().is_empty());
        registry.get_mut("desktop").unwrap().state = ApplicationState::ActiveForeground;
        assert_eq!(registry.foreground(), vec!["desktop"]);
    }
}
