//! Input-routing collaborator.
//!
//! Keeps track of which application should receive key events and forwards
//! raw keys to its mailbox. The Manager repoints it at the start of every
//! switch, before the handshake completes, so keys typed mid-switch reach the
//! incoming application.

use crate::actor::{self, Receiver, Sender};
use crate::protocol::{AppEvent, AppSnapshot, KeyEvent};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum RouterCommand {
    SetActiveApplication(String),
    /// A launcher started an application task.
    Attach { app: String, mailbox: Sender<AppEvent> },
    /// A launcher stopped an application task.
    Detach { app: String },
    Key(KeyEvent),
    /// Ask a running application for its snapshot. The reply is dropped if
    /// the application is not attached.
    Inspect {
        app: String,
        reply: oneshot::Sender<AppSnapshot>,
    },
}

#[derive(Default)]
pub struct InputRouter {
    active: Option<String>,
    mailboxes: HashMap<String, Sender<AppEvent>>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(self) -> Sender<RouterCommand> {
        let (tx, rx) = actor::channel();
        tokio::spawn(self.run(rx));
        tx
    }

    async fn run(mut self, mut rx: Receiver<RouterCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!("Input router stopped");
    }

    fn handle(&mut self, command: RouterCommand) {
        match command {
            RouterCommand::SetActiveApplication(app) => {
                info!("Routing input to {}", app);
                self.active = Some(app);
            }
            RouterCommand::Attach { app, mailbox } => {
                debug!("Attached mailbox for {}", app);
                self.mailboxes.insert(app, mailbox);
            }
            RouterCommand::Detach { app } => {
                debug!("Detached mailbox for {}", app);
                self.mailboxes.remove(&app);
            }
            RouterCommand::Key(key) => self.route_key(key),
            RouterCommand::Inspect { app, reply } => match self.mailboxes.get(&app) {
                Some(mailbox) => {
                    mailbox.send(AppEvent::Inspect { reply });
                }
                None => debug!("Cannot inspect {}: not running", app),
            },
        }
    }

    fn route_key(&self, key: KeyEvent) {
        let Some(active) = &self.active else {
            warn!("Dropping {:?}: no active application", key);
            return;
        };
        match self.mailboxes.get(active) {
            Some(mailbox) => {
                if !mailbox.send(AppEvent::Key(key)) {
                    warn!("Dropping {:?}: {} mailbox closed", key, active);
                }
            }
            None => warn!("Dropping {:?}: {} is not running", key, active),
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::KeyCode;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent { code, pressed: true }
    }

    #[test]
    fn test_routes_to_active_only() {
        let mut router = InputRouter::new();
        let (desktop_tx, mut desktop_rx) = actor::channel();
        let (music_tx, mut music_rx) = actor::channel();
        router.handle(RouterCommand::Attach { app: "desktop".to_string(), mailbox: desktop_tx });
        router.handle(RouterCommand::Attach { app: "music".to_string(), mailbox: music_tx });

        router.handle(RouterCommand::SetActiveApplication("music".to_string()));
        router.handle(RouterCommand::Key(key(KeyCode::Enter)));

        assert!(matches!(music_rx.try_recv(), Ok(AppEvent::Key(k)) if k.code == KeyCode::Enter));
        assert!(desktop_rx.try_recv().is_err());
        assert_eq!(router.active(), Some("music"));
    }

    #[test]
    fn test_key_without_active_app_is_dropped() {
        let mut router = InputRouter::new();
        let (tx, mut rx) = actor::channel();
        router.handle(RouterCommand::Attach { app: "desktop".to_string(), mailbox: tx });
        router.handle(RouterCommand::Key(key(KeyCode::Back)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detached_app_gets_nothing() {
        let mut router = InputRouter::new();
        let (tx, mut rx) = actor::channel();
        router.handle(RouterCommand::Attach { app: "messages".to_string(), mailbox: tx });
        router.handle(RouterCommand::SetActiveApplication("messages".to_string()));
        router.handle(RouterCommand::Detach { app: "messages".to_string() });
        router.handle(RouterCommand::Key(key(KeyCode::Up)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_inspect_forwarded_to_app() {
        let mut router = InputRouter::new();
        let (tx, mut rx) = actor::channel();
        router.handle(RouterCommand::Attach { app: "music".to_string(), mailbox: tx });

        let (reply, _answer) = oneshot::channel();
        router.handle(RouterCommand::Inspect { app: "music".to_string(), reply });
        assert!(matches!(rx.try_recv(), Ok(AppEvent::Inspect { .. })));

        let (reply, mut answer) = oneshot::channel();
        router.handle(RouterCommand::Inspect { app: "radio".to_string(), reply });
        assert!(answer.try_recv().is_err());
    }
}
