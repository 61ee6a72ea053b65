//! Task start/stop for applications.
//!
//! The Manager never touches an application task directly. It goes through
//! a [`Launcher`], which owns the ability to start and stop the task and the
//! sending half of its mailbox.

use crate::actor::{self, Sender};
use crate::application::{AppContext, Application};
use crate::error::LifecycleError;
use crate::input::RouterCommand;
use crate::protocol::AppEvent;
use crate::window::AppWindow;
use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Trait for starting, stopping and addressing one application.
///
/// This abstraction allows the Manager to be tested with a recording double.
pub trait Launcher: Send {
    fn name(&self) -> &str;

    /// Whether losing focus closes the application instead of backgrounding it.
    fn closeable(&self) -> bool;

    /// Whether the application is started in background at boot.
    fn boot_in_background(&self) -> bool {
        false
    }

    fn run(&mut self, background: bool) -> Result<()>;

    /// Tear the task down. Returns false if nothing was running.
    fn stop(&mut self) -> bool;

    fn is_running(&self) -> bool;

    /// Post an event to the application's mailbox.
    fn deliver(&self, event: AppEvent) -> Result<(), LifecycleError>;
}

/// Static description of an application.
#[derive(Clone)]
pub struct AppSpec {
    pub name: String,
    pub closeable: bool,
    pub boot_in_background: bool,
    pub windows: fn() -> Vec<Box<dyn AppWindow>>,
}

struct RunningApp {
    mailbox: Sender<AppEvent>,
    handle: JoinHandle<()>,
}

/// Runs an [`Application`] actor as a tokio task.
pub struct TaskLauncher {
    spec: AppSpec,
    ctx: AppContext,
    router: Sender<RouterCommand>,
    running: Option<RunningApp>,
}

impl TaskLauncher {
    pub fn new(spec: AppSpec, ctx: AppContext, router: Sender<RouterCommand>) -> Self {
        TaskLauncher {
            spec,
            ctx,
            router,
            running: None,
        }
    }
}

impl Launcher for TaskLauncher {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn closeable(&self) -> bool {
        self.spec.closeable
    }

    fn boot_in_background(&self) -> bool {
        self.spec.boot_in_background
    }

    fn run(&mut self, background: bool) -> Result<()> {
        if self.running.is_some() {
            warn!("{} is already running, restarting it", self.spec.name);
            self.stop();
        }

        let runtime = tokio::runtime::Handle::try_current()
            .with_context(|| format!("No runtime to start {} on", self.spec.name))?;

        let (mailbox, rx) = actor::channel();
        let app = Application::new(
            &self.spec.name,
            (self.spec.windows)(),
            background,
            self.ctx.clone(),
            mailbox.clone(),
        );
        let handle = runtime.spawn(app.run(rx));

        self.router.send(RouterCommand::Attach {
            app: self.spec.name.clone(),
            mailbox: mailbox.clone(),
        });
        self.running = Some(RunningApp { mailbox, handle });

        info!(
            "Started {}{}",
            self.spec.name,
            if background { " in background" } else { "" }
        );
        Ok(())
    }

    fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            debug!("{} is not running", self.spec.name);
            return false;
        };
        running.handle.abort();
        self.router.send(RouterCommand::Detach {
            app: self.spec.name.clone(),
        });
        info!("Stopped {}", self.spec.name);
        true
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    fn deliver(&self, event: AppEvent) -> Result<(), LifecycleError> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| LifecycleError::NotRunning(self.spec.name.clone()))?;
        if running.mailbox.send(event) {
            Ok(())
        } else {
            Err(LifecycleError::NotRunning(self.spec.name.clone()))
        }
    }
}

impl Drop for TaskLauncher {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ManagerEvent, ShowMode};
    use crate::settings::{Settings, SettingsStore};
    use crate::window::BasicWindow;
    use std::time::Duration;

    fn windows() -> Vec<Box<dyn AppWindow>> {
        vec![BasicWindow::boxed("main", "Clock", vec![])]
    }

    fn launcher() -> (
        TaskLauncher,
        actor::Receiver<ManagerEvent>,
        actor::Receiver<RouterCommand>,
    ) {
        let (manager, manager_rx) = actor::channel();
        let (gui, _gui_rx) = actor::channel();
        let (router, router_rx) = actor::channel();
        let ctx = AppContext {
            manager,
            gui,
            settings: SettingsStore::new(Settings::default(), None).spawn(),
            settings_timeout: Duration::from_secs(1),
            long_press: Duration::from_secs(1),
        };
        let spec = AppSpec {
            name: "clock".to_string(),
            closeable: true,
            boot_in_background: false,
            windows,
        };
        (TaskLauncher::new(spec, ctx, router), manager_rx, router_rx)
    }

    #[tokio::test]
    async fn test_run_registers_and_attaches() {
        let (mut launcher, mut manager_rx, mut router_rx) = launcher();
        assert!(!launcher.is_running());
        launcher.run(false).unwrap();
        assert!(launcher.is_running());

        assert!(matches!(
            router_rx.recv().await,
            Some(RouterCommand::Attach { app, .. }) if app == "clock"
        ));
        let registered = tokio::time::timeout(Duration::from_secs(1), manager_rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            registered,
            Some(ManagerEvent::Register {
                sender,
                success: true,
                start_in_background: false,
            }) if sender == "clock"
        ));
    }

    #[tokio::test]
    async fn test_deliver_and_stop() {
        let (mut launcher, mut manager_rx, mut router_rx) = launcher();
        assert!(matches!(
            launcher.deliver(AppEvent::Close),
            Err(LifecycleError::NotRunning(_))
        ));

        launcher.run(false).unwrap();
        manager_rx.recv().await;
        launcher
            .deliver(AppEvent::Switch {
                target_app: "clock".to_string(),
                target_window: None,
                payload: None,
                mode: ShowMode::Init,
            })
            .unwrap();
        let confirmed = tokio::time::timeout(Duration::from_secs(1), manager_rx.recv())
            .await
            .unwrap();
        assert!(matches!(confirmed, Some(ManagerEvent::ConfirmSwitch { .. })));

        assert!(launcher.stop());
        assert!(!launcher.stop());
        assert!(!launcher.is_running());
        router_rx.recv().await; // attach
        assert!(matches!(router_rx.recv().await, Some(RouterCommand::Detach { .. })));
    }

    #[test]
    fn test_run_without_runtime_fails() {
        let (manager, _manager_rx) = actor::channel();
        let (gui, _gui_rx) = actor::channel();
        let (router, _router_rx) = actor::channel();
        let (settings_tx, _settings_rx) = actor::channel();
        let ctx = AppContext {
            manager,
            gui,
            settings: crate::settings::SettingsClient::from_sender(settings_tx),
            settings_timeout: Duration::from_secs(1),
            long_press: Duration::from_secs(1),
        };
        let spec = AppSpec {
            name: "clock".to_string(),
            closeable: true,
            boot_in_background: false,
            windows,
        };
        let mut launcher = TaskLauncher::new(spec, ctx, router);
        assert!(launcher.run(false).is_err());
        assert!(!launcher.is_running());
    }
}
