//! Daemon wiring.
//!
//! Spawns the collaborators, builds a task launcher per catalog entry, runs
//! the Manager and bridges control-socket commands into the actor system.

use crate::actor::{self, Sender};
use crate::application::AppContext;
use crate::catalog;
use crate::config::Config;
use crate::gui::GuiService;
use crate::input::{InputRouter, RouterCommand};
use crate::ipc::{self, IpcCommand, IpcResponse};
use crate::launcher::{Launcher, TaskLauncher};
use crate::manager::ApplicationManager;
use crate::protocol::{KeyCode, KeyEvent, ManagerEvent};
use crate::registry::Registry;
use crate::settings::{Settings, SettingsStore};
use crate::socket_server;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const IPC_SENDER: &str = "ipc";
const STATUS_TIMEOUT: Duration = Duration::from_secs(1);

/// Handles to a running actor system.
pub struct Services {
    manager: Sender<ManagerEvent>,
    router: Sender<RouterCommand>,
    long_press: Duration,
    manager_task: JoinHandle<()>,
}

impl Services {
    /// Spawn every actor. Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let settings_path = config.settings_path()?;
        let settings = Settings::load(&settings_path).unwrap_or_else(|e| {
            warn!("{:#}, using default settings", e);
            Settings::default()
        });
        let settings = SettingsStore::new(settings, Some(settings_path)).spawn();
        let gui = GuiService::new().spawn();
        let router = InputRouter::new().spawn();
        let (manager, manager_rx) = actor::channel();

        let ctx = AppContext {
            manager: manager.clone(),
            gui,
            settings: settings.clone(),
            settings_timeout: config.settings_timeout(),
            long_press: config.long_press(),
        };
        let launchers: Vec<Box<dyn Launcher>> = catalog::builtin()
            .into_iter()
            .map(|spec| {
                Box::new(TaskLauncher::new(spec, ctx.clone(), router.clone())) as Box<dyn Launcher>
            })
            .collect();
        info!("Loaded {} application(s)", launchers.len());

        let app_manager = ApplicationManager::new(
            Registry::new(launchers),
            config.manager_config(),
            manager.clone(),
            router.clone(),
            settings,
        );
        let manager_task = tokio::spawn(app_manager.run(manager_rx));

        Ok(Services {
            manager,
            router,
            long_press: config.long_press(),
            manager_task,
        })
    }

    pub async fn handle_command(&self, command: IpcCommand) -> IpcResponse {
        match command {
            IpcCommand::Switch { app, window } => self.post(ManagerEvent::SwitchRequest {
                sender: IPC_SENDER.to_string(),
                target_app: app,
                target_window: window,
                payload: None,
            }),
            IpcCommand::Launch { app } => self.post(ManagerEvent::LaunchRequest {
                sender: IPC_SENDER.to_string(),
                target_app: app,
            }),
            IpcCommand::Back => self.post(ManagerEvent::SwitchPreviousRequest {
                sender: IPC_SENDER.to_string(),
                payload: None,
            }),
            IpcCommand::Key { key, long } => self.press_key(key, long),
            IpcCommand::Language { language } => {
                self.post(ManagerEvent::ChangeLanguage { language })
            }
            IpcCommand::Status => self.status().await,
            IpcCommand::Shutdown => self.shutdown(),
        }
    }

    fn post(&self, event: ManagerEvent) -> IpcResponse {
        if self.manager.send(event) {
            IpcResponse::Ok
        } else {
            IpcResponse::Error("Application manager has stopped".to_string())
        }
    }

    /// Press and release `code`. A long press is held past the detection time.
    fn press_key(&self, code: KeyCode, long: bool) -> IpcResponse {
        if !self.router.send(RouterCommand::Key(KeyEvent { code, pressed: true })) {
            return IpcResponse::Error("Input router has stopped".to_string());
        }
        let release = RouterCommand::Key(KeyEvent { code, pressed: false });
        if long {
            let router = self.router.clone();
            let hold = self.long_press + Duration::from_millis(50);
            tokio::spawn(async move {
                tokio::time::sleep(hold).await;
                router.send(release);
            });
        } else {
            self.router.send(release);
        }
        IpcResponse::Ok
    }

    async fn status(&self) -> IpcResponse {
        let (reply, answer) = oneshot::channel();
        if !self.manager.send(ManagerEvent::Status { reply }) {
            return IpcResponse::Error("Application manager has stopped".to_string());
        }
        let manager = match tokio::time::timeout(STATUS_TIMEOUT, answer).await {
            Ok(Ok(status)) => status,
            _ => return IpcResponse::Error("Application manager did not answer".to_string()),
        };

        let focused = match &manager.focus {
            Some(app) => {
                let (reply, answer) = oneshot::channel();
                self.router.send(RouterCommand::Inspect {
                    app: app.clone(),
                    reply,
                });
                tokio::time::timeout(STATUS_TIMEOUT, answer)
                    .await
                    .ok()
                    .and_then(|answer| answer.ok())
            }
            None => None,
        };

        IpcResponse::Status { manager, focused }
    }

    pub fn shutdown(&self) -> IpcResponse {
        info!("Shutdown requested");
        self.post(ManagerEvent::CloseApplications)
    }
}

pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Daemon { config }
    }

    /// Main event loop
    pub async fn run(self) -> Result<()> {
        let (mut ipc_rx, _socket_guard) =
            socket_server::start_server(&ipc::get_socket_path()?).await?;
        let mut services = Services::start(&self.config)?;
        info!("Starting daemon event loop");

        loop {
            tokio::select! {
                Some(request) = ipc_rx.recv() => {
                    let response = services.handle_command(request.command).await;
                    if request.reply.send(response).is_err() {
                        warn!("IPC client went away before the response");
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        error!("Failed to listen for ctrl-c: {}", e);
                    }
                    services.shutdown();
                }
                result = &mut services.manager_task => {
                    if let Err(e) = result {
                        error!("Application manager task failed: {}", e);
                    }
                    info!("Application manager finished, shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ApplicationState, ManagerState, ManagerStatus};
    use clap::Parser;

    fn config(name: &str) -> Config {
        let settings = std::env::temp_dir()
            .join(format!("appmgr-daemon-{}-{}", name, std::process::id()))
            .join("settings.json");
        Config::try_parse_from([
            "appmgr",
            "--settings-file",
            settings.to_str().unwrap(),
            "--sweep-interval-ms",
            "10",
            "--long-press-ms",
            "50",
        ])
        .unwrap()
    }

    async fn status(services: &Services) -> (ManagerStatus, Option<crate::protocol::AppSnapshot>) {
        match services.handle_command(IpcCommand::Status).await {
            IpcResponse::Status { manager, focused } => (manager, focused),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    /// Poll the status until `done` holds.
    async fn wait_for(services: &Services, done: impl Fn(&ManagerStatus) -> bool) -> ManagerStatus {
        for _ in 0..200 {
            let (manager, _) = status(services).await;
            if done(&manager) {
                return manager;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    fn idle_on(app: &'static str) -> impl Fn(&ManagerStatus) -> bool {
        move |s: &ManagerStatus| {
            s.state == ManagerState::Idle && s.focus.as_deref() == Some(app) && s.queued == 0
        }
    }

    #[tokio::test]
    async fn test_boot_switch_and_shutdown() {
        let services = Services::start(&config("e2e")).unwrap();

        let booted = wait_for(&services, idle_on(catalog::DESKTOP)).await;
        let call = booted
            .applications
            .iter()
            .find(|a| a.name == catalog::CALL)
            .unwrap();
        assert_eq!(call.state, ApplicationState::ActiveBackground);

        // Desktop main -> menu, then open Messages from the menu
        services.handle_command(IpcCommand::Key { key: KeyCode::Enter, long: false }).await;
        let (_, focused) = status(&services).await;
        let focused = focused.unwrap();
        assert_eq!(focused.name, catalog::DESKTOP);

        services.handle_command(IpcCommand::Key { key: KeyCode::Num(1), long: false }).await;
        let switched = wait_for(&services, idle_on(catalog::MESSAGES)).await;
        assert_eq!(switched.previous.as_deref(), Some(catalog::DESKTOP));

        // Back to the desktop, which kept its window stack
        assert!(matches!(
            services.handle_command(IpcCommand::Back).await,
            IpcResponse::Ok
        ));
        wait_for(&services, idle_on(catalog::DESKTOP)).await;
        let (manager, focused) = status(&services).await;
        assert_eq!(focused.unwrap().window_stack, vec!["main".to_string(), "menu".to_string()]);
        let messages = manager
            .applications
            .iter()
            .find(|a| a.name == catalog::MESSAGES)
            .unwrap();
        assert_eq!(messages.state, ApplicationState::Deactivated);

        assert!(matches!(services.shutdown(), IpcResponse::Ok));
        tokio::time::timeout(Duration::from_secs(2), services.manager_task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_switch_to_window_via_ipc() {
        let services = Services::start(&config("window")).unwrap();
        wait_for(&services, idle_on(catalog::DESKTOP)).await;

        services
            .handle_command(IpcCommand::Switch {
                app: catalog::MUSIC.to_string(),
                window: Some("library".to_string()),
            })
            .await;
        wait_for(&services, idle_on(catalog::MUSIC)).await;

        let (_, focused) = status(&services).await;
        let focused = focused.unwrap();
        assert_eq!(focused.current_window, "library");
        assert_eq!(focused.state, ApplicationState::ActiveForeground);
    }
}
