//! Application Manager actor.
//!
//! Sequences focus hand-offs between applications. At most one switch
//! handshake is in flight; requests arriving meanwhile wait in a FIFO queue
//! and are replayed once the Manager is idle again.

use crate::actor::{Receiver, Sender};
use crate::error::LifecycleError;
use crate::input::RouterCommand;
use crate::payload::SwitchPayload;
use crate::protocol::{
    AppEvent, ApplicationState, ManagerEvent, ManagerState, ManagerStatus, ShowMode,
};
use crate::registry::Registry;
use crate::settings::{Language, Settings, SettingsClient};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root application, focused at boot and the fallback for "previous".
    pub home: String,
    pub sweep_interval: Duration,
    /// Deadline for each waiting state. `None` disables it.
    pub handshake_timeout: Option<Duration>,
    pub settings_timeout: Duration,
}

/// A request that has to wait for the Manager to become idle.
#[derive(Debug)]
enum PendingRequest {
    Switch {
        target_app: String,
        target_window: Option<String>,
        payload: Option<SwitchPayload>,
    },
    SwitchPrevious {
        payload: Option<SwitchPayload>,
    },
    Launch {
        target_app: String,
    },
}

pub struct ApplicationManager {
    registry: Registry,
    state: ManagerState,
    focus: Option<String>,
    previous: Option<String>,
    launching: Option<String>,
    launch_in_background: bool,
    queue: VecDeque<PendingRequest>,
    mailbox: Sender<ManagerEvent>,
    input: Sender<RouterCommand>,
    settings_client: SettingsClient,
    settings: Settings,
    config: ManagerConfig,
    handshake_seq: u64,
    sweep: Option<JoinHandle<()>>,
    shutting_down: bool,
    finished: bool,
}

impl ApplicationManager {
    /// `mailbox` must be the sender for the receiver later passed to
    /// [`run`](Self::run).
    pub fn new(
        registry: Registry,
        config: ManagerConfig,
        mailbox: Sender<ManagerEvent>,
        input: Sender<RouterCommand>,
        settings_client: SettingsClient,
    ) -> Self {
        if !registry.contains(&config.home) {
            error!("Home application {} is not in the catalog", config.home);
        }

        ApplicationManager {
            registry,
            state: ManagerState::Idle,
            focus: None,
            previous: None,
            launching: None,
            launch_in_background: false,
            queue: VecDeque::new(),
            mailbox,
            input,
            settings_client,
            settings: Settings::default(),
            config,
            handshake_seq: 0,
            sweep: None,
            shutting_down: false,
            finished: false,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn run(mut self, mut rx: Receiver<ManagerEvent>) {
        self.boot().await;

        while !self.finished {
            let Some(event) = rx.recv().await else {
                break;
            };
            if let Err(e) = self.handle_event(event) {
                warn!("{}", e);
            }
        }

        if let Some(sweep) = self.sweep.take() {
            sweep.abort();
        }
        let closed = self.close_applications();
        info!("Application manager stopped, {} application(s) closed on exit", closed);
    }

    /// Load settings, start background applications, then bring up home.
    pub async fn boot(&mut self) {
        match self.settings_client.fetch(self.config.settings_timeout).await {
            Ok(settings) => self.settings = settings,
            Err(e) => warn!("{}, using default settings", e),
        }
        info!("Language: {}", self.settings.language);

        let background: Vec<String> = self
            .registry
            .iter()
            .filter(|e| e.launcher.boot_in_background())
            .map(|e| e.name.clone())
            .collect();
        for target_app in background {
            self.queue.push_back(PendingRequest::Launch { target_app });
        }
        self.queue.push_back(PendingRequest::Switch {
            target_app: self.config.home.clone(),
            target_window: None,
            payload: None,
        });
        self.drain_queue();
    }

    pub fn handle_event(&mut self, event: ManagerEvent) -> Result<(), LifecycleError> {
        match event {
            ManagerEvent::SwitchRequest {
                sender,
                target_app,
                target_window,
                payload,
            } => {
                debug!("{} requests switch to {}", sender, target_app);
                self.request(PendingRequest::Switch {
                    target_app,
                    target_window,
                    payload,
                })
            }
            ManagerEvent::SwitchPreviousRequest { sender, payload } => {
                debug!("{} requests previous application", sender);
                self.request(PendingRequest::SwitchPrevious { payload })
            }
            ManagerEvent::LaunchRequest { sender, target_app } => {
                debug!("{} requests launch of {}", sender, target_app);
                self.request(PendingRequest::Launch { target_app })
            }
            ManagerEvent::ConfirmSwitch { sender } => self.on_confirm_switch(&sender),
            ManagerEvent::ConfirmClose { sender } => self.on_confirm_close(&sender),
            ManagerEvent::Register {
                sender,
                success,
                start_in_background,
            } => self.on_register(&sender, success, start_in_background),
            ManagerEvent::DelayedClose { target_app } => self.on_delayed_close(&target_app),
            ManagerEvent::ChangeLanguage { language } => {
                self.change_language(language);
                Ok(())
            }
            ManagerEvent::CloseApplications => {
                self.begin_shutdown();
                Ok(())
            }
            ManagerEvent::CloseSweep => {
                if self.close_applications() == 0 && self.shutting_down {
                    info!("No applications left running");
                    self.finished = true;
                }
                Ok(())
            }
            ManagerEvent::HandshakeTimeout { seq } => self.on_handshake_timeout(seq),
            ManagerEvent::Status { reply } => {
                let _ = reply.send(self.status());
                Ok(())
            }
        }
    }

    fn request(&mut self, request: PendingRequest) -> Result<(), LifecycleError> {
        if self.shutting_down {
            warn!("Ignoring {:?} during shutdown", request);
            return Ok(());
        }
        if self.state != ManagerState::Idle {
            info!("Manager busy ({:?}), queueing {:?}", self.state, request);
            self.queue.push_back(request);
            return Ok(());
        }
        self.process(request)
    }

    fn process(&mut self, request: PendingRequest) -> Result<(), LifecycleError> {
        match request {
            PendingRequest::Switch {
                target_app,
                target_window,
                payload,
            } => self.begin_switch(target_app, target_window, payload),
            PendingRequest::SwitchPrevious { payload } => {
                let target = self
                    .previous
                    .clone()
                    .filter(|p| self.focus.as_ref() != Some(p))
                    .unwrap_or_else(|| self.config.home.clone());
                if self.focus.as_ref() == Some(&target) {
                    return Err(LifecycleError::NoPreviousApplication);
                }
                self.begin_switch(target, None, payload)
            }
            PendingRequest::Launch { target_app } => self.launch(target_app),
        }
    }

    fn drain_queue(&mut self) {
        while self.state == ManagerState::Idle && !self.shutting_down {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            if let Err(e) = self.process(request) {
                warn!("Dropped queued request: {}", e);
            }
        }
    }

    fn begin_switch(
        &mut self,
        target: String,
        window: Option<String>,
        payload: Option<SwitchPayload>,
    ) -> Result<(), LifecycleError> {
        if !self.registry.contains(&target) {
            return Err(LifecycleError::UnknownApplication(target));
        }
        if self.focus.as_ref() == Some(&target) {
            return Err(LifecycleError::AlreadyFocused(target));
        }

        info!(
            "Switching application to {} (window: {})",
            target,
            window.as_deref().unwrap_or("<default>")
        );
        let suppress_close = payload.as_ref().is_some_and(|p| p.suppress_app_close);
        if let Some(entry) = self.registry.get_mut(&target) {
            entry.stash(window, payload);
        }
        self.launching = Some(target.clone());
        self.launch_in_background = false;
        self.set_state(ManagerState::ClosingPreviousApp);
        self.input
            .send(RouterCommand::SetActiveApplication(target.clone()));

        match self.focus.clone() {
            Some(focused) => self.release_focused(&focused, suppress_close),
            None => self.start_application(&target),
        }
    }

    /// Ask the focused application to close or go to background.
    fn release_focused(
        &mut self,
        focused: &str,
        suppress_close: bool,
    ) -> Result<(), LifecycleError> {
        let closeable = self.registry.get(focused).is_some_and(|e| e.closeable);
        self.previous = Some(focused.to_string());

        let (event, next) = if closeable && !suppress_close {
            (AppEvent::Close, ManagerState::WaitingCloseConfirmation)
        } else {
            (
                AppEvent::Switch {
                    target_app: focused.to_string(),
                    target_window: None,
                    payload: None,
                    mode: ShowMode::Init,
                },
                ManagerState::WaitingLostFocusConfirmation,
            )
        };

        match self.deliver(focused, event) {
            Ok(()) => {
                self.set_state(next);
                Ok(())
            }
            Err(e) => {
                warn!("Could not release {}: {}", focused, e);
                self.force_stop(focused);
                self.start_pending()
            }
        }
    }

    fn start_pending(&mut self) -> Result<(), LifecycleError> {
        match self.launching.clone() {
            Some(target) => self.start_application(&target),
            None => {
                self.go_idle();
                Ok(())
            }
        }
    }

    fn start_application(&mut self, target: &str) -> Result<(), LifecycleError> {
        self.set_state(ManagerState::StartingNewApp);
        let background = self.launch_in_background;
        let entry = self
            .registry
            .get_mut(target)
            .ok_or_else(|| LifecycleError::UnknownApplication(target.to_string()))?;

        if entry.state == ApplicationState::ActiveBackground {
            debug!("{} is already running in background", target);
            let (target_window, payload) = entry.take_pending();
            let delivered = entry.launcher.deliver(AppEvent::Switch {
                target_app: target.to_string(),
                target_window,
                payload,
                mode: ShowMode::Init,
            });
            return match delivered {
                Ok(()) => {
                    self.set_state(ManagerState::WaitingFocusConfirmation);
                    Ok(())
                }
                Err(e) => {
                    self.abort_launch(target);
                    Err(e)
                }
            };
        }

        debug!("[{}] ({}) -> ({})", target, entry.state, ApplicationState::Initializing);
        entry.state = ApplicationState::Initializing;
        match entry.launcher.run(background) {
            Ok(()) => {
                self.set_state(ManagerState::WaitingNewAppRegistration);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start {}: {:#}", target, e);
                self.abort_launch(target);
                Ok(())
            }
        }
    }

    /// Start an application without handing it focus.
    fn launch(&mut self, target: String) -> Result<(), LifecycleError> {
        let entry = self
            .registry
            .get(&target)
            .ok_or_else(|| LifecycleError::UnknownApplication(target.clone()))?;
        if entry.state.is_started() {
            debug!("{} is already running", target);
            return Ok(());
        }

        info!("Launching {} in background", target);
        self.launching = Some(target.clone());
        self.launch_in_background = true;
        self.start_application(&target)
    }

    fn on_register(
        &mut self,
        sender: &str,
        success: bool,
        start_in_background: bool,
    ) -> Result<(), LifecycleError> {
        if !self.registry.contains(sender) {
            return Err(LifecycleError::UnknownApplication(sender.to_string()));
        }

        let is_target = self.launching.as_deref() == Some(sender)
            && self.state == ManagerState::WaitingNewAppRegistration;
        if !is_target {
            return self.on_unrelated_register(sender, success);
        }

        if !success {
            warn!("{} failed to initialise, aborting launch", sender);
            self.abort_launch(sender);
            return Ok(());
        }

        if start_in_background {
            info!("{} started in background", sender);
            self.mirror(sender, ApplicationState::ActiveBackground);
            self.launching = None;
            self.launch_in_background = false;
            self.go_idle();
            return Ok(());
        }

        self.mirror(sender, ApplicationState::Activating);
        let Some(entry) = self.registry.get_mut(sender) else {
            return Err(LifecycleError::UnknownApplication(sender.to_string()));
        };
        let (target_window, payload) = entry.take_pending();
        let delivered = entry.launcher.deliver(AppEvent::Switch {
            target_app: sender.to_string(),
            target_window,
            payload,
            mode: ShowMode::Init,
        });
        match delivered {
            Ok(()) => {
                self.set_state(ManagerState::WaitingFocusConfirmation);
                Ok(())
            }
            Err(e) => {
                self.abort_launch(sender);
                Err(e)
            }
        }
    }

    /// Registration from an application nobody is waiting for.
    fn on_unrelated_register(&mut self, sender: &str, success: bool) -> Result<(), LifecycleError> {
        let Some(entry) = self.registry.get_mut(sender) else {
            return Err(LifecycleError::UnknownApplication(sender.to_string()));
        };
        if !entry.launcher.is_running() {
            debug!("Ignoring registration from stopped {}", sender);
            return Ok(());
        }
        if success {
            self.mirror(sender, ApplicationState::ActiveBackground);
        } else {
            warn!("{} failed to initialise, stopping it", sender);
            self.force_stop(sender);
        }
        Ok(())
    }

    fn on_confirm_switch(&mut self, sender: &str) -> Result<(), LifecycleError> {
        match self.state {
            ManagerState::WaitingFocusConfirmation if self.launching.as_deref() == Some(sender) => {
                self.mirror(sender, ApplicationState::ActiveForeground);
                self.focus = self.launching.take();
                info!("{} has focus", sender);
                self.go_idle();
                Ok(())
            }
            ManagerState::WaitingLostFocusConfirmation if self.focus.as_deref() == Some(sender) => {
                self.mirror(sender, ApplicationState::ActiveBackground);
                self.previous = self.focus.take();
                self.start_pending()
            }
            state => Err(LifecycleError::UnexpectedConfirmation {
                kind: "ConfirmSwitch",
                sender: sender.to_string(),
                state,
            }),
        }
    }

    fn on_confirm_close(&mut self, sender: &str) -> Result<(), LifecycleError> {
        if self.state != ManagerState::WaitingCloseConfirmation
            || self.previous.as_deref() != Some(sender)
        {
            return Err(LifecycleError::UnexpectedConfirmation {
                kind: "ConfirmClose",
                sender: sender.to_string(),
                state: self.state,
            });
        }

        let closeable = self.registry.get(sender).is_some_and(|e| e.closeable);
        if closeable {
            self.mirror(sender, ApplicationState::Deactivated);
            // Tear the task down only after this turn has finished
            self.mailbox.send(ManagerEvent::DelayedClose {
                target_app: sender.to_string(),
            });
        } else {
            self.mirror(sender, ApplicationState::ActiveBackground);
        }
        if self.focus.as_deref() == Some(sender) {
            self.focus = None;
        }
        self.start_pending()
    }

    fn on_delayed_close(&mut self, target: &str) -> Result<(), LifecycleError> {
        let entry = self
            .registry
            .get_mut(target)
            .ok_or_else(|| LifecycleError::UnknownApplication(target.to_string()))?;
        if entry.state != ApplicationState::Deactivated {
            debug!("{} came back before its delayed close, keeping it", target);
            return Ok(());
        }
        entry.launcher.stop();
        Ok(())
    }

    fn on_handshake_timeout(&mut self, seq: u64) -> Result<(), LifecycleError> {
        if seq != self.handshake_seq || !self.state.is_waiting() {
            debug!("Stale handshake timeout #{}", seq);
            return Ok(());
        }

        warn!("Handshake timed out in {:?}", self.state);
        match self.state {
            ManagerState::WaitingCloseConfirmation | ManagerState::WaitingLostFocusConfirmation => {
                if let Some(stalled) = self.previous.clone() {
                    self.force_stop(&stalled);
                }
                self.start_pending()
            }
            _ => {
                match self.launching.clone() {
                    Some(target) => self.abort_launch(&target),
                    None => self.go_idle(),
                }
                Ok(())
            }
        }
    }

    /// Give up on the current launch and return to idle.
    fn abort_launch(&mut self, target: &str) {
        if let Some(entry) = self.registry.get_mut(target) {
            entry.launcher.stop();
            entry.take_pending();
        }
        self.mirror(target, ApplicationState::Deactivated);
        self.launching = None;
        self.launch_in_background = false;

        match self.focus.clone() {
            Some(focused) => {
                self.input.send(RouterCommand::SetActiveApplication(focused));
            }
            None if target != self.config.home => {
                warn!("Nothing has focus, falling back to {}", self.config.home);
                self.queue.push_front(PendingRequest::Switch {
                    target_app: self.config.home.clone(),
                    target_window: None,
                    payload: None,
                });
            }
            None => error!("Home application {} failed to start", target),
        }
        self.go_idle();
    }

    /// Stop an application without a handshake.
    fn force_stop(&mut self, app: &str) {
        if let Some(entry) = self.registry.get_mut(app) {
            entry.launcher.stop();
        }
        self.mirror(app, ApplicationState::Deactivated);
        if self.focus.as_deref() == Some(app) {
            self.focus = None;
        }
    }

    fn change_language(&mut self, language: Language) {
        if self.settings.language == language {
            warn!("Language already set to {}", language);
            return;
        }

        info!("Changing language to {}", language);
        self.settings.language = language;
        if !self.settings_client.update(self.settings.clone()) {
            warn!("Settings store is gone, language change not persisted");
        }
        for entry in self.registry.iter().filter(|e| {
            matches!(
                e.state,
                ApplicationState::ActiveForeground | ApplicationState::ActiveBackground
            )
        }) {
            if let Err(e) = entry.launcher.deliver(AppEvent::Rebuild) {
                warn!("Rebuild of {} failed: {}", entry.name, e);
            }
        }
    }

    fn begin_shutdown(&mut self) {
        if self.shutting_down {
            debug!("Shutdown already in progress");
            return;
        }

        info!("Closing all applications");
        self.shutting_down = true;
        self.queue.clear();

        let mailbox = self.mailbox.clone();
        let period = self.config.sweep_interval;
        self.sweep = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !mailbox.send(ManagerEvent::CloseSweep) {
                    break;
                }
            }
        }));
    }

    /// Force-stop every started application. Returns how many were stopped.
    fn close_applications(&mut self) -> usize {
        let mut closed = 0;
        for entry in self.registry.iter_mut().filter(|e| e.state.is_started()) {
            info!("Force closing {}", entry.name);
            entry.launcher.stop();
            debug!("[{}] ({}) -> ({})", entry.name, entry.state, ApplicationState::Deactivated);
            entry.state = ApplicationState::Deactivated;
            if self.focus.as_ref() == Some(&entry.name) {
                self.focus = None;
            }
            closed += 1;
        }
        closed
    }

    fn go_idle(&mut self) {
        self.set_state(ManagerState::Idle);
        self.drain_queue();
    }

    fn set_state(&mut self, state: ManagerState) {
        debug!("Manager ({:?}) -> ({:?})", self.state, state);
        self.state = state;
        self.handshake_seq += 1;

        if state.is_waiting()
            && let Some(timeout) = self.config.handshake_timeout
        {
            let mailbox = self.mailbox.clone();
            let seq = self.handshake_seq;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                mailbox.send(ManagerEvent::HandshakeTimeout { seq });
            });
        }
    }

    fn mirror(&mut self, app: &str, state: ApplicationState) {
        if let Some(entry) = self.registry.get_mut(app) {
            debug!("[{}] ({}) -> ({})", app, entry.state, state);
            entry.state = state;
        }
    }

    fn deliver(&self, app: &str, event: AppEvent) -> Result<(), LifecycleError> {
        self.registry
            .get(app)
            .ok_or_else(|| LifecycleError::UnknownApplication(app.to_string()))?
            .launcher
            .deliver(event)
    }

    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            state: self.state,
            focus: self.focus.clone(),
            previous: self.previous.clone(),
            launching: self.launching.clone(),
            queued: self.queue.len(),
            applications: self.registry.iter().map(|e| e.status()).collect(),
        }
    }
}
