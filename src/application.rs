//! Application actor.
//!
//! Each application runs on its own task with a private mailbox. It owns its
//! lifecycle state, its windows and its window stack, and speaks the
//! registration/confirmation protocol with the Manager. The Manager keeps a
//! mirror of the state; the two are kept in step only by handshake messages.

use crate::actor::{Receiver, Sender};
use crate::error::LifecycleError;
use crate::gui::GuiCommand;
use crate::payload::SwitchPayload;
use crate::protocol::{
    AppEvent, AppSnapshot, ApplicationState, InputEvent, KeyCode, KeyEvent, ManagerEvent,
    RefreshMode, ShowMode,
};
use crate::settings::{Settings, SettingsClient};
use crate::window::{AppWindow, InputOutcome};
use crate::window_stack::{MAIN_WINDOW, WindowStack};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Collaborators every application talks to.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub manager: Sender<ManagerEvent>,
    pub gui: Sender<GuiCommand>,
    pub settings: SettingsClient,
    pub settings_timeout: Duration,
    pub long_press: Duration,
}

/// Key currently held down, for long-press detection.
#[derive(Debug, Clone, Copy)]
struct HeldKey {
    code: KeyCode,
    seq: u64,
    long_fired: bool,
}

pub struct Application {
    name: String,
    state: ApplicationState,
    start_in_background: bool,
    windows: HashMap<String, Box<dyn AppWindow>>,
    stack: WindowStack,
    settings: Settings,
    ctx: AppContext,
    mailbox: Sender<AppEvent>,
    held: Option<HeldKey>,
    key_seq: u64,
    /// Set once "back" ran off the bottom of the stack; the stack is only
    /// cleared when focus is actually handed to another application.
    leaving: bool,
}

impl Application {
    /// Create an application. `mailbox` must be the sender for the receiver
    /// later passed to [`run`](Self::run); the application posts to itself
    /// through it.
    pub fn new(
        name: &str,
        windows: Vec<Box<dyn AppWindow>>,
        start_in_background: bool,
        ctx: AppContext,
        mailbox: Sender<AppEvent>,
    ) -> Self {
        let windows = windows
            .into_iter()
            .map(|w| (w.name().to_string(), w))
            .collect();

        Application {
            name: name.to_string(),
            state: ApplicationState::Deactivated,
            start_in_background,
            windows,
            stack: WindowStack::new(),
            settings: Settings::default(),
            ctx,
            mailbox,
            held: None,
            key_seq: 0,
            leaving: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    pub fn stack(&self) -> &WindowStack {
        &self.stack
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn set_state(&mut self, state: ApplicationState) {
        debug!("[{}] ({}) -> ({})", self.name, self.state, state);
        self.state = state;
    }

    /// Main event loop. Initialises first; lifecycle messages are only
    /// processed once registration has been reported.
    pub async fn run(mut self, mut rx: Receiver<AppEvent>) {
        if !self.init().await {
            warn!("[{}] initialisation failed, stopping", self.name);
            return;
        }

        while let Some(event) = rx.recv().await {
            if let Err(e) = self.handle_event(event) {
                warn!("[{}] {}", self.name, e);
            }
        }

        info!("Closing an application: {}", self.name);
        self.close_windows();
    }

    /// Fetch settings and register with the Manager.
    pub async fn init(&mut self) -> bool {
        self.set_state(ApplicationState::Initializing);

        let success = match self.ctx.settings.fetch(self.ctx.settings_timeout).await {
            Ok(settings) => {
                self.settings = settings;
                true
            }
            Err(e) => {
                error!("[{}] {}", self.name, e);
                false
            }
        };

        if success && self.start_in_background {
            self.set_state(ApplicationState::ActiveBackground);
        }

        self.ctx.manager.send(ManagerEvent::Register {
            sender: self.name.clone(),
            success,
            start_in_background: self.start_in_background,
        });
        success
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Result<(), LifecycleError> {
        match event {
            AppEvent::Switch {
                target_app,
                target_window,
                payload,
                mode,
            } => self.handle_switch(&target_app, target_window, payload, mode),
            AppEvent::SwitchWindow {
                window,
                mode,
                payload,
            } => self.handle_switch_window(&window, mode, payload),
            AppEvent::Close => {
                self.handle_close();
                Ok(())
            }
            AppEvent::Rebuild => {
                self.handle_rebuild();
                Ok(())
            }
            AppEvent::Refresh { mode } => self.render(mode),
            AppEvent::Key(key) => {
                self.handle_key(key);
                Ok(())
            }
            AppEvent::LongPressTimeout { code, seq } => {
                self.handle_long_press(code, seq);
                Ok(())
            }
            AppEvent::Inspect { reply } => {
                let _ = reply.send(self.snapshot());
                Ok(())
            }
        }
    }

    fn handle_switch(
        &mut self,
        target_app: &str,
        target_window: Option<String>,
        payload: Option<SwitchPayload>,
        mode: ShowMode,
    ) -> Result<(), LifecycleError> {
        debug!("AppSwitch: {} in state {}", target_app, self.state);
        if target_app != self.name {
            return Err(LifecycleError::UnexpectedSwitch {
                app: target_app.to_string(),
                state: self.state,
            });
        }

        match self.state {
            ApplicationState::Initializing
            | ApplicationState::Activating
            | ApplicationState::ActiveBackground => {
                self.leaving = false;
                self.set_state(ApplicationState::ActiveForeground);
                self.confirm_switch();
                info!(
                    "[{}] target window: {} payload: {}",
                    self.name,
                    target_window.as_deref().unwrap_or("<last>"),
                    payload.as_ref().map(|p| p.description()).unwrap_or("")
                );
                match target_window {
                    Some(window) => self.switch_window(&window, mode, payload),
                    // Returning to the application: reshow whatever was on top
                    None if !self.stack.is_empty() => {
                        let current = self.stack.current().to_string();
                        self.switch_window(&current, ShowMode::Return, payload);
                    }
                    None => self.switch_window(MAIN_WINDOW, mode, payload),
                }
                Ok(())
            }
            ApplicationState::ActiveForeground => {
                if target_window.is_none() && payload.is_none() {
                    // Empty switch while in front means "go to background"
                    self.set_state(ApplicationState::ActiveBackground);
                    self.forget_stack_if_leaving();
                    self.confirm_switch();
                } else {
                    let window = target_window.unwrap_or_else(|| self.stack.current().to_string());
                    self.switch_window(&window, mode, payload);
                }
                Ok(())
            }
            state => Err(LifecycleError::UnexpectedSwitch {
                app: target_app.to_string(),
                state,
            }),
        }
    }

    fn confirm_switch(&self) {
        if !self.ctx.manager.send(ManagerEvent::ConfirmSwitch {
            sender: self.name.clone(),
        }) {
            error!("[{}] failed to confirm switch: manager is gone", self.name);
        }
    }

    /// Queue a window switch on this application's own mailbox.
    pub fn switch_window(&self, window: &str, mode: ShowMode, payload: Option<SwitchPayload>) {
        debug!(
            "switching [{}] to window: {} payload: {:?}",
            self.name, window, payload
        );
        self.mailbox.send(AppEvent::SwitchWindow {
            window: window.to_string(),
            mode,
            payload,
        });
    }

    fn handle_switch_window(
        &mut self,
        window: &str,
        mode: ShowMode,
        payload: Option<SwitchPayload>,
    ) -> Result<(), LifecycleError> {
        if !self.windows.contains_key(window) {
            return Err(LifecycleError::UnknownWindow {
                app: self.name.clone(),
                window: window.to_string(),
            });
        }

        self.leaving = false;
        let current = self.stack.current().to_string();
        if let Some(current) = self.windows.get_mut(&current) {
            current.on_close();
        }

        if payload.as_ref().is_some_and(|p| p.skip_on_back_stack) {
            match self.stack.prev_window(1).map(str::to_string) {
                Some(prev) => {
                    self.stack.pop_to_window(&prev);
                }
                None => {
                    self.stack.pop_to_empty();
                }
            }
        }

        self.stack.push(window);
        if let Some(target) = self.windows.get_mut(window) {
            target.on_before_show(mode, payload);
        }
        self.refresh(RefreshMode::Deep);
        Ok(())
    }

    /// Go back `times` windows, or ask for the previous application when this
    /// application has no earlier window.
    pub fn return_to_previous_window(&mut self, times: usize) {
        match self.stack.prev_window(times).map(str::to_string) {
            Some(prev) => {
                info!("Back to previous window {}", prev);
                self.switch_window(&prev, ShowMode::Return, None);
            }
            None => {
                info!("Back to previous application");
                self.leaving = true;
                self.ctx.manager.send(ManagerEvent::SwitchPreviousRequest {
                    sender: self.name.clone(),
                    payload: None,
                });
            }
        }
    }

    fn forget_stack_if_leaving(&mut self) {
        if self.leaving {
            self.leaving = false;
            self.stack.clean();
        }
    }

    fn handle_close(&mut self) {
        self.set_state(ApplicationState::Deactivating);
        self.forget_stack_if_leaving();
        self.close_windows();
        self.ctx.manager.send(ManagerEvent::ConfirmClose {
            sender: self.name.clone(),
        });
    }

    fn close_windows(&mut self) {
        for (name, window) in self.windows.iter_mut() {
            debug!("Closing a window: {}", name);
            window.on_close();
        }
    }

    fn handle_rebuild(&mut self) {
        info!("Application {} rebuilding gui", self.name);
        for window in self.windows.values_mut() {
            window.rebuild();
        }
        if self.state == ApplicationState::ActiveForeground {
            self.refresh(RefreshMode::Deep);
        }
    }

    fn refresh(&self, mode: RefreshMode) {
        self.mailbox.send(AppEvent::Refresh { mode });
    }

    /// Send the current window's draw list to the GUI, if in front.
    pub fn render(&self, mode: RefreshMode) -> Result<(), LifecycleError> {
        let current = self.stack.current();
        let window = self
            .windows
            .get(current)
            .ok_or_else(|| LifecycleError::UnknownWindow {
                app: self.name.clone(),
                window: current.to_string(),
            })?;

        if self.state == ApplicationState::ActiveForeground {
            self.ctx.gui.send(GuiCommand::Draw {
                app: self.name.clone(),
                commands: window.build_draw_list(),
                mode,
            });
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.state != ApplicationState::ActiveForeground {
            error!(
                "FATAL: application {} with no focus ({}) grabbed key {}",
                self.name, self.state, key.code
            );
        }

        if key.pressed {
            self.key_seq += 1;
            let seq = self.key_seq;
            self.held = Some(HeldKey {
                code: key.code,
                seq,
                long_fired: false,
            });
            let mailbox = self.mailbox.clone();
            let delay = self.ctx.long_press;
            let code = key.code;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                mailbox.send(AppEvent::LongPressTimeout { code, seq });
            });
            return;
        }

        match self.held.take() {
            Some(held) if held.code == key.code => {
                if !held.long_fired {
                    self.dispatch_input(InputEvent::ShortPress(key.code));
                }
            }
            _ => debug!("[{}] release of {} without press", self.name, key.code),
        }
    }

    fn handle_long_press(&mut self, code: KeyCode, seq: u64) {
        match self.held.as_mut() {
            Some(held) if held.code == code && held.seq == seq && !held.long_fired => {
                held.long_fired = true;
                self.dispatch_input(InputEvent::LongPress(code));
            }
            _ => debug!("[{}] stale long press timer for {}", self.name, code),
        }
    }

    fn dispatch_input(&mut self, event: InputEvent) {
        let current = self.stack.current().to_string();
        let Some(window) = self.windows.get_mut(&current) else {
            error!("[{}] current window {} is not defined", self.name, current);
            return;
        };

        match window.on_input(&event) {
            InputOutcome::Ignored => {}
            InputOutcome::Refresh => self.refresh(RefreshMode::Fast),
            InputOutcome::Navigate { window, payload } => {
                self.switch_window(&window, ShowMode::Init, payload);
            }
            InputOutcome::OpenApplication { app, window } => {
                self.ctx.manager.send(ManagerEvent::SwitchRequest {
                    sender: self.name.clone(),
                    target_app: app,
                    target_window: window,
                    payload: None,
                });
            }
            InputOutcome::Back => self.return_to_previous_window(1),
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            name: self.name.clone(),
            state: self.state,
            window_stack: self.stack.entries().to_vec(),
            current_window: self.stack.current().to_string(),
        }
    }
}
