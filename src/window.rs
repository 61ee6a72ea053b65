//! Windows owned by an application.
//!
//! An application keeps its windows in a map keyed by name and only ever
//! addresses them by that name; the [`WindowStack`](crate::window_stack::WindowStack)
//! records the navigation history.

use crate::gui::DrawCommand;
use crate::payload::SwitchPayload;
use crate::protocol::{InputEvent, KeyCode, ShowMode};
use tracing::debug;

/// What the application should do after a window consumed an input.
#[derive(Debug)]
pub enum InputOutcome {
    Ignored,
    /// The window changed, redraw it.
    Refresh,
    Navigate {
        window: String,
        payload: Option<SwitchPayload>,
    },
    OpenApplication {
        app: String,
        window: Option<String>,
    },
    Back,
}

pub trait AppWindow: Send {
    fn name(&self) -> &str;

    /// Runs before the window is shown. Takes ownership of the switch payload.
    fn on_before_show(&mut self, mode: ShowMode, payload: Option<SwitchPayload>);

    fn on_close(&mut self) {}

    fn on_input(&mut self, event: &InputEvent) -> InputOutcome;

    fn build_draw_list(&self) -> Vec<DrawCommand>;

    /// Recreate widgets, e.g. after a language change.
    fn rebuild(&mut self) {}
}

/// Target of a menu entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    Window {
        name: String,
        skip_on_back_stack: bool,
    },
    Application {
        app: String,
        window: Option<String>,
    },
    Nothing,
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub label: String,
    pub action: ItemAction,
}

impl MenuItem {
    pub fn window(label: &str, window: &str) -> Self {
        MenuItem {
            label: label.to_string(),
            action: ItemAction::Window {
                name: window.to_string(),
                skip_on_back_stack: false,
            },
        }
    }

    /// Navigate to `window`, dropping the current window from the back stack.
    pub fn replacing_window(label: &str, window: &str) -> Self {
        MenuItem {
            label: label.to_string(),
            action: ItemAction::Window {
                name: window.to_string(),
                skip_on_back_stack: true,
            },
        }
    }

    pub fn application(label: &str, app: &str, window: Option<&str>) -> Self {
        MenuItem {
            label: label.to_string(),
            action: ItemAction::Application {
                app: app.to_string(),
                window: window.map(str::to_string),
            },
        }
    }

    pub fn label(label: &str) -> Self {
        MenuItem {
            label: label.to_string(),
            action: ItemAction::Nothing,
        }
    }
}

/// A list window driven by a table of menu items.
pub struct BasicWindow {
    name: String,
    title: String,
    items: Vec<MenuItem>,
    selected: usize,
    note: Option<String>,
    shown: usize,
    closed: usize,
    rebuilds: usize,
}

impl BasicWindow {
    pub fn new(name: &str, title: &str, items: Vec<MenuItem>) -> Self {
        BasicWindow {
            name: name.to_string(),
            title: title.to_string(),
            items,
            selected: 0,
            note: None,
            shown: 0,
            closed: 0,
            rebuilds: 0,
        }
    }

    pub fn boxed(name: &str, title: &str, items: Vec<MenuItem>) -> Box<dyn AppWindow> {
        Box::new(Self::new(name, title, items))
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// How many times the window was shown, closed and rebuilt.
    pub fn hook_counts(&self) -> (usize, usize, usize) {
        (self.shown, self.closed, self.rebuilds)
    }

    fn activate(&self, index: usize) -> InputOutcome {
        let Some(item) = self.items.get(index) else {
            return InputOutcome::Ignored;
        };
        match &item.action {
            ItemAction::Window { name, skip_on_back_stack } => {
                let payload = if *skip_on_back_stack {
                    Some(SwitchPayload::new(item.label.clone()).skip_on_back_stack())
                } else {
                    None
                };
                InputOutcome::Navigate {
                    window: name.clone(),
                    payload,
                }
            }
            ItemAction::Application { app, window } => InputOutcome::OpenApplication {
                app: app.clone(),
                window: window.clone(),
            },
            ItemAction::Nothing => InputOutcome::Ignored,
        }
    }
}

impl AppWindow for BasicWindow {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_before_show(&mut self, mode: ShowMode, payload: Option<SwitchPayload>) {
        self.shown += 1;
        if mode == ShowMode::Init {
            self.selected = 0;
        }
        if let Some(payload) = payload {
            debug!("{} received payload: {:?}", self.name, payload);
            self.note = Some(payload.description().to_string());
        }
    }

    fn on_close(&mut self) {
        self.closed += 1;
    }

    fn on_input(&mut self, event: &InputEvent) -> InputOutcome {
        match *event {
            InputEvent::ShortPress(KeyCode::Up) => {
                if self.items.is_empty() {
                    return InputOutcome::Ignored;
                }
                self.selected = self.selected.checked_sub(1).unwrap_or(self.items.len() - 1);
                InputOutcome::Refresh
            }
            InputEvent::ShortPress(KeyCode::Down) => {
                if self.items.is_empty() {
                    return InputOutcome::Ignored;
                }
                self.selected = (self.selected + 1) % self.items.len();
                InputOutcome::Refresh
            }
            InputEvent::ShortPress(KeyCode::Enter) => self.activate(self.selected),
            InputEvent::ShortPress(KeyCode::Num(n)) if n > 0 => self.activate(usize::from(n) - 1),
            InputEvent::ShortPress(KeyCode::Back) => InputOutcome::Back,
            // Long press on back clears the note and stays put
            InputEvent::LongPress(KeyCode::Back) => {
                if self.note.take().is_some() {
                    InputOutcome::Refresh
                } else {
                    InputOutcome::Ignored
                }
            }
            _ => InputOutcome::Ignored,
        }
    }

    fn build_draw_list(&self) -> Vec<DrawCommand> {
        let mut commands = vec![
            DrawCommand::Clear,
            DrawCommand::Header {
                title: self.title.clone(),
            },
        ];
        if !self.items.is_empty() {
            commands.push(DrawCommand::Highlight {
                line: self.selected as u16,
            });
        }
        commands.extend(self.items.iter().enumerate().map(|(i, item)| DrawCommand::Text {
            line: i as u16,
            text: item.label.clone(),
        }));
        if let Some(note) = &self.note {
            commands.push(DrawCommand::Text {
                line: self.items.len() as u16,
                text: note.clone(),
            });
        }
        commands
    }

    fn rebuild(&mut self) {
        self.rebuilds += 1;
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
    }
}
