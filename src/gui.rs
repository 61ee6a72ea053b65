//! GUI collaborator.
//!
//! Applications send it draw lists while they hold focus. The service here
//! only renders them into log lines; a real display driver would sit behind
//! the same message.

use crate::actor::{self, Receiver, Sender};
use crate::protocol::RefreshMode;
use std::collections::HashMap;
use tracing::{debug, info};

/// One primitive in a draw list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommand {
    Clear,
    Header { title: String },
    Text { line: u16, text: String },
    Highlight { line: u16 },
}

/// Commands sent from applications to the GUI service
#[derive(Debug, Clone)]
pub enum GuiCommand {
    Draw {
        app: String,
        commands: Vec<DrawCommand>,
        mode: RefreshMode,
    },
}

#[derive(Default)]
pub struct GuiService {
    frames: HashMap<String, usize>,
}

impl GuiService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(self) -> Sender<GuiCommand> {
        let (tx, rx) = actor::channel();
        tokio::spawn(self.run(rx));
        tx
    }

    async fn run(mut self, mut rx: Receiver<GuiCommand>) {
        info!("GUI service started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        info!("GUI service stopped after {} frame(s)", self.total_frames());
    }

    fn handle(&mut self, command: GuiCommand) {
        match command {
            GuiCommand::Draw { app, commands, mode } => {
                let count = self.frames.entry(app.clone()).or_default();
                *count += 1;
                debug!(
                    "Frame #{} from {} ({:?}, {} command(s))",
                    count,
                    app,
                    mode,
                    commands.len()
                );
                for line in render_lines(&commands) {
                    debug!("  | {}", line);
                }
            }
        }
    }

    pub fn frames_for(&self, app: &str) -> usize {
        self.frames.get(app).copied().unwrap_or(0)
    }

    pub fn total_frames(&self) -> usize {
        self.frames.values().sum()
    }
}

/// Flatten a draw list into text rows.
fn render_lines(commands: &[DrawCommand]) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut highlighted: Option<u16> = None;
    for command in commands {
        match command {
            DrawCommand::Clear => {
                lines.clear();
                highlighted = None;
            }
            DrawCommand::Header { title } => lines.push(format!("== {} ==", title)),
            DrawCommand::Text { line, text } => {
                let marker = if highlighted == Some(*line) { ">" } else { " " };
                lines.push(format!("{} {}", marker, text));
            }
            DrawCommand::Highlight { line } => highlighted = Some(*line),
        }
    }
    lines
}
