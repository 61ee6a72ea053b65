//! Built-in applications.
//!
//! The launcher list is static: every application the Manager can ever start
//! is described here, with its window table.

use crate::launcher::AppSpec;
use crate::window::{AppWindow, BasicWindow, MenuItem};

pub const DESKTOP: &str = "desktop";
pub const CALL: &str = "call";
pub const MESSAGES: &str = "messages";
pub const SETTINGS: &str = "settings";
pub const MUSIC: &str = "music";

fn desktop_windows() -> Vec<Box<dyn AppWindow>> {
    vec![
        BasicWindow::boxed(
            "main",
            "Desktop",
            vec![
                MenuItem::window("Menu", "menu"),
                MenuItem::application("Call", CALL, Some("dial")),
            ],
        ),
        BasicWindow::boxed(
            "menu",
            "Menu",
            vec![
                MenuItem::application("Messages", MESSAGES, None),
                MenuItem::application("Music", MUSIC, None),
                MenuItem::application("Settings", SETTINGS, None),
                MenuItem::application("Call log", CALL, Some("log")),
            ],
        ),
    ]
}

fn call_windows() -> Vec<Box<dyn AppWindow>> {
    vec![
        BasicWindow::boxed(
            "main",
            "Call",
            vec![
                MenuItem::window("Dial", "dial"),
                MenuItem::window("Call log", "log"),
            ],
        ),
        BasicWindow::boxed(
            "dial",
            "Dial",
            vec![
                MenuItem::replacing_window("Call", "active"),
                MenuItem::application("Send message", MESSAGES, Some("compose")),
            ],
        ),
        BasicWindow::boxed("active", "Calling", vec![MenuItem::label("Hang up")]),
        BasicWindow::boxed(
            "log",
            "Call log",
            vec![MenuItem::window("Call back", "dial")],
        ),
    ]
}

fn messages_windows() -> Vec<Box<dyn AppWindow>> {
    vec![
        BasicWindow::boxed(
            "main",
            "Messages",
            vec![
                MenuItem::window("New message", "compose"),
                MenuItem::window("Inbox", "thread"),
            ],
        ),
        BasicWindow::boxed(
            "thread",
            "Thread",
            vec![
                MenuItem::window("Reply", "compose"),
                MenuItem::application("Call back", CALL, Some("dial")),
            ],
        ),
        BasicWindow::boxed(
            "compose",
            "New message",
            vec![MenuItem::replacing_window("Send", "thread")],
        ),
    ]
}

fn settings_windows() -> Vec<Box<dyn AppWindow>> {
    vec![
        BasicWindow::boxed(
            "main",
            "Settings",
            vec![
                MenuItem::window("Language", "language"),
                MenuItem::window("Time", "time"),
            ],
        ),
        BasicWindow::boxed(
            "language",
            "Language",
            vec![
                MenuItem::label("English"),
                MenuItem::label("Polski"),
                MenuItem::label("Deutsch"),
                MenuItem::label("Español"),
            ],
        ),
        BasicWindow::boxed(
            "time",
            "Time",
            vec![MenuItem::label("12h"), MenuItem::label("24h")],
        ),
    ]
}

fn music_windows() -> Vec<Box<dyn AppWindow>> {
    vec![
        BasicWindow::boxed(
            "main",
            "Music",
            vec![
                MenuItem::window("Now playing", "player"),
                MenuItem::window("Library", "library"),
            ],
        ),
        BasicWindow::boxed("player", "Now playing", vec![MenuItem::label("Pause")]),
        BasicWindow::boxed(
            "library",
            "Library",
            vec![MenuItem::replacing_window("Play", "player")],
        ),
    ]
}

fn spec(
    name: &str,
    closeable: bool,
    boot_in_background: bool,
    windows: fn() -> Vec<Box<dyn AppWindow>>,
) -> AppSpec {
    AppSpec {
        name: name.to_string(),
        closeable,
        boot_in_background,
        windows,
    }
}

/// Every application known to the Manager.
pub fn builtin() -> Vec<AppSpec> {
    vec![
        spec(DESKTOP, false, false, desktop_windows),
        spec(CALL, false, true, call_windows),
        spec(MESSAGES, true, false, messages_windows),
        spec(SETTINGS, true, false, settings_windows),
        spec(MUSIC, false, false, music_windows),
    ]
}
