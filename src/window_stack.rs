//! Per-application window history.
//!
//! Owned by exactly one Application actor. Pushing a window that is already
//! on the stack jumps back to it instead of appending, so no two adjacent
//! entries are ever equal.

use tracing::debug;

/// Name of the window shown when the stack is empty.
pub const MAIN_WINDOW: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowStack {
    stack: Vec<String>,
}

impl WindowStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a window, truncating back to it if it is already present.
    pub fn push(&mut self, name: &str) {
        if self.pop_to_window(name) {
            return;
        }
        self.stack.push(name.to_string());
        debug!("[{}] pushed window: {}", self.stack.len(), name);
    }

    /// Truncate the stack so it ends at the first occurrence of `name`.
    ///
    /// Returns true if `name` was found.
    pub fn pop_to_window(&mut self, name: &str) -> bool {
        match self.stack.iter().position(|w| w == name) {
            Some(pos) => {
                let popped = self.stack.len() - pos - 1;
                if popped > 0 {
                    debug!("Pop last window(s) [{}]: {}", popped, name);
                }
                self.stack.truncate(pos + 1);
                true
            }
            None => false,
        }
    }

    /// The "no window" form of [`pop_to_window`](Self::pop_to_window): clears
    /// a stack holding at most one entry and reports whether it is now empty.
    pub fn pop_to_empty(&mut self) -> bool {
        if self.stack.len() <= 1 {
            self.stack.clear();
            true
        } else {
            false
        }
    }

    /// Entry `count` positions below the top.
    ///
    /// `None` means there is no earlier window in this application; the
    /// caller should ask for the previous application instead.
    pub fn prev_window(&self, count: usize) -> Option<&str> {
        if self.stack.len() <= 1 || count >= self.stack.len() {
            return None;
        }
        self.stack
            .get(self.stack.len() - 1 - count)
            .map(String::as_str)
    }

    /// Clear the whole history.
    pub fn clean(&mut self) {
        self.stack.clear();
    }

    /// Window on top of the stack, if any.
    pub fn top(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    /// Window currently shown: the top, or the main window for an empty stack.
    pub fn current(&self) -> &str {
        self.top().unwrap_or(MAIN_WINDOW)
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_of(names: &[&str]) -> WindowStack {
        let mut stack = WindowStack::new();
        for name in names {
            stack.push(name);
        }
        stack
    }

    #[test]
    fn test_empty_stack_shows_main() {
        let stack = WindowStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.current(), MAIN_WINDOW);
        assert_eq!(stack.top(), None);
        assert_eq!(stack.prev_window(1), None);
    }

    #[test]
    fn test_push_appends_new_windows() {
        let stack = stack_of(&["main", "options", "details"]);
        assert_eq!(stack.entries(), &["main", "options", "details"]);
        assert_eq!(stack.current(), "details");
    }

    #[test]
    fn test_push_existing_truncates() {
        let mut stack = stack_of(&["main", "options", "details"]);
        stack.push("options");
        assert_eq!(stack.entries(), &["main", "options"]);
    }

    #[test]
    fn test_push_same_window_twice_is_idempotent() {
        let mut stack = stack_of(&["main", "options"]);
        stack.push("options");
        stack.push("options");
        assert_eq!(stack.entries(), &["main", "options"]);
    }

    #[test]
    fn test_no_adjacent_duplicates() {
        let mut stack = WindowStack::new();
        for name in ["a", "b", "b", "c", "a", "c", "c", "b", "d", "d"] {
            stack.push(name);
            let entries = stack.entries();
            assert!(entries.windows(2).all(|pair| pair[0] != pair[1]));
        }
    }

    #[test]
    fn test_prev_window_and_pop_scenario() {
        let mut stack = stack_of(&["main", "options", "details"]);
        assert_eq!(stack.prev_window(1), Some("options"));
        assert_eq!(stack.prev_window(2), Some("main"));
        assert_eq!(stack.prev_window(3), None);

        assert!(stack.pop_to_window("main"));
        assert_eq!(stack.entries(), &["main"]);

        // A single-entry stack clears when popped to "no window"
        assert!(stack.pop_to_empty());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_to_empty_noop_on_deep_stack() {
        let mut stack = stack_of(&["main", "options"]);
        assert!(!stack.pop_to_empty());
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_pop_to_missing_window() {
        let mut stack = stack_of(&["main", "options"]);
        assert!(!stack.pop_to_window("nowhere"));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_clean() {
        let mut stack = stack_of(&["main", "options"]);
        stack.clean();
        assert!(stack.is_empty());
    }
}
