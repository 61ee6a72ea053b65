use std::any::Any;
use std::fmt;

/// Data bundle attached to a window or application switch.
///
/// Ownership moves from the caller into the switch message, from the message
/// into the registry (while a handshake is in flight) and finally into the
/// destination window's before-show hook. It is never cloned.
pub struct SwitchPayload {
    description: String,
    /// Drop the current window from the back stack before showing the target.
    pub skip_on_back_stack: bool,
    /// Background the focused application instead of closing it.
    pub suppress_app_close: bool,
    body: Option<Box<dyn Any + Send>>,
}

impl SwitchPayload {
    pub fn new(description: impl Into<String>) -> Self {
        SwitchPayload {
            description: description.into(),
            skip_on_back_stack: false,
            suppress_app_close: false,
            body: None,
        }
    }

    pub fn with_body<T: Any + Send>(mut self, body: T) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn skip_on_back_stack(mut self) -> Self {
        self.skip_on_back_stack = true;
        self
    }

    pub fn suppress_app_close(mut self) -> Self {
        self.suppress_app_close = true;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn body<T: Any>(&self) -> Option<&T> {
        self.body.as_ref().and_then(|b| b.downcast_ref::<T>())
    }

    /// Take the typed body out, leaving the payload without one.
    pub fn take_body<T: Any>(&mut self) -> Option<T> {
        match self.body.take()?.downcast::<T>() {
            Ok(body) => Some(*body),
            Err(other) => {
                self.body = Some(other);
                None
            }
        }
    }
}

impl fmt::Debug for SwitchPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchPayload")
            .field("description", &self.description)
            .field("skip_on_back_stack", &self.skip_on_back_stack)
            .field("suppress_app_close", &self.suppress_app_close)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}
