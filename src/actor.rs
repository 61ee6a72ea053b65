//! Mailbox primitives shared by every actor.
//!
//! Each actor owns the receiving half of an unbounded channel and drains it
//! on its own task. Senders are cheap to clone and are the only way to reach
//! an actor.

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

pub struct Sender<Event>(UnboundedSender<Event>);
pub type Receiver<Event> = UnboundedReceiver<Event>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Sender<Event> {
    /// Fire-and-forget send. Returns false when the receiving actor is gone.
    pub fn send(&self, event: Event) -> bool {
        self.try_send(event).is_ok()
    }

    pub fn try_send(&self, event: Event) -> Result<(), SendError<Event>> {
        self.0.send(event)
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<Event> std::fmt::Debug for Sender<Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender").field("closed", &self.is_closed()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel::<u32>();
        assert!(tx.send(1));
        drop(rx);
        assert!(!tx.send(2));
        assert!(tx.is_closed());
    }

    #[test]
    fn test_fifo_order() {
        let (tx, mut rx) = channel();
        for i in 0..5 {
            tx.send(i);
        }
        let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }
}
