use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use super::AppMessage;

/// MessageBus carries input from reader threads (stdin, MIDI) to the app loop
pub struct MessageBus {
    pub(crate) sender: Sender<AppMessage>,
    pub(crate) receiver: Receiver<AppMessage>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();

        MessageBus { sender, receiver }
    }

    /// Get a sender that can be cloned and handed to input sources
    pub fn sender(&self) -> Sender<AppMessage> {
        self.sender.clone()
    }

    /// Wait for the next message, giving up after `timeout` so the caller
    /// can run timers
    pub fn receive_timeout(&self, timeout: Duration) -> Result<AppMessage, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
