//! Producer-ready handshake.
//!
//! The monitor waits on a [`StartSignal`]; producers share the [`StartGate`].
//! The first producer to call [`StartGate::ready`] fires the signal with the
//! logical start instant of the run. Later calls are no-ops. If every gate
//! handle is dropped without firing, the signal resolves to `None`.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;

#[derive(Debug)]
pub struct StartGate {
    sender: Mutex<Option<oneshot::Sender<Instant>>>,
}

#[derive(Debug)]
pub struct StartSignal {
    receiver: oneshot::Receiver<Instant>,
}

/// Create a connected gate and signal.
pub fn start_gate() -> (Arc<StartGate>, StartSignal) {
    let (sender, receiver) = oneshot::channel();
    (
        Arc::new(StartGate {
            sender: Mutex::new(Some(sender)),
        }),
        StartSignal { receiver },
    )
}

impl StartGate {
    /// Mark a producer ready. Returns `true` only for the call that fired the signal.
    pub fn ready(&self) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match sender {
            Some(sender) => {
                // The monitor may have given up already; the start instant is then unused.
                let _ = sender.send(Instant::now());
                true
            }
            None => false,
        }
    }
}

impl StartSignal {
    /// Wait for the first producer. `None` if no producer ever became ready.
    pub async fn wait(self) -> Option<Instant> {
        self.receiver.await.ok()
    }
}
