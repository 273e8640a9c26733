//! Shutdown coordination for both services.
//!
//! The trigger is a latched flag rather than a message: a task that starts
//! listening after `trigger()` still observes it.

use tokio::sync::watch;

/// Owner side: flips the flag once.
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Listener side, one per long-running task.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        tracing::info!(listeners = self.tx.receiver_count(), "Shutdown triggered");
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolve once shutdown has been triggered. Also resolves if the
    /// `Shutdown` owner is gone, since nothing can trigger it any more.
    pub async fn recv(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
