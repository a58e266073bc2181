//! Shutdown coordination for a running server.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// One-shot stop signal shared by the serve loop and its drain deadline.
///
/// Receivers must subscribe before `trigger` to observe it; a dropped
/// coordinator counts as triggered.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Returns false if it had already fired.
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once the signal fires or its sender is gone.
pub async fn signalled(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}
