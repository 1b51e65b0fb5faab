//! Drain coordination.

use tokio::sync::broadcast;

/// Outcome of a supervised run, reported at exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every worker drained within the timeout.
    Clean,
    /// At least one worker was forcibly terminated.
    Forced,
}

impl ShutdownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, ShutdownOutcome::Clean)
    }
}

/// Drain signal for one worker and its connections.
///
/// Wraps a broadcast channel: the supervisor holds the trigger side, the
/// worker's accept loop and every connection it spawned hold subscriptions.
/// Firing it tells them to stop taking new work and finish what they have.
#[derive(Debug, Clone)]
pub struct DrainSignal {
    tx: broadcast::Sender<()>,
}

impl DrainSignal {
    /// Create a new drain signal.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the signal. Must happen before `trigger` for the
    /// subscriber to observe it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of live subscriptions (tasks still running).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for DrainSignal {
    fn default() -> Self {
        Self::new()
    }
}
