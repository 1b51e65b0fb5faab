//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ControlEvent::Shutdown
//!     SIGHUP         → ControlEvent::Reload
//!
//! Shutdown:
//!     Shutdown event → stop accepting → drain workers → reap → exit
//!     Second shutdown event or drain timeout → forced termination
//!
//! Reload:
//!     Reload event → re-read config → rotate workers one at a time
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Drain is bounded: forced exit after the deadline, reported unclean
//! - Rolling reload keeps at least count - 1 workers ready

pub mod shutdown;
pub mod signals;

pub use shutdown::{DrainSignal, ShutdownOutcome};

/// Server lifecycle states.
///
/// `Starting → Running → Draining → Stopped`; `Draining` is entered only on
/// a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Binding, dropping privileges, spawning workers.
    Starting,
    /// Steady-state request serving.
    Running,
    /// No new connections; in-flight work finishing.
    Draining,
    /// All workers reaped, listener closed.
    Stopped,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Control events delivered to the supervisor.
///
/// Produced by the signal handler in production and sent directly by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Begin a graceful shutdown. A second one forces termination.
    Shutdown,
    /// Re-read configuration and rotate the worker pool.
    Reload,
}
