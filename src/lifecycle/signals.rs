//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to control events for the supervisor
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A repeated SIGTERM/SIGINT is forwarded too; the supervisor treats the
//!   second one as a forced shutdown
//! - SIGHUP triggers config reload, not shutdown

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::lifecycle::ControlEvent;

/// Translate OS signals into control events until the supervisor goes away.
pub async fn listen(control: mpsc::UnboundedSender<ControlEvent>) -> Result<(), std::io::Error> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;

    loop {
        let (name, event) = tokio::select! {
            _ = term.recv() => ("SIGTERM", ControlEvent::Shutdown),
            _ = int.recv() => ("SIGINT", ControlEvent::Shutdown),
            _ = hup.recv() => ("SIGHUP", ControlEvent::Reload),
        };
        tracing::info!(signal = name, "signal received");
        if control.send(event).is_err() {
            // Supervisor is gone; nothing left to steer.
            return Ok(());
        }
    }
}
