//! Metrics collection.
//!
//! # Metrics
//! - `gantry_requests_total` (counter): requests by method and status
//! - `gantry_workers_ready` (gauge): current Ready worker count
//! - `gantry_worker_restarts_total` (counter): respawns by worker slot
//!
//! # Design Decisions
//! - Uses the `metrics` facade; exposition is left to the embedder. Without
//!   an installed recorder these calls are no-ops.

use std::time::Instant;

use metrics::{counter, gauge, histogram};

use crate::supervisor::WorkerId;

/// Record a completed request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    counter!(
        "gantry_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gantry_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record a worker respawn.
pub fn record_worker_restart(worker: WorkerId) {
    counter!("gantry_worker_restarts_total", "worker" => worker.to_string()).increment(1);
}

/// Publish the current Ready worker count.
pub fn set_ready_workers(count: usize) {
    gauge!("gantry_workers_ready").set(count as f64);
}
