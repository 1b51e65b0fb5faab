//! Request-serving workers.
//!
//! # Data Flow
//! ```text
//! worker task:
//!     load application once → Ready
//!     → accept loop (per-worker connection cap via semaphore)
//!     → connection task per accepted socket (JoinSet-owned)
//!     → on drain: stop accepting, finish in-flight work, Exited
//! ```
//!
//! # Design Decisions
//! - A worker is an independent Tokio task; the supervisor observes its join
//!   handle the way a parent observes a child exit
//! - Connection tasks live in a JoinSet owned by the worker, so forcibly
//!   terminating the worker also terminates its connections
//! - A failing request never takes the worker down; failures are converted
//!   to generic error responses in the dispatch path

mod serve;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::app::{AppFactory, Application};
use crate::config::ServerConfig;
use crate::lifecycle::DrainSignal;
use crate::net::Listener;
use crate::supervisor::WorkerId;

/// Event reported by a worker to the supervisor.
#[derive(Debug)]
pub struct WorkerEvent {
    pub worker: WorkerId,
    pub kind: WorkerEventKind,
}

#[derive(Debug)]
pub enum WorkerEventKind {
    /// Application loaded; accepting connections.
    Ready,
    /// Liveness beat, carrying the number of requests served so far.
    Heartbeat { jobs: u64 },
    /// Drain observed; finishing in-flight work.
    Draining,
    /// Worker is done. `clean` is false when it went down on its own.
    Exited { clean: bool },
}

impl WorkerEvent {
    fn new(worker: WorkerId, kind: WorkerEventKind) -> Self {
        Self { worker, kind }
    }
}

/// Per-worker limits, copied out of the server config at spawn time.
#[derive(Debug, Clone)]
pub struct WorkerLimits {
    /// Maximum concurrent connections held by this worker.
    pub max_connections: usize,
    /// Bound on a single application call.
    pub request_timeout: Duration,
    /// Bound on a request body.
    pub max_body_bytes: usize,
    /// Interval between heartbeats to the supervisor.
    pub heartbeat_interval: Duration,
}

impl WorkerLimits {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_connections: config.workers.max_connections,
            request_timeout: config.limits.request_timeout(),
            max_body_bytes: config.limits.max_body_bytes,
            heartbeat_interval: config.workers.heartbeat_interval(),
        }
    }
}

/// Everything a worker needs to run, handed over by the supervisor.
pub struct WorkerContext {
    pub id: WorkerId,
    /// The bound listener, shared with every other worker.
    pub listener: Arc<Listener>,
    pub factory: Arc<dyn AppFactory>,
    pub limits: WorkerLimits,
    pub drain: DrainSignal,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
}

/// State shared between a worker's connection tasks.
pub(crate) struct WorkerShared {
    pub id: WorkerId,
    pub app: Arc<dyn Application>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    /// Requests served by this worker, reported with heartbeats.
    pub jobs: AtomicU64,
}

/// Worker task body: load the application once, then serve until drained.
pub async fn run(ctx: WorkerContext) {
    let app = match ctx.factory.load() {
        Ok(app) => app,
        Err(error) => {
            tracing::error!(worker = %ctx.id, error = %error, "application failed to load");
            let _ = ctx
                .events
                .send(WorkerEvent::new(ctx.id, WorkerEventKind::Exited { clean: false }));
            return;
        }
    };

    let shared = Arc::new(WorkerShared {
        id: ctx.id,
        app,
        request_timeout: ctx.limits.request_timeout,
        max_body_bytes: ctx.limits.max_body_bytes,
        jobs: AtomicU64::new(0),
    });

    let _ = ctx
        .events
        .send(WorkerEvent::new(ctx.id, WorkerEventKind::Ready));
    tracing::info!(worker = %ctx.id, "worker ready");

    let limit = Arc::new(Semaphore::new(ctx.limits.max_connections));
    let mut conns: JoinSet<()> = JoinSet::new();
    let mut heartbeat = tokio::time::interval(ctx.limits.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut drain_rx = ctx.drain.subscribe();

    'accept: loop {
        // Reap connection tasks that have finished.
        while conns.try_join_next().is_some() {}

        // Backpressure: hold a connection permit before accepting.
        let permit = tokio::select! {
            _ = drain_rx.recv() => break 'accept,
            _ = heartbeat.tick() => {
                let jobs = shared.jobs.load(Ordering::Relaxed);
                let _ = ctx
                    .events
                    .send(WorkerEvent::new(ctx.id, WorkerEventKind::Heartbeat { jobs }));
                continue 'accept;
            }
            permit = limit.clone().acquire_owned() => {
                permit.expect("connection semaphore closed unexpectedly")
            }
        };

        tokio::select! {
            _ = drain_rx.recv() => break 'accept,
            _ = heartbeat.tick() => {
                let jobs = shared.jobs.load(Ordering::Relaxed);
                let _ = ctx
                    .events
                    .send(WorkerEvent::new(ctx.id, WorkerEventKind::Heartbeat { jobs }));
                continue 'accept;
            }
            accepted = ctx.listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let shared = shared.clone();
                    let drain = ctx.drain.subscribe();
                    conns.spawn(async move {
                        let _permit = permit;
                        serve::serve_connection(stream, peer, shared, drain).await;
                    });
                }
                Err(error) => {
                    tracing::warn!(worker = %ctx.id, error = %error, "accept failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    let _ = ctx
        .events
        .send(WorkerEvent::new(ctx.id, WorkerEventKind::Draining));
    let in_flight = conns.len();
    if in_flight > 0 {
        tracing::info!(worker = %ctx.id, in_flight, "worker draining");
    }
    while conns.join_next().await.is_some() {}

    let _ = ctx
        .events
        .send(WorkerEvent::new(ctx.id, WorkerEventKind::Exited { clean: true }));
    tracing::info!(worker = %ctx.id, jobs = shared.jobs.load(Ordering::Relaxed), "worker exited");
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("opaque panic payload")
}
