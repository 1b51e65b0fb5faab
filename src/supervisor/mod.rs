//! Worker pool supervision.
//!
//! # Data Flow
//! ```text
//! run():
//!     bind listener → drop privileges → resolve entry point
//!     → spawn workers → monitor loop → shutdown outcome
//!
//! monitor loop:
//!     worker events  → handle table updates, crash respawn
//!     control events → drain (Shutdown) or rolling restart (Reload)
//!     liveness sweep → reap worker tasks that died without a word
//! ```
//!
//! # Design Decisions
//! - The worker handle table is owned exclusively by the supervisor; every
//!   mutation goes through it (single-writer)
//! - Crash respawn is budgeted per slot; an exhausted budget leaves the slot
//!   down and the pool degraded rather than retrying forever
//! - Observers get point-in-time snapshots over a watch channel, never a
//!   reference into the table

pub mod handle;
pub mod restart;

pub use handle::{PoolStatus, WorkerId, WorkerSnapshot, WorkerState};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::app::{AppFactory, AppRegistry, EntryPoint};
use crate::config::{loader, ServerConfig};
use crate::error::ServerError;
use crate::lifecycle::{ControlEvent, DrainSignal, ServerState, ShutdownOutcome};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::security;
use crate::worker::{self, WorkerContext, WorkerEvent, WorkerEventKind, WorkerLimits};

use handle::WorkerHandle;
use restart::RestartBudget;

/// Interval of the liveness sweep over worker join handles.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Cloneable handle for steering and observing a running supervisor.
#[derive(Clone)]
pub struct SupervisorControl {
    control: mpsc::UnboundedSender<ControlEvent>,
    status: watch::Receiver<PoolStatus>,
}

impl SupervisorControl {
    /// Send a control event. Returns false when the supervisor is gone.
    pub fn send(&self, event: ControlEvent) -> bool {
        self.control.send(event).is_ok()
    }

    /// The sender half, for the signal handler.
    pub fn control_sender(&self) -> mpsc::UnboundedSender<ControlEvent> {
        self.control.clone()
    }

    /// Subscribe to pool status snapshots.
    pub fn status(&self) -> watch::Receiver<PoolStatus> {
        self.status.clone()
    }
}

/// The long-lived parent of the worker pool.
pub struct Supervisor {
    config: ServerConfig,
    config_path: Option<PathBuf>,
    registry: AppRegistry,
    factory: Option<Arc<dyn AppFactory>>,
    listener: Option<Arc<Listener>>,
    addr: Option<std::net::SocketAddr>,
    workers: Vec<WorkerHandle>,
    state: ServerState,
    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    status_tx: watch::Sender<PoolStatus>,
}

impl Supervisor {
    /// Create a supervisor and its control handle.
    ///
    /// `config_path` is re-read on reload; without one, a reload rotates the
    /// workers on their current settings.
    pub fn new(
        config: ServerConfig,
        registry: AppRegistry,
        config_path: Option<PathBuf>,
    ) -> (Self, SupervisorControl) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(PoolStatus::default());

        let supervisor = Self {
            config,
            config_path,
            registry,
            factory: None,
            listener: None,
            addr: None,
            workers: Vec::new(),
            state: ServerState::Starting,
            control_rx,
            events_tx,
            events_rx,
            status_tx,
        };
        let control = SupervisorControl {
            control: control_tx,
            status: status_rx,
        };
        (supervisor, control)
    }

    /// Run to completion: startup, steady state, shutdown.
    ///
    /// Fatal startup problems (bind failure, privilege drop failure, unknown
    /// entry point) surface as an error before any worker is spawned. After
    /// startup the return value reports how shutdown went.
    pub async fn run(mut self) -> Result<ShutdownOutcome, ServerError> {
        let listener = Listener::bind(&self.config.listener).await?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Listener(ListenerError::Bind(e)))?;

        // Privileged ports are bound by now; no worker is accepting yet.
        if let Some(account) = self.config.runtime.user.clone() {
            security::drop_privileges(&account)?;
        }

        let entry = EntryPoint::parse(&self.config.app.entry_point)?;
        let factory = self
            .registry
            .resolve(&entry)
            .ok_or_else(|| ServerError::UnknownEntryPoint(entry.to_string()))?;

        self.listener = Some(Arc::new(listener));
        self.addr = Some(addr);
        self.factory = Some(factory);

        for slot in 0..self.config.workers.count {
            let handle = self.new_slot(slot);
            self.workers.push(handle);
            self.spawn_into(slot);
        }

        self.state = ServerState::Running;
        self.publish();
        tracing::info!(
            address = %addr,
            workers = self.config.workers.count,
            app = %entry,
            "supervisor running"
        );

        Ok(self.monitor().await)
    }

    /// Steady-state loop: runs until a shutdown event arrives.
    async fn monitor(&mut self) -> ShutdownOutcome {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    if let Some(slot) = self.apply_event(event) {
                        self.respawn(slot).await;
                    }
                }
                Some(event) = self.control_rx.recv() => match event {
                    ControlEvent::Shutdown => return self.drain_all().await,
                    ControlEvent::Reload => self.reload().await,
                },
                _ = sweep.tick() => {
                    for slot in self.sweep_crashes().await {
                        self.respawn(slot).await;
                    }
                }
            }
        }
    }

    fn new_slot(&self, slot: usize) -> WorkerHandle {
        WorkerHandle {
            id: WorkerId(slot),
            state: WorkerState::Starting,
            task: None,
            drain: DrainSignal::new(),
            restarts: 0,
            jobs: 0,
            last_heartbeat: None,
            budget: RestartBudget::new(
                self.config.restart.max_restarts,
                self.config.restart.window(),
            ),
        }
    }

    /// Spawn a worker task into an existing slot.
    fn spawn_into(&mut self, slot: usize) {
        let listener = self
            .listener
            .clone()
            .expect("listener bound before workers spawn");
        let factory = self
            .factory
            .clone()
            .expect("entry point resolved before workers spawn");
        let drain = DrainSignal::new();

        let ctx = WorkerContext {
            id: WorkerId(slot),
            listener,
            factory,
            limits: WorkerLimits::from_config(&self.config),
            drain: drain.clone(),
            events: self.events_tx.clone(),
        };
        let task = tokio::spawn(worker::run(ctx));

        let handle = &mut self.workers[slot];
        handle.state = WorkerState::Starting;
        handle.drain = drain;
        handle.task = Some(task);
        handle.last_heartbeat = None;
        self.publish();
    }

    /// Update the handle table from a worker event. Returns the slot index
    /// when the event amounts to an unexpected death during steady state.
    fn apply_event(&mut self, event: WorkerEvent) -> Option<usize> {
        let run_state = self.state;
        let slot = event.worker.0;
        let Some(handle) = self.workers.get_mut(slot) else {
            return None;
        };

        let mut crashed = None;
        let mut changed = true;
        match event.kind {
            WorkerEventKind::Ready => {
                handle.state = WorkerState::Ready;
                handle.last_heartbeat = Some(Instant::now());
                tracing::debug!(worker = %handle.id, "worker ready");
            }
            WorkerEventKind::Heartbeat { jobs } => {
                handle.last_heartbeat = Some(Instant::now());
                handle.jobs = jobs;
                changed = false;
            }
            WorkerEventKind::Draining => {
                if handle.state != WorkerState::Exited {
                    handle.state = WorkerState::Draining;
                }
            }
            WorkerEventKind::Exited { clean } => {
                handle.state = WorkerState::Exited;
                if !clean && run_state == ServerState::Running {
                    crashed = Some(slot);
                }
            }
        }
        if changed {
            self.publish();
        }
        crashed
    }

    /// Reap finished worker tasks and report slots that died unexpectedly.
    async fn sweep_crashes(&mut self) -> Vec<usize> {
        let run_state = self.state;
        let mut crashed = Vec::new();
        for slot in 0..self.workers.len() {
            let handle = &mut self.workers[slot];
            if handle.state == WorkerState::Failed {
                continue;
            }
            if let Some(task) = handle.task.take_if(|task| task.is_finished()) {
                match task.await {
                    Ok(()) => {}
                    Err(error) if error.is_panic() => {
                        let payload = error.into_panic();
                        let message = worker::panic_message(payload.as_ref());
                        tracing::error!(worker = %handle.id, message, "worker task panicked");
                    }
                    Err(_) => {}
                }
                if handle.state != WorkerState::Exited {
                    tracing::warn!(worker = %handle.id, "worker task ended without reporting exit");
                    handle.state = WorkerState::Exited;
                }
            }
            if handle.state == WorkerState::Exited
                && handle.task.is_none()
                && run_state == ServerState::Running
            {
                crashed.push(slot);
            }
        }
        if !crashed.is_empty() {
            self.publish();
        }
        crashed
    }

    /// Respawn a dead worker slot, subject to its restart budget.
    async fn respawn(&mut self, slot: usize) {
        if self.state != ServerState::Running {
            return;
        }
        let base_ms = self.config.restart.backoff_base_ms;
        let max_ms = self.config.restart.backoff_max_ms;

        let handle = &mut self.workers[slot];
        if handle.state == WorkerState::Failed {
            return;
        }
        if let Some(task) = handle.task.take() {
            if !task.is_finished() {
                task.abort();
            }
            let _ = task.await;
        }
        if !handle.budget.try_acquire() {
            handle.state = WorkerState::Failed;
            tracing::error!(
                worker = %handle.id,
                restarts = handle.restarts,
                "restart budget exhausted; leaving worker slot down"
            );
            self.publish();
            return;
        }
        handle.restarts += 1;
        let attempt = handle.restarts;
        let tokens_left = handle.budget.remaining();
        let id = handle.id;
        metrics::record_worker_restart(id);

        let delay = restart::respawn_backoff(attempt, base_ms, max_ms);
        if !delay.is_zero() {
            tracing::debug!(
                worker = %id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "backing off before respawn"
            );
            tokio::time::sleep(delay).await;
        }
        tracing::info!(worker = %id, attempt, tokens_left, "respawning worker");
        self.spawn_into(slot);
    }

    /// Drain the pool: stop accepting, let in-flight work finish within the
    /// timeout, forcibly terminate the rest.
    async fn drain_all(&mut self) -> ShutdownOutcome {
        self.state = ServerState::Draining;
        // Dropping our listener reference lets the socket close as soon as
        // the last worker exits.
        self.listener = None;
        self.publish();

        let timeout = self.config.lifecycle.drain_timeout();
        tracing::info!(
            drain_timeout_secs = timeout.as_secs(),
            "shutdown requested; draining workers"
        );
        for handle in &self.workers {
            handle.drain.trigger();
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut forced = false;
        while !self.all_workers_exited() {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    let _ = self.apply_event(event);
                }
                Some(event) = self.control_rx.recv() => {
                    if event == ControlEvent::Shutdown {
                        tracing::warn!("second termination signal; aborting drain");
                        forced = true;
                        break;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!("drain timeout elapsed; terminating remaining workers");
                    forced = true;
                    break;
                }
            }
        }

        let mut tasks = Vec::new();
        for handle in &mut self.workers {
            if let Some(task) = handle.task.take() {
                tasks.push((handle.id, task));
            }
            if forced && !matches!(handle.state, WorkerState::Exited | WorkerState::Failed) {
                handle.state = WorkerState::Exited;
            }
        }
        for (id, task) in tasks {
            if forced && !task.is_finished() {
                tracing::warn!(worker = %id, "forcibly terminating worker");
                task.abort();
            }
            let _ = task.await;
        }

        self.state = ServerState::Stopped;
        self.publish();

        if forced {
            tracing::warn!("shutdown complete (unclean)");
            ShutdownOutcome::Forced
        } else {
            tracing::info!("shutdown complete");
            ShutdownOutcome::Clean
        }
    }

    fn all_workers_exited(&self) -> bool {
        self.workers
            .iter()
            .all(|h| matches!(h.state, WorkerState::Exited | WorkerState::Failed))
    }

    /// Rolling restart onto a freshly loaded configuration.
    async fn reload(&mut self) {
        tracing::info!("reload requested");
        let new_config = match self.config_path.as_deref() {
            Some(path) => match loader::load(Some(path)) {
                Ok(config) => config,
                Err(error) => {
                    tracing::warn!(error = %error, "reload rejected; keeping current configuration");
                    return;
                }
            },
            None => {
                tracing::info!("no configuration file; restarting workers on current settings");
                self.config.clone()
            }
        };

        if new_config.listener.bind_address != self.config.listener.bind_address {
            tracing::warn!(
                configured = %new_config.listener.bind_address,
                bound = %self.config.listener.bind_address,
                "bind address changes require a full restart; keeping the bound listener"
            );
        }

        let entry = match EntryPoint::parse(&new_config.app.entry_point) {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(error = %error, "reload rejected");
                return;
            }
        };
        let Some(factory) = self.registry.resolve(&entry) else {
            tracing::warn!(entry = %entry, "reload rejected; unknown application entry point");
            return;
        };

        let old_count = self.workers.len();
        let bound_address = self.config.listener.bind_address.clone();
        self.config = new_config;
        self.config.listener.bind_address = bound_address;
        self.factory = Some(factory);

        let new_count = self.config.workers.count;
        tracing::info!(workers = new_count, "rolling worker restart started");

        for slot in 0..old_count.min(new_count) {
            self.rotate_slot(slot).await;
        }

        if new_count > old_count {
            for slot in old_count..new_count {
                let handle = self.new_slot(slot);
                self.workers.push(handle);
                self.spawn_into(slot);
            }
        } else if new_count < old_count {
            for slot in new_count..old_count {
                self.workers[slot].drain.trigger();
            }
            let deadline = tokio::time::Instant::now() + self.config.lifecycle.drain_timeout();
            for slot in new_count..old_count {
                if !self.wait_for_slot(slot, WorkerState::Exited, deadline).await {
                    if let Some(task) = self.workers[slot].task.take() {
                        task.abort();
                        let _ = task.await;
                    }
                } else if let Some(task) = self.workers[slot].task.take() {
                    let _ = task.await;
                }
            }
            self.workers.truncate(new_count);
        }

        self.publish();
        tracing::info!("rolling worker restart complete");
    }

    /// Replace one worker: drain it, reap it, spawn a successor, wait for the
    /// successor to report ready. The rest of the pool keeps serving, so the
    /// pool never loses more than this one worker at a time.
    async fn rotate_slot(&mut self, slot: usize) {
        let drain_timeout = self.config.lifecycle.drain_timeout();
        let fresh_budget = RestartBudget::new(
            self.config.restart.max_restarts,
            self.config.restart.window(),
        );

        let already_down = {
            let handle = &mut self.workers[slot];
            if matches!(handle.state, WorkerState::Exited | WorkerState::Failed) {
                // A downed slot comes back with the new config and a fresh
                // budget.
                handle.budget = fresh_budget;
                true
            } else {
                handle.drain.trigger();
                handle.state = WorkerState::Draining;
                false
            }
        };
        self.publish();

        if !already_down {
            let deadline = tokio::time::Instant::now() + drain_timeout;
            if !self.wait_for_slot(slot, WorkerState::Exited, deadline).await {
                tracing::warn!(
                    worker = %WorkerId(slot),
                    "worker did not drain in time during reload; terminating"
                );
                if let Some(task) = self.workers[slot].task.take() {
                    task.abort();
                }
                self.workers[slot].state = WorkerState::Exited;
            }
        }
        if let Some(task) = self.workers[slot].task.take() {
            let _ = task.await;
        }

        self.workers[slot].restarts += 1;
        self.spawn_into(slot);

        let ready_deadline = tokio::time::Instant::now() + drain_timeout;
        if !self
            .wait_for_slot(slot, WorkerState::Ready, ready_deadline)
            .await
        {
            tracing::warn!(
                worker = %WorkerId(slot),
                "replacement worker not ready in time; continuing rotation"
            );
        }
    }

    /// Process worker events until the slot reaches `target` or the deadline
    /// passes. Events from other workers are applied along the way.
    async fn wait_for_slot(
        &mut self,
        slot: usize,
        target: WorkerState,
        deadline: tokio::time::Instant,
    ) -> bool {
        loop {
            if self.workers[slot].state == target {
                return true;
            }
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    let _ = self.apply_event(event);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return self.workers[slot].state == target;
                }
            }
        }
    }

    /// Publish a status snapshot to observers.
    fn publish(&self) {
        let status = PoolStatus {
            state: self.state,
            addr: self.addr,
            workers: self.workers.iter().map(WorkerHandle::snapshot).collect(),
        };
        metrics::set_ready_workers(status.ready_workers());
        let _ = self.status_tx.send_replace(status);
    }
}
