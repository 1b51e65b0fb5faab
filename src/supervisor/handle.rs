//! Supervisor-owned worker records and pool status snapshots.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::lifecycle::{DrainSignal, ServerState};
use crate::supervisor::restart::RestartBudget;

/// Identifier of a worker slot in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Worker states as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned; loading the application.
    Starting,
    /// Accepting connections.
    Ready,
    /// Drain observed; finishing in-flight work.
    Draining,
    /// Gone, by drain or by crash.
    Exited,
    /// Restart budget exhausted; slot left down.
    Failed,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Starting => "starting",
            WorkerState::Ready => "ready",
            WorkerState::Draining => "draining",
            WorkerState::Exited => "exited",
            WorkerState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Supervisor-owned record for one spawned worker.
///
/// Single-writer: only the supervisor creates or mutates handles. Everyone
/// else sees [`WorkerSnapshot`]s.
pub(crate) struct WorkerHandle {
    pub id: WorkerId,
    pub state: WorkerState,
    /// Join handle of the worker task; taken when the worker is reaped.
    pub task: Option<JoinHandle<()>>,
    /// Tells this worker (and its connections) to stop taking new work.
    pub drain: DrainSignal,
    /// Times this slot has been respawned or rotated.
    pub restarts: u32,
    /// Requests served, as of the last heartbeat.
    pub jobs: u64,
    pub last_heartbeat: Option<Instant>,
    pub budget: RestartBudget,
}

impl WorkerHandle {
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id,
            state: self.state,
            restarts: self.restarts,
            jobs: self.jobs,
        }
    }
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub state: WorkerState,
    pub restarts: u32,
    pub jobs: u64,
}

/// Point-in-time view of the pool, published on a watch channel.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub state: ServerState,
    /// Bound listener address, available once binding succeeded.
    pub addr: Option<SocketAddr>,
    pub workers: Vec<WorkerSnapshot>,
}

impl PoolStatus {
    pub fn ready_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::Ready)
            .count()
    }

    pub fn failed_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state == WorkerState::Failed)
            .count()
    }
}

impl Default for PoolStatus {
    fn default() -> Self {
        Self {
            state: ServerState::Starting,
            addr: None,
            workers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: usize, state: WorkerState) -> WorkerSnapshot {
        WorkerSnapshot {
            id: WorkerId(id),
            state,
            restarts: 0,
            jobs: 0,
        }
    }

    #[test]
    fn pool_status_counts_states() {
        let status = PoolStatus {
            state: ServerState::Running,
            addr: None,
            workers: vec![
                snapshot(0, WorkerState::Ready),
                snapshot(1, WorkerState::Ready),
                snapshot(2, WorkerState::Failed),
                snapshot(3, WorkerState::Starting),
            ],
        };
        assert_eq!(status.ready_workers(), 2);
        assert_eq!(status.failed_workers(), 1);
    }

    #[test]
    fn worker_id_display() {
        assert_eq!(WorkerId(3).to_string(), "worker-3");
    }
}
