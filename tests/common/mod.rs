//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::StatusCode;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use gantry::app::{status, AppError, AppFactory, AppRegistry, AppRequest, AppResponse, Application};
use gantry::supervisor::PoolStatus;
use gantry::{ServerConfig, ServerError, ShutdownOutcome, Supervisor, SupervisorControl};

/// A running supervisor under test.
pub struct TestServer {
    pub control: SupervisorControl,
    pub status: watch::Receiver<PoolStatus>,
    pub addr: SocketAddr,
    pub task: JoinHandle<Result<ShutdownOutcome, ServerError>>,
}

/// Config bound to an ephemeral port with test-friendly timings.
pub fn test_config(workers: usize) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.workers.count = workers;
    config.workers.heartbeat_interval_secs = 1;
    config.lifecycle.drain_timeout_secs = 5;
    config
}

/// Registry with a single factory under the default entry point.
pub fn registry_with(factory: Arc<dyn AppFactory>) -> AppRegistry {
    let mut registry = AppRegistry::new();
    registry.register("service:app", factory).unwrap();
    registry
}

/// Registry serving the built-in status application.
pub fn status_registry() -> AppRegistry {
    registry_with(status::factory())
}

/// Spawn a supervisor and wait until the full pool is ready.
pub async fn start_server(config: ServerConfig, registry: AppRegistry) -> TestServer {
    let workers = config.workers.count;
    let (supervisor, control) = Supervisor::new(config, registry, None);
    let task = tokio::spawn(supervisor.run());

    let mut status = control.status();
    let ready = wait_status(&mut status, Duration::from_secs(10), |s| {
        s.addr.is_some() && s.ready_workers() == workers
    })
    .await;

    TestServer {
        control,
        addr: ready.addr.unwrap(),
        status,
        task,
    }
}

/// Poll the status channel until the predicate holds or the timeout passes.
pub async fn wait_status<F>(
    status: &mut watch::Receiver<PoolStatus>,
    timeout: Duration,
    mut pred: F,
) -> PoolStatus
where
    F: FnMut(&PoolStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        {
            let current = status.borrow().clone();
            if pred(&current) {
                return current;
            }
        }
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    panic!("supervisor went away while waiting for pool status");
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                panic!("timed out waiting for pool status: {:?}", status.borrow().clone());
            }
        }
    }
}

/// HTTP client that talks straight to the test server.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

/// Application that sleeps before answering.
pub struct SlowApp {
    pub delay: Duration,
}

#[async_trait]
impl Application for SlowApp {
    async fn call(&self, _request: AppRequest) -> Result<AppResponse, AppError> {
        tokio::time::sleep(self.delay).await;
        Ok(AppResponse::text(StatusCode::OK, "slow done"))
    }
}

pub fn slow_factory(delay: Duration) -> Arc<dyn AppFactory> {
    Arc::new(move || -> Result<Arc<dyn Application>, AppError> {
        Ok(Arc::new(SlowApp { delay }))
    })
}

/// Application that fails on request: errors on `/boom`, panics on `/panic`.
pub struct FlakyApp;

#[async_trait]
impl Application for FlakyApp {
    async fn call(&self, request: AppRequest) -> Result<AppResponse, AppError> {
        match request.path.as_str() {
            "/boom" => Err("handler exploded".into()),
            "/panic" => panic!("handler panicked"),
            _ => Ok(AppResponse::text(StatusCode::OK, "ok")),
        }
    }
}

pub fn flaky_factory() -> Arc<dyn AppFactory> {
    Arc::new(|| -> Result<Arc<dyn Application>, AppError> { Ok(Arc::new(FlakyApp)) })
}

/// Factory whose load always fails, taking the worker down at startup.
pub fn failing_factory() -> Arc<dyn AppFactory> {
    Arc::new(|| -> Result<Arc<dyn Application>, AppError> {
        Err("application refused to load".into())
    })
}
