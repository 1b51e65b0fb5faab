//! Lifecycle tests: drain, forced shutdown, startup failures, reload.

use std::time::Duration;

use gantry::supervisor::WorkerState;
use gantry::{ControlEvent, ServerError, ServerState, ShutdownOutcome, Supervisor};

mod common;

#[tokio::test]
async fn drain_lets_inflight_request_finish() {
    let server = common::start_server(
        common::test_config(1),
        common::registry_with(common::slow_factory(Duration::from_millis(600))),
    )
    .await;
    let client = common::client();

    let url = common::url(server.addr, "/");
    let inflight = tokio::spawn(async move { client.get(&url).send().await });

    // Let the request reach the worker, then ask for shutdown.
    tokio::time::sleep(Duration::from_millis(150)).await;
    server.control.send(ControlEvent::Shutdown);

    let response = inflight.await.unwrap().expect("in-flight request was dropped");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "slow done");

    let outcome = server.task.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);

    let status = server.status.borrow().clone();
    assert_eq!(status.state, ServerState::Stopped);
}

#[tokio::test]
async fn draining_server_takes_no_new_work() {
    let server = common::start_server(
        common::test_config(1),
        common::registry_with(common::slow_factory(Duration::from_millis(800))),
    )
    .await;
    let client = common::client();

    let url = common::url(server.addr, "/");
    let inflight = {
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move { client.get(&url).send().await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    server.control.send(ControlEvent::Shutdown);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Nobody accepts after the drain signal; this request never gets served.
    let late = client
        .get(&url)
        .timeout(Duration::from_millis(300))
        .send()
        .await;
    assert!(late.is_err(), "request accepted during drain");

    let response = inflight.await.unwrap().expect("in-flight request was dropped");
    assert_eq!(response.status(), 200);

    let outcome = server.task.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
}

#[tokio::test]
async fn drain_timeout_forces_unclean_shutdown() {
    let mut config = common::test_config(1);
    config.lifecycle.drain_timeout_secs = 1;
    let server = common::start_server(
        config,
        common::registry_with(common::slow_factory(Duration::from_secs(30))),
    )
    .await;
    let client = common::client();

    let url = common::url(server.addr, "/");
    let inflight = tokio::spawn(async move {
        client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    server.control.send(ControlEvent::Shutdown);

    let outcome = server.task.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Forced);

    // The stuck request was abandoned, not answered.
    assert!(inflight.await.unwrap().is_err());
}

#[tokio::test]
async fn occupied_port_fails_before_any_worker_spawns() {
    let holder = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = holder.local_addr().unwrap();

    let mut config = common::test_config(2);
    config.listener.bind_address = addr.to_string();

    let (supervisor, control) = Supervisor::new(config, common::status_registry(), None);
    let err = supervisor.run().await.unwrap_err();
    assert!(matches!(err, ServerError::Listener(_)));
    assert!(control.status().borrow().workers.is_empty());
}

#[tokio::test]
async fn unknown_entry_point_fails_before_any_worker_spawns() {
    let mut config = common::test_config(2);
    config.app.entry_point = "missing:app".to_string();

    let (supervisor, control) = Supervisor::new(config, common::status_registry(), None);
    let err = supervisor.run().await.unwrap_err();
    assert!(matches!(err, ServerError::UnknownEntryPoint(_)));
    assert!(control.status().borrow().workers.is_empty());
}

#[tokio::test]
async fn missing_runtime_account_fails_startup() {
    let mut config = common::test_config(1);
    config.runtime.user = Some("gantry-no-such-account".to_string());

    let (supervisor, control) = Supervisor::new(config, common::status_registry(), None);
    let err = supervisor.run().await.unwrap_err();
    assert!(matches!(err, ServerError::Privilege(_)));
    assert!(control.status().borrow().workers.is_empty());
}

#[tokio::test]
async fn crash_looping_worker_is_left_down_after_budget() {
    let mut config = common::test_config(1);
    config.restart.max_restarts = 2;
    config.restart.backoff_base_ms = 1;
    config.restart.backoff_max_ms = 5;

    let (supervisor, control) =
        Supervisor::new(config, common::registry_with(common::failing_factory()), None);
    let task = tokio::spawn(supervisor.run());
    let mut status = control.status();

    let degraded = common::wait_status(&mut status, Duration::from_secs(10), |s| {
        s.failed_workers() == 1
    })
    .await;
    assert_eq!(degraded.ready_workers(), 0);
    let worker = &degraded.workers[0];
    assert_eq!(worker.state, WorkerState::Failed);
    assert_eq!(worker.restarts, 2);

    // The supervisor itself is still alive and shuts down on request.
    control.send(ControlEvent::Shutdown);
    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
}

#[tokio::test]
async fn rolling_reload_keeps_pool_available() {
    let server = common::start_server(common::test_config(3), common::status_registry()).await;
    let mut status = server.status.clone();

    server.control.send(ControlEvent::Reload);

    // Track the lowest Ready count observed while the pool rotates.
    let mut min_ready = usize::MAX;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let snapshot = status.borrow().clone();
        if snapshot.state == ServerState::Running {
            min_ready = min_ready.min(snapshot.ready_workers());
        }
        let rotated = snapshot.workers.iter().all(|w| w.restarts >= 1);
        if rotated && snapshot.ready_workers() == 3 {
            break;
        }
        tokio::select! {
            changed = status.changed() => changed.expect("supervisor went away during reload"),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {}
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "reload did not complete in time"
        );
    }
    assert!(
        min_ready >= 2,
        "pool dropped to {} ready workers during rotation",
        min_ready
    );

    // Still serving after the rotation.
    let client = common::client();
    let response = client
        .get(common::url(server.addr, "/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    server.control.send(ControlEvent::Shutdown);
    let outcome = server.task.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
}

#[tokio::test]
async fn second_shutdown_signal_forces_exit() {
    let mut config = common::test_config(1);
    config.lifecycle.drain_timeout_secs = 30;
    let server = common::start_server(
        config,
        common::registry_with(common::slow_factory(Duration::from_secs(60))),
    )
    .await;
    let client = common::client();

    let url = common::url(server.addr, "/");
    let _inflight = tokio::spawn(async move {
        client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    server.control.send(ControlEvent::Shutdown);
    tokio::time::sleep(Duration::from_millis(150)).await;
    server.control.send(ControlEvent::Shutdown);

    let outcome = server.task.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Forced);
}
