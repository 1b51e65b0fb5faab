//! Connection serving and per-request dispatch.
//!
//! # Responsibilities
//! - Drive one connection through hyper (HTTP/1.1 keep-alive, HTTP/2)
//! - Collect the request body under the configured limit
//! - Invoke the loaded application and contain its failures
//!
//! # Design Decisions
//! - Application errors, panics and timeouts all map to a generic 500 for
//!   that request only; the connection and the worker keep going
//! - Responses on one connection go out in request order (hyper guarantees
//!   this for the protocols it negotiates)

use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::app::AppRequest;
use crate::http::request::RequestId;
use crate::http::response;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::worker::WorkerShared;

/// Serve one connection until the peer closes, an error occurs, or a drain
/// finishes the in-flight exchange.
pub(crate) async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<WorkerShared>,
    mut drain: broadcast::Receiver<()>,
) {
    let conn_id = ConnectionId::new();
    tracing::debug!(
        worker = %shared.id,
        connection = %conn_id,
        peer = %peer,
        "connection accepted"
    );

    let svc_shared = shared.clone();
    let service = service_fn(move |request: Request<Incoming>| {
        let shared = svc_shared.clone();
        async move { Ok::<_, Infallible>(dispatch(shared, peer, request).await) }
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    let result = loop {
        if draining {
            break conn.as_mut().await;
        }
        tokio::select! {
            result = conn.as_mut() => break result,
            _ = drain.recv() => {
                // Finish the in-flight exchange, then close.
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    };

    match result {
        Ok(()) => {
            tracing::debug!(worker = %shared.id, connection = %conn_id, "connection closed");
        }
        Err(error) => {
            tracing::debug!(
                worker = %shared.id,
                connection = %conn_id,
                error = %error,
                "connection ended with error"
            );
        }
    }
}

/// Run one request through the loaded application.
///
/// Always produces a response: application failures of any kind are converted
/// to a generic server error for this request alone.
async fn dispatch(
    shared: Arc<WorkerShared>,
    peer: SocketAddr,
    request: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = RequestId::for_request(request.headers());

    let (parts, body) = request.into_parts();
    let body = match Limited::new(body, shared.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            let (status, message) = if error.downcast_ref::<LengthLimitError>().is_some() {
                (StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
            } else {
                (StatusCode::BAD_REQUEST, "failed to read request body")
            };
            tracing::warn!(
                worker = %shared.id,
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %error,
                "request body rejected"
            );
            metrics::record_request(method.as_str(), status.as_u16(), started);
            return response::error_response(status, message, &request_id);
        }
    };

    let app_request = AppRequest {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        request_id: request_id.clone(),
        peer_addr: peer,
    };
    let log_path = app_request.path.clone();

    let app = shared.app.clone();
    let call = AssertUnwindSafe(async move { app.call(app_request).await }).catch_unwind();

    let http_response = match tokio::time::timeout(shared.request_timeout, call).await {
        Err(_) => {
            tracing::error!(
                worker = %shared.id,
                request_id = %request_id,
                method = %method,
                path = %log_path,
                timeout_secs = shared.request_timeout.as_secs(),
                "application call timed out"
            );
            response::error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                &request_id,
            )
        }
        Ok(Err(panic)) => {
            tracing::error!(
                worker = %shared.id,
                request_id = %request_id,
                method = %method,
                path = %log_path,
                message = crate::worker::panic_message(panic.as_ref()),
                "application panicked"
            );
            response::error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                &request_id,
            )
        }
        Ok(Ok(Err(error))) => {
            tracing::error!(
                worker = %shared.id,
                request_id = %request_id,
                method = %method,
                path = %log_path,
                error = %error,
                "application error"
            );
            response::error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                &request_id,
            )
        }
        Ok(Ok(Ok(app_response))) => response::into_http(app_response, &request_id),
    };

    shared.jobs.fetch_add(1, Ordering::Relaxed);
    let status = http_response.status();
    metrics::record_request(method.as_str(), status.as_u16(), started);
    tracing::debug!(
        worker = %shared.id,
        request_id = %request_id,
        method = %method,
        path = %log_path,
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );

    http_response
}
