//! Application boundary subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     entry point string ("module:attribute")
//!         → registry.rs (resolve to a factory, fatal if unknown)
//!         → each worker calls AppFactory::load() exactly once
//!         → Arc<dyn Application> held for the worker's lifetime
//!
//! per request:
//!     normalized AppRequest → Application::call → normalized AppResponse
//! ```
//!
//! # Design Decisions
//! - Loading is a one-time initialization step per worker; the loaded handle
//!   is passed into the dispatch path, never looked up per request
//! - Application failures are values, not process state: an Err from call()
//!   is contained to that single request

pub mod registry;
pub mod status;

pub use registry::{AppRegistry, EntryPoint, EntryPointError};

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};

use crate::http::request::RequestId;

/// Error surfaced by an application load or call.
pub type AppError = Box<dyn std::error::Error + Send + Sync>;

/// A normalized request handed to the hosted application.
#[derive(Debug, Clone)]
pub struct AppRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: RequestId,
    pub peer_addr: SocketAddr,
}

/// A normalized response produced by the hosted application.
#[derive(Debug, Clone)]
pub struct AppResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AppResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a plain-text response.
    pub fn text(status: StatusCode, body: &str) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.body = Bytes::from(body.to_string());
        response
    }

    /// Create a JSON response.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        response.body = Bytes::from(value.to_string());
        response
    }
}

/// The single callable entity that serves requests.
///
/// One instance is loaded per worker and shared across that worker's
/// connections, so implementations must be `Send + Sync`.
#[async_trait]
pub trait Application: Send + Sync {
    async fn call(&self, request: AppRequest) -> Result<AppResponse, AppError>;
}

/// Constructs an [`Application`] instance.
///
/// `load` runs once per worker. A failed load takes the worker down and is
/// handled by the supervisor's respawn policy.
pub trait AppFactory: Send + Sync {
    fn load(&self) -> Result<Arc<dyn Application>, AppError>;
}

impl<F> AppFactory for F
where
    F: Fn() -> Result<Arc<dyn Application>, AppError> + Send + Sync,
{
    fn load(&self) -> Result<Arc<dyn Application>, AppError> {
        (self)()
    }
}
