//! Built-in status application.
//!
//! The default entry point (`service:app`) when no application has been
//! wired in. Answers a health probe and an index route, which is enough to
//! exercise the full serving path end to end.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde_json::json;

use crate::app::{AppError, AppFactory, AppRequest, AppResponse, Application};

/// Entry point reference the status application registers under.
pub const ENTRY_POINT: &str = "service:app";

/// Minimal application serving `/health` and `/`.
pub struct StatusApp;

#[async_trait]
impl Application for StatusApp {
    async fn call(&self, request: AppRequest) -> Result<AppResponse, AppError> {
        match (&request.method, request.path.as_str()) {
            (&Method::GET, "/health") => Ok(AppResponse::json(
                StatusCode::OK,
                &json!({ "status": "OK" }),
            )),
            (&Method::GET, "/") => Ok(AppResponse::json(
                StatusCode::OK,
                &json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            )),
            _ => Ok(AppResponse::text(StatusCode::NOT_FOUND, "not found")),
        }
    }
}

/// Factory for the status application.
pub fn factory() -> Arc<dyn AppFactory> {
    Arc::new(|| -> Result<Arc<dyn Application>, AppError> { Ok(Arc::new(StatusApp)) })
}
