//! Response shaping.
//!
//! # Responsibilities
//! - Convert normalized application responses into wire responses
//! - Produce generic error responses for contained per-request failures
//! - Stamp `x-request-id` and `server` on everything leaving the process

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};

use crate::app::AppResponse;
use crate::http::request::{RequestId, X_REQUEST_ID};

/// Value of the `server` header.
pub const SERVER_NAME: &str = concat!("gantry/", env!("CARGO_PKG_VERSION"));

fn stamp(response: &mut Response<Full<Bytes>>, request_id: &RequestId) {
    let headers = response.headers_mut();
    headers.insert(X_REQUEST_ID, request_id.header_value());
    headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
}

/// Convert an application response into a wire response.
pub fn into_http(app_response: AppResponse, request_id: &RequestId) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(app_response.body));
    *response.status_mut() = app_response.status;
    *response.headers_mut() = app_response.headers;
    stamp(&mut response, request_id);
    response
}

/// Build a generic error response.
///
/// Application failures are never forwarded verbatim; the client sees only a
/// short plain-text message and the request ID for correlation.
pub fn error_response(
    status: StatusCode,
    message: &str,
    request_id: &RequestId,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    stamp(&mut response, request_id);
    response
}
