//! Request identification.
//!
//! # Responsibilities
//! - Generate a unique request ID per request
//! - Honor a client-supplied `x-request-id` when it is a valid UUID
//!
//! # Design Decisions
//! - Request ID attached as early as possible so every log line about a
//!   request carries it

use hyper::header::{HeaderMap, HeaderValue};
use uuid::Uuid;

/// Header carrying the request ID, both inbound and outbound.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reuse the client-supplied ID when present and valid, otherwise
    /// generate one.
    pub fn for_request(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(Self)
            .unwrap_or_else(Self::new)
    }

    /// Render as a header value. UUIDs are plain ASCII, so this cannot fail.
    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.0.to_string()).expect("uuid is a valid header value")
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
