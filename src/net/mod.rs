//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind once, shared accept)
//!     → accepting worker (owns the connection exclusively)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - One listener, bound exactly once, shared across workers via Arc
//! - Load distribution is the kernel's accept queue, not application logic
//! - Per-worker connection limits live with the worker, not the listener

pub mod connection;
pub mod listener;

pub use listener::{Listener, ListenerError};
