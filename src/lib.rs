//! gantry, a supervised HTTP application server.
//!
//! A single long-lived process binds a port, drops privileges, spawns a
//! fixed-size pool of workers that each load one application object, and
//! turns termination/reload signals into an orderly drain or a rolling
//! restart.

// Core subsystems
pub mod app;
pub mod config;
pub mod http;
pub mod net;
pub mod supervisor;
pub mod worker;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use app::AppRegistry;
pub use config::ServerConfig;
pub use error::ServerError;
pub use lifecycle::{ControlEvent, ServerState, ShutdownOutcome};
pub use supervisor::{PoolStatus, Supervisor, SupervisorControl};
