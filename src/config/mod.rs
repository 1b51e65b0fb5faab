//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → propagated to listener, workers and supervisor at spawn time
//!
//! On reload signal (SIGHUP):
//!     loader.rs loads the file again
//!     → validation.rs validates
//!     → supervisor rotates workers onto the new config
//!     → an invalid reload is rejected; the running config stays active
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::ServerConfig;
pub use schema::ListenerConfig;
pub use schema::WorkersConfig;
