//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (worker count, timeouts, limits)
//! - Check the bind address and entry point parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::app::EntryPoint;
use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    InvalidBindAddress(String),
    ZeroWorkers,
    ZeroWorkerConnections,
    ZeroDrainTimeout,
    ZeroRestartWindow,
    ZeroRequestTimeout,
    ZeroBodyLimit,
    InvalidEntryPoint(String),
    EmptyRuntimeUser,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "bind address '{}' is not a valid socket address", addr)
            }
            ValidationError::ZeroWorkers => write!(f, "workers.count must be at least 1"),
            ValidationError::ZeroWorkerConnections => {
                write!(f, "workers.max_connections must be at least 1")
            }
            ValidationError::ZeroDrainTimeout => {
                write!(f, "lifecycle.drain_timeout_secs must be at least 1")
            }
            ValidationError::ZeroRestartWindow => {
                write!(f, "restart.window_secs must be at least 1")
            }
            ValidationError::ZeroRequestTimeout => {
                write!(f, "limits.request_timeout_secs must be at least 1")
            }
            ValidationError::ZeroBodyLimit => {
                write!(f, "limits.max_body_bytes must be at least 1")
            }
            ValidationError::InvalidEntryPoint(entry) => {
                write!(
                    f,
                    "entry point '{}' is invalid, expected 'module:attribute'",
                    entry
                )
            }
            ValidationError::EmptyRuntimeUser => {
                write!(f, "runtime.user must not be empty when set")
            }
        }
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.workers.count == 0 {
        errors.push(ValidationError::ZeroWorkers);
    }
    if config.workers.max_connections == 0 {
        errors.push(ValidationError::ZeroWorkerConnections);
    }
    if config.lifecycle.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
    }
    if config.restart.window_secs == 0 {
        errors.push(ValidationError::ZeroRestartWindow);
    }
    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if EntryPoint::parse(&config.app.entry_point).is_err() {
        errors.push(ValidationError::InvalidEntryPoint(
            config.app.entry_point.clone(),
        ));
    }
    if matches!(config.runtime.user.as_deref(), Some("")) {
        errors.push(ValidationError::EmptyRuntimeUser);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.workers.count = 0;
        config.lifecycle.drain_timeout_secs = 0;
        config.app.entry_point = "no-colon".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroWorkers));
        assert!(errors.contains(&ValidationError::ZeroDrainTimeout));
    }

    #[test]
    fn empty_runtime_user_is_rejected() {
        let mut config = ServerConfig::default();
        config.runtime.user = Some(String::new());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyRuntimeUser]);
    }
}
