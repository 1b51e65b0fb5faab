//! Fatal startup errors.

use thiserror::Error;

use crate::app::EntryPointError;
use crate::config::ConfigError;
use crate::net::ListenerError;
use crate::security::PrivilegeError;

/// Errors that abort the server before any request is served.
///
/// Everything here is fatal: the binary reports it and exits non-zero
/// without spawning workers.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("privilege drop failed: {0}")]
    Privilege(#[from] PrivilegeError),

    #[error(transparent)]
    EntryPoint(#[from] EntryPointError),

    #[error("unknown application entry point '{0}'")]
    UnknownEntryPoint(String),
}
