//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the application server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Worker pool sizing and per-worker limits.
    pub workers: WorkersConfig,

    /// Hosted application selection.
    pub app: AppConfig,

    /// Shutdown and reload behavior.
    pub lifecycle: LifecycleConfig,

    /// Worker respawn policy.
    pub restart: RestartConfig,

    /// Per-request limits.
    pub limits: LimitsConfig,

    /// Process identity settings.
    pub runtime: RuntimeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Number of workers in the pool.
    pub count: usize,

    /// Maximum concurrent connections per worker (backpressure).
    pub max_connections: usize,

    /// Interval between worker heartbeats in seconds.
    pub heartbeat_interval_secs: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: 4,
            max_connections: 256,
            heartbeat_interval_secs: 5,
        }
    }
}

impl WorkersConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Hosted application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application entry point, `module:attribute` style.
    pub entry_point: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entry_point: "service:app".to_string(),
        }
    }
}

/// Shutdown and reload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long draining workers may take to finish in-flight work, in
    /// seconds. Workers still running at the deadline are terminated.
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

impl LifecycleConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Worker respawn policy.
///
/// Respawns are budgeted per worker slot over a sliding window so a
/// crash-looping application degrades capacity instead of spinning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Maximum respawns per worker slot within the window.
    pub max_restarts: u32,

    /// Sliding window for the restart budget, in seconds.
    pub window_secs: u64,

    /// Base delay for respawn backoff in milliseconds.
    pub backoff_base_ms: u64,

    /// Maximum delay for respawn backoff in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            window_secs: 60,
            backoff_base_ms: 100,
            backoff_max_ms: 1000,
        }
    }
}

impl RestartConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Per-request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Request timeout (application call) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

impl LimitsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Unprivileged account to switch to after the listener has bound.
    /// When unset the process keeps its current identity.
    pub user: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.workers.max_connections, 256);
        assert_eq!(config.app.entry_point, "service:app");
        assert_eq!(config.lifecycle.drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.restart.max_restarts, 5);
        assert!(config.runtime.user.is_none());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [workers]
            count = 2
            "#,
        )
        .expect("valid config");

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.workers.count, 2);
        // Untouched sections keep their defaults.
        assert_eq!(config.workers.max_connections, 256);
        assert_eq!(config.app.entry_point, "service:app");
    }

    #[test]
    fn full_toml_round_trips() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "0.0.0.0:8081"

            [workers]
            count = 8
            max_connections = 64
            heartbeat_interval_secs = 2

            [app]
            entry_point = "billing:app"

            [lifecycle]
            drain_timeout_secs = 10

            [restart]
            max_restarts = 3
            window_secs = 30

            [limits]
            request_timeout_secs = 5
            max_body_bytes = 1024

            [runtime]
            user = "appuser"

            [observability]
            log_level = "debug"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.workers.count, 8);
        assert_eq!(config.app.entry_point, "billing:app");
        assert_eq!(config.runtime.user.as_deref(), Some("appuser"));
        assert_eq!(config.limits.max_body_bytes, 1024);
    }
}
