//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    Env { var: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::Env { var, message } => {
                write!(f, "Invalid environment override {}: {}", var, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration.
///
/// Resolution order: built-in defaults, then the TOML file if one was given,
/// then `GANTRY_*` environment overrides.
pub fn load(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `GANTRY_*` environment overrides on top of a loaded config.
///
/// The lookup is injected so the merge logic stays a pure function.
pub(crate) fn apply_env_overrides<F>(
    config: &mut ServerConfig,
    lookup: F,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(bind) = lookup("GANTRY_BIND") {
        config.listener.bind_address = bind;
    }
    if let Some(workers) = lookup("GANTRY_WORKERS") {
        config.workers.count = workers.parse().map_err(|_| ConfigError::Env {
            var: "GANTRY_WORKERS".into(),
            message: format!("'{}' is not a worker count", workers),
        })?;
    }
    if let Some(level) = lookup("GANTRY_LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(app) = lookup("GANTRY_APP") {
        config.app.entry_point = app;
    }
    if let Some(user) = lookup("GANTRY_USER") {
        config.runtime.user = Some(user);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            pairs
                .iter()
                .find(|(name, _)| *name == var)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = ServerConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("GANTRY_BIND", "127.0.0.1:9999"),
                ("GANTRY_WORKERS", "7"),
                ("GANTRY_LOG_LEVEL", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.workers.count, 7);
        assert_eq!(config.observability.log_level, "debug");
        // Untouched knobs keep their values.
        assert_eq!(config.app.entry_point, "service:app");
    }

    #[test]
    fn bad_worker_count_is_reported() {
        let mut config = ServerConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("GANTRY_WORKERS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
