//! Entry point parsing and application registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::app::AppFactory;

/// A parsed application entry point, `module:attribute` style.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    pub module: String,
    pub attribute: String,
}

/// Error type for entry point parsing.
#[derive(Debug, PartialEq, Eq)]
pub struct EntryPointError(String);

impl std::fmt::Display for EntryPointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid application entry point '{}': expected 'module:attribute'",
            self.0
        )
    }
}

impl std::error::Error for EntryPointError {}

impl EntryPoint {
    /// Parse a `module:attribute` reference.
    pub fn parse(raw: &str) -> Result<Self, EntryPointError> {
        let (module, attribute) = raw
            .split_once(':')
            .ok_or_else(|| EntryPointError(raw.to_string()))?;
        if module.is_empty()
            || attribute.is_empty()
            || module.chars().any(char::is_whitespace)
            || attribute.contains(':')
            || attribute.chars().any(char::is_whitespace)
        {
            return Err(EntryPointError(raw.to_string()));
        }
        Ok(Self {
            module: module.to_string(),
            attribute: attribute.to_string(),
        })
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}

/// Registry of loadable applications, keyed by entry point.
///
/// Populated before the supervisor starts; resolution of the configured entry
/// point happens once at startup and a miss is a fatal error there.
#[derive(Default)]
pub struct AppRegistry {
    apps: HashMap<String, Arc<dyn AppFactory>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an entry point reference.
    pub fn register(
        &mut self,
        entry_point: &str,
        factory: Arc<dyn AppFactory>,
    ) -> Result<(), EntryPointError> {
        let entry = EntryPoint::parse(entry_point)?;
        self.apps.insert(entry.to_string(), factory);
        Ok(())
    }

    /// Look up the factory for a parsed entry point.
    pub fn resolve(&self, entry: &EntryPoint) -> Option<Arc<dyn AppFactory>> {
        self.apps.get(&entry.to_string()).cloned()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
