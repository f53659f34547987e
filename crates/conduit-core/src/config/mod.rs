//! Configuration
//!
//! A conduit configuration names the workers that can be launched, the
//! services they expose, and how to log. Files may be JSON, TOML, or YAML;
//! the format is picked from the file extension.

mod logging;
mod worker;

pub use logging::LoggingConfig;
pub use worker::WorkerConfig;

use crate::error::{ConduitError, ConduitResult};
use crate::registry::{ServiceDefinition, ServiceRegistry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConduitConfig {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Launchable workers by name
    #[serde(default)]
    pub workers: HashMap<String, WorkerConfig>,
    /// Inline service definitions
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceDefinition>,
    /// Additional service definitions file, relative to this config file
    #[serde(default)]
    pub registry_file: Option<PathBuf>,
}

impl ConduitConfig {
    /// Load configuration from a file.
    ///
    /// Returns the default config if the file doesn't exist. A relative
    /// `registry_file` is resolved against the config file's directory.
    pub fn load_from_file(path: &Path) -> ConduitResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let mut config: Self = read_file(path)?;
        if let Some(registry_file) = config.registry_file.take() {
            let resolved = match path.parent() {
                Some(dir) if registry_file.is_relative() => dir.join(registry_file),
                _ => registry_file,
            };
            config.registry_file = Some(resolved);
        }
        Ok(config)
    }

    /// Get a worker by name
    pub fn worker(&self, name: &str) -> ConduitResult<&WorkerConfig> {
        self.workers
            .get(name)
            .ok_or_else(|| ConduitError::config(format!("unknown worker '{}'", name)))
    }

    /// All workers, sorted by name
    pub fn workers_by_name(&self) -> Vec<(&String, &WorkerConfig)> {
        let mut workers: Vec<_> = self.workers.iter().collect();
        workers.sort_by(|a, b| a.0.cmp(b.0));
        workers
    }

    /// Build the service registry from inline definitions plus `registry_file`
    pub fn build_registry(&self) -> ConduitResult<ServiceRegistry> {
        let mut definitions = self.services.clone();
        if let Some(path) = &self.registry_file {
            let file: crate::registry::RegistryFile = read_file(path)?;
            definitions.extend(file.services);
        }
        ServiceRegistry::new(definitions)
    }
}

/// Deserialize a JSON, TOML, or YAML file based on its extension
pub(crate) fn read_file<T: DeserializeOwned>(path: &Path) -> ConduitResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        ConduitError::config(format!("Failed to read config file: {}", e))
            .with_context(format!("Reading configuration from '{}'", path.display()))
    })?;

    let parsed = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            ConduitError::config(format!("Failed to parse TOML config: {}", e))
                .with_context(format!("Deserializing TOML from '{}'", path.display()))
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
            ConduitError::config(format!("Failed to parse YAML config: {}", e))
                .with_context(format!("Deserializing YAML from '{}'", path.display()))
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            ConduitError::config(format!("Failed to parse JSON config: {}", e))
                .with_context(format!("Deserializing JSON from '{}'", path.display()))
        })?,
    };

    Ok(parsed)
}
