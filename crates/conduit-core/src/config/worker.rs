//! Worker launch configuration

use crate::process::CommandFactory;
use crate::transport::DEFAULT_MAX_FRAME_LENGTH;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn default_max_frame_length() -> usize {
    DEFAULT_MAX_FRAME_LENGTH
}

fn default_true() -> bool {
    true
}

/// How to launch one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Command to execute
    pub command: String,
    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Longest accepted message frame in bytes
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,
    /// Upper bound callers put on a single call; the core itself never times out
    #[serde(default, with = "humantime_serde")]
    pub call_timeout: Option<Duration>,
    /// Whether this worker is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl WorkerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            call_timeout: None,
            enabled: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Process factory launching this worker
    pub fn factory(&self) -> CommandFactory {
        CommandFactory::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = WorkerConfig::new("python3")
            .with_args(["-u", "worker.py"])
            .with_env("PYTHONUNBUFFERED", "1");

        assert_eq!(config.args, vec!["-u", "worker.py"]);
        assert_eq!(config.env.len(), 1);
        assert!(config.enabled);
        assert_eq!(config.factory().config().command, "python3");
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: WorkerConfig = serde_json::from_str(r#"{"command": "node"}"#).unwrap();
        assert_eq!(config.max_frame_length, DEFAULT_MAX_FRAME_LENGTH);
        assert!(config.enabled);
        assert!(config.call_timeout.is_none());
    }
}
