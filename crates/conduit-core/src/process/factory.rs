//! Process factories
//!
//! The supervisor never spawns anything itself; it asks an injected
//! [`ProcessFactory`] each time it needs a fresh worker.

use super::WorkerProcess;
use crate::config::WorkerConfig;
use crate::error::{ConduitError, ConduitResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Creates worker processes on demand
#[async_trait]
pub trait ProcessFactory: Send + Sync {
    async fn spawn(&self) -> ConduitResult<WorkerProcess>;
}

#[async_trait]
impl<F> ProcessFactory for F
where
    F: Fn() -> ConduitResult<WorkerProcess> + Send + Sync,
{
    async fn spawn(&self) -> ConduitResult<WorkerProcess> {
        (self)()
    }
}

/// Spawns a configured command with piped stdio
#[derive(Debug, Clone)]
pub struct CommandFactory {
    config: WorkerConfig,
}

impl CommandFactory {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

#[async_trait]
impl ProcessFactory for CommandFactory {
    async fn spawn(&self) -> ConduitResult<WorkerProcess> {
        let mut cmd = Command::new(&self.config.command);

        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }

        debug!(command = %self.config.command, args = ?self.config.args, "spawning worker");

        let child = cmd.spawn().map_err(|e| {
            ConduitError::spawn(format!(
                "Failed to spawn worker '{}': {}",
                self.config.command, e
            ))
        })?;

        WorkerProcess::from_child(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let factory = CommandFactory::new(WorkerConfig::new("/nonexistent/conduit-worker"));
        let err = factory.spawn().await.unwrap_err();
        assert!(matches!(err, ConduitError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_closure_factory() {
        let factory = || -> ConduitResult<WorkerProcess> { Err(ConduitError::spawn("nope")) };
        assert!(ProcessFactory::spawn(&factory).await.is_err());
    }
}
