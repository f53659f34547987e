//! A supervised worker for the lifetime of one command

use crate::logging::wire_logger;
use anyhow::bail;
use conduit_core::{ConduitConfig, ConduitResult, ServiceRegistry, Supervisor, SupervisorOptions};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct WorkerSession {
    pub supervisor: Supervisor,
    call_timeout: Option<Duration>,
}

impl WorkerSession {
    pub fn open(
        config: &ConduitConfig,
        registry: &Arc<ServiceRegistry>,
        worker: &str,
        trace: bool,
    ) -> anyhow::Result<Self> {
        let worker_config = config.worker(worker)?;
        if !worker_config.enabled {
            bail!("worker '{}' is disabled", worker);
        }

        let options = SupervisorOptions {
            message_logger: trace.then(wire_logger),
            max_frame_length: worker_config.max_frame_length,
            ..SupervisorOptions::default()
        };

        Ok(Self {
            supervisor: Supervisor::with_options(
                worker,
                Arc::clone(registry),
                worker_config.factory(),
                options,
            ),
            call_timeout: worker_config.call_timeout,
        })
    }

    /// Await `future`, bounded by the worker's call timeout
    pub async fn bounded<T>(&self, future: impl Future<Output = ConduitResult<T>>) -> anyhow::Result<T> {
        bounded(self.call_timeout, future).await
    }
}

impl Drop for WorkerSession {
    fn drop(&mut self) {
        self.supervisor.dispose();
    }
}

pub async fn bounded<T>(
    timeout: Option<Duration>,
    future: impl Future<Output = ConduitResult<T>>,
) -> anyhow::Result<T> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(result) => Ok(result?),
            Err(_) => bail!("worker did not answer within {:?}", limit),
        },
        None => Ok(future.await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::ConduitError;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded(
            Some(Duration::from_millis(10)),
            std::future::pending::<ConduitResult<()>>(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("did not answer"));
    }

    #[tokio::test]
    async fn test_bounded_passes_errors_through() {
        let err = bounded(None, async { Err::<(), _>(ConduitError::Disposed) })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConduitError>(),
            Some(ConduitError::Disposed)
        ));
    }

    #[test]
    fn test_open_rejects_unknown_and_disabled_workers() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("conduit.toml");
        std::fs::write(
            &path,
            "[workers.off]\ncommand = \"true\"\nenabled = false\n",
        )
        .unwrap();
        let config = ConduitConfig::load_from_file(&path).unwrap();
        let registry = Arc::new(config.build_registry().unwrap());

        assert!(WorkerSession::open(&config, &registry, "missing", false).is_err());
        let err = WorkerSession::open(&config, &registry, "off", false)
            .err()
            .unwrap();
        assert!(err.to_string().contains("disabled"));
    }
}
