//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands;
use anyhow::Context;
use conduit_core::{ConduitConfig, ServiceRegistry};
use std::sync::Arc;

/// Build the service catalog and install it process-wide.
///
/// Runs once, before any supervisor is created.
pub fn install_registry(config: &ConduitConfig) -> anyhow::Result<Arc<ServiceRegistry>> {
    let registry = config
        .build_registry()
        .context("Failed to build service registry")?;
    Ok(ServiceRegistry::install_global(registry)?)
}

/// Route CLI commands to their respective handlers
pub async fn route(
    cli: Cli,
    config: ConduitConfig,
    registry: Arc<ServiceRegistry>,
) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Services { format } => commands::catalog::list_services(&registry, format),
        Commands::Workers { format } => commands::catalog::list_workers(&config, format),
        Commands::Call(args) => commands::remote::call(&config, &registry, args, cli.trace).await,
        Commands::Subscribe(args) => {
            commands::remote::subscribe(&config, &registry, args, cli.trace).await
        }
        Commands::Notify(args) => {
            commands::remote::notify(&config, &registry, args, cli.trace).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{MethodDefinition, MethodKind, ServiceDefinition};

    #[test]
    fn test_install_registry_once() {
        let mut config = ConduitConfig::default();
        config.services.push(
            ServiceDefinition::new("Hover")
                .with_method(MethodDefinition::new("hover", MethodKind::Call)),
        );

        let registry = install_registry(&config).unwrap();
        assert!(registry.service("Hover").is_ok());
        assert!(Arc::ptr_eq(&registry, &ServiceRegistry::global().unwrap()));

        assert!(install_registry(&config).is_err());
    }
}
