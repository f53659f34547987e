//! Service and worker listings

use conduit_core::{ConduitConfig, ServiceDefinition, ServiceRegistry};
use serde_json::json;

/// List registered services and their methods
pub fn list_services(registry: &ServiceRegistry, format: &str) -> anyhow::Result<()> {
    let services = registry.services();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&services)?);
        return Ok(());
    }

    if services.is_empty() {
        println!("No services registered.");
        println!("\nDeclare services with [[service]] tables or point registry_file at a file.");
        return Ok(());
    }

    println!("Registered Services:\n");
    for service in services {
        print!("{}", describe_service(service));
    }
    Ok(())
}

/// List configured workers
pub fn list_workers(config: &ConduitConfig, format: &str) -> anyhow::Result<()> {
    let workers = config.workers_by_name();

    if format == "json" {
        let output: Vec<_> = workers
            .iter()
            .map(|(name, worker)| json!({ "name": name, "config": worker }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if workers.is_empty() {
        println!("No workers configured.");
        return Ok(());
    }

    println!("Configured Workers:\n");
    for (name, worker) in workers {
        let status = if worker.enabled { "enabled" } else { "disabled" };
        let mut command = worker.command.clone();
        for arg in &worker.args {
            command.push(' ');
            command.push_str(arg);
        }
        println!("  {} - {} [{}]", name, command, status);
        if let Some(timeout) = worker.call_timeout {
            println!("    call timeout: {:?}", timeout);
        }
    }
    Ok(())
}

fn describe_service(service: &ServiceDefinition) -> String {
    let mut out = format!("  {}\n", service.name);
    for method in &service.methods {
        let params: Vec<String> = method
            .params
            .iter()
            .map(|p| {
                if p.optional {
                    format!("{}?", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect();
        out.push_str(&format!(
            "    {}({}) [{}]\n",
            method.name,
            params.join(", "),
            method.kind
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{MethodDefinition, MethodKind, ParamSpec};

    #[test]
    fn test_describe_service() {
        let service = ServiceDefinition::new("Hover")
            .with_method(
                MethodDefinition::new("hover", MethodKind::Call)
                    .with_param(ParamSpec::required("line"))
                    .with_param(ParamSpec::optional("column")),
            )
            .with_method(MethodDefinition::new("changed", MethodKind::Notify));

        assert_eq!(
            describe_service(&service),
            "  Hover\n    hover(line, column?) [call]\n    changed() [notify]\n"
        );
    }
}
