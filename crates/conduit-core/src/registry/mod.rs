//! Service registry
//!
//! An immutable catalog of the services a worker exposes: each service's
//! methods, their call shape, and the parameter names used to marshal
//! arguments. Built once at startup and shared read-only by every connection.

mod marshal;

use crate::error::{ConduitError, ConduitResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

static GLOBAL_REGISTRY: OnceCell<Arc<ServiceRegistry>> = OnceCell::new();

/// How a method is invoked and how its result comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    /// Single request, single response
    #[default]
    Call,
    /// Request answered by zero or more values, then completion or error
    Stream,
    /// Fire-and-forget, no response
    Notify,
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => f.write_str("call"),
            Self::Stream => f.write_str("stream"),
            Self::Notify => f.write_str("notify"),
        }
    }
}

/// A named parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }
}

/// One remotely callable method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: MethodKind,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl MethodDefinition {
    pub fn new(name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

/// A service and its methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default, rename = "method")]
    pub methods: Vec<MethodDefinition>,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MethodDefinition) -> Self {
        self.methods.push(method);
        self
    }

    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&MethodDefinition> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// On-disk registry layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceDefinition>,
}

/// Immutable service catalog
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDefinition>,
}

impl ServiceRegistry {
    /// Build a registry, rejecting duplicate service or method names
    pub fn new(definitions: impl IntoIterator<Item = ServiceDefinition>) -> ConduitResult<Self> {
        let mut services = HashMap::new();

        for definition in definitions {
            let mut seen = std::collections::HashSet::new();
            for method in &definition.methods {
                if !seen.insert(method.name.as_str()) {
                    return Err(ConduitError::config(format!(
                        "duplicate method '{}' in service '{}'",
                        method.name, definition.name
                    )));
                }
            }

            if services.contains_key(&definition.name) {
                return Err(ConduitError::config(format!(
                    "duplicate service '{}'",
                    definition.name
                )));
            }
            services.insert(definition.name.clone(), definition);
        }

        Ok(Self { services })
    }

    /// Load definitions from a TOML, YAML or JSON file (by extension)
    pub fn load_from_file(path: &Path) -> ConduitResult<Self> {
        let file: RegistryFile = crate::config::read_file(path)?;
        Self::new(file.services)
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> ConduitResult<&ServiceDefinition> {
        self.services
            .get(name)
            .ok_or_else(|| ConduitError::service_not_found(name))
    }

    /// Look up a method of a service
    pub fn method(&self, service: &str, method: &str) -> ConduitResult<&MethodDefinition> {
        self.service(service)?
            .method(method)
            .ok_or_else(|| ConduitError::method_not_found(service, method))
    }

    /// All services, sorted by name
    pub fn services(&self) -> Vec<&ServiceDefinition> {
        let mut services: Vec<_> = self.services.values().collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Install the process-wide registry. Fails if one is already installed.
    pub fn install_global(registry: ServiceRegistry) -> ConduitResult<Arc<ServiceRegistry>> {
        let registry = Arc::new(registry);
        GLOBAL_REGISTRY
            .set(Arc::clone(&registry))
            .map_err(|_| ConduitError::config("global service registry already installed"))?;
        Ok(registry)
    }

    /// The process-wide registry, if installed
    pub fn global() -> Option<Arc<ServiceRegistry>> {
        GLOBAL_REGISTRY.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hover_service() -> ServiceDefinition {
        ServiceDefinition::new("Hover")
            .with_method(
                MethodDefinition::new("hover", MethodKind::Call)
                    .with_param(ParamSpec::required("path"))
                    .with_param(ParamSpec::required("line")),
            )
            .with_method(MethodDefinition::new("diagnostics", MethodKind::Stream))
    }

    #[test]
    fn test_lookup() {
        let registry = ServiceRegistry::new([hover_service()]).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.method("Hover", "diagnostics").unwrap().kind, MethodKind::Stream);
        assert!(matches!(
            registry.service("Missing"),
            Err(ConduitError::ServiceNotFound { .. })
        ));
        assert!(matches!(
            registry.method("Hover", "missing"),
            Err(ConduitError::MethodNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let err = ServiceRegistry::new([hover_service(), ServiceDefinition::new("Hover")]).unwrap_err();
        assert!(matches!(err, ConduitError::Config { .. }));
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let service = ServiceDefinition::new("Dup")
            .with_method(MethodDefinition::new("a", MethodKind::Call))
            .with_method(MethodDefinition::new("a", MethodKind::Notify));
        assert!(ServiceRegistry::new([service]).is_err());
    }

    #[test]
    fn test_services_sorted() {
        let registry = ServiceRegistry::new([
            ServiceDefinition::new("Zeta"),
            ServiceDefinition::new("Alpha"),
        ])
        .unwrap();
        let names: Vec<_> = registry.services().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_registry_file_toml() {
        let file: RegistryFile = toml::from_str(
            r#"
            [[service]]
            name = "Debugger"

            [[service.method]]
            name = "setBreakpoint"
            params = [{ name = "path" }, { name = "condition", optional = true }]

            [[service.method]]
            name = "events"
            kind = "stream"
            "#,
        )
        .unwrap();

        let registry = ServiceRegistry::new(file.services).unwrap();
        let method = registry.method("Debugger", "setBreakpoint").unwrap();
        assert_eq!(method.kind, MethodKind::Call);
        assert_eq!(method.params[1], ParamSpec::optional("condition"));
        assert_eq!(registry.method("Debugger", "events").unwrap().kind, MethodKind::Stream);
    }

    #[test]
    fn test_global_install_once() {
        let installed = ServiceRegistry::install_global(ServiceRegistry::new([hover_service()]).unwrap());
        // Only test touching the global slot
        let installed = installed.unwrap();
        assert!(Arc::ptr_eq(&installed, &ServiceRegistry::global().unwrap()));

        let again = ServiceRegistry::install_global(ServiceRegistry::default());
        assert!(again.is_err());
    }
}
