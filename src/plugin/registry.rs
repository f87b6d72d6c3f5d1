use crate::config::OrchestratorConfig;
use crate::plugin::component::Plugin;
use crate::plugin::contract::{ContractError, ContractSet};
use crate::plugin::metadata::ComponentMetadata;
use crate::plugin::{Category, validator};
use crate::version::Resolution;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Plugin name must be a non-empty string")]
    EmptyName,

    #[error("Plugin category must be a non-empty string")]
    EmptyCategory,

    #[error("{0}")]
    UnknownCategory(String),

    /// Displays as the first validation error, verbatim.
    #[error("{message}")]
    ContractViolation {
        category: Category,
        name: String,
        message: String,
    },

    #[error("Plugin not found: {category}:{name}")]
    PluginNotFound { category: Category, name: String },

    #[error("Plugin {name} resolved to {expected} but the candidate declares {found}")]
    VersionMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Contracts(#[from] ContractError),
}

/// A registered plugin. The metadata has passed contract validation.
#[derive(Debug, Clone)]
struct RegistryEntry {
    name: String,
    plugin: Arc<Plugin>,
}

/// Catalog of plugins keyed by category and name.
///
/// Registration validates the candidate against the contract loaded for its
/// category; categories without a contract accept anything (with a warning).
/// Mutation takes `&mut self`; callers sharing a registry synchronize it
/// themselves (see [`PluginRegistry::global`]).
#[derive(Debug, Default)]
pub struct PluginRegistry {
    contracts: ContractSet,
    entries: HashMap<Category, Vec<RegistryEntry>>,
}

static GLOBAL: OnceLock<RwLock<PluginRegistry>> = OnceLock::new();

impl PluginRegistry {
    /// An empty registry with no contracts. Every registration is accepted.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contracts(contracts: ContractSet) -> Self {
        Self {
            contracts,
            entries: HashMap::new(),
        }
    }

    /// Builds a registry from configuration: contracts are loaded from
    /// `contracts_dir` under the environment's policy, or the builtin set is
    /// used when no directory is configured.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, RegistryError> {
        let contracts = match &config.contracts_dir {
            Some(dir) => ContractSet::load_dir(dir, config.environment.contract_policy())?,
            None => ContractSet::builtin(),
        };
        log::info!(
            "Plugin registry initialised with {} contract(s) ({} mode)",
            contracts.len(),
            config.environment
        );
        Ok(Self::with_contracts(contracts))
    }

    /// Process-wide registry backed by the builtin contracts. Intended for the
    /// application boundary; library code should take a registry explicitly.
    pub fn global() -> &'static RwLock<PluginRegistry> {
        GLOBAL.get_or_init(|| RwLock::new(PluginRegistry::with_contracts(ContractSet::builtin())))
    }

    pub fn contracts(&self) -> &ContractSet {
        &self.contracts
    }

    /// Validates `plugin` against the `category` contract and stores it as
    /// `category:name`, replacing any plugin already registered there.
    pub fn register(
        &mut self,
        category: Category,
        name: &str,
        plugin: Plugin,
    ) -> Result<&mut Self, RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }

        match self.contracts.get(category) {
            Some(contract) => {
                let report = validator::validate(contract, &plugin);
                for warning in report.warnings() {
                    log::warn!("{}:{}: {}", category, name, warning);
                }
                if let Some(first) = report.first_error() {
                    return Err(RegistryError::ContractViolation {
                        category,
                        name: name.to_string(),
                        message: first.message.clone(),
                    });
                }
            }
            None => log::warn!(
                "No contract loaded for category '{}'; registering {} without validation",
                category,
                name
            ),
        }

        let plugin = Arc::new(plugin);
        let entries = self.entries.entry(category).or_default();
        match entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => {
                log::debug!("Replacing plugin {}:{}", category, name);
                existing.plugin = plugin;
            }
            None => {
                log::debug!("Registered plugin {}:{}", category, name);
                entries.push(RegistryEntry {
                    name: name.to_string(),
                    plugin,
                });
            }
        }
        Ok(self)
    }

    /// Like [`register`](Self::register), with the category given as a string
    /// (as read from a manifest).
    pub fn register_raw(
        &mut self,
        category: &str,
        name: &str,
        plugin: Plugin,
    ) -> Result<&mut Self, RegistryError> {
        if category.trim().is_empty() {
            return Err(RegistryError::EmptyCategory);
        }
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let category = category
            .parse::<Category>()
            .map_err(RegistryError::UnknownCategory)?;
        self.register(category, name, plugin)
    }

    /// Registers a plugin built from a resolved catalog version. The candidate's
    /// metadata must declare the version that was resolved.
    pub fn register_resolved(
        &mut self,
        category: Category,
        resolution: &Resolution,
        plugin: Plugin,
    ) -> Result<&mut Self, RegistryError> {
        let expected = resolution.version.to_string();
        if let Some(found) = plugin.metadata().map(|m| m.version.as_str()) {
            if found != expected {
                return Err(RegistryError::VersionMismatch {
                    name: resolution.name.clone(),
                    expected,
                    found: found.to_string(),
                });
            }
        }
        self.register(category, &resolution.name, plugin)
    }

    pub fn get(&self, category: Category, name: &str) -> Result<Arc<Plugin>, RegistryError> {
        self.entries
            .get(&category)
            .and_then(|entries| entries.iter().find(|e| e.name == name))
            .map(|e| Arc::clone(&e.plugin))
            .ok_or_else(|| RegistryError::PluginNotFound {
                category,
                name: name.to_string(),
            })
    }

    /// Alias of [`get`](Self::get).
    pub fn resolve(&self, category: Category, name: &str) -> Result<Arc<Plugin>, RegistryError> {
        self.get(category, name)
    }

    /// Names registered under `category`, in first-registration order.
    pub fn list(&self, category: Category) -> Vec<String> {
        self.entries
            .get(&category)
            .map(|entries| entries.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn metadata(&self, category: Category, name: &str) -> Option<ComponentMetadata> {
        self.get(category, name)
            .ok()
            .and_then(|plugin| plugin.metadata().cloned())
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.get(category, name).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every registered plugin. Contracts are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeValue;
    use crate::core::error::BoxError;
    use crate::version::{ResolutionStrategy, VersionResolver};
    use crate::version::{BuildDescriptor, Channel, VersionCatalog};
    use serde_json::json;

    fn echo(input: NodeValue) -> std::future::Ready<Result<NodeValue, BoxError>> {
        std::future::ready(Ok(input))
    }

    fn loader(name: &str, version: &str) -> Plugin {
        Plugin::new()
            .with_metadata(
                ComponentMetadata::new(name, version, Category::Loader).description("test loader"),
            )
            .capability("load", echo)
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::with_contracts(ContractSet::builtin())
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = registry();
        registry
            .register(Category::Loader, "pdf", loader("pdf", "1.0.0"))
            .unwrap();

        assert!(registry.contains(Category::Loader, "pdf"));
        assert!(!registry.contains(Category::Embedder, "pdf"));
        assert_eq!(
            registry.metadata(Category::Loader, "pdf").map(|m| m.version),
            Some("1.0.0".to_string())
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_capability_rejected() {
        let mut registry = registry();
        let candidate = Plugin::new()
            .with_metadata(ComponentMetadata::new("pdf", "1.0.0", Category::Loader));
        let err = registry
            .register(Category::Loader, "pdf", candidate)
            .unwrap_err();
        assert_eq!(err.to_string(), "Plugin missing required method: load");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_category_mismatch_rejected() {
        let mut registry = registry();
        let err = registry
            .register(Category::Embedder, "pdf", loader("pdf", "1.0.0"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ContractViolation { .. }));
        assert_eq!(
            err.to_string(),
            "Plugin type mismatch: expected 'embedder', got 'loader'"
        );
    }

    #[test]
    fn test_register_raw_rejects_bad_keys() {
        let mut registry = registry();
        assert!(matches!(
            registry.register_raw("", "pdf", loader("pdf", "1.0.0")),
            Err(RegistryError::EmptyCategory)
        ));
        assert!(matches!(
            registry.register_raw("loader", " ", loader("pdf", "1.0.0")),
            Err(RegistryError::EmptyName)
        ));
        let err = registry
            .register_raw("indexer", "pdf", loader("pdf", "1.0.0"))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown plugin category 'indexer'"));
        registry
            .register_raw("loader", "pdf", loader("pdf", "1.0.0"))
            .unwrap();
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut registry = registry();
        registry
            .register(Category::Loader, "a", loader("a", "1.0.0"))
            .unwrap()
            .register(Category::Loader, "b", loader("b", "1.0.0"))
            .unwrap()
            .register(Category::Loader, "a", loader("a", "2.0.0"))
            .unwrap();

        assert_eq!(registry.list(Category::Loader), vec!["a", "b"]);
        assert_eq!(
            registry.metadata(Category::Loader, "a").map(|m| m.version),
            Some("2.0.0".to_string())
        );
    }

    #[test]
    fn test_not_found_and_clear() {
        let mut registry = registry();
        registry
            .register(Category::Loader, "pdf", loader("pdf", "1.0.0"))
            .unwrap();

        let err = registry.resolve(Category::Loader, "csv").unwrap_err();
        assert_eq!(err.to_string(), "Plugin not found: loader:csv");

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.list(Category::Loader).is_empty());
        assert_eq!(registry.contracts().len(), Category::ALL.len());
    }

    #[test]
    fn test_without_contracts_accepts_anything() {
        let mut registry = PluginRegistry::new();
        registry
            .register(Category::Generator, "raw", Plugin::new().value("model", "x"))
            .unwrap();
        assert_eq!(registry.list(Category::Generator), vec!["raw"]);
    }

    #[test]
    fn test_register_resolved_checks_version() {
        let mut catalog = VersionCatalog::new();
        catalog.insert(
            "pdf",
            ComponentMetadata::new("pdf", "1.1.0", Category::Loader),
        );
        catalog
            .publish("pdf", "1.1.0", BuildDescriptor::default(), Some(Channel::Latest))
            .unwrap();
        let resolution = VersionResolver::new(&catalog)
            .resolve_version("pdf", "latest")
            .unwrap();
        assert_eq!(resolution.strategy, ResolutionStrategy::Channel(Channel::Latest));

        let mut registry = registry();
        let err = registry
            .register_resolved(Category::Loader, &resolution, loader("pdf", "1.0.0"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::VersionMismatch { .. }));

        registry
            .register_resolved(Category::Loader, &resolution, loader("pdf", "1.1.0"))
            .unwrap();
        assert!(registry.contains(Category::Loader, "pdf"));
    }

    #[test]
    fn test_global_registry() {
        let global = PluginRegistry::global();
        global
            .write()
            .unwrap()
            .register(Category::Evaluator, "global-test", {
                Plugin::new()
                    .with_metadata(
                        ComponentMetadata::new("global-test", "0.1.0", Category::Evaluator)
                            .description("scores"),
                    )
                    .capability("evaluate", |_input: NodeValue| async {
                        Ok::<_, BoxError>(json!({ "score": 1.0 }))
                    })
            })
            .unwrap();
        assert!(
            PluginRegistry::global()
                .read()
                .unwrap()
                .contains(Category::Evaluator, "global-test")
        );
    }
}
