//! Configuration management for the metadata catalog.

use crate::common::{atomic, Atomic, Hierarchy};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::plugin::{MetaPlugin, PluginRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Public interface for catalog configuration.
///
/// Plugins and the hierarchy binding are loaded before [MetaConfig::initialize];
/// afterwards the configuration is frozen and the registry immutable.
///
/// # Examples
///
/// ```rust,ignore
/// use metacat::CatalogBuilder;
///
/// let catalog = CatalogBuilder::default()
///     .hierarchy(hierarchy)
///     .plugin(column_plugin.as_plugin())
///     .plugin(json_plugin.as_plugin())
///     .open()?;
/// ```
#[derive(Clone)]
pub struct MetaConfig {
    /// The pointer to implementation. Uses Arc for cheap cloning and thread safety.
    inner: Arc<MetaConfigInner>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaConfig {
    /// Creates a new configuration instance with default values.
    pub fn new() -> Self {
        MetaConfig {
            inner: Arc::new(MetaConfigInner::new()),
        }
    }

    /// Loads a metadata plugin, appended in load order.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is already initialized.
    pub fn load_plugin(&self, plugin: MetaPlugin) -> MetaResult<()> {
        self.inner.load_plugin(plugin)
    }

    /// Binds the hierarchy provider of the external entity catalog.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is already initialized.
    pub fn set_hierarchy(&self, hierarchy: Hierarchy) -> MetaResult<()> {
        self.inner.set_hierarchy(hierarchy)
    }

    /// Demands that every bulk write lands in a single plugin.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is already initialized.
    pub fn set_single_plugin_writes(&self, demand: bool) -> MetaResult<()> {
        self.inner.set_single_plugin_writes(demand)
    }

    /// Freezes the configuration and builds the plugin registry.
    ///
    /// # Errors
    ///
    /// Returns error on double initialization, a missing hierarchy binding,
    /// or a registry rejection (no plugins, duplicate names, ownership
    /// overlap).
    pub fn initialize(&self) -> MetaResult<()> {
        self.inner.initialize()
    }

    /// Returns the built plugin registry.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is not initialized.
    pub fn registry(&self) -> MetaResult<Arc<PluginRegistry>> {
        self.inner.registry()
    }

    /// Returns the bound hierarchy.
    ///
    /// # Errors
    ///
    /// Returns error if no hierarchy is bound.
    pub fn hierarchy(&self) -> MetaResult<Hierarchy> {
        self.inner.hierarchy()
    }

    /// Returns whether bulk writes must land in a single plugin.
    pub fn single_plugin_writes(&self) -> bool {
        self.inner.single_plugin_writes.load(Ordering::Acquire)
    }
}

struct MetaConfigInner {
    configured: AtomicBool,
    single_plugin_writes: AtomicBool,
    plugins: Atomic<Vec<MetaPlugin>>,
    hierarchy: Atomic<Option<Hierarchy>>,
    registry: OnceLock<Arc<PluginRegistry>>,
}

impl MetaConfigInner {
    fn new() -> Self {
        MetaConfigInner {
            configured: AtomicBool::new(false),
            single_plugin_writes: AtomicBool::new(false),
            plugins: atomic(Vec::new()),
            hierarchy: atomic(None),
            registry: OnceLock::new(),
        }
    }

    fn check_mutable(&self) -> MetaResult<()> {
        if self.configured.load(Ordering::Acquire) {
            log::error!("Catalog configuration is already initialized");
            return Err(MetaError::new(
                "configuration cannot change after initialization",
                ErrorKind::ConfigError,
            ));
        }
        Ok(())
    }

    fn load_plugin(&self, plugin: MetaPlugin) -> MetaResult<()> {
        self.check_mutable()?;
        self.plugins.write().push(plugin);
        Ok(())
    }

    fn set_hierarchy(&self, hierarchy: Hierarchy) -> MetaResult<()> {
        self.check_mutable()?;
        *self.hierarchy.write() = Some(hierarchy);
        Ok(())
    }

    fn set_single_plugin_writes(&self, demand: bool) -> MetaResult<()> {
        self.check_mutable()?;
        self.single_plugin_writes.store(demand, Ordering::Release);
        Ok(())
    }

    fn initialize(&self) -> MetaResult<()> {
        if self.configured.swap(true, Ordering::AcqRel) {
            return Err(MetaError::new(
                "configuration is already initialized",
                ErrorKind::ConfigError,
            ));
        }
        self.hierarchy()?;
        let plugins = self.plugins.read().clone();
        let registry = PluginRegistry::new(plugins)?;
        self.registry
            .set(Arc::new(registry))
            .map_err(|_| MetaError::new("registry is already built", ErrorKind::ConfigError))?;
        Ok(())
    }

    fn registry(&self) -> MetaResult<Arc<PluginRegistry>> {
        self.registry.get().cloned().ok_or_else(|| {
            MetaError::new(
                "configuration is not initialized",
                ErrorKind::ConfigError,
            )
        })
    }

    fn hierarchy(&self) -> MetaResult<Hierarchy> {
        self.hierarchy.read().clone().ok_or_else(|| {
            log::error!("No hierarchy provider is bound");
            MetaError::new("no hierarchy provider is bound", ErrorKind::ConfigError)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ColumnAdapter, DocumentAdapter};
    use crate::common::InMemoryHierarchy;
    use crate::plugin::{ColumnMetaPlugin, JsonMetaPlugin, MetaPluginProvider};

    fn configured() -> MetaConfig {
        let hierarchy = Hierarchy::new(InMemoryHierarchy::new());
        let column =
            ColumnMetaPlugin::new(ColumnAdapter::new(hierarchy.clone()), hierarchy.clone());
        let json = JsonMetaPlugin::new(DocumentAdapter::new());

        let config = MetaConfig::new();
        config.set_hierarchy(hierarchy).unwrap();
        config.load_plugin(column.as_plugin()).unwrap();
        config.load_plugin(json.as_plugin()).unwrap();
        config
    }

    #[test]
    fn test_initialize_builds_registry() {
        let config = configured();
        config.initialize().unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.plugins().len(), 2);
        assert_eq!(registry.base().plugin_name(), "DID_COLUMN");
    }

    #[test]
    fn test_frozen_after_initialize() {
        let config = configured();
        config.initialize().unwrap();

        let json = JsonMetaPlugin::new(DocumentAdapter::new());
        let err = config.load_plugin(json.as_plugin()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigError);

        let err = config.initialize().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigError);
    }

    #[test]
    fn test_registry_before_initialize() {
        let config = configured();
        let err = config.registry().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigError);
    }

    #[test]
    fn test_missing_hierarchy_rejected() {
        let config = MetaConfig::new();
        let json = JsonMetaPlugin::new(DocumentAdapter::new());
        config.load_plugin(json.as_plugin()).unwrap();
        let err = config.initialize().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigError);
    }

    #[test]
    fn test_no_plugins_rejected() {
        let config = MetaConfig::new();
        config
            .set_hierarchy(Hierarchy::new(InMemoryHierarchy::new()))
            .unwrap();
        let err = config.initialize().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigError);
    }

    #[test]
    fn test_single_plugin_writes_flag() {
        let config = configured();
        assert!(!config.single_plugin_writes());
        config.set_single_plugin_writes(true).unwrap();
        assert!(config.single_plugin_writes());
    }
}
