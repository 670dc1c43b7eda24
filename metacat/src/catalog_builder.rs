use crate::catalog::MetaCatalog;
use crate::common::Hierarchy;
use crate::errors::{MetaError, MetaResult};
use crate::meta_config::MetaConfig;
use crate::plugin::MetaPlugin;

/// Fluent builder for opening a [MetaCatalog].
///
/// Deferred-error style: configuration mistakes are captured as they happen
/// and surface from [CatalogBuilder::open], so call chains stay clean.
///
/// # Examples
///
/// ```rust,ignore
/// let catalog = CatalogBuilder::default()
///     .hierarchy(hierarchy)
///     .plugin(column_plugin.as_plugin())
///     .plugin(json_plugin.as_plugin())
///     .single_plugin_writes(true)
///     .open()?;
/// ```
pub struct CatalogBuilder {
    error: Option<MetaError>,
    config: MetaConfig,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        CatalogBuilder {
            error: None,
            config: MetaConfig::new(),
        }
    }

    /// Binds the hierarchy provider of the external entity catalog.
    pub fn hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_hierarchy(hierarchy) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Registers a metadata plugin. The first registered plugin is the base
    /// plugin.
    pub fn plugin(mut self, plugin: MetaPlugin) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.load_plugin(plugin) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Demands that every bulk write lands in a single plugin.
    pub fn single_plugin_writes(mut self, demand: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_single_plugin_writes(demand) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Freezes the configuration and opens the catalog.
    ///
    /// # Errors
    ///
    /// The first captured builder error, or any registry rejection from
    /// initialization.
    pub fn open(self) -> MetaResult<MetaCatalog> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize()?;
        MetaCatalog::open(self.config)
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}
