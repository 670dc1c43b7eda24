use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::plugin::{MetaPlugin, PluginSelector};
use itertools::Itertools;

/// Immutable, ordered set of registered metadata plugins.
///
/// Plugins are registered in load order before the catalog opens; the first
/// plugin is the base plugin and serves key-less listings. Plugin names are
/// unique case-insensitively. Construction is fail-closed: duplicate names
/// and any ownership overlap detectable from the plugins' advertised keys
/// reject the whole registry.
#[derive(Debug)]
pub struct PluginRegistry {
    plugins: Vec<MetaPlugin>,
}

impl PluginRegistry {
    /// Builds a registry from plugins in load order.
    ///
    /// # Errors
    ///
    /// `ConfigError` when no plugin is registered, a name repeats, or more
    /// than one plugin claims an advertised key.
    pub fn new(plugins: Vec<MetaPlugin>) -> MetaResult<Self> {
        if plugins.is_empty() {
            return Err(MetaError::new(
                "at least one metadata plugin must be registered",
                ErrorKind::ConfigError,
            ));
        }

        let duplicate = plugins
            .iter()
            .map(|p| p.plugin_name().to_ascii_lowercase())
            .duplicates()
            .next();
        if let Some(name) = duplicate {
            return Err(MetaError::new(
                &format!("plugin name '{}' is registered twice", name),
                ErrorKind::ConfigError,
            ));
        }

        // manages_key is an opaque predicate, so overlap verification runs
        // over every key any plugin concretely advertises
        for plugin in &plugins {
            for key in plugin.known_keys() {
                let claimants: Vec<&str> = plugins
                    .iter()
                    .filter(|p| p.manages_key(&key))
                    .map(|p| p.plugin_name())
                    .collect();
                if claimants.len() > 1 {
                    log::error!(
                        "Key '{}' is claimed by multiple plugins: {}",
                        key,
                        claimants.join(", ")
                    );
                    return Err(MetaError::new(
                        &format!(
                            "key '{}' is claimed by multiple plugins: {}",
                            key,
                            claimants.join(", ")
                        ),
                        ErrorKind::ConfigError,
                    ));
                }
            }
        }

        log::debug!(
            "Plugin registry built with: {}",
            plugins.iter().map(|p| p.plugin_name()).join(", ")
        );
        Ok(PluginRegistry { plugins })
    }

    /// Returns the base plugin, the first registered.
    pub fn base(&self) -> &MetaPlugin {
        &self.plugins[0]
    }

    pub fn plugins(&self) -> &[MetaPlugin] {
        &self.plugins
    }

    /// Looks a plugin up by name, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// `UnsupportedMetadataPlugin` when no plugin carries the name.
    pub fn get(&self, name: &str) -> MetaResult<MetaPlugin> {
        self.plugins
            .iter()
            .find(|p| p.plugin_name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| {
                log::error!("No metadata plugin named '{}' is registered", name);
                MetaError::new(
                    &format!("metadata plugin '{}' is not registered", name),
                    ErrorKind::UnsupportedMetadataPlugin,
                )
            })
    }

    /// Resolves a selector to the plugins it addresses, in registry order.
    pub fn resolve(&self, selector: &PluginSelector) -> MetaResult<Vec<MetaPlugin>> {
        match selector {
            PluginSelector::All => Ok(self.plugins.clone()),
            PluginSelector::Named(name) => Ok(vec![self.get(name)?]),
        }
    }
}
