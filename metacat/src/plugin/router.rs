use crate::common::MetaValue;
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::plugin::{MetaPlugin, PluginRegistry};
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Selects which plugins an operation addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PluginSelector {
    /// Exactly one plugin, by registered name.
    Named(String),
    /// Every registered plugin.
    #[default]
    All,
}

impl PluginSelector {
    pub fn named(name: &str) -> Self {
        PluginSelector::Named(name.to_string())
    }
}

impl Display for PluginSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginSelector::Named(name) => write!(f, "{}", name),
            PluginSelector::All => write!(f, "ALL"),
        }
    }
}

/// One plugin's slice of a partitioned write.
#[derive(Clone, Debug)]
pub struct WritePartition {
    plugin: MetaPlugin,
    values: BTreeMap<String, MetaValue>,
}

impl WritePartition {
    pub fn plugin(&self) -> &MetaPlugin {
        &self.plugin
    }

    pub fn values(&self) -> &BTreeMap<String, MetaValue> {
        &self.values
    }
}

/// Resolves key ownership against the plugin registry.
///
/// Every read, write, and filter compilation goes through the router first;
/// it alone decides which plugin is authoritative for a key. Resolution is
/// fail-closed: a key nobody claims is an error, and so is a key more than
/// one plugin claims at resolution time.
#[derive(Clone)]
pub struct KeyRouter {
    registry: Arc<PluginRegistry>,
}

impl KeyRouter {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        KeyRouter { registry }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Resolves the single plugin authoritative for a write to `key`.
    ///
    /// # Errors
    ///
    /// `UnmanagedKey` when no plugin claims the key; `ConfigError` when more
    /// than one does.
    pub fn resolve_write(&self, key: &str) -> MetaResult<MetaPlugin> {
        let claimants: Vec<&MetaPlugin> = self
            .registry
            .plugins()
            .iter()
            .filter(|p| p.manages_key(key))
            .collect();
        match claimants.len() {
            0 => {
                log::error!("No registered plugin manages key '{}'", key);
                Err(MetaError::new(
                    &format!("no registered plugin manages key '{}'", key),
                    ErrorKind::UnmanagedKey,
                ))
            }
            1 => Ok(claimants[0].clone()),
            _ => Err(MetaError::new(
                &format!(
                    "key '{}' is claimed by multiple plugins: {}",
                    key,
                    claimants.iter().map(|p| p.plugin_name()).join(", ")
                ),
                ErrorKind::ConfigError,
            )),
        }
    }

    /// Resolves the plugins a read addresses, in registry order.
    pub fn resolve_read(&self, selector: &PluginSelector) -> MetaResult<Vec<MetaPlugin>> {
        self.registry.resolve(selector)
    }

    /// Splits a key/value batch into per-plugin partitions, registry order.
    ///
    /// Every key is resolved before any partition is returned, so a single
    /// unmanaged key rejects the whole batch up front.
    pub fn partition_write(
        &self,
        values: &BTreeMap<String, MetaValue>,
    ) -> MetaResult<Vec<WritePartition>> {
        let mut partitions: IndexMap<String, WritePartition> = self
            .registry
            .plugins()
            .iter()
            .map(|plugin| {
                (
                    plugin.plugin_name().to_string(),
                    WritePartition {
                        plugin: plugin.clone(),
                        values: BTreeMap::new(),
                    },
                )
            })
            .collect();

        for (key, value) in values {
            let plugin = self.resolve_write(key)?;
            if let Some(partition) = partitions.get_mut(plugin.plugin_name()) {
                partition.values.insert(key.clone(), value.clone());
            }
        }

        Ok(partitions
            .into_values()
            .filter(|p| !p.values.is_empty())
            .collect())
    }

    /// Resolves the single plugin a filter expression compiles against.
    ///
    /// With an explicit plugin selection the filter goes there unchecked.
    /// Otherwise the filter keys decide: no keys means the base plugin, and
    /// keys owned by more than one plugin cannot be answered by a single
    /// backend query.
    ///
    /// # Errors
    ///
    /// `UnmanagedKey` for a key nobody claims; `CrossPluginFilter` when the
    /// keys span plugins.
    pub fn resolve_filter_keys(
        &self,
        keys: &BTreeSet<String>,
        selector: &PluginSelector,
    ) -> MetaResult<MetaPlugin> {
        if let PluginSelector::Named(name) = selector {
            return self.registry.get(name);
        }
        if keys.is_empty() {
            return Ok(self.registry.base().clone());
        }

        let mut owners: IndexMap<String, MetaPlugin> = IndexMap::new();
        for key in keys {
            let plugin = self.resolve_write(key)?;
            owners.insert(plugin.plugin_name().to_string(), plugin);
        }
        if owners.len() > 1 {
            log::error!(
                "Filter keys {:?} span plugins: {}",
                keys,
                owners.keys().join(", ")
            );
            return Err(MetaError::new(
                &format!(
                    "filter keys span multiple plugins ({}); restrict the filter or select one plugin",
                    owners.keys().join(", ")
                ),
                ErrorKind::CrossPluginFilter,
            ));
        }
        match owners.into_iter().next() {
            Some((_, plugin)) => Ok(plugin),
            None => Ok(self.registry.base().clone()),
        }
    }
}
