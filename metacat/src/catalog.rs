use crate::bulk::BulkWriteCoordinator;
use crate::common::{EntityId, MetaValue};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::filter::FilterExpression;
use crate::listing::{ListEntry, ListOptions, RecursiveListingExpander};
use crate::meta_config::MetaConfig;
use crate::plugin::{KeyRouter, MetaPlugin, PluginSelector};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Facade of the metadata routing layer.
///
/// One uniform surface over every registered plugin: reads merge the
/// per-plugin slices, writes route by key ownership, deletes go to the one
/// owning plugin, and listings compile a declarative filter against the one
/// plugin that can answer it. Cheap to clone and safe to share across
/// threads.
///
/// # Examples
///
/// ```rust,ignore
/// let catalog = CatalogBuilder::default()
///     .hierarchy(hierarchy)
///     .plugin(column_plugin.as_plugin())
///     .plugin(json_plugin.as_plugin())
///     .open()?;
///
/// catalog.set_metadata(&id, "project", MetaValue::from("data17"), false)?;
/// let meta = catalog.get_metadata(&id, &PluginSelector::All)?;
/// ```
#[derive(Clone)]
pub struct MetaCatalog {
    inner: Arc<MetaCatalogInner>,
}

impl std::fmt::Debug for MetaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaCatalog").finish_non_exhaustive()
    }
}

struct MetaCatalogInner {
    config: MetaConfig,
    router: KeyRouter,
    coordinator: BulkWriteCoordinator,
    expander: RecursiveListingExpander,
}

impl MetaCatalog {
    /// Opens a catalog from an initialized configuration.
    pub(crate) fn open(config: MetaConfig) -> MetaResult<Self> {
        let registry = config.registry()?;
        let hierarchy = config.hierarchy()?;
        let router = KeyRouter::new(registry);
        let coordinator =
            BulkWriteCoordinator::new(router.clone(), config.single_plugin_writes());
        let expander = RecursiveListingExpander::new(hierarchy);
        Ok(MetaCatalog {
            inner: Arc::new(MetaCatalogInner {
                config,
                router,
                coordinator,
                expander,
            }),
        })
    }

    pub fn config(&self) -> &MetaConfig {
        &self.inner.config
    }

    /// Reads an entity's metadata from the selected plugins, merged.
    ///
    /// Plugins own disjoint key slices; where a full dump still collides on
    /// a key, the earlier-registered plugin's value wins.
    pub fn get_metadata(
        &self,
        id: &EntityId,
        selector: &PluginSelector,
    ) -> MetaResult<BTreeMap<String, MetaValue>> {
        let mut merged = BTreeMap::new();
        for plugin in self.inner.router.resolve_read(selector)? {
            for (key, value) in plugin.get(id)? {
                merged.entry(key).or_insert(value);
            }
        }
        Ok(merged)
    }

    /// Writes one key/value pair through its owning plugin.
    pub fn set_metadata(
        &self,
        id: &EntityId,
        key: &str,
        value: MetaValue,
        recursive: bool,
    ) -> MetaResult<()> {
        let plugin = self.inner.router.resolve_write(key)?;
        let mut values = BTreeMap::new();
        values.insert(key.to_string(), value);
        plugin.set(id, &values, recursive)
    }

    /// Writes a key/value batch to one entity, partitioned by ownership.
    pub fn set_metadata_bulk(
        &self,
        id: &EntityId,
        values: &BTreeMap<String, MetaValue>,
        recursive: bool,
    ) -> MetaResult<()> {
        self.inner.coordinator.set_bulk(id, values, recursive)
    }

    /// Writes per-entity batches across many entities.
    pub fn bulk_set_across_entities(
        &self,
        writes: &[(EntityId, BTreeMap<String, MetaValue>)],
        recursive: bool,
    ) -> MetaResult<()> {
        self.inner.coordinator.set_across_entities(writes, recursive)
    }

    /// Deletes one key from an entity through its owning plugin.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` when the owning plugin cannot delete;
    /// `KeyNotFound` when the entity does not carry the key.
    pub fn delete_metadata(&self, id: &EntityId, key: &str) -> MetaResult<()> {
        let plugin = self.inner.router.resolve_write(key)?;
        if !plugin.capabilities().supports_delete {
            log::error!(
                "Plugin {} does not support deleting key '{}'",
                plugin.plugin_name(),
                key
            );
            return Err(MetaError::new(
                &format!(
                    "plugin '{}' does not support deletion",
                    plugin.plugin_name()
                ),
                ErrorKind::UnsupportedOperation,
            ));
        }
        plugin.delete(id, key)
    }

    /// Lists entities matching a declarative filter expression.
    ///
    /// The filter's keys resolve to exactly one plugin; keys spanning
    /// plugins are rejected rather than partially answered.
    pub fn list_entities(
        &self,
        filters: &serde_json::Value,
        options: &ListOptions,
    ) -> MetaResult<Vec<ListEntry>> {
        let expression = FilterExpression::parse(filters)?;
        let keys = expression.filter_keys();
        let plugin = self
            .inner
            .router
            .resolve_filter_keys(&keys, options.plugin())?;
        self.inner.expander.list(&plugin, &expression, options)
    }

    /// Reads metadata for many entities, optionally merging inherited
    /// values from ancestors.
    ///
    /// Inheritance applies per plugin, only where the plugin declares
    /// support: ancestor values are merged root-down, so nearer ancestors
    /// win and the entity's own values win over all of them.
    pub fn bulk_get(
        &self,
        ids: &[EntityId],
        selector: &PluginSelector,
        inherit: bool,
    ) -> MetaResult<Vec<(EntityId, BTreeMap<String, MetaValue>)>> {
        let plugins = self.inner.router.resolve_read(selector)?;
        let hierarchy = self.inner.config.hierarchy()?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let mut merged = BTreeMap::new();
            for plugin in &plugins {
                let slice = if inherit && plugin.capabilities().supports_inheritance {
                    self.inherited_values(plugin, id, &hierarchy)?
                } else {
                    plugin.get(id)?
                };
                // earlier-registered plugin wins on a key collision
                for (key, value) in slice {
                    merged.entry(key).or_insert(value);
                }
            }
            out.push((id.clone(), merged));
        }
        Ok(out)
    }

    fn inherited_values(
        &self,
        plugin: &MetaPlugin,
        id: &EntityId,
        hierarchy: &crate::common::Hierarchy,
    ) -> MetaResult<BTreeMap<String, MetaValue>> {
        // ancestors come nearest-first; apply root-down so nearer wins
        let mut merged = BTreeMap::new();
        for ancestor in hierarchy.ancestors(id)?.iter().rev() {
            merged.extend(plugin.get(ancestor)?);
        }
        merged.extend(plugin.get(id)?);
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ColumnAdapter, DocumentAdapter};
    use crate::catalog_builder::CatalogBuilder;
    use crate::common::{EntityType, Hierarchy, InMemoryHierarchy};
    use crate::plugin::{ColumnMetaPlugin, JsonMetaPlugin, MetaPluginProvider};

    fn id(name: &str) -> EntityId {
        EntityId::new("scope", name)
    }

    fn meta(pairs: &[(&str, MetaValue)]) -> BTreeMap<String, MetaValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn catalog() -> (MetaCatalog, ColumnAdapter, InMemoryHierarchy) {
        let graph = InMemoryHierarchy::new();
        let hierarchy = Hierarchy::new(graph.clone());
        let adapter = ColumnAdapter::new(hierarchy.clone());
        let column = ColumnMetaPlugin::new(adapter.clone(), hierarchy.clone());
        let json = JsonMetaPlugin::new(DocumentAdapter::new());

        let catalog = CatalogBuilder::default()
            .hierarchy(hierarchy)
            .plugin(column.as_plugin())
            .plugin(json.as_plugin())
            .open()
            .unwrap();
        (catalog, adapter, graph)
    }

    #[test]
    fn test_set_and_get_merged() {
        let (catalog, adapter, _) = catalog();
        adapter.register_entity(&id("f1"), EntityType::File);

        catalog
            .set_metadata(&id("f1"), "project", MetaValue::from("data17"), false)
            .unwrap();
        catalog
            .set_metadata(&id("f1"), "custom_tag", MetaValue::from("blue"), false)
            .unwrap();

        let merged = catalog.get_metadata(&id("f1"), &PluginSelector::All).unwrap();
        assert_eq!(merged.get("project"), Some(&MetaValue::from("data17")));
        assert_eq!(merged.get("custom_tag"), Some(&MetaValue::from("blue")));

        let json_only = catalog
            .get_metadata(&id("f1"), &PluginSelector::named("JSON"))
            .unwrap();
        assert_eq!(json_only.get("project"), None);
        assert_eq!(json_only.get("custom_tag"), Some(&MetaValue::from("blue")));
    }

    #[test]
    fn test_set_unmanaged_key() {
        let (catalog, adapter, _) = catalog();
        adapter.register_entity(&id("f1"), EntityType::File);
        let err = catalog
            .set_metadata(&id("f1"), "nested.key", MetaValue::from("x"), false)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnmanagedKey);
    }

    #[test]
    fn test_delete_routes_by_capability() {
        let (catalog, adapter, _) = catalog();
        adapter.register_entity(&id("f1"), EntityType::File);
        catalog
            .set_metadata(&id("f1"), "custom_tag", MetaValue::from("x"), false)
            .unwrap();

        catalog.delete_metadata(&id("f1"), "custom_tag").unwrap();

        // column keys cannot be deleted
        let err = catalog.delete_metadata(&id("f1"), "project").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_list_entities_routes_filter() {
        let (catalog, adapter, _) = catalog();
        adapter.register_entity(&id("f1"), EntityType::File);
        catalog
            .set_metadata(&id("f1"), "project", MetaValue::from("X"), false)
            .unwrap();
        catalog
            .set_metadata(&id("f1"), "custom_tag", MetaValue::from("blue"), false)
            .unwrap();

        let names = catalog
            .list_entities(&serde_json::json!({"project": "X"}), &ListOptions::new())
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].name(), "f1");

        let err = catalog
            .list_entities(
                &serde_json::json!({"project": "X", "custom_tag": "blue"}),
                &ListOptions::new(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::CrossPluginFilter);
    }

    #[test]
    fn test_merge_keeps_earlier_plugin_value() {
        use crate::backend::BackendAdapter;
        use crate::plugin::{MetaPlugin, PluginCapabilities};

        // a plugin whose full dump always carries a fixed payload, so two of
        // them can collide on a key neither exclusively owns
        #[derive(Clone)]
        struct FixedPlugin {
            name: String,
            owned_key: String,
            payload: BTreeMap<String, MetaValue>,
        }

        impl FixedPlugin {
            fn new(name: &str, owned_key: &str, payload: &[(&str, MetaValue)]) -> Self {
                FixedPlugin {
                    name: name.to_string(),
                    owned_key: owned_key.to_string(),
                    payload: meta(payload),
                }
            }
        }

        impl MetaPluginProvider for FixedPlugin {
            fn plugin_name(&self) -> &str {
                &self.name
            }
            fn capabilities(&self) -> PluginCapabilities {
                PluginCapabilities {
                    supports_delete: false,
                    supports_recursive_write: false,
                    supports_recursive_list: false,
                    supports_inheritance: false,
                }
            }
            fn manages_key(&self, key: &str) -> bool {
                key == self.owned_key
            }
            fn known_keys(&self) -> Vec<String> {
                vec![self.owned_key.clone()]
            }
            fn adapter(&self) -> BackendAdapter {
                BackendAdapter::new(DocumentAdapter::new())
            }
            fn get(&self, _id: &EntityId) -> MetaResult<BTreeMap<String, MetaValue>> {
                Ok(self.payload.clone())
            }
            fn set(
                &self,
                _id: &EntityId,
                _values: &BTreeMap<String, MetaValue>,
                _recursive: bool,
            ) -> MetaResult<()> {
                Ok(())
            }
            fn delete(&self, _id: &EntityId, _key: &str) -> MetaResult<()> {
                Ok(())
            }
            fn as_plugin(&self) -> MetaPlugin {
                MetaPlugin::new(self.clone())
            }
        }

        let first = FixedPlugin::new(
            "FIRST",
            "alpha",
            &[("shared", MetaValue::from("from_first"))],
        );
        let second = FixedPlugin::new(
            "SECOND",
            "beta",
            &[("shared", MetaValue::from("from_second"))],
        );

        let catalog = CatalogBuilder::default()
            .hierarchy(Hierarchy::new(InMemoryHierarchy::new()))
            .plugin(first.as_plugin())
            .plugin(second.as_plugin())
            .open()
            .unwrap();

        let merged = catalog
            .get_metadata(&id("f1"), &PluginSelector::All)
            .unwrap();
        assert_eq!(merged.get("shared"), Some(&MetaValue::from("from_first")));

        let bulk = catalog
            .bulk_get(&[id("f1")], &PluginSelector::All, false)
            .unwrap();
        assert_eq!(
            bulk[0].1.get("shared"),
            Some(&MetaValue::from("from_first"))
        );
    }

    #[test]
    fn test_bulk_get_inheritance() {
        let (catalog, adapter, graph) = catalog();
        adapter.register_entity(&id("ds"), EntityType::Dataset);
        adapter.register_entity(&id("f1"), EntityType::File);
        graph.attach(&id("ds"), &id("f1"), EntityType::File);

        catalog
            .set_metadata(&id("ds"), "custom_tag", MetaValue::from("inherited"), false)
            .unwrap();
        catalog
            .set_metadata(&id("ds"), "sample", MetaValue::from("parent"), false)
            .unwrap();
        catalog
            .set_metadata(&id("f1"), "sample", MetaValue::from("own"), false)
            .unwrap();

        let plain = catalog
            .bulk_get(&[id("f1")], &PluginSelector::named("JSON"), false)
            .unwrap();
        assert_eq!(plain[0].1.get("custom_tag"), None);

        let inherited = catalog
            .bulk_get(&[id("f1")], &PluginSelector::named("JSON"), true)
            .unwrap();
        assert_eq!(
            inherited[0].1.get("custom_tag"),
            Some(&MetaValue::from("inherited"))
        );
        // the entity's own value wins over the ancestor's
        assert_eq!(inherited[0].1.get("sample"), Some(&MetaValue::from("own")));
    }
}
