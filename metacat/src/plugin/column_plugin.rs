use crate::backend::{BackendAdapter, BackendAdapterProvider, ColumnAdapter, COLUMN_KEYS};
use crate::common::{EntityId, Hierarchy, MetaValue};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::plugin::{MetaPlugin, MetaPluginProvider, PluginCapabilities};
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashSet};

pub static PLUGIN_NAME_COLUMN: &str = "DID_COLUMN";

/// Pseudo-key accepted on writes; stored as a derived `expired_at`.
pub static LIFETIME_KEY: &str = "lifetime";

/// Base plugin over the relational entity table.
///
/// Owns the fixed column keys plus the `lifetime` pseudo-key. Writes of
/// `lifetime` store a derived `expired_at` timestamp; a null value clears
/// it. Recursive writes cascade the same values to every attached
/// descendant that has a row, silently skipping descendants the table does
/// not know.
#[derive(Clone)]
pub struct ColumnMetaPlugin {
    adapter: ColumnAdapter,
    hierarchy: Hierarchy,
}

impl ColumnMetaPlugin {
    pub fn new(adapter: ColumnAdapter, hierarchy: Hierarchy) -> Self {
        ColumnMetaPlugin { adapter, hierarchy }
    }

    pub fn column_adapter(&self) -> &ColumnAdapter {
        &self.adapter
    }

    /// Rewrites the `lifetime` pseudo-key into its stored `expired_at` form.
    fn transform_values(
        &self,
        values: &BTreeMap<String, MetaValue>,
    ) -> MetaResult<BTreeMap<String, MetaValue>> {
        let mut out = BTreeMap::new();
        for (key, value) in values {
            if key == LIFETIME_KEY {
                let expired_at = match value {
                    MetaValue::Null => MetaValue::Null,
                    other => {
                        let seconds = other.as_i64().ok_or_else(|| {
                            MetaError::new(
                                "lifetime must be a whole number of seconds",
                                ErrorKind::InvalidDataType,
                            )
                        })?;
                        MetaValue::Timestamp(Utc::now() + Duration::seconds(seconds))
                    }
                };
                out.insert("expired_at".to_string(), expired_at);
            } else {
                out.insert(key.clone(), value.clone());
            }
        }
        Ok(out)
    }

    /// Applies the transformed values to every descendant with a row,
    /// breadth-first, each entity at most once.
    fn cascade(&self, root: &EntityId, values: &BTreeMap<String, MetaValue>) -> MetaResult<()> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut frontier = self.hierarchy.children(root)?;
        while let Some(child) = frontier.pop() {
            if !seen.insert(child.id.qualified()) {
                continue;
            }
            if child.entity_type.is_collection_like() {
                frontier.extend(self.hierarchy.children(&child.id)?);
            }
            if self.adapter.contains(&child.id) {
                self.adapter.write(&child.id, values)?;
            } else {
                log::debug!("Skipping cascade to unregistered entity {}", child.id);
            }
        }
        Ok(())
    }
}

impl MetaPluginProvider for ColumnMetaPlugin {
    fn plugin_name(&self) -> &str {
        PLUGIN_NAME_COLUMN
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            supports_delete: false,
            supports_recursive_write: true,
            supports_recursive_list: true,
            supports_inheritance: false,
        }
    }

    fn manages_key(&self, key: &str) -> bool {
        key == LIFETIME_KEY || COLUMN_KEYS.contains(key)
    }

    fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = COLUMN_KEYS.iter().map(|k| k.to_string()).collect();
        keys.push(LIFETIME_KEY.to_string());
        keys
    }

    fn adapter(&self) -> BackendAdapter {
        BackendAdapter::new(self.adapter.clone())
    }

    fn get(&self, id: &EntityId) -> MetaResult<BTreeMap<String, MetaValue>> {
        self.adapter.read(id)
    }

    fn set(
        &self,
        id: &EntityId,
        values: &BTreeMap<String, MetaValue>,
        recursive: bool,
    ) -> MetaResult<()> {
        let transformed = self.transform_values(values)?;
        self.adapter.write(id, &transformed)?;
        if recursive {
            self.cascade(id, &transformed)?;
        }
        Ok(())
    }

    fn delete(&self, id: &EntityId, key: &str) -> MetaResult<()> {
        log::error!(
            "Plugin {} cannot delete key '{}' from entity {}",
            PLUGIN_NAME_COLUMN,
            key,
            id
        );
        Err(MetaError::new(
            &format!("plugin '{}' does not support deletion", PLUGIN_NAME_COLUMN),
            ErrorKind::UnsupportedOperation,
        ))
    }

    fn as_plugin(&self) -> MetaPlugin {
        MetaPlugin::new(self.clone())
    }
}
