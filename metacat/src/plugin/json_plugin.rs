use crate::backend::{BackendAdapter, BackendAdapterProvider, DocumentAdapter, COLUMN_KEYS};
use crate::common::{EntityId, MetaValue};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::plugin::column_plugin::LIFETIME_KEY;
use crate::plugin::{MetaPlugin, MetaPluginProvider, PluginCapabilities};
use std::collections::BTreeMap;

pub static PLUGIN_NAME_JSON: &str = "JSON";

/// Catch-all plugin over the per-entity JSON document store.
///
/// Claims every dot-free key the base column plugin does not own. Supports
/// key deletion and inherited reads; recursive writes are rejected since the
/// document store has no view of the attachment graph.
#[derive(Clone, Default)]
pub struct JsonMetaPlugin {
    adapter: DocumentAdapter,
}

impl JsonMetaPlugin {
    pub fn new(adapter: DocumentAdapter) -> Self {
        JsonMetaPlugin { adapter }
    }

    pub fn document_adapter(&self) -> &DocumentAdapter {
        &self.adapter
    }
}

impl MetaPluginProvider for JsonMetaPlugin {
    fn plugin_name(&self) -> &str {
        PLUGIN_NAME_JSON
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            supports_delete: true,
            supports_recursive_write: false,
            supports_recursive_list: true,
            supports_inheritance: true,
        }
    }

    fn manages_key(&self, key: &str) -> bool {
        !key.contains('.')
            && key != "name"
            && key != LIFETIME_KEY
            && !COLUMN_KEYS.contains(key)
    }

    fn known_keys(&self) -> Vec<String> {
        // catch-all: no concrete keys to advertise
        Vec::new()
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
        if recursive {
            log::error!(
                "Plugin {} cannot write recursively to entity {}",
                PLUGIN_NAME_JSON,
                id
            );
            return Err(MetaError::new(
                &format!(
                    "plugin '{}' does not support recursive writes",
                    PLUGIN_NAME_JSON
                ),
                ErrorKind::UnsupportedOperation,
            ));
        }
        self.adapter.write(id, values)
    }

    fn delete(&self, id: &EntityId, key: &str) -> MetaResult<()> {
        self.adapter.delete_key(id, key)
    }

    fn as_plugin(&self) -> MetaPlugin {
        MetaPlugin::new(self.clone())
    }
}
