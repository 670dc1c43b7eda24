use crate::backend::BackendAdapter;
use crate::common::{EntityId, MetaValue};
use crate::errors::MetaResult;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

/// Capability flags a plugin advertises at registration.
///
/// Callers never probe capabilities by trial: the router and the listing
/// expander consult these flags up front and fail with the matching error
/// kind before touching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginCapabilities {
    /// Whether single-key deletion is supported.
    pub supports_delete: bool,
    /// Whether a write may cascade to attached descendants.
    pub supports_recursive_write: bool,
    /// Whether listing may expand through attached descendants.
    pub supports_recursive_list: bool,
    /// Whether reads may merge metadata inherited from ancestors.
    pub supports_inheritance: bool,
}

/// Contract for implementing metadata plugins.
///
/// # Purpose
/// A plugin is the unit of metadata ownership: it claims a slice of the key
/// space through [MetaPluginProvider::manages_key] and serves every read,
/// write, delete, and query for the keys it owns, delegating storage to its
/// backend adapter.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the registry shares plugins across
/// concurrent requests.
pub trait MetaPluginProvider: Send + Sync {
    /// Returns the unique plugin name used for selection and error context.
    fn plugin_name(&self) -> &str;

    /// Returns the capability flags of this plugin.
    fn capabilities(&self) -> PluginCapabilities;

    /// Checks whether this plugin is authoritative for a metadata key.
    ///
    /// Ownership must be disjoint across registered plugins; the registry
    /// verifies this at build time over the keys advertised through
    /// [MetaPluginProvider::known_keys].
    fn manages_key(&self, key: &str) -> bool;

    /// Returns the concrete keys this plugin advertises for the registry's
    /// ownership-overlap verification. Catch-all plugins return an empty
    /// list; their claims are checked against every other plugin's
    /// advertised keys instead.
    fn known_keys(&self) -> Vec<String>;

    /// Returns the backend adapter serving this plugin's storage.
    fn adapter(&self) -> BackendAdapter;

    /// Reads all metadata this plugin holds for one entity.
    fn get(&self, id: &EntityId) -> MetaResult<BTreeMap<String, MetaValue>>;

    /// Writes a batch of key/value pairs for one entity.
    ///
    /// # Arguments
    ///
    /// * `recursive` - Cascade the write to attached descendants; rejected
    ///   with `UnsupportedOperation` unless the plugin supports it
    fn set(
        &self,
        id: &EntityId,
        values: &BTreeMap<String, MetaValue>,
        recursive: bool,
    ) -> MetaResult<()>;

    /// Deletes a single key from one entity's metadata.
    fn delete(&self, id: &EntityId, key: &str) -> MetaResult<()>;

    /// Returns a polymorphic wrapper of this plugin.
    fn as_plugin(&self) -> MetaPlugin;
}

/// Polymorphic wrapper around a metadata plugin implementation.
#[derive(Clone)]
pub struct MetaPlugin {
    inner: Arc<dyn MetaPluginProvider>,
}

impl MetaPlugin {
    pub fn new<T: MetaPluginProvider + 'static>(inner: T) -> Self {
        MetaPlugin {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for MetaPlugin {
    type Target = Arc<dyn MetaPluginProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for MetaPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaPlugin")
            .field("name", &self.inner.plugin_name())
            .finish()
    }
}
