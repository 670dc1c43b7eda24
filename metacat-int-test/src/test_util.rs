use metacat::backend::{ColumnAdapter, DocumentAdapter};
use metacat::catalog_builder::CatalogBuilder;
use metacat::common::{EntityId, EntityType, Hierarchy, InMemoryHierarchy, MetaValue};
use metacat::errors::MetaResult;
use metacat::plugin::{ColumnMetaPlugin, JsonMetaPlugin, MetaPluginProvider};
use metacat::MetaCatalog;
use std::collections::BTreeMap;

/// A catalog over the reference adapters, with direct handles for seeding
/// entities and attachments.
#[derive(Clone)]
pub struct TestContext {
    catalog: MetaCatalog,
    columns: ColumnAdapter,
    graph: InMemoryHierarchy,
}

impl TestContext {
    pub fn catalog(&self) -> MetaCatalog {
        self.catalog.clone()
    }

    pub fn columns(&self) -> &ColumnAdapter {
        &self.columns
    }

    pub fn graph(&self) -> &InMemoryHierarchy {
        &self.graph
    }

    /// Registers an entity in the column table.
    pub fn register(&self, id: &EntityId, entity_type: EntityType) {
        self.columns.register_entity(id, entity_type);
    }

    /// Registers a child entity and attaches it to a parent.
    pub fn attach(&self, parent: &EntityId, child: &EntityId, child_type: EntityType) {
        self.columns.register_entity(child, child_type);
        self.graph.attach(parent, child, child_type);
    }
}

/// Builds a fresh catalog with the column plugin first and the JSON plugin
/// as the catch-all.
pub fn create_test_context() -> MetaResult<TestContext> {
    let graph = InMemoryHierarchy::new();
    let hierarchy = Hierarchy::new(graph.clone());
    let columns = ColumnAdapter::new(hierarchy.clone());
    let column_plugin = ColumnMetaPlugin::new(columns.clone(), hierarchy.clone());
    let json_plugin = JsonMetaPlugin::new(DocumentAdapter::new());

    let catalog = CatalogBuilder::default()
        .hierarchy(hierarchy)
        .plugin(column_plugin.as_plugin())
        .plugin(json_plugin.as_plugin())
        .open()?;

    Ok(TestContext {
        catalog,
        columns,
        graph,
    })
}

pub fn id(name: &str) -> EntityId {
    EntityId::new("testscope", name)
}

pub fn meta(pairs: &[(&str, MetaValue)]) -> BTreeMap<String, MetaValue> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
