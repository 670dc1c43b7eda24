use crate::common::{EntityId, EntityRef, EntityType};
use crate::errors::MetaResult;
use dashmap::DashMap;
use std::ops::Deref;
use std::sync::Arc;

/// Contract for resolving the parent/child graph of catalog entities.
///
/// # Purpose
/// The entity catalog owns the hierarchy of containers, datasets and files;
/// this crate only reads it. The recursive listing expander walks children,
/// and the column adapter walks parents to cascade aggregate counters.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; calls may run concurrently from
/// independent requests.
pub trait HierarchyProvider: Send + Sync {
    /// Returns the direct children attached to an entity.
    ///
    /// Entities with no attachments (including files) return an empty list.
    fn children(&self, entity: &EntityId) -> MetaResult<Vec<EntityRef>>;

    /// Returns the direct parents an entity is attached to.
    fn parents(&self, entity: &EntityId) -> MetaResult<Vec<EntityId>>;
}

/// Polymorphic wrapper around a hierarchy provider implementation.
#[derive(Clone)]
pub struct Hierarchy {
    inner: Arc<dyn HierarchyProvider>,
}

impl Hierarchy {
    /// Creates a new hierarchy wrapper from an implementation.
    pub fn new<T: HierarchyProvider + 'static>(inner: T) -> Self {
        Hierarchy { inner: Arc::new(inner) }
    }

    /// Returns every ancestor of an entity, nearest first.
    ///
    /// Cycles in a misconfigured graph are tolerated; each ancestor is
    /// visited once.
    pub fn ancestors(&self, entity: &EntityId) -> MetaResult<Vec<EntityId>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut frontier = self.parents(entity)?;
        while let Some(parent) = frontier.pop() {
            if !seen.insert(parent.qualified()) {
                continue;
            }
            frontier.extend(self.parents(&parent)?);
            out.push(parent);
        }
        Ok(out)
    }
}

impl Deref for Hierarchy {
    type Target = Arc<dyn HierarchyProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// In-memory reference implementation of the hierarchy graph.
///
/// Used by tests and as a stand-in for the external catalog: attachments are
/// registered explicitly with [InMemoryHierarchy::attach].
#[derive(Clone, Default)]
pub struct InMemoryHierarchy {
    children: Arc<DashMap<String, Vec<EntityRef>>>,
    parents: Arc<DashMap<String, Vec<EntityId>>>,
}

impl InMemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a child entity to a parent.
    pub fn attach(&self, parent: &EntityId, child: &EntityId, child_type: EntityType) {
        self.children
            .entry(parent.qualified())
            .or_default()
            .push(EntityRef::new(child.clone(), child_type));
        self.parents
            .entry(child.qualified())
            .or_default()
            .push(parent.clone());
    }
}

impl HierarchyProvider for InMemoryHierarchy {
    fn children(&self, entity: &EntityId) -> MetaResult<Vec<EntityRef>> {
        Ok(self
            .children
            .get(&entity.qualified())
            .map(|refs| refs.clone())
            .unwrap_or_default())
    }

    fn parents(&self, entity: &EntityId) -> MetaResult<Vec<EntityId>> {
        Ok(self
            .parents
            .get(&entity.qualified())
            .map(|ids| ids.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> EntityId {
        EntityId::new("scope", name)
    }

    #[test]
    fn test_attach_and_children() {
        let graph = InMemoryHierarchy::new();
        graph.attach(&id("container"), &id("dataset"), EntityType::Dataset);
        graph.attach(&id("dataset"), &id("file1"), EntityType::File);

        let children = graph.children(&id("container")).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, id("dataset"));
        assert_eq!(children[0].entity_type, EntityType::Dataset);

        assert!(graph.children(&id("file1")).unwrap().is_empty());
    }

    #[test]
    fn test_parents() {
        let graph = InMemoryHierarchy::new();
        graph.attach(&id("dataset"), &id("file1"), EntityType::File);
        let parents = graph.parents(&id("file1")).unwrap();
        assert_eq!(parents, vec![id("dataset")]);
    }

    #[test]
    fn test_ancestors_transitive() {
        let graph = InMemoryHierarchy::new();
        graph.attach(&id("container"), &id("dataset"), EntityType::Dataset);
        graph.attach(&id("dataset"), &id("file1"), EntityType::File);

        let hierarchy = Hierarchy::new(graph);
        let ancestors = hierarchy.ancestors(&id("file1")).unwrap();
        assert_eq!(ancestors.len(), 2);
        assert!(ancestors.contains(&id("dataset")));
        assert!(ancestors.contains(&id("container")));
    }

    #[test]
    fn test_ancestors_tolerates_cycle() {
        let graph = InMemoryHierarchy::new();
        graph.attach(&id("a"), &id("b"), EntityType::Dataset);
        graph.attach(&id("b"), &id("a"), EntityType::Dataset);

        let hierarchy = Hierarchy::new(graph);
        let ancestors = hierarchy.ancestors(&id("a")).unwrap();
        assert_eq!(ancestors.len(), 2);
    }
}
