use crate::errors::{ErrorKind, MetaError, MetaResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifier of an addressable catalog entity.
///
/// An `EntityId` is the stable `(namespace, name)` pair owned by the external
/// entity catalog. It is immutable once the entity exists; this crate never
/// creates or deletes entities, it only routes metadata addressed to them.
///
/// The qualified form `namespace:name` is used wherever a single string key
/// is needed (dedup sets, in-memory table keys).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    namespace: String,
    name: String,
}

impl EntityId {
    /// Creates a new entity identifier.
    pub fn new(namespace: &str, name: &str) -> Self {
        EntityId {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the qualified `namespace:name` form.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// Semantic type of a catalog entity.
///
/// The type decides whether recursive expansion applies: container-like
/// entities (everything except `File`) can have attached children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    File,
    Dataset,
    Container,
    Collection,
}

impl EntityType {
    /// Checks whether entities of this type can have attached children.
    #[inline]
    pub fn is_collection_like(&self) -> bool {
        !matches!(self, EntityType::File)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::Dataset => "dataset",
            EntityType::Container => "container",
            EntityType::Collection => "collection",
        }
    }

    /// Parses an entity type from its lowercase name.
    pub fn parse(raw: &str) -> MetaResult<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "file" => Ok(EntityType::File),
            "dataset" => Ok(EntityType::Dataset),
            "container" => Ok(EntityType::Container),
            "collection" => Ok(EntityType::Collection),
            other => Err(MetaError::new(
                &format!("unknown entity type '{}'", other),
                ErrorKind::InvalidDataType,
            )),
        }
    }

    /// Checks whether an entity of type `actual` satisfies this type filter.
    ///
    /// `Collection` acts as the semantic filter for any container-like type.
    pub fn accepts(&self, actual: EntityType) -> bool {
        match self {
            EntityType::Collection => actual.is_collection_like(),
            other => *other == actual,
        }
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed reference to an entity, as returned by hierarchy walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub id: EntityId,
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn new(id: EntityId, entity_type: EntityType) -> Self {
        EntityRef { id, entity_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_qualified() {
        let id = EntityId::new("mc16", "events.root");
        assert_eq!(id.qualified(), "mc16:events.root");
        assert_eq!(format!("{}", id), "mc16:events.root");
        assert_eq!(id.namespace(), "mc16");
        assert_eq!(id.name(), "events.root");
    }

    #[test]
    fn test_entity_id_equality() {
        let a = EntityId::new("scope", "name");
        let b = EntityId::new("scope", "name");
        let c = EntityId::new("scope", "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_entity_type_collection_like() {
        assert!(!EntityType::File.is_collection_like());
        assert!(EntityType::Dataset.is_collection_like());
        assert!(EntityType::Container.is_collection_like());
        assert!(EntityType::Collection.is_collection_like());
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(EntityType::parse("file").unwrap(), EntityType::File);
        assert_eq!(EntityType::parse("DATASET").unwrap(), EntityType::Dataset);
        assert!(EntityType::parse("blob").is_err());
    }

    #[test]
    fn test_entity_type_accepts() {
        assert!(EntityType::Collection.accepts(EntityType::Dataset));
        assert!(EntityType::Collection.accepts(EntityType::Container));
        assert!(!EntityType::Collection.accepts(EntityType::File));
        assert!(EntityType::File.accepts(EntityType::File));
        assert!(!EntityType::Dataset.accepts(EntityType::Container));
    }
}
