use crate::common::{EntityId, EntityType, MetaValue};
use crate::errors::MetaResult;
use crate::filter::{CompiledQuery, FilterClause};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// A single entity row as a backend returns it from a query.
///
/// Carries the entity identity, its type where the backend tracks one, and
/// the metadata values visible to the issuing adapter. Adapters that store
/// raw values surface them untyped; typed adapters surface coerced values.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    id: EntityId,
    entity_type: Option<EntityType>,
    values: BTreeMap<String, MetaValue>,
}

impl EntityRecord {
    pub fn new(
        id: EntityId,
        entity_type: Option<EntityType>,
        values: BTreeMap<String, MetaValue>,
    ) -> Self {
        EntityRecord {
            id,
            entity_type,
            values,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity_type
    }

    /// Looks up a value by key. The entity name is addressable as the
    /// pseudo-key `name`.
    pub fn get(&self, key: &str) -> Option<MetaValue> {
        if key == "name" {
            return Some(MetaValue::from(self.id.name()));
        }
        self.values.get(key).cloned()
    }

    pub fn values(&self) -> &BTreeMap<String, MetaValue> {
        &self.values
    }
}

/// Trait for backend-native filter predicates.
///
/// A `PredicateProvider` is the translated form of one filter clause, ready
/// for the owning backend to evaluate. The reference adapters evaluate
/// predicates row by row against [EntityRecord]s; an adapter fronting an
/// external store would instead render them into its query language and
/// never call [PredicateProvider::matches].
pub trait PredicateProvider: Send + Sync + Display {
    /// Evaluates the predicate against a single record.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the record satisfies the predicate, `Ok(false)` otherwise
    fn matches(&self, record: &EntityRecord) -> MetaResult<bool>;
}

/// A cloneable handle over a backend-native predicate.
#[derive(Clone)]
pub struct NativePredicate {
    inner: Arc<dyn PredicateProvider>,
}

impl NativePredicate {
    pub fn new<T: PredicateProvider + 'static>(inner: T) -> Self {
        NativePredicate {
            inner: Arc::new(inner),
        }
    }
}

impl Display for NativePredicate {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Deref for NativePredicate {
    type Target = Arc<dyn PredicateProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for NativePredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativePredicate({})", self.inner)
    }
}

/// Trait for metadata storage backends.
///
/// A `BackendAdapterProvider` hides one concrete store behind a uniform
/// surface: point reads and writes of per-entity metadata, key deletion,
/// clause translation, and query execution. Plugins own exactly one adapter
/// and route every storage operation through it.
pub trait BackendAdapterProvider: Send + Sync {
    /// Returns the adapter name, used in log lines and error context.
    fn name(&self) -> &str;

    /// Checks whether this backend stores values as submitted, without type
    /// coercion. Raw-value backends get lenient filter validation since
    /// their stored representation may not match the coerced form.
    fn stores_raw_values(&self) -> bool;

    /// Translates one validated clause into this backend's native predicate.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` when the clause cannot be expressed natively, for
    /// example a wildcard against a non-string column.
    fn translate_clause(&self, clause: &FilterClause) -> MetaResult<NativePredicate>;

    /// Reads all metadata stored for one entity.
    ///
    /// # Errors
    ///
    /// `EntityNotFound` when the backend tracks entity existence and the
    /// entity is absent.
    fn read(&self, id: &EntityId) -> MetaResult<BTreeMap<String, MetaValue>>;

    /// Writes a batch of key/value pairs for one entity. Existing keys are
    /// overwritten, absent keys created.
    fn write(&self, id: &EntityId, values: &BTreeMap<String, MetaValue>) -> MetaResult<()>;

    /// Deletes a single key from one entity's metadata.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` when the entity has no record under this backend;
    /// `KeyNotFound` as well when the record exists but lacks the key.
    fn delete_key(&self, id: &EntityId, key: &str) -> MetaResult<()>;

    /// Executes a compiled query, optionally restricted to one entity type.
    ///
    /// Result ordering is backend-defined. Callers needing stable pagination
    /// sort the merged results themselves.
    fn execute(
        &self,
        query: &CompiledQuery,
        entity_type: Option<EntityType>,
    ) -> MetaResult<Vec<EntityRecord>>;
}

/// Compiles a `*` wildcard pattern into an anchored regex.
///
/// Every other character is matched literally.
pub(crate) fn wildcard_regex(pattern: &str) -> MetaResult<regex::Regex> {
    let mut source = String::with_capacity(pattern.len() + 2);
    source.push('^');
    for ch in pattern.chars() {
        if ch == '*' {
            source.push_str(".*");
        } else {
            source.push_str(&regex::escape(&ch.to_string()));
        }
    }
    source.push('$');
    regex::Regex::new(&source).map_err(|e| {
        crate::errors::MetaError::new(
            &format!("wildcard pattern '{}' failed to compile: {}", pattern, e),
            crate::errors::ErrorKind::InvalidFilter,
        )
    })
}

/// A cloneable handle over a backend adapter implementation.
#[derive(Clone)]
pub struct BackendAdapter {
    inner: Arc<dyn BackendAdapterProvider>,
}

impl BackendAdapter {
    pub fn new<T: BackendAdapterProvider + 'static>(inner: T) -> Self {
        BackendAdapter {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for BackendAdapter {
    type Target = Arc<dyn BackendAdapterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_name_pseudo_key() {
        let record = EntityRecord::new(
            EntityId::new("scope", "file_1"),
            Some(EntityType::File),
            BTreeMap::new(),
        );
        assert_eq!(record.get("name"), Some(MetaValue::from("file_1")));
        assert_eq!(record.get("project"), None);
    }

    #[test]
    fn test_record_value_lookup() {
        let mut values = BTreeMap::new();
        values.insert("bytes".to_string(), MetaValue::I64(42));
        let record = EntityRecord::new(EntityId::new("scope", "f"), None, values);
        assert_eq!(record.get("bytes"), Some(MetaValue::I64(42)));
    }

    #[test]
    fn test_wildcard_regex() {
        let re = wildcard_regex("data17_*").unwrap();
        assert!(re.is_match("data17_13TeV"));
        assert!(!re.is_match("data18_13TeV"));
        assert!(!re.is_match("xdata17_13TeV"));

        // regex metacharacters in the pattern are literal
        let re = wildcard_regex("run.1*").unwrap();
        assert!(re.is_match("run.100"));
        assert!(!re.is_match("runx100"));
    }
}
