use crate::backend::adapter::wildcard_regex;
use crate::backend::{
    BackendAdapterProvider, EntityRecord, NativePredicate, PredicateProvider,
};
use crate::common::{EntityId, EntityType, MetaValue};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::filter::{coerce_value, CompiledQuery, FilterClause, FilterOperator};
use dashmap::DashMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub static ADAPTER_NAME_DOCUMENT: &str = "json_documents";

/// A filter clause translated to a JSON path predicate.
///
/// The stored values are raw, exactly as submitted, so the predicate coerces
/// each stored value to its typed form before comparing. A stored `"100"`
/// therefore satisfies `length.gt: 50` even though the document holds a
/// string.
struct DocumentPredicate {
    clause: FilterClause,
    pattern: Option<Regex>,
}

impl DocumentPredicate {
    fn new(clause: &FilterClause) -> MetaResult<Self> {
        let pattern = if clause.is_wildcard() {
            let raw = clause.value().as_str().ok_or_else(|| {
                MetaError::new(
                    &format!("wildcard clause on '{}' has a non-string value", clause.key()),
                    ErrorKind::InvalidFilter,
                )
            })?;
            Some(wildcard_regex(raw)?)
        } else {
            None
        };
        Ok(DocumentPredicate {
            clause: clause.clone(),
            pattern,
        })
    }
}

impl PredicateProvider for DocumentPredicate {
    fn matches(&self, record: &EntityRecord) -> MetaResult<bool> {
        let raw = match record.get(self.clause.key()) {
            Some(value) => value,
            None => return Ok(false),
        };
        if let Some(pattern) = &self.pattern {
            let matched = raw.as_str().map(|s| pattern.is_match(s)).unwrap_or(false);
            return Ok(match self.clause.operator() {
                FilterOperator::Ne => !matched,
                _ => matched,
            });
        }
        let actual = coerce_value(&raw);
        Ok(self.clause.operator().evaluate(&actual, self.clause.value()))
    }
}

impl Display for DocumentPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.pattern.is_some() {
            let negated = if self.clause.operator() == FilterOperator::Ne {
                " NOT"
            } else {
                ""
            };
            write!(
                f,
                "meta->>'{}'{} LIKE {}",
                self.clause.key(),
                negated,
                self.clause.value()
            )
        } else {
            write!(
                f,
                "meta->>'{}' {} {}",
                self.clause.key(),
                self.clause.operator(),
                self.clause.value()
            )
        }
    }
}

/// In-memory stand-in for a per-entity JSON document table.
///
/// One document per entity, created lazily on first write. The store keeps
/// values exactly as submitted and knows nothing about entity types, so
/// type-restricted queries pass through unrestricted and listing results
/// carry no type information.
#[derive(Clone, Default)]
pub struct DocumentAdapter {
    docs: Arc<DashMap<EntityId, BTreeMap<String, MetaValue>>>,
}

impl DocumentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.docs.contains_key(id)
    }
}

impl BackendAdapterProvider for DocumentAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME_DOCUMENT
    }

    fn stores_raw_values(&self) -> bool {
        true
    }

    fn translate_clause(&self, clause: &FilterClause) -> MetaResult<NativePredicate> {
        Ok(NativePredicate::new(DocumentPredicate::new(clause)?))
    }

    fn read(&self, id: &EntityId) -> MetaResult<BTreeMap<String, MetaValue>> {
        // an entity without a document simply has no metadata here
        Ok(self.docs.get(id).map(|doc| doc.clone()).unwrap_or_default())
    }

    fn write(&self, id: &EntityId, values: &BTreeMap<String, MetaValue>) -> MetaResult<()> {
        let mut doc = self.docs.entry(id.clone()).or_default();
        for (key, value) in values {
            doc.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn delete_key(&self, id: &EntityId, key: &str) -> MetaResult<()> {
        let mut doc = match self.docs.get_mut(id) {
            Some(doc) => doc,
            None => {
                log::error!("Entity {} has no metadata document", id);
                return Err(MetaError::new(
                    &format!("key '{}' not found for entity '{}'", key, id),
                    ErrorKind::KeyNotFound,
                ));
            }
        };
        if doc.remove(key).is_none() {
            return Err(MetaError::new(
                &format!("key '{}' not found for entity '{}'", key, id),
                ErrorKind::KeyNotFound,
            ));
        }
        Ok(())
    }

    fn execute(
        &self,
        query: &CompiledQuery,
        entity_type: Option<EntityType>,
    ) -> MetaResult<Vec<EntityRecord>> {
        if entity_type.is_some() {
            log::debug!("Document store does not track entity types; type restriction skipped");
        }
        let mut out = Vec::new();
        for entry in self.docs.iter() {
            let record = EntityRecord::new(entry.key().clone(), None, entry.value().clone());
            if query.matches(&record)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendAdapter;
    use crate::filter::FilterEngine;
    use serde_json::json;

    fn id(name: &str) -> EntityId {
        EntityId::new("scope", name)
    }

    fn meta(pairs: &[(&str, MetaValue)]) -> BTreeMap<String, MetaValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_write_creates_document() {
        let adapter = DocumentAdapter::new();
        assert!(!adapter.contains(&id("f1")));
        adapter
            .write(&id("f1"), &meta(&[("custom_tag", MetaValue::from("blue"))]))
            .unwrap();
        assert!(adapter.contains(&id("f1")));
        let doc = adapter.read(&id("f1")).unwrap();
        assert_eq!(doc.get("custom_tag"), Some(&MetaValue::from("blue")));
    }

    #[test]
    fn test_read_absent_is_empty() {
        let adapter = DocumentAdapter::new();
        assert!(adapter.read(&id("ghost")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_key() {
        let adapter = DocumentAdapter::new();
        adapter
            .write(&id("f1"), &meta(&[("custom_tag", MetaValue::from("blue"))]))
            .unwrap();
        adapter.delete_key(&id("f1"), "custom_tag").unwrap();
        assert!(adapter.read(&id("f1")).unwrap().is_empty());

        // second delete of the same key reports it as missing again
        let err = adapter.delete_key(&id("f1"), "custom_tag").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_delete_from_absent_document() {
        let adapter = DocumentAdapter::new();
        let err = adapter.delete_key(&id("ghost"), "custom_tag").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_execute_coerces_raw_values() {
        let adapter = DocumentAdapter::new();
        adapter
            .write(&id("f1"), &meta(&[("length", MetaValue::from("100"))]))
            .unwrap();
        adapter
            .write(&id("f2"), &meta(&[("length", MetaValue::from("10"))]))
            .unwrap();

        let engine = FilterEngine::new(&json!({"length.gt": 50}), false).unwrap();
        let query = engine
            .compile(&BackendAdapter::new(adapter.clone()))
            .unwrap();
        let records = adapter.execute(&query, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), &id("f1"));
    }

    #[test]
    fn test_execute_wildcard() {
        let adapter = DocumentAdapter::new();
        adapter
            .write(&id("f1"), &meta(&[("campaign_tag", MetaValue::from("mc16_13TeV"))]))
            .unwrap();
        adapter
            .write(&id("f2"), &meta(&[("campaign_tag", MetaValue::from("data18"))]))
            .unwrap();

        let engine = FilterEngine::new(&json!({"campaign_tag": "mc16*"}), false).unwrap();
        let query = engine
            .compile(&BackendAdapter::new(adapter.clone()))
            .unwrap();
        let records = adapter.execute(&query, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), &id("f1"));
    }

    #[test]
    fn test_execute_ignores_type_restriction() {
        let adapter = DocumentAdapter::new();
        adapter
            .write(&id("f1"), &meta(&[("custom_tag", MetaValue::from("x"))]))
            .unwrap();
        let engine = FilterEngine::new(&json!({"custom_tag": "x"}), false).unwrap();
        let query = engine
            .compile(&BackendAdapter::new(adapter.clone()))
            .unwrap();
        let records = adapter
            .execute(&query, Some(EntityType::File))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_type(), None);
    }
}
