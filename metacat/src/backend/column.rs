use crate::backend::adapter::wildcard_regex;
use crate::backend::{
    BackendAdapterProvider, EntityRecord, NativePredicate, PredicateProvider,
};
use crate::common::{EntityId, EntityType, Hierarchy, MetaValue};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::filter::{CompiledQuery, FilterClause, FilterOperator};
use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub static ADAPTER_NAME_COLUMN: &str = "did_columns";

/// The fixed relational column set. A key outside this set does not exist as
/// a column and cannot be written or filtered through this adapter.
pub static COLUMN_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "project",
        "datatype",
        "guid",
        "md5",
        "adler32",
        "bytes",
        "length",
        "events",
        "run_number",
        "is_open",
        "obsolete",
        "availability",
        "campaign",
        "stream_name",
        "prod_step",
        "version",
        "phys_group",
        "provenance",
        "transient",
        "created_at",
        "updated_at",
        "expired_at",
    ]
    .into_iter()
    .collect()
});

/// Counters a file-level write cascades up to ancestor collections.
static AGGREGATE_KEYS: &[&str] = &["bytes", "events"];

/// A filter clause translated to a SQL-style column predicate.
struct ColumnPredicate {
    clause: FilterClause,
    pattern: Option<Regex>,
}

impl ColumnPredicate {
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
        Ok(ColumnPredicate {
            clause: clause.clone(),
            pattern,
        })
    }
}

impl PredicateProvider for ColumnPredicate {
    fn matches(&self, record: &EntityRecord) -> MetaResult<bool> {
        let actual = match record.get(self.clause.key()) {
            Some(value) => value,
            // absent column value satisfies nothing, like SQL NULL
            None => return Ok(false),
        };
        if let Some(pattern) = &self.pattern {
            let matched = actual.as_str().map(|s| pattern.is_match(s)).unwrap_or(false);
            return Ok(match self.clause.operator() {
                FilterOperator::Ne => !matched,
                _ => matched,
            });
        }
        Ok(self.clause.operator().evaluate(&actual, self.clause.value()))
    }
}

impl Display for ColumnPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.pattern.is_some() {
            let negated = if self.clause.operator() == FilterOperator::Ne {
                " NOT"
            } else {
                ""
            };
            write!(f, "{}{} LIKE {}", self.clause.key(), negated, self.clause.value())
        } else {
            write!(f, "{}", self.clause)
        }
    }
}

#[derive(Debug, Clone)]
struct ColumnRow {
    entity_type: EntityType,
    values: BTreeMap<String, MetaValue>,
}

/// In-memory stand-in for the relational entity table.
///
/// Rows exist only for registered entities; the external catalog creates
/// them when an entity is born. Writes of the aggregate counters on file
/// rows cascade the delta to every ancestor row, under one table-level write
/// lock so the row update and the cascade are observed together.
#[derive(Clone)]
pub struct ColumnAdapter {
    rows: Arc<DashMap<EntityId, ColumnRow>>,
    hierarchy: Hierarchy,
    write_lock: Arc<Mutex<()>>,
}

impl ColumnAdapter {
    pub fn new(hierarchy: Hierarchy) -> Self {
        ColumnAdapter {
            rows: Arc::new(DashMap::new()),
            hierarchy,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Creates the row for a newly cataloged entity with its creation
    /// timestamps set.
    pub fn register_entity(&self, id: &EntityId, entity_type: EntityType) {
        let now = MetaValue::Timestamp(Utc::now());
        let mut values = BTreeMap::new();
        values.insert("created_at".to_string(), now.clone());
        values.insert("updated_at".to_string(), now);
        self.rows.insert(
            id.clone(),
            ColumnRow {
                entity_type,
                values,
            },
        );
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.rows.contains_key(id)
    }

    /// Returns the cataloged type of an entity, if its row exists.
    pub fn entity_type_of(&self, id: &EntityId) -> Option<EntityType> {
        self.rows.get(id).map(|row| row.entity_type)
    }

    fn aggregate_deltas(
        row: &ColumnRow,
        values: &BTreeMap<String, MetaValue>,
    ) -> Vec<(String, i64)> {
        if row.entity_type != EntityType::File {
            return Vec::new();
        }
        let mut deltas = Vec::new();
        for key in AGGREGATE_KEYS {
            if let Some(new) = values.get(*key).and_then(|v| v.as_i64()) {
                let old = row.values.get(*key).and_then(|v| v.as_i64()).unwrap_or(0);
                if new != old {
                    deltas.push((key.to_string(), new - old));
                }
            }
        }
        deltas
    }
}

impl BackendAdapterProvider for ColumnAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME_COLUMN
    }

    fn stores_raw_values(&self) -> bool {
        false
    }

    fn translate_clause(&self, clause: &FilterClause) -> MetaResult<NativePredicate> {
        if !clause.is_name_clause() && !COLUMN_KEYS.contains(clause.key()) {
            log::error!("Filter references unknown column '{}'", clause.key());
            return Err(MetaError::new(
                &format!("'{}' is not a column of the entity table", clause.key()),
                ErrorKind::InvalidFilter,
            ));
        }
        Ok(NativePredicate::new(ColumnPredicate::new(clause)?))
    }

    fn read(&self, id: &EntityId) -> MetaResult<BTreeMap<String, MetaValue>> {
        match self.rows.get(id) {
            Some(row) => Ok(row.values.clone()),
            None => {
                log::error!("Entity {} has no row in the entity table", id);
                Err(MetaError::new(
                    &format!("entity '{}' not found", id),
                    ErrorKind::EntityNotFound,
                ))
            }
        }
    }

    fn write(&self, id: &EntityId, values: &BTreeMap<String, MetaValue>) -> MetaResult<()> {
        for key in values.keys() {
            if !COLUMN_KEYS.contains(key.as_str()) {
                return Err(MetaError::new(
                    &format!("'{}' is not a column of the entity table", key),
                    ErrorKind::BackendError,
                ));
            }
        }

        // one writer at a time so the row update and the aggregate cascade
        // are observed together
        let _guard = self.write_lock.lock();

        let deltas = {
            let mut row = self.rows.get_mut(id).ok_or_else(|| {
                MetaError::new(
                    &format!("entity '{}' not found", id),
                    ErrorKind::EntityNotFound,
                )
            })?;
            let deltas = Self::aggregate_deltas(&row, values);
            for (key, value) in values {
                row.values.insert(key.clone(), value.clone());
            }
            row.values
                .insert("updated_at".to_string(), MetaValue::Timestamp(Utc::now()));
            deltas
        };

        if !deltas.is_empty() {
            for ancestor in self.hierarchy.ancestors(id)? {
                if let Some(mut row) = self.rows.get_mut(&ancestor) {
                    for (key, delta) in &deltas {
                        let current = row.values.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
                        row.values.insert(key.clone(), MetaValue::I64(current + delta));
                    }
                }
            }
            log::debug!("Cascaded aggregate update from {} to its ancestors", id);
        }
        Ok(())
    }

    fn delete_key(&self, _id: &EntityId, key: &str) -> MetaResult<()> {
        log::error!("Column '{}' cannot be deleted from the entity table", key);
        Err(MetaError::new(
            "entity table columns cannot be deleted",
            ErrorKind::UnsupportedOperation,
        ))
    }

    fn execute(
        &self,
        query: &CompiledQuery,
        entity_type: Option<EntityType>,
    ) -> MetaResult<Vec<EntityRecord>> {
        let mut out = Vec::new();
        for entry in self.rows.iter() {
            if let Some(wanted) = entity_type {
                if !wanted.accepts(entry.entity_type) {
                    continue;
                }
            }
            let record = EntityRecord::new(
                entry.key().clone(),
                Some(entry.entity_type),
                entry.values.clone(),
            );
            if query.matches(&record)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}
