use crate::common::{EntityId, EntityType, Hierarchy};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::filter::{FilterEngine, FilterExpression};
use crate::plugin::{MetaPlugin, PluginSelector};
use std::collections::HashSet;

/// Options of a listing call.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    plugin: PluginSelector,
    entity_type: Option<EntityType>,
    long: bool,
    recursive: bool,
    offset: Option<usize>,
    limit: Option<usize>,
    ignored: HashSet<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the listing to one plugin by name.
    pub fn with_plugin(mut self, name: &str) -> Self {
        self.plugin = PluginSelector::named(name);
        self
    }

    /// Restricts results to one semantic entity type.
    ///
    /// By default no restriction applies and every type is listed; callers
    /// wanting the collection view pass [EntityType::Collection] explicitly.
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Excludes entities the caller has already seen from the results.
    ///
    /// Useful when pages of a larger walk are assembled across several
    /// listing calls; ignored entities are also not re-reported by the
    /// recursive expansion.
    pub fn ignoring(mut self, ids: &[EntityId]) -> Self {
        self.ignored.extend(ids.iter().map(EntityId::qualified));
        self
    }

    /// Returns full records instead of bare names.
    pub fn long(mut self) -> Self {
        self.long = true;
        self
    }

    /// Expands matched collections through their attached descendants.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn plugin(&self) -> &PluginSelector {
        &self.plugin
    }

    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity_type
    }

    pub fn is_long(&self) -> bool {
        self.long
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn ignored(&self) -> &HashSet<String> {
        &self.ignored
    }
}

/// A full listing record, with fields the owning backend cannot supply left
/// unset. The document backend tracks neither entity types nor sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRecord {
    pub namespace: String,
    pub name: String,
    pub entity_type: Option<EntityType>,
    pub bytes: Option<i64>,
    pub length: Option<i64>,
}

/// One listing result, in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEntry {
    /// Bare entity name.
    Short(String),
    /// Full record.
    Long(ListRecord),
}

impl ListEntry {
    pub fn name(&self) -> &str {
        match self {
            ListEntry::Short(name) => name,
            ListEntry::Long(record) => &record.name,
        }
    }
}

/// Executes listing queries, including recursive expansion.
///
/// A recursive listing walks the attachment graph of every matched
/// collection, rewrites the filter's `name` clauses to each child's exact
/// name, and re-issues the query, so every level is still answered by the
/// same single backend. Results from overlapping OR groups and from the
/// expansion are deduplicated by qualified entity name.
pub struct RecursiveListingExpander {
    hierarchy: Hierarchy,
}

impl RecursiveListingExpander {
    pub fn new(hierarchy: Hierarchy) -> Self {
        RecursiveListingExpander { hierarchy }
    }

    /// Runs a listing for an already-resolved plugin.
    ///
    /// # Errors
    ///
    /// `RecursionUnsupported` when recursion is requested against a plugin
    /// that does not support it.
    pub fn list(
        &self,
        plugin: &MetaPlugin,
        expression: &FilterExpression,
        options: &ListOptions,
    ) -> MetaResult<Vec<ListEntry>> {
        if options.is_recursive() && !plugin.capabilities().supports_recursive_list {
            log::error!(
                "Plugin {} does not support recursive listing",
                plugin.plugin_name()
            );
            return Err(MetaError::new(
                &format!(
                    "plugin '{}' does not support recursive listing",
                    plugin.plugin_name()
                ),
                ErrorKind::RecursionUnsupported,
            ));
        }

        // caller-supplied exclusions are just pre-seen entities
        let mut seen = options.ignored().clone();
        let mut expanded = HashSet::new();
        let mut entries = Vec::new();
        self.collect(
            plugin,
            expression,
            options,
            &mut seen,
            &mut expanded,
            &mut entries,
        )?;

        let offset = options.offset.unwrap_or(0);
        let entries: Vec<ListEntry> = match options.limit {
            Some(limit) => entries.into_iter().skip(offset).take(limit).collect(),
            None => entries.into_iter().skip(offset).collect(),
        };
        Ok(entries)
    }

    fn collect(
        &self,
        plugin: &MetaPlugin,
        expression: &FilterExpression,
        options: &ListOptions,
        seen: &mut HashSet<String>,
        expanded: &mut HashSet<String>,
        entries: &mut Vec<ListEntry>,
    ) -> MetaResult<()> {
        let adapter = plugin.adapter();
        let strict = !adapter.stores_raw_values();
        let engine = FilterEngine::from_expression(expression.clone(), strict)?;
        let query = engine.compile(&adapter)?;
        let records = adapter.execute(&query, options.entity_type())?;

        if options.is_recursive() {
            let mut child_names = Vec::new();
            for record in &records {
                if !expanded.insert(record.id().qualified()) {
                    continue;
                }
                for child in self.hierarchy.children(record.id())? {
                    child_names.push(child.id.name().to_string());
                }
            }
            for name in child_names {
                let rewritten = expression.rewrite_name(&name);
                self.collect(plugin, &rewritten, options, seen, expanded, entries)?;
            }
        }

        for record in records {
            if !seen.insert(record.id().qualified()) {
                continue;
            }
            if options.is_long() {
                entries.push(ListEntry::Long(ListRecord {
                    namespace: record.id().namespace().to_string(),
                    name: record.id().name().to_string(),
                    entity_type: record.entity_type(),
                    bytes: record.get("bytes").and_then(|v| v.as_i64()),
                    length: record.get("length").and_then(|v| v.as_i64()),
                }));
            } else {
                entries.push(ListEntry::Short(record.id().name().to_string()));
            }
        }
        Ok(())
    }
}
