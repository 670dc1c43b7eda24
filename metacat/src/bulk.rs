use crate::common::{EntityId, MetaValue};
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::plugin::{KeyRouter, WritePartition};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Coordinates writes that span plugins or entities.
///
/// A bulk write is partitioned by key ownership and applied per plugin in
/// registry order. There is no cross-plugin transaction and no compensation:
/// when a partition fails, earlier partitions stay committed and the error
/// names them, so the caller knows exactly what landed. Callers that cannot
/// tolerate a torn write demand a single-plugin batch up front.
pub struct BulkWriteCoordinator {
    router: KeyRouter,
    require_single_plugin: bool,
}

impl BulkWriteCoordinator {
    pub fn new(router: KeyRouter, require_single_plugin: bool) -> Self {
        BulkWriteCoordinator {
            router,
            require_single_plugin,
        }
    }

    fn check_span(&self, partitions: &[WritePartition]) -> MetaResult<()> {
        if self.require_single_plugin && partitions.len() > 1 {
            let names = partitions
                .iter()
                .map(|p| p.plugin().plugin_name())
                .join(", ");
            log::error!("Atomic bulk write spans plugins: {}", names);
            return Err(MetaError::new(
                &format!(
                    "write spans plugins ({}) but single-plugin atomicity was demanded",
                    names
                ),
                ErrorKind::UnsupportedOperation,
            ));
        }
        Ok(())
    }

    fn apply(
        &self,
        id: &EntityId,
        partitions: &[WritePartition],
        recursive: bool,
    ) -> MetaResult<()> {
        for (index, partition) in partitions.iter().enumerate() {
            if let Err(err) = partition.plugin().set(id, partition.values(), recursive) {
                let committed = partitions[..index]
                    .iter()
                    .map(|p| p.plugin().plugin_name())
                    .join(", ");
                log::error!(
                    "Bulk write to {} failed at plugin '{}'; committed plugins: [{}]",
                    id,
                    partition.plugin().plugin_name(),
                    committed
                );
                let kind = err.kind().clone();
                return Err(MetaError::new_with_cause(
                    &format!(
                        "bulk write to '{}' failed at plugin '{}'; committed plugins: [{}]",
                        id,
                        partition.plugin().plugin_name(),
                        committed
                    ),
                    kind,
                    err,
                ));
            }
        }
        Ok(())
    }

    /// Writes a key/value batch to one entity across the owning plugins.
    ///
    /// Every key is resolved before the first write; an unmanaged key
    /// rejects the batch with nothing committed.
    pub fn set_bulk(
        &self,
        id: &EntityId,
        values: &BTreeMap<String, MetaValue>,
        recursive: bool,
    ) -> MetaResult<()> {
        let partitions = self.router.partition_write(values)?;
        self.check_span(&partitions)?;
        self.apply(id, &partitions, recursive)
    }

    /// Writes per-entity batches across many entities.
    ///
    /// Every entity's partition is validated before the first write, so a
    /// routing failure anywhere leaves the whole batch unwritten. Once
    /// applying starts, the per-entity semantics of
    /// [set_bulk](BulkWriteCoordinator::set_bulk) hold and a failure reports
    /// the failed entity.
    pub fn set_across_entities(
        &self,
        writes: &[(EntityId, BTreeMap<String, MetaValue>)],
        recursive: bool,
    ) -> MetaResult<()> {
        let mut planned = Vec::with_capacity(writes.len());
        for (id, values) in writes {
            let partitions = self.router.partition_write(values)?;
            self.check_span(&partitions)?;
            planned.push((id, partitions));
        }

        for (index, (id, partitions)) in planned.iter().enumerate() {
            if let Err(err) = self.apply(id, partitions, recursive) {
                let kind = err.kind().clone();
                return Err(MetaError::new_with_cause(
                    &format!(
                        "bulk write across entities failed at '{}' ({} of {} entities written)",
                        id,
                        index,
                        planned.len()
                    ),
                    kind,
                    err,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ColumnAdapter, DocumentAdapter};
    use crate::common::{EntityType, Hierarchy, InMemoryHierarchy};
    use crate::plugin::{ColumnMetaPlugin, JsonMetaPlugin, MetaPluginProvider, PluginRegistry};
    use std::sync::Arc;

    fn id(name: &str) -> EntityId {
        EntityId::new("scope", name)
    }

    fn meta(pairs: &[(&str, MetaValue)]) -> BTreeMap<String, MetaValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn stack() -> (ColumnMetaPlugin, JsonMetaPlugin, KeyRouter) {
        let hierarchy = Hierarchy::new(InMemoryHierarchy::new());
        let column = ColumnMetaPlugin::new(ColumnAdapter::new(hierarchy.clone()), hierarchy);
        let json = JsonMetaPlugin::new(DocumentAdapter::new());
        let registry =
            PluginRegistry::new(vec![column.as_plugin(), json.as_plugin()]).unwrap();
        let router = KeyRouter::new(Arc::new(registry));
        (column, json, router)
    }

    #[test]
    fn test_partitioned_write_lands_in_both_plugins() {
        let (column, json, router) = stack();
        column.column_adapter().register_entity(&id("f1"), EntityType::File);

        let coordinator = BulkWriteCoordinator::new(router, false);
        coordinator
            .set_bulk(
                &id("f1"),
                &meta(&[
                    ("bytes", MetaValue::I64(100)),
                    ("custom_tag", MetaValue::from("blue")),
                ]),
                false,
            )
            .unwrap();

        assert_eq!(
            column.get(&id("f1")).unwrap().get("bytes"),
            Some(&MetaValue::I64(100))
        );
        assert_eq!(
            json.get(&id("f1")).unwrap().get("custom_tag"),
            Some(&MetaValue::from("blue"))
        );
    }

    #[test]
    fn test_unmanaged_key_rejects_before_writing() {
        let (column, _, router) = stack();
        column.column_adapter().register_entity(&id("f1"), EntityType::File);

        let coordinator = BulkWriteCoordinator::new(router, false);
        let err = coordinator
            .set_bulk(
                &id("f1"),
                &meta(&[
                    ("bytes", MetaValue::I64(100)),
                    ("nested.key", MetaValue::from("x")),
                ]),
                false,
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnmanagedKey);

        // nothing was committed
        assert_eq!(column.get(&id("f1")).unwrap().get("bytes"), None);
    }

    #[test]
    fn test_single_plugin_demand() {
        let (column, _, router) = stack();
        column.column_adapter().register_entity(&id("f1"), EntityType::File);

        let coordinator = BulkWriteCoordinator::new(router, true);
        let err = coordinator
            .set_bulk(
                &id("f1"),
                &meta(&[
                    ("bytes", MetaValue::I64(100)),
                    ("custom_tag", MetaValue::from("blue")),
                ]),
                false,
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedOperation);

        coordinator
            .set_bulk(&id("f1"), &meta(&[("bytes", MetaValue::I64(100))]), false)
            .unwrap();
    }

    #[test]
    fn test_failure_reports_committed_plugins() {
        let (column, json, router) = stack();
        // entity is never registered in the column table, so the column
        // partition fails after the registry ordering puts it first
        let coordinator = BulkWriteCoordinator::new(router, false);
        let err = coordinator
            .set_bulk(
                &id("ghost"),
                &meta(&[
                    ("bytes", MetaValue::I64(100)),
                    ("custom_tag", MetaValue::from("blue")),
                ]),
                false,
            )
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EntityNotFound);
        assert!(err.message().contains("committed plugins: []"));
        assert!(err.message().contains("DID_COLUMN"));
        assert!(err.cause().is_some());

        // the JSON partition never ran
        assert!(json.get(&id("ghost")).unwrap().is_empty());
        assert!(!column.column_adapter().contains(&id("ghost")));
    }

    #[test]
    fn test_across_entities_validates_all_before_writing() {
        let (column, _, router) = stack();
        column.column_adapter().register_entity(&id("f1"), EntityType::File);

        let coordinator = BulkWriteCoordinator::new(router, false);
        let writes = vec![
            (id("f1"), meta(&[("bytes", MetaValue::I64(1))])),
            (id("f2"), meta(&[("nested.key", MetaValue::from("x"))])),
        ];
        let err = coordinator.set_across_entities(&writes, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnmanagedKey);

        // the valid first entity was not written either
        assert_eq!(column.get(&id("f1")).unwrap().get("bytes"), None);
    }

    #[test]
    fn test_across_entities_applies_in_order() {
        let (column, json, router) = stack();
        column.column_adapter().register_entity(&id("f1"), EntityType::File);
        column.column_adapter().register_entity(&id("f2"), EntityType::File);

        let coordinator = BulkWriteCoordinator::new(router, false);
        let writes = vec![
            (id("f1"), meta(&[("bytes", MetaValue::I64(1))])),
            (id("f2"), meta(&[("custom_tag", MetaValue::from("x"))])),
        ];
        coordinator.set_across_entities(&writes, false).unwrap();

        assert_eq!(
            column.get(&id("f1")).unwrap().get("bytes"),
            Some(&MetaValue::I64(1))
        );
        assert_eq!(
            json.get(&id("f2")).unwrap().get("custom_tag"),
            Some(&MetaValue::from("x"))
        );
    }
}
