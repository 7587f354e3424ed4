//! Pools: administrative containers restricting the class of their items.
//!
//! A pool is a `pools` node. Items, nested pools and pools placed inside
//! inventory objects all hang from their container through a
//! `CHILD_OF_SPECIAL` edge; the edge of a pool is tagged `pool`.

use super::inventory::ObjectRef;
use super::{InventoryService, require_name};
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node, tagged};
use crate::types::model::{ActivityType, AttributeChanges, BusinessObjectLight, Pool};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId};

impl InventoryService {
    /// A pool without a parent.
    pub fn create_root_pool(
        &self,
        actor: &str,
        name: &str,
        description: &str,
        class_name: &str,
        pool_type: i64,
    ) -> Result<String, InventoryError> {
        require_name(name, "pool")?;
        self.write(|tx, _| {
            let (_, uuid) = self.create_pool_node(tx, actor, name, description, class_name, pool_type)?;
            Ok(uuid)
        })
    }

    pub fn create_pool_in_object(
        &self,
        actor: &str,
        parent: ObjectRef<'_>,
        name: &str,
        description: &str,
        class_name: &str,
        pool_type: i64,
    ) -> Result<String, InventoryError> {
        require_name(name, "pool")?;
        self.write(|tx, _| {
            let parent = self.mapper.object_node(tx, parent.0, parent.1)?;
            let (pool, uuid) =
                self.create_pool_node(tx, actor, name, description, class_name, pool_type)?;
            tx.create_relationship(pool, parent.id, REL_CHILD_OF_SPECIAL, tagged(TAG_POOL))?;
            Ok(uuid)
        })
    }

    pub fn create_pool_in_pool(
        &self,
        actor: &str,
        parent_pool: &str,
        name: &str,
        description: &str,
        class_name: &str,
        pool_type: i64,
    ) -> Result<String, InventoryError> {
        require_name(name, "pool")?;
        self.write(|tx, _| {
            let parent = pool_node(tx, parent_pool)?;
            let (pool, uuid) =
                self.create_pool_node(tx, actor, name, description, class_name, pool_type)?;
            tx.create_relationship(pool, parent.id, REL_CHILD_OF_SPECIAL, tagged(TAG_POOL))?;
            Ok(uuid)
        })
    }

    fn create_pool_node(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        name: &str,
        description: &str,
        class_name: &str,
        pool_type: i64,
    ) -> Result<(NodeId, String), InventoryError> {
        self.catalog.class_node(tx, class_name)?;
        let pool = tx.create_node(&[LABEL_POOLS])?;
        let uuid = uuid::Uuid::new_v4().to_string();
        tx.set_property(pool, PROPERTY_UUID, uuid.as_str().into())?;
        tx.set_property(pool, PROPERTY_NAME, name.into())?;
        tx.set_property(pool, PROPERTY_DESCRIPTION, description.into())?;
        tx.set_property(pool, PROPERTY_CLASS_NAME, class_name.into())?;
        tx.set_property(pool, PROPERTY_TYPE, pool_type.into())?;
        self.log_general(
            tx,
            actor,
            ActivityType::CreateApplicationObject,
            &ChangeDescriptor::with_notes(format!("Pool {} created", name)),
        )?;
        Ok((pool, uuid))
    }

    /// Create an object inside a pool. Its class must be the class of the
    /// pool or a subclass.
    pub fn create_pool_item(
        &self,
        actor: &str,
        pool_uuid: &str,
        class_name: &str,
        attributes: &AttributeChanges,
        template: Option<&str>,
    ) -> Result<String, InventoryError> {
        self.write(|tx, _| {
            let pool = pool_node(tx, pool_uuid)?;
            let pool_class = pool.text_or_empty(PROPERTY_CLASS_NAME);
            let class = self.inventory_class(tx, class_name)?;
            if !self.catalog.is_subclass_of(tx, class_name, &pool_class)? {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::POOL_CLASS_MISMATCH)
                        .arg(pool.name())
                        .arg(&pool_class),
                ));
            }
            let (node, uuid) = self.instantiate(tx, &class, attributes, template)?;
            tx.relate(node, pool.id, REL_CHILD_OF_SPECIAL)?;
            self.log_object(
                tx,
                actor,
                node,
                ActivityType::CreateInventoryObject,
                &ChangeDescriptor::with_notes(format!("{} created in pool {}", class_name, pool.name())),
            )?;
            Ok(uuid)
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn get_pool(&self, uuid: &str) -> Result<Pool, InventoryError> {
        self.read(|tx| pool_node(tx, uuid).map(|n| pool(&n)))
    }

    /// Pools without a parent, optionally restricted by class (and its
    /// subclasses, if asked) and type.
    pub fn get_root_pools(
        &self,
        class_name: Option<&str>,
        pool_type: Option<i64>,
        include_subclasses: bool,
    ) -> Result<Vec<Pool>, InventoryError> {
        self.read(|tx| {
            let mut out = Vec::new();
            for node in tx.nodes(LABEL_POOLS)? {
                if !tx.outgoing(node.id, REL_CHILD_OF_SPECIAL)?.is_empty() {
                    continue;
                }
                let pool = pool(&node);
                if pool_type.is_some_and(|t| t != pool.pool_type) {
                    continue;
                }
                if let Some(class_name) = class_name {
                    let accepted = pool.class_name == class_name
                        || (include_subclasses
                            && self.catalog.is_subclass_of(tx, &pool.class_name, class_name)?);
                    if !accepted {
                        continue;
                    }
                }
                out.push(pool);
            }
            Ok(out)
        })
    }

    pub fn get_pools_in_object(
        &self,
        class_name: &str,
        uuid: &str,
        pool_class: Option<&str>,
    ) -> Result<Vec<Pool>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            pools_under(tx, node.id, pool_class)
        })
    }

    pub fn get_pools_in_pool(
        &self,
        uuid: &str,
        pool_class: Option<&str>,
    ) -> Result<Vec<Pool>, InventoryError> {
        self.read(|tx| {
            let node = pool_node(tx, uuid)?;
            pools_under(tx, node.id, pool_class)
        })
    }

    /// Objects in a pool. `limit == 0` returns all.
    pub fn get_pool_items(
        &self,
        uuid: &str,
        limit: usize,
    ) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        self.read(|tx| {
            let pool = pool_node(tx, uuid)?;
            let mut items = super::inventory::children_of(&self.mapper, tx, pool.id, true)?;
            if limit > 0 {
                items.truncate(limit);
            }
            Ok(items)
        })
    }

    // =========================================================================
    // UPDATES & DELETION
    // =========================================================================

    pub fn set_pool_properties(
        &self,
        actor: &str,
        uuid: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<ChangeDescriptor, InventoryError> {
        if let Some(name) = name {
            require_name(name, "pool")?;
        }
        self.write(|tx, _| {
            let pool = pool_node(tx, uuid)?;
            let mut change = ChangeDescriptor::new();
            for (key, value) in [(PROPERTY_NAME, name), (PROPERTY_DESCRIPTION, description)] {
                if let Some(value) = value {
                    change.record(key, pool.text(key).map(str::to_string), Some(value.to_string()));
                    tx.set_property(pool.id, key, value.into())?;
                }
            }
            if !change.is_empty() {
                self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            }
            Ok(change)
        })
    }

    /// Delete pools with their items and nested pools. Relationships of
    /// the items are released.
    pub fn delete_pools(&self, actor: &str, uuids: &[&str]) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            for uuid in uuids {
                let pool = pool_node(tx, uuid)?;
                effects.blobs.extend(self.hierarchy.delete_subtree(tx, pool.id, true)?);
                self.log_general(
                    tx,
                    actor,
                    ActivityType::DeleteApplicationObject,
                    &ChangeDescriptor::with_notes(format!("Pool {} deleted", pool.name())),
                )?;
            }
            Ok(())
        })
    }
}

fn pool_node(tx: &impl GraphRead, uuid: &str) -> Result<Node, InventoryError> {
    match tx.node_by_uuid(uuid)? {
        Some(node) if node.has_label(LABEL_POOLS) => Ok(node),
        _ => Err(InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::POOL_NOT_FOUND).arg(uuid),
        )),
    }
}

fn pool(node: &Node) -> Pool {
    Pool {
        uuid: node.uuid().unwrap_or_default().to_string(),
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        class_name: node.text_or_empty(PROPERTY_CLASS_NAME),
        pool_type: node.integer(PROPERTY_TYPE).unwrap_or(0),
    }
}

fn pools_under(
    tx: &impl GraphRead,
    parent: NodeId,
    pool_class: Option<&str>,
) -> Result<Vec<Pool>, InventoryError> {
    let mut out = Vec::new();
    for rel in tx.incoming(parent, REL_CHILD_OF_SPECIAL)? {
        let child = tx.require_node(rel.start)?;
        if !child.has_label(LABEL_POOLS) {
            continue;
        }
        let pool = pool(&child);
        if pool_class.is_none_or(|c| c == pool.class_name) {
            out.push(pool);
        }
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::service;
    use crate::types::AttributeValue;
    use crate::types::model::ClassDefinition;

    fn schema(service: &InventoryService) {
        service
            .create_class(ADMIN_USER, &ClassDefinition::new("GenericPort", CLASS_INVENTORY_OBJECT).abstract_class())
            .expect("class");
        for (name, parent) in [("OpticalPort", "GenericPort"), ("Building", CLASS_INVENTORY_OBJECT)] {
            service
                .create_class(ADMIN_USER, &ClassDefinition::new(name, parent))
                .expect("class");
        }
    }

    fn named(name: &str) -> AttributeChanges {
        let mut changes = AttributeChanges::new();
        changes.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text(name.into())));
        changes
    }

    #[test]
    fn items_must_match_the_pool_class() {
        let service = service();
        schema(&service);
        let pool = service
            .create_root_pool(ADMIN_USER, "Spares", "", "GenericPort", 1)
            .expect("pool");
        let item = service
            .create_pool_item(ADMIN_USER, &pool, "OpticalPort", &named("sfp-1"), None)
            .expect("item");
        let err = service
            .create_pool_item(ADMIN_USER, &pool, "Building", &named("b"), None)
            .expect_err("wrong class");
        assert_eq!(err.key(), Some(messages::POOL_CLASS_MISMATCH));
        let items = service.get_pool_items(&pool, 0).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].uuid, item);
        assert!(service.get_parent("OpticalPort", &item).expect("parent").is_none());
    }

    #[test]
    fn root_pool_filters() {
        let service = service();
        schema(&service);
        service.create_root_pool(ADMIN_USER, "Ports", "", "OpticalPort", 1).expect("pool");
        service.create_root_pool(ADMIN_USER, "Sites", "", "Building", 2).expect("pool");
        assert_eq!(service.get_root_pools(None, None, false).expect("all").len(), 2);
        assert_eq!(service.get_root_pools(None, Some(2), false).expect("typed").len(), 1);
        assert!(service.get_root_pools(Some("GenericPort"), None, false).expect("exact").is_empty());
        assert_eq!(service.get_root_pools(Some("GenericPort"), None, true).expect("sub").len(), 1);
    }

    #[test]
    fn nested_pools_are_deleted_with_their_items() {
        let service = service();
        schema(&service);
        service.add_possible_children(ADMIN_USER, None, &["Building"]).expect("children");
        let building = service
            .create_object(ADMIN_USER, "Building", None, &named("HQ"), None)
            .expect("building");
        let outer = service
            .create_pool_in_object(ADMIN_USER, ("Building", &building), "Stock", "", "GenericPort", 1)
            .expect("pool");
        let inner = service
            .create_pool_in_pool(ADMIN_USER, &outer, "Optics", "", "OpticalPort", 1)
            .expect("pool");
        let item = service
            .create_pool_item(ADMIN_USER, &inner, "OpticalPort", &named("sfp"), None)
            .expect("item");
        assert_eq!(service.get_pools_in_object("Building", &building, None).expect("pools").len(), 1);
        assert_eq!(service.get_pools_in_pool(&outer, Some("OpticalPort")).expect("pools").len(), 1);
        assert!(service.get_pools_in_pool(&outer, Some("Building")).expect("pools").is_empty());
        assert!(service.get_root_pools(None, None, false).expect("roots").is_empty());

        service.delete_pools(ADMIN_USER, &[&outer]).expect("delete");
        assert!(service.get_pool(&inner).is_err());
        assert!(service.get_object("OpticalPort", &item).is_err());
        assert!(service.get_object("Building", &building).is_ok());
    }

    #[test]
    fn rename_pool() {
        let service = service();
        schema(&service);
        let pool = service.create_root_pool(ADMIN_USER, "Old", "", "Building", 1).expect("pool");
        let change = service
            .set_pool_properties(ADMIN_USER, &pool, Some("New"), None)
            .expect("update");
        assert_eq!(change.old_values, vec!["Old".to_string()]);
        assert_eq!(service.get_pool(&pool).expect("pool").name, "New");
        let err = service.set_pool_properties(ADMIN_USER, &pool, Some(" "), None).expect_err("empty");
        assert_eq!(err.key(), Some(messages::NAME_EMPTY));
    }
}
