//! List type items: the enumerated values list type attributes point to.

use super::{InventoryService, require_name};
use crate::cache::CacheUpdate;
use crate::mapper::EntityMapper;
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, Node};
use crate::types::model::{
    ActivityType, AttributeChanges, BusinessObjectLight, ClassMetadataLight, ListTypeItem,
};
use crate::types::{AttributeValue, ChangeDescriptor, ErrorMessage, InventoryError};
use std::collections::BTreeSet;

impl InventoryService {
    pub fn create_list_type_item(
        &self,
        actor: &str,
        class_name: &str,
        name: &str,
        display_name: Option<&str>,
    ) -> Result<String, InventoryError> {
        require_name(name, "list type item")?;
        self.write(|tx, effects| {
            let class = self.list_type_class(tx, class_name)?;
            let mut attributes = AttributeChanges::new();
            attributes.insert(PROPERTY_NAME.to_string(), Some(AttributeValue::Text(name.to_string())));
            if let Some(display_name) = display_name {
                attributes.insert(
                    PROPERTY_DISPLAY_NAME.to_string(),
                    Some(AttributeValue::Text(display_name.to_string())),
                );
            }
            let (_, uuid) =
                self.mapper
                    .create_instance(tx, &class, false, LABEL_LIST_TYPE_ITEMS, &attributes)?;
            effects.cache.push(CacheUpdate::ListTypeChanged(class.name.clone()));
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("List type item {} of {} created", name, class_name)),
            )?;
            Ok(uuid)
        })
    }

    /// Delete an item. Items still referenced are only deleted with
    /// `release_relationships`, which clears the referencing attributes.
    pub fn delete_list_type_item(
        &self,
        actor: &str,
        class_name: &str,
        uuid: &str,
        release_relationships: bool,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = self.list_type_item_node(tx, class_name, uuid)?;
            if !release_relationships {
                ensure_unreferenced(tx, &node)?;
            }
            let update = list_type_update(&self.mapper, tx, &node)?;
            effects.blobs.extend(self.hierarchy.delete_subtree(tx, node.id, true)?);
            effects.cache.extend(update);
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("List type item {} deleted", node.name())),
            )
        })
    }

    /// Items of exactly `class_name`, sorted by name.
    pub fn get_list_type_items(&self, class_name: &str) -> Result<Vec<ListTypeItem>, InventoryError> {
        self.read(|tx| {
            self.cache.get_or_load(
                tx.cache_epoch(),
                |c| c.list_types.get(class_name).cloned(),
                || {
                    let class = self.list_type_class(tx, class_name)?;
                    let mut items = Vec::new();
                    for rel in tx.incoming(class.id, REL_INSTANCE_OF)? {
                        let node = tx.require_node(rel.start)?;
                        if node.has_label(LABEL_LIST_TYPE_ITEMS) {
                            items.push(list_type_item(&class.name, &node));
                        }
                    }
                    items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
                    Ok(items)
                },
                |c, items| {
                    c.list_types.insert(class_name.to_string(), items);
                },
            )
        })
    }

    pub fn get_list_type_item(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<ListTypeItem, InventoryError> {
        self.read(|tx| {
            let node = self.list_type_item_node(tx, class_name, uuid)?;
            let membership = self.mapper.membership(tx, node.id)?;
            Ok(list_type_item(&membership.class_name, &node))
        })
    }

    /// Names are not unique; the most recently created match wins.
    pub fn get_list_type_item_with_name(
        &self,
        class_name: &str,
        name: &str,
    ) -> Result<ListTypeItem, InventoryError> {
        self.read(|tx| {
            let class = self.list_type_class(tx, class_name)?;
            let mut found: Option<Node> = None;
            for rel in tx.incoming(class.id, REL_INSTANCE_OF)? {
                let node = tx.require_node(rel.start)?;
                if node.has_label(LABEL_LIST_TYPE_ITEMS)
                    && node.name() == name
                    && found.as_ref().is_none_or(|f| f.id < node.id)
                {
                    found = Some(node);
                }
            }
            found
                .map(|node| list_type_item(&class.name, &node))
                .ok_or_else(|| {
                    InventoryError::ApplicationObjectNotFound(
                        ErrorMessage::new(messages::LIST_TYPE_NAME_NOT_FOUND)
                            .arg(class_name)
                            .arg(name),
                    )
                })
        })
    }

    pub fn get_instanceable_list_types(&self) -> Result<Vec<ClassMetadataLight>, InventoryError> {
        self.read(|tx| self.catalog.get_instanceable_list_types(tx))
    }

    /// Objects referencing the item through any list type attribute.
    /// `limit == 0` returns all of them.
    pub fn get_list_type_item_uses(
        &self,
        class_name: &str,
        uuid: &str,
        limit: usize,
    ) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        self.read(|tx| {
            let node = self.list_type_item_node(tx, class_name, uuid)?;
            let mut seen = BTreeSet::new();
            let mut out = Vec::new();
            for rel in tx.incoming(node.id, REL_RELATED_TO)? {
                if limit > 0 && out.len() >= limit {
                    break;
                }
                if seen.insert(rel.start) {
                    out.push(self.mapper.light(tx, &tx.require_node(rel.start)?)?);
                }
            }
            Ok(out)
        })
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    fn list_type_class(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
    ) -> Result<std::sync::Arc<crate::types::model::ClassMetadata>, InventoryError> {
        if !self.catalog.is_list_type(tx, class_name)? {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::NOT_A_LIST_TYPE).arg(class_name),
            ));
        }
        self.catalog.instanceable_class(tx, class_name)
    }

    pub(super) fn list_type_item_node(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
        uuid: &str,
    ) -> Result<Node, InventoryError> {
        let missing = || {
            InventoryError::ApplicationObjectNotFound(
                ErrorMessage::new(messages::LIST_TYPE_ITEM_NOT_FOUND)
                    .arg(class_name)
                    .arg(uuid),
            )
        };
        let node = tx.node_by_uuid(uuid)?.ok_or_else(missing)?;
        if !node.has_label(LABEL_LIST_TYPE_ITEMS) {
            return Err(missing());
        }
        let membership = self.mapper.membership(tx, node.id)?;
        if !self
            .catalog
            .is_subclass_of(tx, &membership.class_name, class_name)?
        {
            return Err(missing());
        }
        Ok(node)
    }
}

/// The cache entry invalidated by a committed change to `node`, when it is
/// a list type item.
pub(super) fn list_type_update(
    mapper: &EntityMapper,
    tx: &impl GraphRead,
    node: &Node,
) -> Result<Option<CacheUpdate>, InventoryError> {
    if !node.has_label(LABEL_LIST_TYPE_ITEMS) {
        return Ok(None);
    }
    let membership = mapper.membership(tx, node.id)?;
    Ok(Some(CacheUpdate::ListTypeChanged(membership.class_name)))
}

/// Fails while any object references the item.
pub(super) fn ensure_unreferenced(tx: &impl GraphRead, node: &Node) -> Result<(), InventoryError> {
    if tx.incoming(node.id, REL_RELATED_TO)?.is_empty() {
        return Ok(());
    }
    Err(InventoryError::OperationNotPermitted(
        ErrorMessage::new(messages::LIST_TYPE_ITEM_IN_USE).arg(node.name()),
    ))
}

fn list_type_item(class_name: &str, node: &Node) -> ListTypeItem {
    ListTypeItem {
        class_name: class_name.to_string(),
        uuid: node.uuid().unwrap_or_default().to_string(),
        name: node.name(),
        display_name: node
            .text(PROPERTY_DISPLAY_NAME)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        creation_date: node.integer(PROPERTY_CREATION_DATE).unwrap_or(0),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::service;
    use crate::types::model::{AttributeDefinition, AttributeType, ClassDefinition, NewTask};

    fn setup(service: &InventoryService) {
        service
            .create_class(ADMIN_USER, &ClassDefinition::new("Vendor", CLASS_GENERIC_OBJECT_LIST))
            .expect("list type");
        service
            .create_class(ADMIN_USER, &ClassDefinition::new("Router", CLASS_INVENTORY_OBJECT))
            .expect("class");
        service
            .create_attribute(
                ADMIN_USER,
                "Router",
                &AttributeDefinition::new("vendor", AttributeType::ListType("Vendor".into())),
            )
            .expect("attribute");
        service.add_possible_children(ADMIN_USER, None, &["Router"]).expect("children");
    }

    fn router(service: &InventoryService, vendor: &str) -> String {
        let mut attrs = AttributeChanges::new();
        attrs.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text("r1".into())));
        attrs.insert("vendor".into(), Some(AttributeValue::reference(vendor)));
        service
            .create_object(ADMIN_USER, "Router", None, &attrs, None)
            .expect("router")
    }

    #[test]
    fn items_are_sorted_and_cached() {
        let service = service();
        setup(&service);
        service.create_list_type_item(ADMIN_USER, "Vendor", "Nokia", None).expect("item");
        service
            .create_list_type_item(ADMIN_USER, "Vendor", "Cisco", Some("Cisco Systems"))
            .expect("item");
        let items = service.get_list_type_items("Vendor").expect("items");
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Cisco", "Nokia"]);
        assert_eq!(items[0].display_name.as_deref(), Some("Cisco Systems"));

        service.create_list_type_item(ADMIN_USER, "Vendor", "Adva", None).expect("item");
        assert_eq!(service.get_list_type_items("Vendor").expect("items")[0].name, "Adva");
    }

    #[test]
    fn only_list_types_hold_items() {
        let service = service();
        setup(&service);
        let err = service
            .create_list_type_item(ADMIN_USER, "Router", "x", None)
            .expect_err("not a list type");
        assert_eq!(err.key(), Some(messages::NOT_A_LIST_TYPE));
        assert_eq!(service.get_instanceable_list_types().expect("types").len(), 1);
    }

    #[test]
    fn most_recent_item_wins_by_name() {
        let service = service();
        setup(&service);
        service.create_list_type_item(ADMIN_USER, "Vendor", "Dup", None).expect("item");
        let second = service.create_list_type_item(ADMIN_USER, "Vendor", "Dup", None).expect("item");
        let found = service.get_list_type_item_with_name("Vendor", "Dup").expect("found");
        assert_eq!(found.uuid, second);
        let err = service
            .get_list_type_item_with_name("Vendor", "Missing")
            .expect_err("absent");
        assert_eq!(err.key(), Some(messages::LIST_TYPE_NAME_NOT_FOUND));
    }

    #[test]
    fn referenced_items_need_release() {
        let service = service();
        setup(&service);
        let vendor = service.create_list_type_item(ADMIN_USER, "Vendor", "Nokia", None).expect("item");
        let router = router(&service, &vendor);
        let uses = service.get_list_type_item_uses("Vendor", &vendor, 0).expect("uses");
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].uuid, router);

        let err = service
            .delete_list_type_item(ADMIN_USER, "Vendor", &vendor, false)
            .expect_err("in use");
        assert_eq!(err.key(), Some(messages::LIST_TYPE_ITEM_IN_USE));
        service
            .delete_list_type_item(ADMIN_USER, "Vendor", &vendor, true)
            .expect("released");
        assert!(service.get_list_type_items("Vendor").expect("items").is_empty());
        let object = service.get_object("Router", &router).expect("router");
        assert!(object.attribute("vendor").is_none());
        assert!(service.get_list_type_item("Vendor", &vendor).is_err());
    }

    fn cached_names(service: &InventoryService) -> Vec<String> {
        service
            .get_list_type_items("Vendor")
            .expect("items")
            .into_iter()
            .map(|i| i.name)
            .collect()
    }

    #[test]
    fn generic_updates_refresh_the_cached_items() {
        let service = service();
        setup(&service);
        let vendor = service.create_list_type_item(ADMIN_USER, "Vendor", "Cisco", None).expect("item");
        assert_eq!(cached_names(&service), vec!["Cisco"]);

        let mut changes = AttributeChanges::new();
        changes.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text("Juniper".into())));
        service
            .update_object(ADMIN_USER, "Vendor", &vendor, &changes)
            .expect("update");
        assert_eq!(cached_names(&service), vec!["Juniper"]);

        service
            .delete_objects(ADMIN_USER, &[("Vendor", vendor.as_str())], false)
            .expect("delete");
        assert!(cached_names(&service).is_empty());
    }

    #[test]
    fn generic_delete_keeps_referenced_items() {
        let service = service();
        setup(&service);
        let vendor = service.create_list_type_item(ADMIN_USER, "Vendor", "Nokia", None).expect("item");
        let router = router(&service, &vendor);
        assert_eq!(cached_names(&service), vec!["Nokia"]);

        let err = service
            .delete_objects(ADMIN_USER, &[("Vendor", vendor.as_str())], false)
            .expect_err("in use");
        assert_eq!(err.key(), Some(messages::LIST_TYPE_ITEM_IN_USE));
        assert_eq!(cached_names(&service), vec!["Nokia"]);

        service
            .delete_objects(ADMIN_USER, &[("Vendor", vendor.as_str())], true)
            .expect("released");
        assert!(cached_names(&service).is_empty());
        let object = service.get_object("Router", &router).expect("router");
        assert!(object.attribute("vendor").is_none());
    }

    #[test]
    fn task_writes_refresh_the_cached_items() {
        let service = service();
        setup(&service);
        let vendor = service.create_list_type_item(ADMIN_USER, "Vendor", "Cisco", None).expect("item");
        assert_eq!(cached_names(&service), vec!["Cisco"]);

        let mut parameters = std::collections::BTreeMap::new();
        parameters.insert("uuid".to_string(), vendor.clone());
        let task = NewTask {
            name: "rename vendor".into(),
            enabled: true,
            commit_on_execute: true,
            script: Some(
                r#"
                set_attribute("Vendor", parameters.uuid, "name", "Juniper");
                #{ messages: [] }
                "#
                .into(),
            ),
            parameters,
            ..NewTask::default()
        };
        let id = service.create_task(ADMIN_USER, &task).expect("task");
        service.execute_task(ADMIN_USER, id).expect("execute");
        assert_eq!(cached_names(&service), vec!["Juniper"]);
    }
}
