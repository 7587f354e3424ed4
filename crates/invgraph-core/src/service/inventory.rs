//! Inventory objects: creation, containment, updates, deletion and special
//! relationships.

use super::list_types::{ensure_unreferenced, list_type_update};
use super::{InventoryService, require_name};
use crate::hierarchy::{CopyTarget, Placement, special_node};
use crate::mapper::{EntityMapper, WriteMode};
use crate::messages;
use crate::primitives::*;
use crate::storage::{Direction, GraphRead, GraphWrite, Node, tagged};
use crate::types::model::{
    ActivityType, AttributeChanges, BusinessObject, BusinessObjectLight, ClassMetadata,
    ProcessInstance, SpecialRelationship,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId};
use std::sync::Arc;

/// `(class name, uuid)` of an existing object.
pub type ObjectRef<'a> = (&'a str, &'a str);

impl InventoryService {
    /// Create an inventory object under `parent` (the inventory root when
    /// `None`). With a template, the template tree is copied first and the
    /// given attributes are written over the copy.
    pub fn create_object(
        &self,
        actor: &str,
        class_name: &str,
        parent: Option<ObjectRef<'_>>,
        attributes: &AttributeChanges,
        template: Option<&str>,
    ) -> Result<String, InventoryError> {
        self.write(|tx, _| {
            let (parent_node, parent_class) = self.resolve_parent(tx, parent)?;
            self.create_contained(
                tx,
                actor,
                class_name,
                parent_node,
                parent_class.as_deref(),
                false,
                attributes,
                template,
            )
        })
    }

    pub fn create_special_object(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        attributes: &AttributeChanges,
        template: Option<&str>,
    ) -> Result<String, InventoryError> {
        self.write(|tx, _| {
            let (parent_node, parent_class) = self.resolve_parent(tx, Some(parent))?;
            self.create_contained(
                tx,
                actor,
                class_name,
                parent_node,
                parent_class.as_deref(),
                true,
                attributes,
                template,
            )
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn create_contained(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        class_name: &str,
        parent: NodeId,
        parent_class: Option<&str>,
        special: bool,
        attributes: &AttributeChanges,
        template: Option<&str>,
    ) -> Result<String, InventoryError> {
        let class = self.inventory_class(tx, class_name)?;
        self.catalog
            .check_possible_child(tx, parent_class, class_name, special)?;
        let (node, uuid) = self.instantiate(tx, &class, attributes, template)?;
        let containment = if special { REL_CHILD_OF_SPECIAL } else { REL_CHILD_OF };
        tx.relate(node, parent, containment)?;
        self.log_object(
            tx,
            actor,
            node,
            ActivityType::CreateInventoryObject,
            &ChangeDescriptor::with_notes(format!("{} created", class_name)),
        )?;
        Ok(uuid)
    }

    /// An instanceable subclass of `InventoryObject`.
    pub(super) fn inventory_class(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
    ) -> Result<Arc<ClassMetadata>, InventoryError> {
        let class = self.catalog.instanceable_class(tx, class_name)?;
        if !self
            .catalog
            .is_subclass_of(tx, class_name, CLASS_INVENTORY_OBJECT)?
        {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::NOT_SUBCLASS)
                    .arg(class_name)
                    .arg(CLASS_INVENTORY_OBJECT),
            ));
        }
        Ok(class)
    }

    /// A new unattached object node, spawned from a template if given.
    pub(super) fn instantiate(
        &self,
        tx: &impl GraphWrite,
        class: &ClassMetadata,
        attributes: &AttributeChanges,
        template: Option<&str>,
    ) -> Result<(NodeId, String), InventoryError> {
        let Some(template) = template else {
            return self
                .mapper
                .create_instance(tx, class, false, LABEL_INVENTORY_OBJECTS, attributes);
        };
        let root = self.template_root(tx, &class.name, template)?;
        let node = self
            .hierarchy
            .copy_subtree(tx, root.id, CopyTarget::InventoryObject, true)?;
        self.mapper
            .dematerialize(tx, node, class, attributes, WriteMode::Create)?;
        let uuid = tx.require_node(node)?.uuid().unwrap_or_default().to_string();
        Ok((node, uuid))
    }

    /// The containing node and its class; the inventory root has no class.
    fn resolve_parent(
        &self,
        tx: &impl GraphRead,
        parent: Option<ObjectRef<'_>>,
    ) -> Result<(NodeId, Option<String>), InventoryError> {
        match parent {
            None => Ok((special_node(tx, NODE_DUMMY_ROOT)?.id, None)),
            Some((class, uuid)) => {
                let node = self.mapper.object_node(tx, class, uuid)?;
                let membership = self.mapper.membership(tx, node.id)?;
                Ok((node.id, Some(membership.class_name)))
            }
        }
    }

    pub fn create_bulk_objects(
        &self,
        actor: &str,
        class_name: &str,
        parent: Option<ObjectRef<'_>>,
        count: usize,
        pattern: &str,
    ) -> Result<Vec<String>, InventoryError> {
        self.write(|tx, _| {
            let (parent_node, parent_class) = self.resolve_parent(tx, parent)?;
            self.create_bulk(tx, actor, class_name, parent_node, parent_class.as_deref(), false, count, pattern)
        })
    }

    pub fn create_bulk_special_objects(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        count: usize,
        pattern: &str,
    ) -> Result<Vec<String>, InventoryError> {
        self.write(|tx, _| {
            let (parent_node, parent_class) = self.resolve_parent(tx, Some(parent))?;
            self.create_bulk(tx, actor, class_name, parent_node, parent_class.as_deref(), true, count, pattern)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn create_bulk(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        class_name: &str,
        parent: NodeId,
        parent_class: Option<&str>,
        special: bool,
        count: usize,
        pattern: &str,
    ) -> Result<Vec<String>, InventoryError> {
        let class = self.inventory_class(tx, class_name)?;
        self.catalog
            .check_possible_child(tx, parent_class, class_name, special)?;
        let uuids = self.hierarchy.create_bulk(
            tx,
            &class,
            Placement { parent, special },
            false,
            count,
            pattern,
        )?;
        self.log_general(
            tx,
            actor,
            ActivityType::CreateInventoryObject,
            &ChangeDescriptor::with_notes(format!("{} objects of class {} created", uuids.len(), class_name)),
        )?;
        Ok(uuids)
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn get_object(&self, class_name: &str, uuid: &str) -> Result<BusinessObject, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            self.mapper.materialize_node(tx, &node)
        })
    }

    pub fn get_object_light(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<BusinessObjectLight, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            self.mapper.light(tx, &node)
        })
    }

    pub fn get_children(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            children_of(&self.mapper, tx, node.id, false)
        })
    }

    pub fn get_special_children(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            children_of(&self.mapper, tx, node.id, true)
        })
    }

    /// Objects placed directly under the inventory root.
    pub fn get_root_objects(&self) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        self.read(|tx| {
            let root = special_node(tx, NODE_DUMMY_ROOT)?;
            children_of(&self.mapper, tx, root.id, false)
        })
    }

    /// The containing object. `None` under the inventory root or a pool.
    pub fn get_parent(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Option<BusinessObjectLight>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            let Some(parent) = self.hierarchy.parent(tx, node.id)? else {
                return Ok(None);
            };
            let parent = tx.require_node(parent)?;
            if !parent.has_label(LABEL_INVENTORY_OBJECTS) {
                return Ok(None);
            }
            self.mapper.light(tx, &parent).map(Some)
        })
    }

    /// Instances of the class and its subclasses. `limit == 0` returns all.
    pub fn get_objects_of_class(
        &self,
        class_name: &str,
        limit: usize,
    ) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        self.read(|tx| objects_of_class(&self.mapper, tx, class_name, limit))
    }

    // =========================================================================
    // UPDATES & DELETION
    // =========================================================================

    pub fn update_object(
        &self,
        actor: &str,
        class_name: &str,
        uuid: &str,
        changes: &AttributeChanges,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            let membership = self.mapper.membership(tx, node.id)?;
            let class = self.catalog.get_class(tx, &membership.class_name)?;
            let change = self
                .mapper
                .dematerialize(tx, node.id, &class, changes, WriteMode::Update)?;
            if !change.is_empty() {
                effects.cache.extend(list_type_update(&self.mapper, tx, &node)?);
                self.log_object(tx, actor, node.id, ActivityType::UpdateInventoryObject, &change)?;
            }
            Ok(change)
        })
    }

    /// Delete objects with their subtrees. Unless `release_relationships`
    /// is set, protected objects abort the whole operation.
    pub fn delete_objects(
        &self,
        actor: &str,
        objects: &[ObjectRef<'_>],
        release_relationships: bool,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            for (class_name, uuid) in objects {
                let node = self.mapper.object_node(tx, class_name, uuid)?;
                let name = node.name();
                let list_type = list_type_update(&self.mapper, tx, &node)?;
                let blobs = if list_type.is_some() {
                    if !release_relationships {
                        ensure_unreferenced(tx, &node)?;
                    }
                    self.hierarchy.delete_subtree(tx, node.id, true)?
                } else {
                    self.hierarchy
                        .delete_subtree(tx, node.id, release_relationships)?
                };
                effects.blobs.extend(blobs);
                effects.cache.extend(list_type);
                let mut change = ChangeDescriptor::with_notes(format!("{} deleted", class_name));
                change.record(PROPERTY_NAME, Some(name), None);
                self.log_general(tx, actor, ActivityType::DeleteInventoryObject, &change)?;
            }
            Ok(())
        })
    }

    // =========================================================================
    // SPECIAL RELATIONSHIPS
    // =========================================================================

    /// Relate two objects with a named special relationship. Business
    /// rules are checked when enforcement is enabled.
    pub fn create_special_relationship(
        &self,
        actor: &str,
        source: ObjectRef<'_>,
        target: ObjectRef<'_>,
        name: &str,
    ) -> Result<(), InventoryError> {
        require_name(name, "relationship")?;
        self.write(|tx, _| {
            let a = self.mapper.object_node(tx, source.0, source.1)?;
            let b = self.mapper.object_node(tx, target.0, target.1)?;
            if self.config.enforce_business_rules {
                let a_class = self.mapper.membership(tx, a.id)?.class_name;
                let b_class = self.mapper.membership(tx, b.id)?.class_name;
                self.rules
                    .check_relationship_by_attribute_value(tx, &a_class, source.1, &b_class, target.1)?;
            }
            tx.create_relationship(a.id, b.id, REL_RELATED_TO_SPECIAL, tagged(name))?;
            let mut change = ChangeDescriptor::new();
            change.record(name, None, Some(target.1.to_string()));
            self.log_object(tx, actor, a.id, ActivityType::CreateRelationship, &change)
        })
    }

    /// Release the named relationships of `source`, towards `target` only
    /// if given.
    pub fn release_special_relationship(
        &self,
        actor: &str,
        source: ObjectRef<'_>,
        target: Option<&str>,
        name: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            let a = self.mapper.object_node(tx, source.0, source.1)?;
            let mut released = Vec::new();
            for rel in tx.outgoing(a.id, REL_RELATED_TO_SPECIAL)? {
                if rel.tag() != Some(name) {
                    continue;
                }
                let other = tx.require_node(rel.end)?;
                let other_uuid = other.uuid().unwrap_or_default().to_string();
                if target.is_none_or(|t| t == other_uuid) {
                    tx.delete_relationship(rel.id)?;
                    released.push(other_uuid);
                }
            }
            if released.is_empty() {
                if let Some(target) = target {
                    return Err(InventoryError::BusinessObjectNotFound(
                        ErrorMessage::new(messages::RELATIONSHIP_NOT_FOUND)
                            .arg(name)
                            .arg(source.1)
                            .arg(target),
                    ));
                }
                return Ok(());
            }
            let mut change = ChangeDescriptor::new();
            change.record(name, Some(released.join(";")), None);
            self.log_object(tx, actor, a.id, ActivityType::ReleaseRelationship, &change)
        })
    }

    pub fn get_special_relationships(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<SpecialRelationship>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            let mut out = Vec::new();
            for rel in tx.relationships(node.id, Direction::Both, Some(REL_RELATED_TO_SPECIAL))? {
                let other = tx.require_node(rel.other(node.id))?;
                out.push(SpecialRelationship {
                    name: rel.tag().unwrap_or_default().to_string(),
                    other: self.mapper.light(tx, &other)?,
                    outgoing: rel.start == node.id,
                });
            }
            Ok(out)
        })
    }

    // =========================================================================
    // PROCESS INSTANCES
    // =========================================================================

    /// Link a process instance to an object. The link protects the object
    /// from safe deletion.
    pub fn create_process_instance(
        &self,
        actor: &str,
        object: ObjectRef<'_>,
        name: &str,
        description: &str,
    ) -> Result<NodeId, InventoryError> {
        require_name(name, "process instance")?;
        self.write(|tx, _| {
            let node = self.mapper.object_node(tx, object.0, object.1)?;
            let instance = tx.create_node(&[LABEL_PROCESS_INSTANCES])?;
            tx.set_property(instance, PROPERTY_NAME, name.into())?;
            tx.set_property(instance, PROPERTY_DESCRIPTION, description.into())?;
            tx.relate(node.id, instance, REL_HAS_PROCESS_INSTANCE)?;
            self.log_object(
                tx,
                actor,
                node.id,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Process instance {} created", name)),
            )?;
            Ok(instance)
        })
    }

    pub fn delete_process_instance(&self, actor: &str, id: NodeId) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            let instance = process_instance_node(tx, id)?;
            tx.detach_delete(instance.id)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Process instance {} deleted", instance.name())),
            )
        })
    }

    pub fn get_process_instances(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<ProcessInstance>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            let object = self.mapper.light(tx, &node)?;
            let mut out = Vec::new();
            for rel in tx.outgoing(node.id, REL_HAS_PROCESS_INSTANCE)? {
                let instance = tx.require_node(rel.end)?;
                out.push(ProcessInstance {
                    id: instance.id,
                    name: instance.name(),
                    description: instance.text_or_empty(PROPERTY_DESCRIPTION),
                    object: object.clone(),
                });
            }
            Ok(out)
        })
    }
}

fn process_instance_node(tx: &impl GraphRead, id: NodeId) -> Result<Node, InventoryError> {
    match tx.node(id)? {
        Some(node) if node.has_label(LABEL_PROCESS_INSTANCES) => Ok(node),
        _ => Err(InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::PROCESS_INSTANCE_NOT_FOUND).arg(id),
        )),
    }
}

/// Inventory objects directly contained in `node`. Pools are skipped.
pub(crate) fn children_of(
    mapper: &EntityMapper,
    tx: &impl GraphRead,
    node: NodeId,
    special: bool,
) -> Result<Vec<BusinessObjectLight>, InventoryError> {
    let kind = if special { REL_CHILD_OF_SPECIAL } else { REL_CHILD_OF };
    let mut out = Vec::new();
    for rel in tx.incoming(node, kind)? {
        let child = tx.require_node(rel.start)?;
        if child.has_label(LABEL_INVENTORY_OBJECTS) {
            out.push(mapper.light(tx, &child)?);
        }
    }
    Ok(out)
}

/// Inventory objects of `class_name` or any subclass, in class then
/// creation order. `limit == 0` returns all.
pub(crate) fn objects_of_class(
    mapper: &EntityMapper,
    tx: &impl GraphRead,
    class_name: &str,
    limit: usize,
) -> Result<Vec<BusinessObjectLight>, InventoryError> {
    let catalog = mapper.catalog();
    let mut classes = vec![class_name.to_string()];
    classes.extend(catalog.subclass_names(tx, class_name)?);
    let mut out = Vec::new();
    for name in classes {
        let class = catalog.class_node(tx, &name)?;
        for rel in tx.incoming(class.id, REL_INSTANCE_OF)? {
            let node = tx.require_node(rel.start)?;
            if !node.has_label(LABEL_INVENTORY_OBJECTS) {
                continue;
            }
            out.push(BusinessObjectLight {
                class_name: name.clone(),
                uuid: node.uuid().unwrap_or_default().to_string(),
                name: node.name(),
            });
            if limit > 0 && out.len() == limit {
                return Ok(out);
            }
        }
    }
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
