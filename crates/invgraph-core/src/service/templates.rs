//! Templates: prototype trees of elements that new objects are spawned from.
//!
//! Elements are instances with special class membership. A template root
//! additionally carries the `templates` label and a `HAS_TEMPLATE` edge
//! from its class.

use super::inventory::ObjectRef;
use super::{InventoryService, require_name};
use crate::hierarchy::{CopyTarget, Placement};
use crate::mapper::{WriteMode, parse_changes};
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    ActivityType, AttributeChanges, TemplateObject, TemplateObjectLight,
};
use crate::types::{AttributeValue, ChangeDescriptor, ErrorMessage, InventoryError, NodeId};
use std::collections::BTreeMap;

impl InventoryService {
    /// Create an empty template for `class_name`.
    pub fn create_template(
        &self,
        actor: &str,
        class_name: &str,
        name: &str,
    ) -> Result<String, InventoryError> {
        require_name(name, "template")?;
        self.write(|tx, _| {
            let class = self.catalog.instanceable_class(tx, class_name)?;
            let mut attributes = AttributeChanges::new();
            attributes.insert(PROPERTY_NAME.to_string(), Some(AttributeValue::Text(name.to_string())));
            let (node, uuid) =
                self.mapper
                    .create_instance(tx, &class, true, LABEL_TEMPLATE_ELEMENTS, &attributes)?;
            tx.add_label(node, LABEL_TEMPLATES)?;
            for rel in tx.outgoing(node, REL_INSTANCE_OF_SPECIAL)? {
                tx.set_relationship_property(rel.id, PROPERTY_NAME, TAG_TEMPLATE.into())?;
            }
            tx.relate(class.id, node, REL_HAS_TEMPLATE)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Template {} of {} created", name, class_name)),
            )?;
            Ok(uuid)
        })
    }

    /// Add an element under a template element.
    pub fn create_template_element(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        name: &str,
    ) -> Result<String, InventoryError> {
        self.create_element(actor, class_name, parent, name, false)
    }

    pub fn create_template_special_element(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        name: &str,
    ) -> Result<String, InventoryError> {
        self.create_element(actor, class_name, parent, name, true)
    }

    fn create_element(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        name: &str,
        special: bool,
    ) -> Result<String, InventoryError> {
        self.write(|tx, _| {
            let parent = self.template_element_node(tx, parent.0, parent.1)?;
            let parent_class = self.mapper.membership(tx, parent.id)?.class_name;
            let class = self.catalog.instanceable_class(tx, class_name)?;
            self.catalog
                .check_possible_child(tx, Some(&parent_class), class_name, special)?;
            let mut attributes = AttributeChanges::new();
            attributes.insert(PROPERTY_NAME.to_string(), Some(AttributeValue::Text(name.to_string())));
            let (node, uuid) =
                self.mapper
                    .create_instance(tx, &class, true, LABEL_TEMPLATE_ELEMENTS, &attributes)?;
            let containment = if special { REL_CHILD_OF_SPECIAL } else { REL_CHILD_OF };
            tx.relate(node, parent.id, containment)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Template element {} created", name)),
            )?;
            Ok(uuid)
        })
    }

    pub fn create_bulk_template_element(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        count: usize,
        pattern: &str,
    ) -> Result<Vec<String>, InventoryError> {
        self.create_bulk_elements(actor, class_name, parent, count, pattern, false)
    }

    pub fn create_bulk_special_template_element(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        count: usize,
        pattern: &str,
    ) -> Result<Vec<String>, InventoryError> {
        self.create_bulk_elements(actor, class_name, parent, count, pattern, true)
    }

    fn create_bulk_elements(
        &self,
        actor: &str,
        class_name: &str,
        parent: ObjectRef<'_>,
        count: usize,
        pattern: &str,
        special: bool,
    ) -> Result<Vec<String>, InventoryError> {
        self.write(|tx, _| {
            let parent = self.template_element_node(tx, parent.0, parent.1)?;
            let parent_class = self.mapper.membership(tx, parent.id)?.class_name;
            let class = self.catalog.instanceable_class(tx, class_name)?;
            self.catalog
                .check_possible_child(tx, Some(&parent_class), class_name, special)?;
            let uuids = self.hierarchy.create_bulk(
                tx,
                &class,
                Placement {
                    parent: parent.id,
                    special,
                },
                true,
                count,
                pattern,
            )?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!(
                    "{} template elements of class {} created",
                    uuids.len(),
                    class_name
                )),
            )?;
            Ok(uuids)
        })
    }

    /// Set attributes of a template element from raw text values. Mandatory
    /// and read-only constraints do not apply to templates.
    pub fn update_template_element(
        &self,
        actor: &str,
        class_name: &str,
        uuid: &str,
        attribute_names: &[&str],
        attribute_values: &[&str],
    ) -> Result<ChangeDescriptor, InventoryError> {
        if attribute_names.len() != attribute_values.len() {
            return Err(InventoryError::ArraySizeMismatch(
                ErrorMessage::new(messages::ARRAY_SIZE_MISMATCH)
                    .arg(attribute_names.len())
                    .arg(attribute_values.len()),
            ));
        }
        self.write(|tx, _| {
            let node = self.template_element_node(tx, class_name, uuid)?;
            let membership = self.mapper.membership(tx, node.id)?;
            let class = self.catalog.get_class(tx, &membership.class_name)?;
            let raw: BTreeMap<String, String> = attribute_names
                .iter()
                .zip(attribute_values)
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect();
            let changes = parse_changes(&class, &raw)?;
            let change = self
                .mapper
                .dematerialize(tx, node.id, &class, &changes, WriteMode::Template)?;
            if !change.is_empty() {
                self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            }
            Ok(change)
        })
    }

    /// Delete an element (or a whole template) and everything below it.
    pub fn delete_template_element(
        &self,
        actor: &str,
        class_name: &str,
        uuid: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = self.template_element_node(tx, class_name, uuid)?;
            effects.blobs.extend(self.hierarchy.delete_subtree(tx, node.id, true)?);
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Template element {} deleted", node.name())),
            )
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn get_templates_for_class(
        &self,
        class_name: &str,
    ) -> Result<Vec<TemplateObjectLight>, InventoryError> {
        self.read(|tx| {
            let class = self.catalog.class_node(tx, class_name)?;
            let mut out = Vec::new();
            for rel in tx.outgoing(class.id, REL_HAS_TEMPLATE)? {
                out.push(self.mapper.light(tx, &tx.require_node(rel.end)?)?);
            }
            Ok(out)
        })
    }

    pub fn get_template_element(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<TemplateObject, InventoryError> {
        self.read(|tx| {
            let node = self.template_element_node(tx, class_name, uuid)?;
            self.mapper.materialize_node(tx, &node)
        })
    }

    pub fn get_template_element_children(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<TemplateObjectLight>, InventoryError> {
        self.read(|tx| {
            let node = self.template_element_node(tx, class_name, uuid)?;
            self.element_children(tx, node.id, false)
        })
    }

    pub fn get_template_special_element_children(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<TemplateObjectLight>, InventoryError> {
        self.read(|tx| {
            let node = self.template_element_node(tx, class_name, uuid)?;
            self.element_children(tx, node.id, true)
        })
    }

    fn element_children(
        &self,
        tx: &impl GraphRead,
        node: NodeId,
        special: bool,
    ) -> Result<Vec<TemplateObjectLight>, InventoryError> {
        let mut out = Vec::new();
        for child in self.hierarchy.children(tx, node, special)? {
            let child = tx.require_node(child)?;
            if child.has_label(LABEL_TEMPLATE_ELEMENTS) {
                out.push(self.mapper.light(tx, &child)?);
            }
        }
        Ok(out)
    }

    // =========================================================================
    // COPY
    // =========================================================================

    /// Copy elements, with their subtrees, under another template element.
    pub fn copy_template_elements(
        &self,
        actor: &str,
        sources: &[ObjectRef<'_>],
        target: ObjectRef<'_>,
    ) -> Result<Vec<String>, InventoryError> {
        self.copy_elements(actor, sources, target, false)
    }

    pub fn copy_template_special_elements(
        &self,
        actor: &str,
        sources: &[ObjectRef<'_>],
        target: ObjectRef<'_>,
    ) -> Result<Vec<String>, InventoryError> {
        self.copy_elements(actor, sources, target, true)
    }

    fn copy_elements(
        &self,
        actor: &str,
        sources: &[ObjectRef<'_>],
        target: ObjectRef<'_>,
        special: bool,
    ) -> Result<Vec<String>, InventoryError> {
        self.write(|tx, _| {
            let target = self.template_element_node(tx, target.0, target.1)?;
            let target_class = self.mapper.membership(tx, target.id)?.class_name;
            let containment = if special { REL_CHILD_OF_SPECIAL } else { REL_CHILD_OF };
            let mut uuids = Vec::with_capacity(sources.len());
            for (class_name, uuid) in sources {
                let source = self.template_element_node(tx, class_name, uuid)?;
                let source_class = self.mapper.membership(tx, source.id)?.class_name;
                self.catalog
                    .check_possible_child(tx, Some(&target_class), &source_class, special)?;
                let copy = self
                    .hierarchy
                    .copy_subtree(tx, source.id, CopyTarget::TemplateElement, true)?;
                tx.relate(copy, target.id, containment)?;
                uuids.push(tx.require_node(copy)?.uuid().unwrap_or_default().to_string());
            }
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("{} template elements copied", uuids.len())),
            )?;
            Ok(uuids)
        })
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// A template element of `class_name` (or a subclass).
    fn template_element_node(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
        uuid: &str,
    ) -> Result<Node, InventoryError> {
        let missing = || {
            InventoryError::BusinessObjectNotFound(
                ErrorMessage::new(messages::TEMPLATE_NOT_FOUND)
                    .arg(class_name)
                    .arg(uuid),
            )
        };
        let node = tx.node_by_uuid(uuid)?.ok_or_else(missing)?;
        if !node.has_label(LABEL_TEMPLATE_ELEMENTS) {
            return Err(missing());
        }
        let membership = self.mapper.membership(tx, node.id)?;
        if !membership.special
            || !self
                .catalog
                .is_subclass_of(tx, &membership.class_name, class_name)?
        {
            return Err(missing());
        }
        Ok(node)
    }

    /// The root of a template of exactly `class_name`.
    pub(super) fn template_root(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
        uuid: &str,
    ) -> Result<Node, InventoryError> {
        let node = self.template_element_node(tx, class_name, uuid)?;
        for rel in tx.incoming(node.id, REL_HAS_TEMPLATE)? {
            if tx.require_node(rel.start)?.name() == class_name {
                return Ok(node);
            }
        }
        Err(InventoryError::BusinessObjectNotFound(
            ErrorMessage::new(messages::TEMPLATE_NOT_FOUND)
                .arg(class_name)
                .arg(uuid),
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::service;
    use crate::types::model::{AttributeDefinition, AttributeType, ClassDefinition};

    fn schema(service: &InventoryService) {
        for name in ["Building", "Rack", "Port"] {
            service
                .create_class(ADMIN_USER, &ClassDefinition::new(name, CLASS_INVENTORY_OBJECT))
                .expect("class");
        }
        service
            .create_attribute(
                ADMIN_USER,
                "Rack",
                &AttributeDefinition::new("serial", AttributeType::String).mandatory(),
            )
            .expect("attribute");
        service
            .create_attribute(ADMIN_USER, "Rack", &AttributeDefinition::new("units", AttributeType::Integer))
            .expect("attribute");
        service.add_possible_children(ADMIN_USER, None, &["Building"]).expect("children");
        service.add_possible_children(ADMIN_USER, Some("Building"), &["Rack"]).expect("children");
        service.add_possible_children(ADMIN_USER, Some("Rack"), &["Port"]).expect("children");
    }

    fn named(name: &str) -> AttributeChanges {
        let mut changes = AttributeChanges::new();
        changes.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text(name.into())));
        changes
    }

    #[test]
    fn spawn_object_from_template() {
        let service = service();
        schema(&service);
        let template = service.create_template(ADMIN_USER, "Rack", "42U").expect("template");
        let change = service
            .update_template_element(ADMIN_USER, "Rack", &template, &["serial", "units"], &["TPL", "42"])
            .expect("update");
        assert_eq!(change.affected_properties.len(), 2);
        let ports = service
            .create_bulk_template_element(ADMIN_USER, "Port", ("Rack", &template), 3, "p[sequence(1,3)]")
            .expect("ports");
        assert_eq!(ports.len(), 3);
        assert_eq!(service.get_templates_for_class("Rack").expect("templates").len(), 1);

        let building = service
            .create_object(ADMIN_USER, "Building", None, &named("HQ"), None)
            .expect("building");
        let rack = service
            .create_object(ADMIN_USER, "Rack", Some(("Building", &building)), &named("R9"), Some(&template))
            .expect("spawn");
        let object = service.get_object("Rack", &rack).expect("rack");
        assert_eq!(object.name, "R9");
        assert_eq!(object.attribute_text("serial").as_deref(), Some("TPL"));
        assert_eq!(object.attribute("units"), Some(&AttributeValue::Integer(42)));
        let children = service.get_children("Rack", &rack).expect("children");
        let mut names: Vec<_> = children.iter().map(|c| c.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["p1", "p2", "p3"]);
        assert!(ports.iter().all(|p| children.iter().all(|c| c.uuid != *p)));
        assert_eq!(
            service.get_template_element_children("Rack", &template).expect("elements").len(),
            3
        );
    }

    #[test]
    fn template_elements_are_not_objects() {
        let service = service();
        schema(&service);
        let template = service.create_template(ADMIN_USER, "Rack", "t").expect("template");
        assert!(service.get_objects_of_class("Rack", 0).expect("objects").is_empty());
        let err = service
            .get_template_element("Building", &template)
            .expect_err("wrong class");
        assert_eq!(err.key(), Some(messages::TEMPLATE_NOT_FOUND));
    }

    #[test]
    fn template_of_other_class_cannot_spawn() {
        let service = service();
        schema(&service);
        let template = service.create_template(ADMIN_USER, "Rack", "t").expect("template");
        let err = service
            .create_object(ADMIN_USER, "Building", None, &named("b"), Some(&template))
            .expect_err("not a Building template");
        assert_eq!(err.key(), Some(messages::TEMPLATE_NOT_FOUND));
    }

    #[test]
    fn array_size_mismatch() {
        let service = service();
        schema(&service);
        let template = service.create_template(ADMIN_USER, "Rack", "t").expect("template");
        let err = service
            .update_template_element(ADMIN_USER, "Rack", &template, &["serial"], &[])
            .expect_err("mismatch");
        assert!(matches!(err, InventoryError::ArraySizeMismatch(_)));
    }

    #[test]
    fn copy_and_delete_elements() {
        let service = service();
        schema(&service);
        let a = service.create_template(ADMIN_USER, "Rack", "a").expect("template");
        let b = service.create_template(ADMIN_USER, "Rack", "b").expect("template");
        let port = service
            .create_template_element(ADMIN_USER, "Port", ("Rack", &a), "p")
            .expect("port");
        let copies = service
            .copy_template_elements(ADMIN_USER, &[("Port", &port)], ("Rack", &b))
            .expect("copy");
        assert_eq!(copies.len(), 1);
        assert_ne!(copies[0], port);
        assert_eq!(service.get_template_element_children("Rack", &b).expect("children").len(), 1);
        let err = service
            .copy_template_special_elements(ADMIN_USER, &[("Port", &port)], ("Rack", &b))
            .expect_err("no special containment");
        assert_eq!(err.key(), Some(messages::NOT_POSSIBLE_SPECIAL_CHILD));

        service.delete_template_element(ADMIN_USER, "Rack", &a).expect("delete");
        assert!(service.get_template_element("Port", &port).is_err());
        assert_eq!(service.get_templates_for_class("Rack").expect("templates").len(), 1);
        assert!(service
            .get_template_special_element_children("Rack", &b)
            .expect("special")
            .is_empty());
    }
}
