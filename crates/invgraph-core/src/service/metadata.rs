//! Class catalog operations.

use super::InventoryService;
use crate::types::model::{
    ActivityType, AttributeDefinition, ClassDefinition, ClassMetadata, ClassMetadataLight,
    ClassUpdate,
};
use crate::types::{ChangeDescriptor, InventoryError, NodeId};
use std::sync::Arc;

impl InventoryService {
    pub fn create_class(
        &self,
        actor: &str,
        definition: &ClassDefinition,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, effects| {
            let id = self.catalog.create_class(tx, definition, &mut effects.cache)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateMetadataObject,
                &ChangeDescriptor::with_notes(format!("Class {} created", definition.name)),
            )?;
            Ok(id)
        })
    }

    pub fn get_class(&self, name: &str) -> Result<Arc<ClassMetadata>, InventoryError> {
        self.read(|tx| self.catalog.get_class(tx, name))
    }

    pub fn get_all_classes(&self) -> Result<Vec<ClassMetadataLight>, InventoryError> {
        self.read(|tx| self.catalog.get_all_classes(tx))
    }

    pub fn set_class_properties(
        &self,
        actor: &str,
        class_name: &str,
        update: &ClassUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let change = self
                .catalog
                .set_class_properties(tx, class_name, update, &mut effects.cache)?;
            if !change.is_empty() {
                self.log_general(tx, actor, ActivityType::UpdateMetadataObject, &change)?;
            }
            Ok(change)
        })
    }

    pub fn delete_class(&self, actor: &str, class_name: &str) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            self.catalog.delete_class(tx, class_name, &mut effects.cache)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteMetadataObject,
                &ChangeDescriptor::with_notes(format!("Class {} deleted", class_name)),
            )
        })
    }

    pub fn create_attribute(
        &self,
        actor: &str,
        class_name: &str,
        definition: &AttributeDefinition,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, effects| {
            let id = self
                .catalog
                .create_attribute(tx, class_name, definition, &mut effects.cache)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateMetadataObject,
                &ChangeDescriptor::with_notes(format!(
                    "Attribute {} added to {}",
                    definition.name, class_name
                )),
            )?;
            Ok(id)
        })
    }

    pub fn delete_attribute(
        &self,
        actor: &str,
        class_name: &str,
        attribute: &str,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            self.catalog
                .delete_attribute(tx, class_name, attribute, &mut effects.cache)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteMetadataObject,
                &ChangeDescriptor::with_notes(format!(
                    "Attribute {} removed from {}",
                    attribute, class_name
                )),
            )
        })
    }

    pub fn is_subclass_of(&self, class_name: &str, super_class: &str) -> Result<bool, InventoryError> {
        self.read(|tx| self.catalog.is_subclass_of(tx, class_name, super_class))
    }

    pub fn get_subclasses(
        &self,
        class_name: &str,
        include_abstract: bool,
        include_self: bool,
    ) -> Result<Vec<ClassMetadataLight>, InventoryError> {
        self.read(|tx| {
            self.catalog
                .get_subclasses(tx, class_name, include_abstract, include_self)
        })
    }

    // =========================================================================
    // CONTAINMENT
    // =========================================================================

    /// `parent_class == None` is the root of the inventory.
    pub fn add_possible_children(
        &self,
        actor: &str,
        parent_class: Option<&str>,
        children: &[&str],
    ) -> Result<(), InventoryError> {
        self.change_possible_children(actor, parent_class, children, false, true)
    }

    pub fn add_possible_special_children(
        &self,
        actor: &str,
        parent_class: Option<&str>,
        children: &[&str],
    ) -> Result<(), InventoryError> {
        self.change_possible_children(actor, parent_class, children, true, true)
    }

    pub fn remove_possible_children(
        &self,
        actor: &str,
        parent_class: Option<&str>,
        children: &[&str],
    ) -> Result<(), InventoryError> {
        self.change_possible_children(actor, parent_class, children, false, false)
    }

    pub fn remove_possible_special_children(
        &self,
        actor: &str,
        parent_class: Option<&str>,
        children: &[&str],
    ) -> Result<(), InventoryError> {
        self.change_possible_children(actor, parent_class, children, true, false)
    }

    fn change_possible_children(
        &self,
        actor: &str,
        parent_class: Option<&str>,
        children: &[&str],
        special: bool,
        add: bool,
    ) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            if add {
                self.catalog
                    .add_possible_children(tx, parent_class, children, special, &mut effects.cache)?;
            } else {
                self.catalog.remove_possible_children(
                    tx,
                    parent_class,
                    children,
                    special,
                    &mut effects.cache,
                )?;
            }
            let mut change = ChangeDescriptor::with_notes(format!(
                "{} possible {}children of {}",
                if add { "Added" } else { "Removed" },
                if special { "special " } else { "" },
                parent_class.unwrap_or(crate::primitives::CLASS_DUMMY_ROOT)
            ));
            change.record(
                "possibleChildren",
                None,
                Some(children.join(",")),
            );
            self.log_general(tx, actor, ActivityType::UpdateMetadataObject, &change)
        })
    }

    pub fn get_possible_children(&self, parent_class: Option<&str>) -> Result<Vec<String>, InventoryError> {
        self.read(|tx| self.catalog.get_possible_children(tx, parent_class, false))
    }

    pub fn get_possible_special_children(
        &self,
        parent_class: Option<&str>,
    ) -> Result<Vec<String>, InventoryError> {
        self.read(|tx| self.catalog.get_possible_children(tx, parent_class, true))
    }
}

// =============================================================================
// TESTS
// =============================================================================
