//! # Schema Catalog
//!
//! Class and attribute metadata stored in the graph.
//!
//! A class is a `classes` node, linked to its parent by `EXTENDS` and to
//! the `attributes` nodes it declares by `HAS_ATTRIBUTE`. A loaded
//! [`ClassMetadata`] carries every inherited attribute, root class first.
//! Possible children are `POSSIBLE_CHILD` / `POSSIBLE_SPECIAL_CHILD`
//! edges between class nodes.
//!
//! Reads through a read transaction are served from the [`CacheLayer`];
//! write transactions always read the graph. Mutations push the cache
//! updates the caller must apply once the transaction has committed.

use crate::cache::{CacheLayer, CacheUpdate};
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    AttributeDefinition, AttributeMetadata, AttributeType, ClassDefinition, ClassMetadata,
    ClassMetadataLight, ClassUpdate,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue, now_millis};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

static CLASS_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(CLASS_NAME_PATTERN).ok());
static ATTRIBUTE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(ATTRIBUTE_NAME_PATTERN).ok());

/// Attributes every class inherits from the root class.
pub const CORE_ATTRIBUTES: [&str; 2] = [PROPERTY_NAME, PROPERTY_CREATION_DATE];

pub(crate) fn name_matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

fn not_found(name: &str) -> InventoryError {
    InventoryError::MetadataObjectNotFound(ErrorMessage::new(messages::CLASS_NOT_FOUND).arg(name))
}

/// Read and write access to the class catalog.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    cache: Arc<CacheLayer>,
}

impl SchemaCatalog {
    pub fn new(cache: Arc<CacheLayer>) -> Self {
        Self { cache }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// The class node with this name.
    pub fn class_node(&self, tx: &impl GraphRead, name: &str) -> Result<Node, InventoryError> {
        tx.find_node(LABEL_CLASSES, PROPERTY_NAME, &PropertyValue::from(name))?
            .ok_or_else(|| not_found(name))
    }

    pub fn get_class(
        &self,
        tx: &impl GraphRead,
        name: &str,
    ) -> Result<Arc<ClassMetadata>, InventoryError> {
        self.cache.get_or_load(
            tx.cache_epoch(),
            |c| c.classes.get(name).cloned(),
            || load_class(tx, name).map(Arc::new),
            |c, class| {
                c.classes.insert(name.to_string(), class);
            },
        )
    }

    pub fn class_exists(&self, tx: &impl GraphRead, name: &str) -> Result<bool, InventoryError> {
        Ok(tx
            .find_node(LABEL_CLASSES, PROPERTY_NAME, &PropertyValue::from(name))?
            .is_some())
    }

    pub fn get_all_classes(
        &self,
        tx: &impl GraphRead,
    ) -> Result<Vec<ClassMetadataLight>, InventoryError> {
        let mut out = Vec::new();
        for node in tx.nodes(LABEL_CLASSES)? {
            out.push(light(&node));
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Whether `class_name` is `super_class` or extends it transitively.
    pub fn is_subclass_of(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
        super_class: &str,
    ) -> Result<bool, InventoryError> {
        let mut visited = BTreeSet::new();
        let mut current = Some(class_name.to_string());
        while let Some(name) = current {
            if name == super_class {
                return Ok(true);
            }
            if !visited.insert(name.clone()) {
                return Err(cycle(&name));
            }
            current = self.get_class(tx, &name)?.parent.clone();
        }
        Ok(false)
    }

    pub fn is_list_type(&self, tx: &impl GraphRead, class_name: &str) -> Result<bool, InventoryError> {
        Ok(class_name != CLASS_GENERIC_OBJECT_LIST
            && self.is_subclass_of(tx, class_name, CLASS_GENERIC_OBJECT_LIST)?)
    }

    /// Names of every class extending `class_name`, transitively.
    pub fn subclass_names(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
    ) -> Result<Vec<String>, InventoryError> {
        self.cache.get_or_load(
            tx.cache_epoch(),
            |c| c.subclasses.get(class_name).cloned(),
            || {
                let root = self.class_node(tx, class_name)?;
                let mut names = Vec::new();
                let mut visited = BTreeSet::from([root.id]);
                let mut stack = vec![root.id];
                while let Some(id) = stack.pop() {
                    for rel in tx.incoming(id, REL_EXTENDS)? {
                        if !visited.insert(rel.start) {
                            return Err(cycle(&rel.start.to_string()));
                        }
                        names.push(tx.require_node(rel.start)?.name());
                        stack.push(rel.start);
                    }
                }
                names.sort();
                Ok(names)
            },
            |c, names| {
                c.subclasses.insert(class_name.to_string(), names);
            },
        )
    }

    pub fn get_subclasses(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
        include_abstract: bool,
        include_self: bool,
    ) -> Result<Vec<ClassMetadataLight>, InventoryError> {
        let mut names = self.subclass_names(tx, class_name)?;
        if include_self {
            names.insert(0, class_name.to_string());
        }
        let mut out = Vec::new();
        for name in names {
            let class = self.get_class(tx, &name)?;
            if include_abstract || !class.abstract_class {
                out.push(ClassMetadataLight::from(class.as_ref()));
            }
        }
        Ok(out)
    }

    /// List types instances may be created of.
    pub fn get_instanceable_list_types(
        &self,
        tx: &impl GraphRead,
    ) -> Result<Vec<ClassMetadataLight>, InventoryError> {
        Ok(self
            .get_subclasses(tx, CLASS_GENERIC_OBJECT_LIST, false, false)?
            .into_iter()
            .filter(|c| c.name != CLASS_GENERIC_OBJECT_LIST)
            .collect())
    }

    /// Classes allowed under an instance of `parent_class` (`None` for the
    /// top of the containment tree), inherited from every superclass.
    /// Abstract entries are expanded to their instanceable subclasses.
    pub fn get_possible_children(
        &self,
        tx: &impl GraphRead,
        parent_class: Option<&str>,
        special: bool,
    ) -> Result<Vec<String>, InventoryError> {
        let parent = parent_class.unwrap_or(CLASS_DUMMY_ROOT).to_string();
        self.cache.get_or_load(
            tx.cache_epoch(),
            |c| c.possible_children.get(&(parent.clone(), special)).cloned(),
            || self.load_possible_children(tx, &parent, special),
            |c, names| {
                c.possible_children.insert((parent.clone(), special), names);
            },
        )
    }

    fn load_possible_children(
        &self,
        tx: &impl GraphRead,
        parent: &str,
        special: bool,
    ) -> Result<Vec<String>, InventoryError> {
        let kind = if special {
            REL_POSSIBLE_SPECIAL_CHILD
        } else {
            REL_POSSIBLE_CHILD
        };
        let mut names = BTreeSet::new();
        let mut current = Some(parent.to_string());
        let mut visited = BTreeSet::new();
        while let Some(class_name) = current {
            if !visited.insert(class_name.clone()) {
                return Err(cycle(&class_name));
            }
            let node = self.class_node(tx, &class_name)?;
            for rel in tx.outgoing(node.id, kind)? {
                let child = tx.require_node(rel.end)?;
                if child.boolean(PROPERTY_ABSTRACT) {
                    for sub in self.get_subclasses(tx, &child.name(), false, false)? {
                        names.insert(sub.name);
                    }
                } else {
                    names.insert(child.name());
                }
            }
            current = self.get_class(tx, &class_name)?.parent.clone();
        }
        Ok(names.into_iter().collect())
    }

    /// Whether `child_class` may be placed under an instance of `parent_class`.
    pub fn can_be_child(
        &self,
        tx: &impl GraphRead,
        parent_class: Option<&str>,
        child_class: &str,
        special: bool,
    ) -> Result<bool, InventoryError> {
        Ok(self
            .get_possible_children(tx, parent_class, special)?
            .iter()
            .any(|c| c == child_class))
    }

    /// Fail unless `child_class` is an allowed (special) child.
    pub fn check_possible_child(
        &self,
        tx: &impl GraphRead,
        parent_class: Option<&str>,
        child_class: &str,
        special: bool,
    ) -> Result<(), InventoryError> {
        if self.can_be_child(tx, parent_class, child_class, special)? {
            return Ok(());
        }
        let key = if special {
            messages::NOT_POSSIBLE_SPECIAL_CHILD
        } else {
            messages::NOT_POSSIBLE_CHILD
        };
        Err(InventoryError::OperationNotPermitted(
            ErrorMessage::new(key)
                .arg(child_class)
                .arg(parent_class.unwrap_or(CLASS_DUMMY_ROOT)),
        ))
    }

    /// The class must exist and accept instances.
    pub fn instanceable_class(
        &self,
        tx: &impl GraphRead,
        name: &str,
    ) -> Result<Arc<ClassMetadata>, InventoryError> {
        let class = self.get_class(tx, name)?;
        if class.abstract_class {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::CLASS_ABSTRACT).arg(name),
            ));
        }
        if class.in_design {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::CLASS_IN_DESIGN).arg(name),
            ));
        }
        Ok(class)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    pub fn create_class(
        &self,
        tx: &impl GraphWrite,
        definition: &ClassDefinition,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<NodeId, InventoryError> {
        self.create_class_node(tx, definition, true, updates)
    }

    /// Create a class. Core classes (`custom == false`) are created by bootstrap only.
    pub(crate) fn create_class_node(
        &self,
        tx: &impl GraphWrite,
        definition: &ClassDefinition,
        custom: bool,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<NodeId, InventoryError> {
        if !name_matches(&CLASS_NAME, &definition.name) {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::CLASS_NAME_INVALID).arg(&definition.name),
            ));
        }
        if self.class_exists(tx, &definition.name)? {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::CLASS_EXISTS).arg(&definition.name),
            ));
        }
        let parent = match &definition.parent {
            Some(parent) => Some(self.class_node(tx, parent)?),
            None if !custom => None,
            None => return Err(not_found("-")),
        };

        let id = tx.create_node(&[LABEL_CLASSES])?;
        tx.set_property(id, PROPERTY_NAME, definition.name.as_str().into())?;
        tx.set_property(id, PROPERTY_DISPLAY_NAME, definition.display_name.as_str().into())?;
        tx.set_property(id, PROPERTY_DESCRIPTION, definition.description.as_str().into())?;
        tx.set_property(id, PROPERTY_ABSTRACT, definition.abstract_class.into())?;
        tx.set_property(id, PROPERTY_IN_DESIGN, definition.in_design.into())?;
        tx.set_property(id, PROPERTY_CUSTOM, custom.into())?;
        tx.set_property(id, PROPERTY_CREATION_DATE, now_millis().into())?;
        if let Some(parent) = parent {
            tx.relate(id, parent.id, REL_EXTENDS)?;
        }
        updates.push(CacheUpdate::SchemaChanged);
        Ok(id)
    }

    /// Update class properties. A rename drops the cache entry of the old name.
    pub fn set_class_properties(
        &self,
        tx: &impl GraphWrite,
        class_name: &str,
        update: &ClassUpdate,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<ChangeDescriptor, InventoryError> {
        let node = self.class_node(tx, class_name)?;
        if let Some(new_name) = &update.name {
            if !name_matches(&CLASS_NAME, new_name) {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::CLASS_NAME_INVALID).arg(new_name),
                ));
            }
            if new_name != class_name && self.class_exists(tx, new_name)? {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::CLASS_EXISTS).arg(new_name),
                ));
            }
            if !node.boolean(PROPERTY_CUSTOM) {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::CLASS_CORE).arg(class_name),
                ));
            }
        }

        let mut change = ChangeDescriptor::new();
        let mut set_text = |key: &str, value: &Option<String>| -> Result<(), InventoryError> {
            if let Some(value) = value {
                change.record(key, node.text(key).map(str::to_string), Some(value.clone()));
                tx.set_property(node.id, key, value.as_str().into())?;
            }
            Ok(())
        };
        set_text(PROPERTY_NAME, &update.name)?;
        set_text(PROPERTY_DISPLAY_NAME, &update.display_name)?;
        set_text(PROPERTY_DESCRIPTION, &update.description)?;
        for (key, value) in [
            (PROPERTY_ABSTRACT, update.abstract_class),
            (PROPERTY_IN_DESIGN, update.in_design),
        ] {
            if let Some(value) = value {
                change.record(key, Some(node.boolean(key).to_string()), Some(value.to_string()));
                tx.set_property(node.id, key, value.into())?;
            }
        }

        match &update.name {
            Some(new_name) if new_name != class_name => {
                updates.push(CacheUpdate::RemoveClass(class_name.to_string()));
                updates.push(CacheUpdate::SchemaChanged);
            }
            _ => {
                updates.push(CacheUpdate::PutClass(load_class(tx, class_name)?));
                if update.abstract_class.is_some() {
                    updates.push(CacheUpdate::PossibleChildrenChanged);
                }
            }
        }
        Ok(change)
    }

    /// Delete a class without instances or subclasses.
    pub fn delete_class(
        &self,
        tx: &impl GraphWrite,
        class_name: &str,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<(), InventoryError> {
        let node = self.class_node(tx, class_name)?;
        if !node.boolean(PROPERTY_CUSTOM) {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::CLASS_CORE).arg(class_name),
            ));
        }
        if !tx.incoming(node.id, REL_EXTENDS)?.is_empty() {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::CLASS_HAS_SUBCLASSES).arg(class_name),
            ));
        }
        if !tx.incoming(node.id, REL_INSTANCE_OF)?.is_empty()
            || !tx.incoming(node.id, REL_INSTANCE_OF_SPECIAL)?.is_empty()
        {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::CLASS_HAS_INSTANCES).arg(class_name),
            ));
        }
        for rel in tx.outgoing(node.id, REL_HAS_ATTRIBUTE)? {
            tx.detach_delete(rel.end)?;
        }
        tx.detach_delete(node.id)?;
        updates.push(CacheUpdate::RemoveClass(class_name.to_string()));
        updates.push(CacheUpdate::SchemaChanged);
        Ok(())
    }

    /// Declare an attribute. Neither the class nor any subclass may already have it.
    pub fn create_attribute(
        &self,
        tx: &impl GraphWrite,
        class_name: &str,
        definition: &AttributeDefinition,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<NodeId, InventoryError> {
        if !name_matches(&ATTRIBUTE_NAME, &definition.name) {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::ATTRIBUTE_NAME_INVALID).arg(&definition.name),
            ));
        }
        let node = self.class_node(tx, class_name)?;
        let mut affected = vec![class_name.to_string()];
        affected.extend(self.subclass_names(tx, class_name)?);
        for name in &affected {
            if self.get_class(tx, name)?.has_attribute(&definition.name) {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::ATTRIBUTE_EXISTS)
                        .arg(name)
                        .arg(&definition.name),
                ));
            }
        }
        if let AttributeType::ListType(list_type) = &definition.attribute_type {
            if !self.is_list_type(tx, list_type)? {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::NOT_A_LIST_TYPE).arg(list_type),
                ));
            }
        }

        let id = tx.create_node(&[LABEL_ATTRIBUTES])?;
        tx.set_property(id, PROPERTY_NAME, definition.name.as_str().into())?;
        tx.set_property(id, PROPERTY_TYPE, definition.attribute_type.as_str().into())?;
        tx.set_property(id, PROPERTY_DISPLAY_NAME, definition.display_name.as_str().into())?;
        tx.set_property(id, PROPERTY_DESCRIPTION, definition.description.as_str().into())?;
        tx.set_property(id, PROPERTY_MANDATORY, definition.mandatory.into())?;
        tx.set_property(id, PROPERTY_UNIQUE, definition.unique.into())?;
        tx.set_property(id, PROPERTY_READ_ONLY, definition.read_only.into())?;
        tx.set_property(id, PROPERTY_VISIBLE, definition.visible.into())?;
        tx.set_property(id, PROPERTY_NO_COPY, definition.no_copy.into())?;
        tx.set_property(id, PROPERTY_MULTIPLE, definition.multiple.into())?;
        tx.set_property(id, PROPERTY_ORDER, definition.order.into())?;
        tx.relate(node.id, id, REL_HAS_ATTRIBUTE)?;
        updates.push(CacheUpdate::SchemaChanged);
        Ok(id)
    }

    /// Remove an attribute declared by `class_name`, and its values from
    /// every instance of the class and its subclasses.
    pub fn delete_attribute(
        &self,
        tx: &impl GraphWrite,
        class_name: &str,
        attribute: &str,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<(), InventoryError> {
        if CORE_ATTRIBUTES.contains(&attribute) {
            return Err(InventoryError::OperationNotPermitted(
                ErrorMessage::new(messages::ATTRIBUTE_CORE).arg(attribute),
            ));
        }
        let node = self.class_node(tx, class_name)?;
        let mut declared = None;
        for rel in tx.outgoing(node.id, REL_HAS_ATTRIBUTE)? {
            let attr = tx.require_node(rel.end)?;
            if attr.name() == attribute {
                declared = Some(attr);
            }
        }
        let Some(declared) = declared else {
            return Err(InventoryError::MetadataObjectNotFound(
                ErrorMessage::new(messages::ATTRIBUTE_NOT_FOUND)
                    .arg(attribute)
                    .arg(class_name),
            ));
        };
        let primitive = AttributeType::parse(&declared.text_or_empty(PROPERTY_TYPE)).is_primitive();

        let mut classes = vec![class_name.to_string()];
        classes.extend(self.subclass_names(tx, class_name)?);
        for name in &classes {
            let class_node = self.class_node(tx, name)?;
            let mut members = tx.incoming(class_node.id, REL_INSTANCE_OF)?;
            members.extend(tx.incoming(class_node.id, REL_INSTANCE_OF_SPECIAL)?);
            for member in members {
                if primitive {
                    tx.remove_property(member.start, attribute)?;
                } else {
                    for rel in tx.outgoing(member.start, REL_RELATED_TO)? {
                        if rel.tag() == Some(attribute) {
                            tx.delete_relationship(rel.id)?;
                        }
                    }
                }
            }
        }
        tx.detach_delete(declared.id)?;
        updates.push(CacheUpdate::SchemaChanged);
        Ok(())
    }

    /// Allow instances of `children` under instances of `parent_class`
    /// (`None` for the top of the containment tree). Existing entries are kept.
    pub fn add_possible_children(
        &self,
        tx: &impl GraphWrite,
        parent_class: Option<&str>,
        children: &[&str],
        special: bool,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<(), InventoryError> {
        let kind = possible_child_kind(special);
        let parent = self.class_node(tx, parent_class.unwrap_or(CLASS_DUMMY_ROOT))?;
        let mut existing: BTreeSet<NodeId> =
            tx.outgoing(parent.id, kind)?.into_iter().map(|r| r.end).collect();
        let mut targets = Vec::new();
        for child in children {
            let node = self.class_node(tx, child)?;
            if node.name() == CLASS_DUMMY_ROOT {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::NOT_POSSIBLE_CHILD)
                        .arg(child)
                        .arg(parent.name()),
                ));
            }
            targets.push(node.id);
        }
        for target in targets {
            if existing.insert(target) {
                tx.relate(parent.id, target, kind)?;
            }
        }
        updates.push(CacheUpdate::PossibleChildrenChanged);
        Ok(())
    }

    pub fn remove_possible_children(
        &self,
        tx: &impl GraphWrite,
        parent_class: Option<&str>,
        children: &[&str],
        special: bool,
        updates: &mut Vec<CacheUpdate>,
    ) -> Result<(), InventoryError> {
        let kind = possible_child_kind(special);
        let parent = self.class_node(tx, parent_class.unwrap_or(CLASS_DUMMY_ROOT))?;
        for child in children {
            let node = self.class_node(tx, child)?;
            for rel in tx.outgoing(parent.id, kind)? {
                if rel.end == node.id {
                    tx.delete_relationship(rel.id)?;
                }
            }
        }
        updates.push(CacheUpdate::PossibleChildrenChanged);
        Ok(())
    }
}

fn possible_child_kind(special: bool) -> &'static str {
    if special {
        REL_POSSIBLE_SPECIAL_CHILD
    } else {
        REL_POSSIBLE_CHILD
    }
}

fn cycle(at: &str) -> InventoryError {
    InventoryError::InvalidArgument(ErrorMessage::new(messages::HIERARCHY_CYCLE).arg(at))
}

fn light(node: &Node) -> ClassMetadataLight {
    ClassMetadataLight {
        id: node.id,
        name: node.name(),
        display_name: node.text_or_empty(PROPERTY_DISPLAY_NAME),
        abstract_class: node.boolean(PROPERTY_ABSTRACT),
    }
}

fn attribute_metadata(node: &Node) -> AttributeMetadata {
    AttributeMetadata {
        id: node.id,
        name: node.name(),
        display_name: node.text_or_empty(PROPERTY_DISPLAY_NAME),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        attribute_type: AttributeType::parse(&node.text_or_empty(PROPERTY_TYPE)),
        mandatory: node.boolean(PROPERTY_MANDATORY),
        unique: node.boolean(PROPERTY_UNIQUE),
        read_only: node.boolean(PROPERTY_READ_ONLY),
        visible: node.boolean(PROPERTY_VISIBLE),
        no_copy: node.boolean(PROPERTY_NO_COPY),
        multiple: node.boolean(PROPERTY_MULTIPLE),
        order: node.integer(PROPERTY_ORDER).unwrap_or(1000),
    }
}

/// Read a class and its inheritance chain from the graph.
fn load_class(tx: &impl GraphRead, name: &str) -> Result<ClassMetadata, InventoryError> {
    let node = tx
        .find_node(LABEL_CLASSES, PROPERTY_NAME, &PropertyValue::from(name))?
        .ok_or_else(|| not_found(name))?;

    let mut chain = vec![node.clone()];
    let mut visited = BTreeSet::from([node.id]);
    let mut cursor = node.id;
    while let Some(parent) = tx.first_outgoing(cursor, REL_EXTENDS)? {
        if !visited.insert(parent) {
            return Err(cycle(name));
        }
        chain.push(tx.require_node(parent)?);
        cursor = parent;
    }

    let mut attributes = Vec::new();
    for class in chain.iter().rev() {
        for rel in tx.outgoing(class.id, REL_HAS_ATTRIBUTE)? {
            attributes.push(attribute_metadata(&tx.require_node(rel.end)?));
        }
    }

    Ok(ClassMetadata {
        id: node.id,
        name: node.name(),
        display_name: node.text_or_empty(PROPERTY_DISPLAY_NAME),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        parent: chain.get(1).map(Node::name),
        abstract_class: node.boolean(PROPERTY_ABSTRACT),
        in_design: node.boolean(PROPERTY_IN_DESIGN),
        custom: node.boolean(PROPERTY_CUSTOM),
        creation_date: node.integer(PROPERTY_CREATION_DATE).unwrap_or(0),
        attributes,
    })
}

/// Create the core classes. Used by bootstrap only.
pub(crate) fn create_core_classes(
    catalog: &SchemaCatalog,
    tx: &impl GraphWrite,
    updates: &mut Vec<CacheUpdate>,
) -> Result<(), InventoryError> {
    let root = ClassDefinition {
        name: CLASS_ROOT_OBJECT.to_string(),
        parent: None,
        abstract_class: true,
        ..ClassDefinition::default()
    };
    catalog.create_class_node(tx, &root, false, updates)?;
    let root_attributes = [
        AttributeDefinition::new(PROPERTY_NAME, AttributeType::String),
        AttributeDefinition::new(PROPERTY_CREATION_DATE, AttributeType::Date).read_only(),
    ];
    for attr in &root_attributes {
        catalog.create_attribute(tx, CLASS_ROOT_OBJECT, attr, updates)?;
    }
    for name in [CLASS_INVENTORY_OBJECT, CLASS_GENERIC_OBJECT_LIST, CLASS_DUMMY_ROOT] {
        catalog.create_class_node(
            tx,
            &ClassDefinition::new(name, CLASS_ROOT_OBJECT).abstract_class(),
            false,
            updates,
        )?;
    }
    catalog.create_attribute(
        tx,
        CLASS_GENERIC_OBJECT_LIST,
        &AttributeDefinition::new(PROPERTY_DISPLAY_NAME, AttributeType::String),
        updates,
    )?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GraphDb;

    fn setup() -> (GraphDb, SchemaCatalog) {
        let db = GraphDb::in_memory().expect("open db");
        let catalog = SchemaCatalog::new(Arc::new(CacheLayer::new()));
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        create_core_classes(&catalog, &tx, &mut updates).expect("core");
        let hardware = ClassDefinition::new("GenericHardware", CLASS_INVENTORY_OBJECT).abstract_class();
        catalog.create_class(&tx, &hardware, &mut updates).expect("class");
        catalog
            .create_class(&tx, &ClassDefinition::new("Router", "GenericHardware"), &mut updates)
            .expect("class");
        catalog
            .create_class(&tx, &ClassDefinition::new("Switch", "GenericHardware"), &mut updates)
            .expect("class");
        catalog
            .create_class(&tx, &ClassDefinition::new("Rack", CLASS_INVENTORY_OBJECT), &mut updates)
            .expect("class");
        tx.commit().expect("commit");
        (db, catalog)
    }

    #[test]
    fn inherited_attributes_lead_with_root() {
        let (db, catalog) = setup();
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        catalog
            .create_attribute(
                &tx,
                "GenericHardware",
                &AttributeDefinition::new("serialNumber", AttributeType::String).unique(),
                &mut updates,
            )
            .expect("attribute");
        let router = catalog.get_class(&tx, "Router").expect("class");
        let names: Vec<_> = router.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["name", "creationDate", "serialNumber"]);
        assert_eq!(router.parent.as_deref(), Some("GenericHardware"));
        assert!(router.attribute("serialNumber").expect("attr").unique);
    }

    #[test]
    fn duplicate_attribute_in_subclass_rejected() {
        let (db, catalog) = setup();
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        catalog
            .create_attribute(&tx, "Router", &AttributeDefinition::new("ports", AttributeType::Integer), &mut updates)
            .expect("attribute");
        let err = catalog
            .create_attribute(
                &tx,
                "GenericHardware",
                &AttributeDefinition::new("ports", AttributeType::Integer),
                &mut updates,
            )
            .expect_err("subclass already declares it");
        assert_eq!(err.key(), Some(messages::ATTRIBUTE_EXISTS));
    }

    #[test]
    fn subclass_queries() {
        let (db, catalog) = setup();
        let tx = db.begin_read_at(Some(0)).expect("read");
        assert!(catalog.is_subclass_of(&tx, "Router", CLASS_INVENTORY_OBJECT).expect("check"));
        assert!(!catalog.is_subclass_of(&tx, "Rack", "GenericHardware").expect("check"));
        let names = catalog.subclass_names(&tx, CLASS_INVENTORY_OBJECT).expect("subs");
        assert_eq!(names, vec!["GenericHardware", "Rack", "Router", "Switch"]);
        let concrete = catalog
            .get_subclasses(&tx, "GenericHardware", false, true)
            .expect("subs");
        assert_eq!(concrete.len(), 2);
    }

    #[test]
    fn abstract_possible_children_expand() {
        let (db, catalog) = setup();
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        catalog
            .add_possible_children(&tx, Some("Rack"), &["GenericHardware"], false, &mut updates)
            .expect("add");
        catalog
            .add_possible_children(&tx, None, &["Rack"], false, &mut updates)
            .expect("add");
        assert_eq!(
            catalog.get_possible_children(&tx, Some("Rack"), false).expect("children"),
            vec!["Router", "Switch"]
        );
        assert!(catalog.can_be_child(&tx, None, "Rack", false).expect("check"));
        let err = catalog
            .check_possible_child(&tx, Some("Rack"), "Rack", false)
            .expect_err("not allowed");
        assert!(matches!(err, InventoryError::OperationNotPermitted(_)));
        assert!(catalog.get_possible_children(&tx, Some("Rack"), true).expect("special").is_empty());
    }

    #[test]
    fn rename_pushes_old_key_removal() {
        let (db, catalog) = setup();
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        let update = ClassUpdate {
            name: Some("Shelf".into()),
            ..ClassUpdate::default()
        };
        let change = catalog
            .set_class_properties(&tx, "Rack", &update, &mut updates)
            .expect("rename");
        assert_eq!(change.old_values, vec!["Rack".to_string()]);
        assert!(matches!(&updates[0], CacheUpdate::RemoveClass(n) if n == "Rack"));
        assert!(catalog.class_exists(&tx, "Shelf").expect("exists"));
    }

    #[test]
    fn core_and_parent_classes_protected() {
        let (db, catalog) = setup();
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        let err = catalog
            .delete_class(&tx, CLASS_INVENTORY_OBJECT, &mut updates)
            .expect_err("core");
        assert_eq!(err.key(), Some(messages::CLASS_CORE));
        let err = catalog
            .delete_class(&tx, "GenericHardware", &mut updates)
            .expect_err("has subclasses");
        assert_eq!(err.key(), Some(messages::CLASS_HAS_SUBCLASSES));
        catalog.delete_class(&tx, "Router", &mut updates).expect("delete");
        assert!(!catalog.class_exists(&tx, "Router").expect("exists"));
    }

    #[test]
    fn invalid_names_rejected() {
        let (db, catalog) = setup();
        let tx = db.begin_write().expect("begin");
        let mut updates = Vec::new();
        let err = catalog
            .create_class(&tx, &ClassDefinition::new("9Router", CLASS_INVENTORY_OBJECT), &mut updates)
            .expect_err("bad name");
        assert_eq!(err.key(), Some(messages::CLASS_NAME_INVALID));
        let err = catalog
            .create_attribute(&tx, "Rack", &AttributeDefinition::new("bad name", AttributeType::String), &mut updates)
            .expect_err("bad name");
        assert_eq!(err.key(), Some(messages::ATTRIBUTE_NAME_INVALID));
    }

    #[test]
    fn read_path_serves_from_cache() {
        let (db, catalog) = setup();
        let epoch = Some(catalog.cache.generation());
        let tx = db.begin_read_at(epoch).expect("read");
        catalog.get_class(&tx, "Router").expect("load");
        assert!(catalog.cache.lookup(epoch, |c| c.classes.get("Router").cloned()).is_some());
    }
}
