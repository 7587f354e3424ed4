//! # Entity Mapper
//!
//! Translation between typed attribute maps and graph nodes.
//!
//! - Primitive attributes are node properties whose stored shape matches
//!   the declared type exactly.
//! - List type attributes are `RELATED_TO` edges to list type items, one
//!   per referenced item, tagged with the attribute name.
//! - Class membership is exactly one `INSTANCE_OF` (inventory, list type
//!   items) or `INSTANCE_OF_SPECIAL` (template elements) edge.
//!
//! Reads report schema drift as `InvalidArgument`; nothing is repaired.
//! Writes validate every change before the first mutation.

use crate::messages;
use crate::primitives::*;
use crate::schema::SchemaCatalog;
use crate::storage::{GraphRead, GraphWrite, Node, tagged};
use crate::types::model::{
    AttributeChanges, AttributeMetadata, AttributeType, BusinessObject, BusinessObjectLight,
    ClassMetadata,
};
use crate::types::{
    AttributeValue, ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue,
    now_millis,
};
use std::collections::BTreeMap;

/// Class membership of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub class_name: String,
    pub class_node: NodeId,
    /// Template element membership.
    pub special: bool,
}

/// Whether an attribute write is part of a creation or an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
    /// Template elements: mandatory and read-only attributes are not enforced.
    Template,
}

#[derive(Debug, Clone)]
pub struct EntityMapper {
    catalog: SchemaCatalog,
}

impl EntityMapper {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    // =========================================================================
    // CLASS MEMBERSHIP
    // =========================================================================

    pub fn membership(&self, tx: &impl GraphRead, node: NodeId) -> Result<Membership, InventoryError> {
        let normal = tx.outgoing(node, REL_INSTANCE_OF)?;
        let special = tx.outgoing(node, REL_INSTANCE_OF_SPECIAL)?;
        let (rel, is_special) = match (normal.as_slice(), special.as_slice()) {
            ([rel], []) => (rel, false),
            ([], [rel]) => (rel, true),
            _ => {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::CLASS_MEMBERSHIP).arg(node),
                ));
            }
        };
        Ok(Membership {
            class_name: tx.require_node(rel.end)?.name(),
            class_node: rel.end,
            special: is_special,
        })
    }

    /// The node of the object with this uuid. Its class must be
    /// `class_name` or one of its subclasses.
    pub fn object_node(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
        uuid: &str,
    ) -> Result<Node, InventoryError> {
        let missing = || {
            InventoryError::BusinessObjectNotFound(
                ErrorMessage::new(messages::OBJECT_NOT_FOUND)
                    .arg(class_name)
                    .arg(uuid),
            )
        };
        let node = tx.node_by_uuid(uuid)?.ok_or_else(missing)?;
        let membership = self.membership(tx, node.id)?;
        if membership.class_name != class_name
            && !self
                .catalog
                .is_subclass_of(tx, &membership.class_name, class_name)?
        {
            return Err(missing());
        }
        Ok(node)
    }

    /// Node of any object by uuid, regardless of its class.
    pub fn any_object_node(&self, tx: &impl GraphRead, uuid: &str) -> Result<Node, InventoryError> {
        tx.node_by_uuid(uuid)?.ok_or_else(|| {
            InventoryError::BusinessObjectNotFound(
                ErrorMessage::new(messages::OBJECT_UUID_NOT_FOUND).arg(uuid),
            )
        })
    }

    // =========================================================================
    // MATERIALIZE
    // =========================================================================

    /// Node to business object, resolving its class.
    pub fn materialize_node(
        &self,
        tx: &impl GraphRead,
        node: &Node,
    ) -> Result<BusinessObject, InventoryError> {
        let membership = self.membership(tx, node.id)?;
        let class = self.catalog.get_class(tx, &membership.class_name)?;
        self.materialize(tx, node, &class)
    }

    pub fn materialize(
        &self,
        tx: &impl GraphRead,
        node: &Node,
        class: &ClassMetadata,
    ) -> Result<BusinessObject, InventoryError> {
        let mut attributes = BTreeMap::new();
        for attr in class.attributes.iter().filter(|a| a.attribute_type.is_primitive()) {
            if let Some(stored) = node.property(&attr.name) {
                attributes.insert(attr.name.clone(), read_primitive(class, attr, stored)?);
            }
        }

        let mut references: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for rel in tx.outgoing(node.id, REL_RELATED_TO)? {
            let tag = rel.tag().ok_or_else(|| {
                InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::UNTAGGED_RELATIONSHIP).arg(uuid_or_id(node)),
                )
            })?;
            match class.attribute(tag) {
                Some(attr) if !attr.attribute_type.is_primitive() => {
                    let item = tx.require_node(rel.end)?;
                    references
                        .entry(tag.to_string())
                        .or_default()
                        .push(item.uuid().unwrap_or_default().to_string());
                }
                _ => {
                    return Err(InventoryError::InvalidArgument(
                        ErrorMessage::new(messages::UNDECLARED_TAG)
                            .arg(uuid_or_id(node))
                            .arg(tag)
                            .arg(&class.name),
                    ));
                }
            }
        }
        for (name, uuids) in references {
            attributes.insert(name, AttributeValue::Reference(uuids));
        }

        Ok(BusinessObject {
            class_name: class.name.clone(),
            uuid: node.uuid().unwrap_or_default().to_string(),
            name: node.name(),
            attributes,
        })
    }

    pub fn light(&self, tx: &impl GraphRead, node: &Node) -> Result<BusinessObjectLight, InventoryError> {
        Ok(BusinessObjectLight {
            class_name: self.membership(tx, node.id)?.class_name,
            uuid: node.uuid().unwrap_or_default().to_string(),
            name: node.name(),
        })
    }

    /// Names of the list type items a list type attribute points to.
    pub fn reference_names(
        &self,
        tx: &impl GraphRead,
        node: NodeId,
        attribute: &str,
    ) -> Result<Vec<String>, InventoryError> {
        let mut names = Vec::new();
        for rel in tx.outgoing(node, REL_RELATED_TO)? {
            if rel.tag() == Some(attribute) {
                names.push(tx.require_node(rel.end)?.name());
            }
        }
        Ok(names)
    }

    // =========================================================================
    // DEMATERIALIZE
    // =========================================================================

    /// Create a node for a new instance of `class` and write its attributes.
    ///
    /// Items of list types and inventory objects get `INSTANCE_OF`;
    /// `special` creates a template element with `INSTANCE_OF_SPECIAL`.
    pub fn create_instance(
        &self,
        tx: &impl GraphWrite,
        class: &ClassMetadata,
        special: bool,
        label: &str,
        attributes: &AttributeChanges,
    ) -> Result<(NodeId, String), InventoryError> {
        let mode = if special {
            WriteMode::Template
        } else {
            WriteMode::Create
        };
        self.validate(tx, None, class, attributes, mode)?;
        let node = tx.create_node(&[label])?;
        let uuid = uuid::Uuid::new_v4().to_string();
        tx.set_property(node, PROPERTY_UUID, uuid.as_str().into())?;
        tx.set_property(node, PROPERTY_CREATION_DATE, now_millis().into())?;
        let kind = if special {
            REL_INSTANCE_OF_SPECIAL
        } else {
            REL_INSTANCE_OF
        };
        tx.relate(node, class.id, kind)?;
        self.apply(tx, node, class, attributes)?;
        Ok((node, uuid))
    }

    /// Validate all changes, then write them. Returns what changed.
    pub fn dematerialize(
        &self,
        tx: &impl GraphWrite,
        node: NodeId,
        class: &ClassMetadata,
        attributes: &AttributeChanges,
        mode: WriteMode,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.validate(tx, Some(node), class, attributes, mode)?;
        self.apply(tx, node, class, attributes)
    }

    fn validate(
        &self,
        tx: &impl GraphRead,
        node: Option<NodeId>,
        class: &ClassMetadata,
        attributes: &AttributeChanges,
        mode: WriteMode,
    ) -> Result<(), InventoryError> {
        // Nodes created by copy already hold the values of their source.
        if mode == WriteMode::Create && node.is_none() {
            for attr in class.attributes.iter().filter(|a| a.mandatory) {
                if attributes.get(&attr.name).is_none_or(|v| is_empty(v.as_ref())) {
                    return Err(mandatory(class, attr));
                }
            }
        }
        for (name, value) in attributes {
            let attr = class.attribute(name).ok_or_else(|| {
                InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::ATTRIBUTE_UNDECLARED)
                        .arg(&class.name)
                        .arg(name),
                )
            })?;
            if mode == WriteMode::Update && attr.read_only {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::ATTRIBUTE_READ_ONLY)
                        .arg(name)
                        .arg(&class.name),
                ));
            }
            if attr.mandatory && mode != WriteMode::Template && is_empty(value.as_ref()) {
                return Err(mandatory(class, attr));
            }
            let Some(value) = value else { continue };
            self.check_shape(tx, attr, value)?;
            if attr.unique && !is_empty(Some(value)) {
                self.check_unique(tx, node, class, attr, value)?;
            }
        }
        Ok(())
    }

    fn check_shape(
        &self,
        tx: &impl GraphRead,
        attr: &AttributeMetadata,
        value: &AttributeValue,
    ) -> Result<(), InventoryError> {
        let accepted = matches!(
            (&attr.attribute_type, value),
            (AttributeType::String, AttributeValue::Text(_))
                | (
                    AttributeType::Integer
                        | AttributeType::Long
                        | AttributeType::Date
                        | AttributeType::Timestamp,
                    AttributeValue::Integer(_)
                )
                | (AttributeType::Float, AttributeValue::Float(_))
                | (AttributeType::Boolean, AttributeValue::Boolean(_))
                | (AttributeType::Binary, AttributeValue::Bytes(_))
                | (AttributeType::ListType(_), AttributeValue::Reference(_))
        );
        if !accepted {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::VALUE_TYPE_MISMATCH)
                    .arg(&attr.name)
                    .arg(attr.attribute_type.as_str())
                    .arg(value.kind()),
            ));
        }
        if let (AttributeType::ListType(list_type), AttributeValue::Reference(uuids)) =
            (&attr.attribute_type, value)
        {
            if uuids.len() > 1 && !attr.multiple {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::SINGLE_SELECTION).arg(&attr.name),
                ));
            }
            for uuid in uuids {
                self.list_type_item(tx, list_type, uuid)?;
            }
        }
        Ok(())
    }

    /// The node of an item of `list_type` (or a subclass).
    pub fn list_type_item(
        &self,
        tx: &impl GraphRead,
        list_type: &str,
        uuid: &str,
    ) -> Result<Node, InventoryError> {
        let invalid = || {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::LIST_TYPE_REFERENCE_INVALID)
                    .arg(uuid)
                    .arg(list_type),
            )
        };
        let node = tx.node_by_uuid(uuid)?.ok_or_else(invalid)?;
        if !node.has_label(LABEL_LIST_TYPE_ITEMS) {
            return Err(invalid());
        }
        let membership = self.membership(tx, node.id)?;
        if !self
            .catalog
            .is_subclass_of(tx, &membership.class_name, list_type)?
        {
            return Err(invalid());
        }
        Ok(node)
    }

    /// Unique values may appear once among the instances of the class.
    /// Scans the graph: the transaction may hold uncommitted instances.
    fn check_unique(
        &self,
        tx: &impl GraphRead,
        node: Option<NodeId>,
        class: &ClassMetadata,
        attr: &AttributeMetadata,
        value: &AttributeValue,
    ) -> Result<(), InventoryError> {
        let Some(stored) = to_property(value) else {
            return Ok(());
        };
        self.check_unique_stored(tx, node, class, attr, &stored)
    }

    /// Unique values a copied node brings along must be free among the
    /// instances of `class` it is about to join.
    pub fn check_unique_copy(
        &self,
        tx: &impl GraphRead,
        source: &Node,
        class: &ClassMetadata,
    ) -> Result<(), InventoryError> {
        for attr in class
            .attributes
            .iter()
            .filter(|a| a.unique && a.attribute_type.is_primitive())
        {
            let Some(stored) = source.property(&attr.name) else {
                continue;
            };
            if stored.as_text() == Some("") {
                continue;
            }
            self.check_unique_stored(tx, None, class, attr, stored)?;
        }
        Ok(())
    }

    fn check_unique_stored(
        &self,
        tx: &impl GraphRead,
        node: Option<NodeId>,
        class: &ClassMetadata,
        attr: &AttributeMetadata,
        stored: &PropertyValue,
    ) -> Result<(), InventoryError> {
        for rel in tx.incoming(class.id, REL_INSTANCE_OF)? {
            if Some(rel.start) == node {
                continue;
            }
            if tx.require_node(rel.start)?.property(&attr.name) == Some(stored) {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::ATTRIBUTE_UNIQUE)
                        .arg(stored.render())
                        .arg(&attr.name)
                        .arg(&class.name),
                ));
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        tx: &impl GraphWrite,
        node: NodeId,
        class: &ClassMetadata,
        attributes: &AttributeChanges,
    ) -> Result<ChangeDescriptor, InventoryError> {
        let mut change = ChangeDescriptor::new();
        let current = tx.require_node(node)?;
        for (name, value) in attributes {
            let Some(attr) = class.attribute(name) else {
                continue;
            };
            if attr.attribute_type.is_primitive() {
                let old = current.property(name).map(PropertyValue::render);
                let new = value.as_ref().and_then(to_property);
                let rendered = new.as_ref().map(PropertyValue::render);
                match new {
                    Some(stored) => tx.set_property(node, name, stored)?,
                    None => {
                        tx.remove_property(node, name)?;
                    }
                }
                if old != rendered {
                    change.record(name, old, rendered);
                }
            } else {
                let mut old = Vec::new();
                for rel in tx.outgoing(node, REL_RELATED_TO)? {
                    if rel.tag() == Some(name.as_str()) {
                        old.push(tx.require_node(rel.end)?.uuid().unwrap_or_default().to_string());
                        tx.delete_relationship(rel.id)?;
                    }
                }
                let new = match value {
                    Some(AttributeValue::Reference(uuids)) => uuids.clone(),
                    _ => Vec::new(),
                };
                for uuid in &new {
                    let item = tx.find_by_uuid(uuid)?.ok_or_else(|| {
                        InventoryError::Storage(format!("list type item {} vanished", uuid))
                    })?;
                    tx.create_relationship(node, item, REL_RELATED_TO, tagged(name))?;
                }
                if old != new {
                    change.record(name, non_empty(old.join(";")), non_empty(new.join(";")));
                }
            }
        }
        Ok(change)
    }
}

// =============================================================================
// VALUE SHAPES
// =============================================================================

fn read_primitive(
    class: &ClassMetadata,
    attr: &AttributeMetadata,
    stored: &PropertyValue,
) -> Result<AttributeValue, InventoryError> {
    let value = match (&attr.attribute_type, stored) {
        (AttributeType::String, PropertyValue::Text(s)) => AttributeValue::Text(s.clone()),
        (
            AttributeType::Integer
            | AttributeType::Long
            | AttributeType::Date
            | AttributeType::Timestamp,
            PropertyValue::Integer(i),
        ) => AttributeValue::Integer(*i),
        (AttributeType::Float, PropertyValue::Float(f)) => AttributeValue::Float(*f),
        (AttributeType::Boolean, PropertyValue::Boolean(b)) => AttributeValue::Boolean(*b),
        (AttributeType::Binary, PropertyValue::Bytes(b)) => AttributeValue::Bytes(b.clone()),
        _ => {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::PROPERTY_TYPE)
                    .arg(&attr.name)
                    .arg(&class.name)
                    .arg(attr.attribute_type.as_str()),
            ));
        }
    };
    Ok(value)
}

/// Stored form of a primitive value. References have none.
pub fn to_property(value: &AttributeValue) -> Option<PropertyValue> {
    match value {
        AttributeValue::Text(s) => Some(PropertyValue::Text(s.clone())),
        AttributeValue::Integer(i) => Some(PropertyValue::Integer(*i)),
        AttributeValue::Float(f) => Some(PropertyValue::Float(*f)),
        AttributeValue::Boolean(b) => Some(PropertyValue::Boolean(*b)),
        AttributeValue::Bytes(b) => Some(PropertyValue::Bytes(b.clone())),
        AttributeValue::Reference(_) => None,
    }
}

/// Absent values, empty text and empty reference lists fail mandatory checks.
fn is_empty(value: Option<&AttributeValue>) -> bool {
    match value {
        None => true,
        Some(AttributeValue::Text(s)) => s.is_empty(),
        Some(AttributeValue::Reference(uuids)) => uuids.is_empty(),
        Some(_) => false,
    }
}

fn mandatory(class: &ClassMetadata, attr: &AttributeMetadata) -> InventoryError {
    InventoryError::InvalidArgument(
        ErrorMessage::new(messages::ATTRIBUTE_MANDATORY)
            .arg(&attr.name)
            .arg(&class.name),
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn uuid_or_id(node: &Node) -> String {
    node.uuid()
        .map(str::to_string)
        .unwrap_or_else(|| node.id.to_string())
}

/// Parse raw text attribute values against the class declaration.
pub fn parse_changes(
    class: &ClassMetadata,
    raw: &BTreeMap<String, String>,
) -> Result<AttributeChanges, InventoryError> {
    let mut changes = AttributeChanges::new();
    for (name, text) in raw {
        let attr = class.attribute(name).ok_or_else(|| {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::ATTRIBUTE_UNDECLARED)
                    .arg(&class.name)
                    .arg(name),
            )
        })?;
        let value = AttributeValue::parse_for(&attr.attribute_type, text)?;
        let cleared = matches!(&value, AttributeValue::Reference(u) if u.is_empty());
        changes.insert(name.clone(), if cleared { None } else { Some(value) });
    }
    Ok(changes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;
    use crate::schema::create_core_classes;
    use crate::storage::{GraphDb, WriteTx};
    use crate::types::model::{AttributeDefinition, ClassDefinition};
    use std::sync::Arc;

    struct Fixture {
        db: GraphDb,
        mapper: EntityMapper,
        vendor: String,
    }

    fn fixture() -> Fixture {
        let db = GraphDb::in_memory().expect("open db");
        let catalog = SchemaCatalog::new(Arc::new(CacheLayer::new()));
        let mapper = EntityMapper::new(catalog.clone());
        let tx = db.begin_write().expect("begin");
        let mut u = Vec::new();
        create_core_classes(&catalog, &tx, &mut u).expect("core");
        catalog
            .create_class(&tx, &ClassDefinition::new("EquipmentVendor", CLASS_GENERIC_OBJECT_LIST), &mut u)
            .expect("class");
        catalog
            .create_class(&tx, &ClassDefinition::new("Router", CLASS_INVENTORY_OBJECT), &mut u)
            .expect("class");
        for def in [
            AttributeDefinition::new("serialNumber", AttributeType::String).unique(),
            AttributeDefinition::new("ports", AttributeType::Integer),
            AttributeDefinition::new("vendor", AttributeType::ListType("EquipmentVendor".into())),
            AttributeDefinition::new("assetTag", AttributeType::String).read_only(),
        ] {
            catalog.create_attribute(&tx, "Router", &def, &mut u).expect("attribute");
        }
        let vendor_class = catalog.get_class(&tx, "EquipmentVendor").expect("class");
        let mut attrs = AttributeChanges::new();
        attrs.insert("name".into(), Some(AttributeValue::Text("Cisco".into())));
        let (_, vendor) = mapper
            .create_instance(&tx, &vendor_class, false, LABEL_LIST_TYPE_ITEMS, &attrs)
            .expect("item");
        tx.commit().expect("commit");
        Fixture { db, mapper, vendor }
    }

    fn router(f: &Fixture, tx: &WriteTx, serial: &str) -> Result<(NodeId, String), InventoryError> {
        let class = f.mapper.catalog().get_class(tx, "Router")?;
        let mut attrs = AttributeChanges::new();
        attrs.insert("name".into(), Some(AttributeValue::Text("r1".into())));
        attrs.insert("serialNumber".into(), Some(AttributeValue::Text(serial.into())));
        attrs.insert("vendor".into(), Some(AttributeValue::reference(&f.vendor)));
        f.mapper
            .create_instance(tx, &class, false, LABEL_INVENTORY_OBJECTS, &attrs)
    }

    #[test]
    fn round_trip_primitives_and_references() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let (node, uuid) = router(&f, &tx, "SN1").expect("create");
        let object = f
            .mapper
            .materialize_node(&tx, &tx.require_node(node).expect("node"))
            .expect("materialize");
        assert_eq!(object.uuid, uuid);
        assert_eq!(object.name, "r1");
        assert_eq!(object.attribute_text("serialNumber").as_deref(), Some("SN1"));
        assert_eq!(object.attribute("vendor"), Some(&AttributeValue::reference(&f.vendor)));
        assert!(object.attribute("creationDate").is_some());
        assert_eq!(
            f.mapper.reference_names(&tx, node, "vendor").expect("names"),
            vec!["Cisco".to_string()]
        );
    }

    #[test]
    fn strict_shapes_rejected_before_write() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let class = f.mapper.catalog().get_class(&tx, "Router").expect("class");
        let mut attrs = AttributeChanges::new();
        attrs.insert("ports".into(), Some(AttributeValue::Text("24".into())));
        let before = tx.node_count().expect("count");
        let err = f
            .mapper
            .create_instance(&tx, &class, false, LABEL_INVENTORY_OBJECTS, &attrs)
            .expect_err("type mismatch");
        assert_eq!(err.key(), Some(messages::VALUE_TYPE_MISMATCH));
        assert_eq!(tx.node_count().expect("count"), before);
    }

    #[test]
    fn unique_values_checked_inside_transaction() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        router(&f, &tx, "SN1").expect("create");
        let err = router(&f, &tx, "SN1").expect_err("duplicate");
        assert_eq!(err.key(), Some(messages::ATTRIBUTE_UNIQUE));
        router(&f, &tx, "SN2").expect("distinct serial");
    }

    #[test]
    fn update_produces_change_descriptor() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let (node, _) = router(&f, &tx, "SN1").expect("create");
        let class = f.mapper.catalog().get_class(&tx, "Router").expect("class");
        let mut changes = AttributeChanges::new();
        changes.insert("ports".into(), Some(AttributeValue::Integer(48)));
        changes.insert("vendor".into(), None);
        let change = f
            .mapper
            .dematerialize(&tx, node, &class, &changes, WriteMode::Update)
            .expect("update");
        assert_eq!(change.affected_properties, vec!["ports", "vendor"]);
        assert_eq!(change.old_values, vec![String::new(), f.vendor.clone()]);
        assert_eq!(change.new_values, vec!["48".to_string(), String::new()]);
        assert!(tx.outgoing(node, REL_RELATED_TO).expect("rels").is_empty());
    }

    #[test]
    fn read_only_rejects_update() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let (node, _) = router(&f, &tx, "SN1").expect("create");
        let class = f.mapper.catalog().get_class(&tx, "Router").expect("class");
        let mut changes = AttributeChanges::new();
        changes.insert("assetTag".into(), Some(AttributeValue::Text("A-1".into())));
        let err = f
            .mapper
            .dematerialize(&tx, node, &class, &changes, WriteMode::Update)
            .expect_err("read only");
        assert!(matches!(err, InventoryError::OperationNotPermitted(_)));
    }

    #[test]
    fn undeclared_tag_is_schema_drift() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let (node, _) = router(&f, &tx, "SN1").expect("create");
        let item = tx.find_by_uuid(&f.vendor).expect("find").expect("item");
        tx.create_relationship(node, item, REL_RELATED_TO, tagged("manufacturer"))
            .expect("rel");
        let err = f
            .mapper
            .materialize_node(&tx, &tx.require_node(node).expect("node"))
            .expect_err("drift");
        assert!(matches!(err, InventoryError::InvalidArgument(_)));
        assert_eq!(err.key(), Some(messages::UNDECLARED_TAG));
    }

    #[test]
    fn untagged_relationship_is_schema_drift() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let (node, _) = router(&f, &tx, "SN1").expect("create");
        let item = tx.find_by_uuid(&f.vendor).expect("find").expect("item");
        tx.relate(node, item, REL_RELATED_TO).expect("rel");
        let err = f
            .mapper
            .materialize_node(&tx, &tx.require_node(node).expect("node"))
            .expect_err("drift");
        assert_eq!(err.key(), Some(messages::UNTAGGED_RELATIONSHIP));
    }

    #[test]
    fn double_membership_detected() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let (node, _) = router(&f, &tx, "SN1").expect("create");
        let class = f.mapper.catalog().class_node(&tx, "Router").expect("class");
        tx.relate(node, class.id, REL_INSTANCE_OF_SPECIAL).expect("rel");
        let err = f.mapper.membership(&tx, node).expect_err("two memberships");
        assert_eq!(err.key(), Some(messages::CLASS_MEMBERSHIP));
    }

    #[test]
    fn parse_changes_maps_sentinel_to_clear() {
        let f = fixture();
        let tx = f.db.begin_read().expect("read");
        let class = f.mapper.catalog().get_class(&tx, "Router").expect("class");
        let mut raw = BTreeMap::new();
        raw.insert("vendor".to_string(), "0".to_string());
        raw.insert("ports".to_string(), "12".to_string());
        let changes = parse_changes(&class, &raw).expect("parse");
        assert_eq!(changes.get("vendor"), Some(&None));
        assert_eq!(changes.get("ports"), Some(&Some(AttributeValue::Integer(12))));
    }
}
