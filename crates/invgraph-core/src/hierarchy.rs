//! # Hierarchy Manager
//!
//! Recursive operations over composite structures: inventory subtrees,
//! pools and templates.
//!
//! Containment is stored child to parent: `CHILD_OF` for the normal tree
//! and `CHILD_OF_SPECIAL` for the special tree (special children, pool
//! members, pools placed in objects). Both trees are walked together with
//! an explicit stack and a visited set; reaching a node twice is reported
//! as a cycle instead of looping.

use crate::blob::{BlobRef, attachment_name};
use crate::mapper::EntityMapper;
use crate::messages;
use crate::pattern::{MirrorWiring, NamePattern};
use crate::primitives::*;
use crate::storage::{Direction, GraphRead, GraphWrite, Node, tagged};
use crate::types::model::{AttributeChanges, ClassMetadata};
use crate::types::{AttributeValue, ErrorMessage, InventoryError, NodeId, PropertyValue, now_millis};
use std::collections::{BTreeMap, BTreeSet};

/// What copies become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    /// Template elements, with special class membership.
    TemplateElement,
    /// Inventory objects spawned from a template.
    InventoryObject,
}

impl CopyTarget {
    fn label(self) -> &'static str {
        match self {
            Self::TemplateElement => LABEL_TEMPLATE_ELEMENTS,
            Self::InventoryObject => LABEL_INVENTORY_OBJECTS,
        }
    }

    fn membership(self) -> &'static str {
        match self {
            Self::TemplateElement => REL_INSTANCE_OF_SPECIAL,
            Self::InventoryObject => REL_INSTANCE_OF,
        }
    }
}

/// Where a new element is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub parent: NodeId,
    pub special: bool,
}

#[derive(Debug, Clone)]
pub struct HierarchyManager {
    mapper: EntityMapper,
}

impl HierarchyManager {
    pub fn new(mapper: EntityMapper) -> Self {
        Self { mapper }
    }

    pub fn mapper(&self) -> &EntityMapper {
        &self.mapper
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    /// Direct children, normal or special.
    pub fn children(
        &self,
        tx: &impl GraphRead,
        node: NodeId,
        special: bool,
    ) -> Result<Vec<NodeId>, InventoryError> {
        let kind = if special { REL_CHILD_OF_SPECIAL } else { REL_CHILD_OF };
        Ok(tx.incoming(node, kind)?.into_iter().map(|r| r.start).collect())
    }

    /// Normal parent, falling back to the special one.
    pub fn parent(&self, tx: &impl GraphRead, node: NodeId) -> Result<Option<NodeId>, InventoryError> {
        match tx.first_outgoing(node, REL_CHILD_OF)? {
            Some(parent) => Ok(Some(parent)),
            None => tx.first_outgoing(node, REL_CHILD_OF_SPECIAL),
        }
    }

    /// `root` and every node below it through either tree, parents first.
    pub fn subtree(&self, tx: &impl GraphRead, root: NodeId) -> Result<Vec<NodeId>, InventoryError> {
        let mut order = Vec::new();
        let mut visited = BTreeSet::from([root]);
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            order.push(node);
            for kind in [REL_CHILD_OF, REL_CHILD_OF_SPECIAL] {
                for rel in tx.incoming(node, kind)? {
                    if !visited.insert(rel.start) {
                        return Err(cycle(rel.start));
                    }
                    stack.push(rel.start);
                }
            }
        }
        Ok(order)
    }

    // =========================================================================
    // DELETION
    // =========================================================================

    /// Whether the node carries relationships that protect it from deletion.
    pub fn is_protected(&self, tx: &impl GraphRead, node: NodeId) -> Result<bool, InventoryError> {
        Ok(!tx
            .relationships(node, Direction::Both, Some(REL_RELATED_TO_SPECIAL))?
            .is_empty()
            || !tx.outgoing(node, REL_HAS_PROCESS_INSTANCE)?.is_empty())
    }

    /// Delete `root` and everything contained in it, children first.
    ///
    /// Unless `unsafe_delete` is set, no node of the subtree may carry
    /// special relationships or process instance links; this is checked
    /// before the first deletion. Returns the blobs the deleted nodes
    /// owned, to be removed once the transaction has committed.
    pub fn delete_subtree(
        &self,
        tx: &impl GraphWrite,
        root: NodeId,
        unsafe_delete: bool,
    ) -> Result<Vec<BlobRef>, InventoryError> {
        let order = self.subtree(tx, root)?;
        if !unsafe_delete {
            for &node in &order {
                if self.is_protected(tx, node)? {
                    let node = tx.require_node(node)?;
                    return Err(InventoryError::OperationNotPermitted(
                        ErrorMessage::new(messages::DELETE_PROTECTED)
                            .arg(format!("{} ({})", node.name(), node.uuid().unwrap_or_default())),
                    ));
                }
            }
        }
        let mut blobs = Vec::new();
        for &node in order.iter().rev() {
            self.delete_single(tx, node, &mut blobs)?;
        }
        Ok(blobs)
    }

    /// Delete one node with what it owns: views, audit entries,
    /// attachments and process instance links.
    fn delete_single(
        &self,
        tx: &impl GraphWrite,
        node: NodeId,
        blobs: &mut Vec<BlobRef>,
    ) -> Result<(), InventoryError> {
        let current = tx.require_node(node)?;
        for rel in tx.outgoing(node, REL_HAS_VIEW)? {
            let view = tx.require_node(rel.end)?;
            if let Some(background) = view.text(PROPERTY_BACKGROUND) {
                if !background.is_empty() {
                    blobs.push(BlobRef::background(background));
                }
            }
            tx.detach_delete(view.id)?;
        }
        for rel in tx.outgoing(node, REL_HAS_HISTORY_ENTRY)? {
            tx.detach_delete(rel.end)?;
        }
        let owner = current
            .uuid()
            .map(str::to_string)
            .unwrap_or_else(|| node.to_string());
        for rel in tx.outgoing(node, REL_HAS_ATTACHMENT)? {
            blobs.push(BlobRef::attachment(attachment_name(&owner, rel.end)));
            tx.detach_delete(rel.end)?;
        }
        for rel in tx.outgoing(node, REL_HAS_PROCESS_INSTANCE)? {
            tx.detach_delete(rel.end)?;
        }
        tx.detach_delete(node)
    }

    // =========================================================================
    // COPY
    // =========================================================================

    /// Copy `source` (and, if `recursive`, both of its containment trees).
    ///
    /// Every property but the uuid is copied, list type edges keep their tag
    /// and target, and class membership is linked to the same class. Mirror
    /// relationships between copied nodes are recreated between the copies.
    /// Returns the new root, not attached to any parent.
    pub fn copy_subtree(
        &self,
        tx: &impl GraphWrite,
        source: NodeId,
        target: CopyTarget,
        recursive: bool,
    ) -> Result<NodeId, InventoryError> {
        let root = self.copy_node(tx, source, target)?;
        let mut copies = BTreeMap::from([(source, root)]);
        if recursive {
            let mut stack = vec![(source, root)];
            while let Some((original, copy)) = stack.pop() {
                for kind in [REL_CHILD_OF, REL_CHILD_OF_SPECIAL] {
                    for rel in tx.incoming(original, kind)? {
                        if copies.contains_key(&rel.start) {
                            return Err(cycle(rel.start));
                        }
                        let child = self.copy_node(tx, rel.start, target)?;
                        tx.relate(child, copy, kind)?;
                        copies.insert(rel.start, child);
                        stack.push((rel.start, child));
                    }
                }
            }
        }
        for (original, copy) in &copies {
            for rel in tx.outgoing(*original, REL_RELATED_TO_SPECIAL)? {
                let Some(tag) = rel.tag() else { continue };
                if tag != TAG_MIRROR && tag != TAG_MIRROR_MULTIPLE {
                    continue;
                }
                if let Some(other) = copies.get(&rel.end) {
                    tx.create_relationship(*copy, *other, REL_RELATED_TO_SPECIAL, tagged(tag))?;
                }
            }
        }
        Ok(root)
    }

    fn copy_node(
        &self,
        tx: &impl GraphWrite,
        source: NodeId,
        target: CopyTarget,
    ) -> Result<NodeId, InventoryError> {
        let original = tx.require_node(source)?;
        let membership = self.mapper.membership(tx, source)?;
        if target == CopyTarget::InventoryObject {
            let class = self.mapper.catalog().get_class(tx, &membership.class_name)?;
            self.check_mandatory_present(tx, source, &class)?;
            self.mapper.check_unique_copy(tx, &original, &class)?;
        }

        let copy = tx.create_node(&[target.label()])?;
        for (key, value) in &original.properties {
            if key != PROPERTY_UUID {
                tx.set_property(copy, key, value.clone())?;
            }
        }
        tx.set_property(copy, PROPERTY_UUID, uuid::Uuid::new_v4().to_string().into())?;
        tx.set_property(copy, PROPERTY_CREATION_DATE, now_millis().into())?;
        for rel in tx.outgoing(source, REL_RELATED_TO)? {
            tx.create_relationship(copy, rel.end, REL_RELATED_TO, rel.properties.clone())?;
        }
        tx.relate(copy, membership.class_node, target.membership())?;
        Ok(copy)
    }

    /// Spawned objects must carry every mandatory attribute of their class.
    fn check_mandatory_present(
        &self,
        tx: &impl GraphRead,
        node: NodeId,
        class: &ClassMetadata,
    ) -> Result<(), InventoryError> {
        let current = tx.require_node(node)?;
        for attr in class.attributes.iter().filter(|a| a.mandatory) {
            let present = if attr.attribute_type.is_primitive() {
                match current.property(&attr.name) {
                    Some(value) => value.as_text() != Some(""),
                    None => false,
                }
            } else {
                !self.mapper.reference_names(tx, node, &attr.name)?.is_empty()
            };
            if !present {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::ATTRIBUTE_MANDATORY)
                        .arg(&attr.name)
                        .arg(&class.name),
                ));
            }
        }
        Ok(())
    }

    // =========================================================================
    // BULK CREATION
    // =========================================================================

    /// Create `count` instances of `class` named after `pattern` under
    /// `placement`, wiring mirror relationships as the pattern dictates.
    /// Returns the uuids, in pattern order.
    pub fn create_bulk(
        &self,
        tx: &impl GraphWrite,
        class: &ClassMetadata,
        placement: Placement,
        template_element: bool,
        count: usize,
        pattern: &str,
    ) -> Result<Vec<String>, InventoryError> {
        let pattern = NamePattern::parse(pattern)?;
        let names = pattern.take(count)?;
        let label = if template_element {
            LABEL_TEMPLATE_ELEMENTS
        } else {
            LABEL_INVENTORY_OBJECTS
        };
        let containment = if placement.special {
            REL_CHILD_OF_SPECIAL
        } else {
            REL_CHILD_OF
        };

        let mut created = Vec::with_capacity(count);
        for name in names {
            let mut attributes = AttributeChanges::new();
            attributes.insert(PROPERTY_NAME.to_string(), Some(AttributeValue::Text(name.clone())));
            let (node, uuid) =
                self.mapper
                    .create_instance(tx, class, template_element, label, &attributes)?;
            tx.relate(node, placement.parent, containment)?;
            created.push((node, uuid));
        }

        let tag = match pattern.wiring() {
            MirrorWiring::None => None,
            MirrorWiring::Pairwise => Some(TAG_MIRROR),
            MirrorWiring::AllToFirst => Some(TAG_MIRROR_MULTIPLE),
        };
        if let Some(tag) = tag {
            for (a, b) in pattern.mirror_pairs(count) {
                if let (Some((from, _)), Some((to, _))) = (created.get(a), created.get(b)) {
                    tx.create_relationship(*from, *to, REL_RELATED_TO_SPECIAL, tagged(tag))?;
                }
            }
        }
        Ok(created.into_iter().map(|(_, uuid)| uuid).collect())
    }
}

fn cycle(at: NodeId) -> InventoryError {
    InventoryError::InvalidArgument(ErrorMessage::new(messages::HIERARCHY_CYCLE).arg(at))
}

/// One of the fixed nodes created at bootstrap (dummy root, groups root, logs).
pub fn special_node(tx: &impl GraphRead, name: &str) -> Result<Node, InventoryError> {
    tx.find_node(LABEL_SPECIAL_NODES, PROPERTY_NAME, &PropertyValue::from(name))?
        .ok_or_else(|| {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::SPECIAL_NODE_MISSING).arg(name),
            )
        })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;
    use crate::schema::{SchemaCatalog, create_core_classes};
    use crate::storage::{GraphDb, WriteTx};
    use crate::types::model::{AttributeDefinition, AttributeType, ClassDefinition};
    use std::sync::Arc;

    fn setup() -> (GraphDb, HierarchyManager) {
        let db = GraphDb::in_memory().expect("open db");
        let catalog = SchemaCatalog::new(Arc::new(CacheLayer::new()));
        let tx = db.begin_write().expect("begin");
        let mut u = Vec::new();
        create_core_classes(&catalog, &tx, &mut u).expect("core");
        for name in ["Rack", "Slot", "Port"] {
            catalog
                .create_class(&tx, &ClassDefinition::new(name, CLASS_INVENTORY_OBJECT), &mut u)
                .expect("class");
        }
        catalog
            .create_attribute(
                &tx,
                "Port",
                &AttributeDefinition::new("speed", AttributeType::Integer),
                &mut u,
            )
            .expect("attribute");
        catalog
            .create_attribute(
                &tx,
                "Rack",
                &AttributeDefinition::new("assetTag", AttributeType::String).unique(),
                &mut u,
            )
            .expect("attribute");
        tx.commit().expect("commit");
        (db, HierarchyManager::new(EntityMapper::new(catalog)))
    }

    fn element(h: &HierarchyManager, tx: &WriteTx, class: &str, name: &str) -> NodeId {
        let class = h.mapper().catalog().get_class(tx, class).expect("class");
        let mut attrs = AttributeChanges::new();
        attrs.insert("name".into(), Some(AttributeValue::Text(name.into())));
        h.mapper()
            .create_instance(tx, &class, true, LABEL_TEMPLATE_ELEMENTS, &attrs)
            .expect("create")
            .0
    }

    #[test]
    fn delete_removes_subtree_and_reports_attachments() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let rack = element(&h, &tx, "Rack", "rack");
        let slot = element(&h, &tx, "Slot", "slot");
        let port = element(&h, &tx, "Port", "port");
        tx.relate(slot, rack, REL_CHILD_OF).expect("rel");
        tx.relate(port, slot, REL_CHILD_OF_SPECIAL).expect("rel");
        let file = tx.create_node(&[LABEL_FILES]).expect("file");
        tx.relate(port, file, REL_HAS_ATTACHMENT).expect("rel");
        let before_nodes = tx.node_count().expect("count");
        let before_rels = tx.relationship_count().expect("count");

        let blobs = h.delete_subtree(&tx, rack, false).expect("delete");
        assert_eq!(blobs.len(), 1);
        assert_eq!(tx.node_count().expect("count"), before_nodes - 4);
        // Three memberships, two containment edges and one attachment edge.
        assert_eq!(tx.relationship_count().expect("count"), before_rels - 6);
        for node in [rack, slot, port, file] {
            assert!(tx.node(node).expect("node").is_none());
        }
    }

    #[test]
    fn protected_descendant_blocks_safe_delete() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let rack = element(&h, &tx, "Rack", "rack");
        let port = element(&h, &tx, "Port", "port");
        let other = element(&h, &tx, "Port", "other");
        tx.relate(port, rack, REL_CHILD_OF).expect("rel");
        tx.create_relationship(port, other, REL_RELATED_TO_SPECIAL, tagged("endpointA"))
            .expect("rel");

        let err = h.delete_subtree(&tx, rack, false).expect_err("protected");
        assert!(matches!(err, InventoryError::OperationNotPermitted(_)));
        assert!(tx.node(rack).expect("node").is_some());

        h.delete_subtree(&tx, rack, true).expect("unsafe delete");
        assert!(tx.node(port).expect("node").is_none());
        assert!(tx.relationships(other, Direction::Both, Some(REL_RELATED_TO_SPECIAL))
            .expect("rels")
            .is_empty());
    }

    #[test]
    fn cycle_is_reported() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let a = element(&h, &tx, "Rack", "a");
        let b = element(&h, &tx, "Slot", "b");
        tx.relate(b, a, REL_CHILD_OF).expect("rel");
        tx.relate(a, b, REL_CHILD_OF_SPECIAL).expect("rel");
        let err = h.subtree(&tx, a).expect_err("cycle");
        assert_eq!(err.key(), Some(messages::HIERARCHY_CYCLE));
        let err = h.copy_subtree(&tx, a, CopyTarget::TemplateElement, true).expect_err("cycle");
        assert_eq!(err.key(), Some(messages::HIERARCHY_CYCLE));
    }

    #[test]
    fn recursive_copy_keeps_both_trees_and_remaps_mirrors() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let rack = element(&h, &tx, "Rack", "rack");
        let slot = element(&h, &tx, "Slot", "slot");
        tx.relate(slot, rack, REL_CHILD_OF).expect("rel");
        let class = h.mapper().catalog().get_class(&tx, "Port").expect("class");
        let ports = h
            .create_bulk(
                &tx,
                &class,
                Placement { parent: rack, special: true },
                true,
                2,
                "[mirror(1,1)]",
            )
            .expect("bulk");
        assert_eq!(ports.len(), 2);

        let copy = h.copy_subtree(&tx, rack, CopyTarget::TemplateElement, true).expect("copy");
        assert_eq!(h.children(&tx, copy, false).expect("children").len(), 1);
        let special = h.children(&tx, copy, true).expect("special");
        assert_eq!(special.len(), 2);
        let mirrors: Vec<_> = special
            .iter()
            .flat_map(|p| tx.outgoing(*p, REL_RELATED_TO_SPECIAL).expect("rels"))
            .collect();
        assert_eq!(mirrors.len(), 1);
        assert!(special.contains(&mirrors[0].end));

        let original = tx.require_node(rack).expect("node");
        let copied = tx.require_node(copy).expect("node");
        assert_ne!(original.uuid(), copied.uuid());
        assert_eq!(original.name(), copied.name());
        let membership = h.mapper().membership(&tx, copy).expect("membership");
        assert!(membership.special);
        assert_eq!(membership.class_name, "Rack");
    }

    #[test]
    fn spawn_produces_inventory_objects() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let rack = element(&h, &tx, "Rack", "rack");
        let slot = element(&h, &tx, "Slot", "slot");
        tx.relate(slot, rack, REL_CHILD_OF).expect("rel");
        let spawned = h.copy_subtree(&tx, rack, CopyTarget::InventoryObject, true).expect("spawn");
        let node = tx.require_node(spawned).expect("node");
        assert!(node.has_label(LABEL_INVENTORY_OBJECTS));
        assert!(!h.mapper().membership(&tx, spawned).expect("membership").special);
        let child = h.children(&tx, spawned, false).expect("children");
        assert!(tx.require_node(child[0]).expect("node").has_label(LABEL_INVENTORY_OBJECTS));
    }

    #[test]
    fn spawned_copies_respect_unique_values() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let rack = element(&h, &tx, "Rack", "rack");
        tx.set_property(rack, "assetTag", "A-100".into()).expect("tag");
        h.copy_subtree(&tx, rack, CopyTarget::TemplateElement, false).expect("template copy");
        let spawned = h.copy_subtree(&tx, rack, CopyTarget::InventoryObject, false).expect("spawn");

        let err = h
            .copy_subtree(&tx, rack, CopyTarget::InventoryObject, false)
            .expect_err("duplicate");
        assert_eq!(err.key(), Some(messages::ATTRIBUTE_UNIQUE));

        tx.set_property(spawned, "assetTag", "A-101".into()).expect("retag");
        h.copy_subtree(&tx, rack, CopyTarget::InventoryObject, false).expect("spawn again");
    }

    #[test]
    fn bulk_multiple_mirror_wires_first_to_all() {
        let (db, h) = setup();
        let tx = db.begin_write().expect("begin");
        let rack = element(&h, &tx, "Rack", "rack");
        let class = h.mapper().catalog().get_class(&tx, "Port").expect("class");
        let uuids = h
            .create_bulk(
                &tx,
                &class,
                Placement { parent: rack, special: false },
                true,
                3,
                "[multiple-mirror(1,2)]",
            )
            .expect("bulk");
        let front = tx.find_by_uuid(&uuids[0]).expect("find").expect("node");
        let rels = tx.outgoing(front, REL_RELATED_TO_SPECIAL).expect("rels");
        assert_eq!(rels.len(), 2);
        assert!(rels.iter().all(|r| r.tag() == Some(TAG_MIRROR_MULTIPLE)));
        assert_eq!(tx.require_node(front).expect("node").name(), "front");

        let err = h
            .create_bulk(&tx, &class, Placement { parent: rack, special: false }, true, 9, "[sequence(1,2)]")
            .expect_err("too short");
        assert_eq!(err.key(), Some(messages::PATTERN_TOO_SHORT));
    }
}
