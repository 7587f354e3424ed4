//! # Storage Module
//!
//! The property graph the store persists into.
//!
//! [`GraphRead`] and [`GraphWrite`] are the only seam between the domain
//! components and the backend. Both are implemented by the redb
//! transactions in [`redb_graph`]; every domain function borrows a
//! transaction and never opens one itself.

pub mod redb_graph;

pub use redb_graph::{GraphDb, ReadTx, WriteTx};

use crate::primitives::{PROPERTY_NAME, PROPERTY_UUID};
use crate::types::{InventoryError, NodeId, PropertyValue, RelId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Property map of a node or relationship.
pub type Properties = BTreeMap<String, PropertyValue>;

// =============================================================================
// GRAPH ELEMENTS
// =============================================================================

/// Which relationships of a node to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A node snapshot read inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: BTreeSet<String>,
    pub properties: Properties,
}

impl Node {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_text)
    }

    /// Text property, empty when absent.
    pub fn text_or_empty(&self, key: &str) -> String {
        self.text(key).unwrap_or_default().to_string()
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(PropertyValue::as_integer)
    }

    pub fn boolean(&self, key: &str) -> bool {
        self.properties
            .get(key)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.text(PROPERTY_UUID)
    }

    pub fn name(&self) -> String {
        self.text_or_empty(PROPERTY_NAME)
    }
}

/// A relationship snapshot read inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub kind: String,
    pub start: NodeId,
    pub end: NodeId,
    pub properties: Properties,
}

impl Relationship {
    /// The endpoint opposite to `node`. Self loops return `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.start == node {
            self.end
        } else {
            self.start
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(PropertyValue::as_text)
    }

    /// The `name` tag carried by tagged relationships.
    pub fn tag(&self) -> Option<&str> {
        self.text(PROPERTY_NAME)
    }
}

/// Build a property map with a single `name` tag.
pub fn tagged(name: &str) -> Properties {
    let mut properties = Properties::new();
    properties.insert(PROPERTY_NAME.to_string(), PropertyValue::from(name));
    properties
}

// =============================================================================
// GRAPH READ
// =============================================================================

/// Read operations available on every transaction.
///
/// Listing operations return elements in storage (creation) order.
pub trait GraphRead {
    fn node(&self, id: NodeId) -> Result<Option<Node>, InventoryError>;

    fn relationship(&self, id: RelId) -> Result<Option<Relationship>, InventoryError>;

    /// Relationships attached to `node`, optionally restricted to one type.
    fn relationships(
        &self,
        node: NodeId,
        direction: Direction,
        kind: Option<&str>,
    ) -> Result<Vec<Relationship>, InventoryError>;

    fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>, InventoryError>;

    fn find_by_uuid(&self, uuid: &str) -> Result<Option<NodeId>, InventoryError>;

    fn node_count(&self) -> Result<u64, InventoryError>;

    fn relationship_count(&self) -> Result<u64, InventoryError>;

    /// Cache generation observed when a read transaction began.
    ///
    /// `None` for write transactions: they may hold uncommitted state and
    /// must neither read from nor populate the caches.
    fn cache_epoch(&self) -> Option<u64>;

    /// Node that must exist because a relationship or index points to it.
    fn require_node(&self, id: NodeId) -> Result<Node, InventoryError> {
        self.node(id)?
            .ok_or_else(|| InventoryError::Storage(format!("dangling node handle {}", id)))
    }

    fn nodes(&self, label: &str) -> Result<Vec<Node>, InventoryError> {
        let mut out = Vec::new();
        for id in self.nodes_with_label(label)? {
            out.push(self.require_node(id)?);
        }
        Ok(out)
    }

    /// First node with `label` whose property `key` equals `value`.
    fn find_node(
        &self,
        label: &str,
        key: &str,
        value: &PropertyValue,
    ) -> Result<Option<Node>, InventoryError> {
        for id in self.nodes_with_label(label)? {
            let node = self.require_node(id)?;
            if node.property(key) == Some(value) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Every node with `label` whose property `key` equals `value`.
    fn find_nodes(
        &self,
        label: &str,
        key: &str,
        value: &PropertyValue,
    ) -> Result<Vec<Node>, InventoryError> {
        Ok(self
            .nodes(label)?
            .into_iter()
            .filter(|n| n.property(key) == Some(value))
            .collect())
    }

    fn node_by_uuid(&self, uuid: &str) -> Result<Option<Node>, InventoryError> {
        match self.find_by_uuid(uuid)? {
            Some(id) => self.node(id),
            None => Ok(None),
        }
    }

    fn outgoing(&self, node: NodeId, kind: &str) -> Result<Vec<Relationship>, InventoryError> {
        self.relationships(node, Direction::Outgoing, Some(kind))
    }

    fn incoming(&self, node: NodeId, kind: &str) -> Result<Vec<Relationship>, InventoryError> {
        self.relationships(node, Direction::Incoming, Some(kind))
    }

    /// End node of the first outgoing relationship of `kind`.
    fn first_outgoing(&self, node: NodeId, kind: &str) -> Result<Option<NodeId>, InventoryError> {
        Ok(self.outgoing(node, kind)?.first().map(|r| r.end))
    }
}

// =============================================================================
// GRAPH WRITE
// =============================================================================

/// Mutations, available on write transactions only.
///
/// Nothing is visible to other transactions until commit.
pub trait GraphWrite: GraphRead {
    fn create_node(&self, labels: &[&str]) -> Result<NodeId, InventoryError>;

    /// Set a property. Setting `_uuid` maintains the uuid index and fails
    /// if another node already owns the uuid.
    fn set_property(
        &self,
        node: NodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), InventoryError>;

    fn remove_property(
        &self,
        node: NodeId,
        key: &str,
    ) -> Result<Option<PropertyValue>, InventoryError>;

    fn add_label(&self, node: NodeId, label: &str) -> Result<(), InventoryError>;

    fn remove_label(&self, node: NodeId, label: &str) -> Result<(), InventoryError>;

    fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        kind: &str,
        properties: Properties,
    ) -> Result<RelId, InventoryError>;

    fn set_relationship_property(
        &self,
        rel: RelId,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), InventoryError>;

    fn delete_relationship(&self, rel: RelId) -> Result<(), InventoryError>;

    /// Delete a node. Fails while relationships are still attached.
    fn delete_node(&self, node: NodeId) -> Result<(), InventoryError>;

    fn set_properties(&self, node: NodeId, properties: Properties) -> Result<(), InventoryError> {
        for (key, value) in properties {
            self.set_property(node, &key, value)?;
        }
        Ok(())
    }

    fn relate(&self, start: NodeId, end: NodeId, kind: &str) -> Result<RelId, InventoryError> {
        self.create_relationship(start, end, kind, Properties::new())
    }

    /// Delete every relationship of the node, then the node.
    fn detach_delete(&self, node: NodeId) -> Result<(), InventoryError> {
        for rel in self.relationships(node, Direction::Both, None)? {
            self.delete_relationship(rel.id)?;
        }
        self.delete_node(node)
    }
}
