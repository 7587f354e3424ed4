//! # redb-backed Property Graph
//!
//! A labelled property graph laid over redb tables:
//! - ACID transactions, crash safety (copy-on-write B-trees)
//! - MVCC: concurrent readers, a single writer
//! - A label index, an adjacency index and a unique `_uuid` index
//!
//! Node and relationship records are postcard encoded. Ids come from
//! counters in the metadata table and start at 1.

use super::{Direction, GraphRead, GraphWrite, Node, Properties, Relationship};
use crate::primitives::PROPERTY_UUID;
use crate::types::{InventoryError, NodeId, PropertyValue, RelId, storage_err};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for nodes: NodeId(u64) -> serialized NodeRecord
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Table for relationships: RelId(u64) -> serialized RelRecord
const RELS: TableDefinition<u64, &[u8]> = TableDefinition::new("relationships");

/// Adjacency index: (node, direction, relationship). 0 = outgoing, 1 = incoming.
const ADJACENCY: TableDefinition<(u64, u8, u64), ()> = TableDefinition::new("adjacency");

/// Label index: (label, node)
const LABELS: TableDefinition<(&str, u64), ()> = TableDefinition::new("labels");

/// Unique index on the `_uuid` property.
const UUID_INDEX: TableDefinition<&str, u64> = TableDefinition::new("uuid_index");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID: &str = "next_node_id";
const NEXT_REL_ID: &str = "next_rel_id";

const OUT: u8 = 0;
const IN: u8 = 1;

type Bytes = &'static [u8];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NodeRecord {
    labels: BTreeSet<String>,
    properties: Properties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelRecord {
    kind: String,
    start: u64,
    end: u64,
    properties: Properties,
}

fn codec_err(e: postcard::Error) -> InventoryError {
    InventoryError::Serialization(e.to_string())
}

// =============================================================================
// DATABASE
// =============================================================================

/// Handle to the graph database. Shared by all transactions.
pub struct GraphDb {
    db: Database,
}

impl std::fmt::Debug for GraphDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDb").finish_non_exhaustive()
    }
}

impl GraphDb {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Self::init(db)
    }

    /// A volatile database, used by tests and benchmarks.
    pub fn in_memory() -> Result<Self, InventoryError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, InventoryError> {
        // Read transactions can only open tables that exist.
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            write_txn.open_table(NODES).map_err(storage_err)?;
            write_txn.open_table(RELS).map_err(storage_err)?;
            write_txn.open_table(ADJACENCY).map_err(storage_err)?;
            write_txn.open_table(LABELS).map_err(storage_err)?;
            write_txn.open_table(UUID_INDEX).map_err(storage_err)?;
            write_txn.open_table(METADATA).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Begin a read transaction on the latest committed snapshot.
    pub fn begin_read(&self) -> Result<ReadTx, InventoryError> {
        self.begin_read_at(None)
    }

    /// Begin a read transaction tagged with the cache generation observed
    /// just before it started.
    pub fn begin_read_at(&self, epoch: Option<u64>) -> Result<ReadTx, InventoryError> {
        let inner = self.db.begin_read().map_err(storage_err)?;
        Ok(ReadTx { inner, epoch })
    }

    /// Begin the write transaction. Blocks while another writer is active.
    pub fn begin_write(&self) -> Result<WriteTx, InventoryError> {
        let inner = self.db.begin_write().map_err(storage_err)?;
        Ok(WriteTx { inner })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<bool, InventoryError> {
        self.db.compact().map_err(storage_err)
    }
}

/// A read-only snapshot.
pub struct ReadTx {
    inner: redb::ReadTransaction,
    epoch: Option<u64>,
}

/// The single write transaction. Dropping it without [`WriteTx::commit`]
/// rolls every change back.
pub struct WriteTx {
    inner: redb::WriteTransaction,
}

impl WriteTx {
    pub fn commit(self) -> Result<(), InventoryError> {
        self.inner.commit().map_err(storage_err)
    }

    pub fn abort(self) -> Result<(), InventoryError> {
        self.inner.abort().map_err(storage_err)
    }

    fn next_id(&self, key: &str) -> Result<u64, InventoryError> {
        let mut meta = self.inner.open_table(METADATA).map_err(storage_err)?;
        let next = meta
            .get(key)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(1);
        meta.insert(key, next + 1).map_err(storage_err)?;
        Ok(next)
    }

    fn load_record(&self, node: NodeId) -> Result<NodeRecord, InventoryError> {
        let nodes = self.inner.open_table(NODES).map_err(storage_err)?;
        read_record(&nodes, node)?
            .ok_or_else(|| InventoryError::Storage(format!("node {} does not exist", node)))
    }

    fn store_record(&self, node: NodeId, record: &NodeRecord) -> Result<(), InventoryError> {
        let bytes = postcard::to_allocvec(record).map_err(codec_err)?;
        let mut nodes = self.inner.open_table(NODES).map_err(storage_err)?;
        nodes.insert(node.0, bytes.as_slice()).map_err(storage_err)?;
        Ok(())
    }

    fn load_rel(&self, rel: RelId) -> Result<RelRecord, InventoryError> {
        let rels = self.inner.open_table(RELS).map_err(storage_err)?;
        read_rel(&rels, rel)?.ok_or_else(|| {
            InventoryError::Storage(format!("relationship {} does not exist", rel.0))
        })
    }

    fn store_rel(&self, rel: RelId, record: &RelRecord) -> Result<(), InventoryError> {
        let bytes = postcard::to_allocvec(record).map_err(codec_err)?;
        let mut rels = self.inner.open_table(RELS).map_err(storage_err)?;
        rels.insert(rel.0, bytes.as_slice()).map_err(storage_err)?;
        Ok(())
    }

    fn index_uuid(&self, node: NodeId, uuid: &str) -> Result<(), InventoryError> {
        let mut index = self.inner.open_table(UUID_INDEX).map_err(storage_err)?;
        let owner = index.get(uuid).map_err(storage_err)?.map(|v| v.value());
        match owner {
            Some(existing) if existing != node.0 => Err(InventoryError::Storage(format!(
                "uuid {} already belongs to node {}",
                uuid, existing
            ))),
            _ => {
                index.insert(uuid, node.0).map_err(storage_err)?;
                Ok(())
            }
        }
    }

    fn unindex_uuid(&self, uuid: &str) -> Result<(), InventoryError> {
        let mut index = self.inner.open_table(UUID_INDEX).map_err(storage_err)?;
        index.remove(uuid).map_err(storage_err)?;
        Ok(())
    }
}

// =============================================================================
// TABLE HELPERS (shared by read and write transactions)
// =============================================================================

fn read_record(
    nodes: &impl ReadableTable<u64, Bytes>,
    id: NodeId,
) -> Result<Option<NodeRecord>, InventoryError> {
    match nodes.get(id.0).map_err(storage_err)? {
        Some(raw) => Ok(Some(postcard::from_bytes(raw.value()).map_err(codec_err)?)),
        None => Ok(None),
    }
}

fn read_rel(
    rels: &impl ReadableTable<u64, Bytes>,
    id: RelId,
) -> Result<Option<RelRecord>, InventoryError> {
    match rels.get(id.0).map_err(storage_err)? {
        Some(raw) => Ok(Some(postcard::from_bytes(raw.value()).map_err(codec_err)?)),
        None => Ok(None),
    }
}

fn to_relationship(id: RelId, record: RelRecord) -> Relationship {
    Relationship {
        id,
        kind: record.kind,
        start: NodeId(record.start),
        end: NodeId(record.end),
        properties: record.properties,
    }
}

fn adjacent(
    adjacency: &impl ReadableTable<(u64, u8, u64), ()>,
    node: NodeId,
    direction: Direction,
) -> Result<BTreeSet<u64>, InventoryError> {
    let (low, high) = match direction {
        Direction::Outgoing => (OUT, OUT),
        Direction::Incoming => (IN, IN),
        Direction::Both => (OUT, IN),
    };
    let mut ids = BTreeSet::new();
    for entry in adjacency
        .range((node.0, low, 0u64)..=(node.0, high, u64::MAX))
        .map_err(storage_err)?
    {
        let (key, _) = entry.map_err(storage_err)?;
        let (_, _, rel) = key.value();
        ids.insert(rel);
    }
    Ok(ids)
}

fn collect_relationships(
    adjacency: &impl ReadableTable<(u64, u8, u64), ()>,
    rels: &impl ReadableTable<u64, Bytes>,
    node: NodeId,
    direction: Direction,
    kind: Option<&str>,
) -> Result<Vec<Relationship>, InventoryError> {
    let mut out = Vec::new();
    for rel in adjacent(adjacency, node, direction)? {
        let record = read_rel(rels, RelId(rel))?
            .ok_or_else(|| InventoryError::Storage(format!("dangling relationship {}", rel)))?;
        if kind.is_none_or(|k| k == record.kind) {
            out.push(to_relationship(RelId(rel), record));
        }
    }
    Ok(out)
}

fn labelled(
    labels: &impl ReadableTable<(&'static str, u64), ()>,
    label: &str,
) -> Result<Vec<NodeId>, InventoryError> {
    let mut ids = Vec::new();
    for entry in labels
        .range((label, 0u64)..=(label, u64::MAX))
        .map_err(storage_err)?
    {
        let (key, _) = entry.map_err(storage_err)?;
        ids.push(NodeId(key.value().1));
    }
    Ok(ids)
}

// =============================================================================
// GRAPH READ (both transaction kinds)
// =============================================================================

macro_rules! impl_graph_read {
    ($tx:ty, $epoch:expr) => {
        impl GraphRead for $tx {
            fn node(&self, id: NodeId) -> Result<Option<Node>, InventoryError> {
                let nodes = self.inner.open_table(NODES).map_err(storage_err)?;
                Ok(read_record(&nodes, id)?.map(|r| Node {
                    id,
                    labels: r.labels,
                    properties: r.properties,
                }))
            }

            fn relationship(&self, id: RelId) -> Result<Option<Relationship>, InventoryError> {
                let rels = self.inner.open_table(RELS).map_err(storage_err)?;
                Ok(read_rel(&rels, id)?.map(|r| to_relationship(id, r)))
            }

            fn relationships(
                &self,
                node: NodeId,
                direction: Direction,
                kind: Option<&str>,
            ) -> Result<Vec<Relationship>, InventoryError> {
                let adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
                let rels = self.inner.open_table(RELS).map_err(storage_err)?;
                collect_relationships(&adjacency, &rels, node, direction, kind)
            }

            fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>, InventoryError> {
                let labels = self.inner.open_table(LABELS).map_err(storage_err)?;
                labelled(&labels, label)
            }

            fn find_by_uuid(&self, uuid: &str) -> Result<Option<NodeId>, InventoryError> {
                let index = self.inner.open_table(UUID_INDEX).map_err(storage_err)?;
                Ok(index
                    .get(uuid)
                    .map_err(storage_err)?
                    .map(|v| NodeId(v.value())))
            }

            fn node_count(&self) -> Result<u64, InventoryError> {
                let nodes = self.inner.open_table(NODES).map_err(storage_err)?;
                nodes.len().map_err(storage_err)
            }

            fn relationship_count(&self) -> Result<u64, InventoryError> {
                let rels = self.inner.open_table(RELS).map_err(storage_err)?;
                rels.len().map_err(storage_err)
            }

            fn cache_epoch(&self) -> Option<u64> {
                let epoch: fn(&$tx) -> Option<u64> = $epoch;
                epoch(self)
            }
        }
    };
}

impl_graph_read!(ReadTx, |tx| tx.epoch);
impl_graph_read!(WriteTx, |_| None);

// =============================================================================
// GRAPH WRITE
// =============================================================================

impl GraphWrite for WriteTx {
    fn create_node(&self, labels: &[&str]) -> Result<NodeId, InventoryError> {
        let id = NodeId(self.next_id(NEXT_NODE_ID)?);
        let record = NodeRecord {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: Properties::new(),
        };
        self.store_record(id, &record)?;
        let mut index = self.inner.open_table(LABELS).map_err(storage_err)?;
        for label in labels {
            index.insert((*label, id.0), ()).map_err(storage_err)?;
        }
        Ok(id)
    }

    fn set_property(
        &self,
        node: NodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), InventoryError> {
        let mut record = self.load_record(node)?;
        if key == PROPERTY_UUID {
            let uuid = value.as_text().ok_or_else(|| {
                InventoryError::Storage(format!("{} must be text", PROPERTY_UUID))
            })?;
            self.index_uuid(node, uuid)?;
            match record.properties.get(PROPERTY_UUID).and_then(|v| v.as_text()) {
                Some(old) if old != uuid => self.unindex_uuid(old)?,
                _ => {}
            }
        }
        record.properties.insert(key.to_string(), value);
        self.store_record(node, &record)
    }

    fn remove_property(
        &self,
        node: NodeId,
        key: &str,
    ) -> Result<Option<PropertyValue>, InventoryError> {
        let mut record = self.load_record(node)?;
        let removed = record.properties.remove(key);
        if let Some(value) = &removed {
            if key == PROPERTY_UUID {
                if let Some(uuid) = value.as_text() {
                    self.unindex_uuid(uuid)?;
                }
            }
            self.store_record(node, &record)?;
        }
        Ok(removed)
    }

    fn add_label(&self, node: NodeId, label: &str) -> Result<(), InventoryError> {
        let mut record = self.load_record(node)?;
        if record.labels.insert(label.to_string()) {
            self.store_record(node, &record)?;
            let mut index = self.inner.open_table(LABELS).map_err(storage_err)?;
            index.insert((label, node.0), ()).map_err(storage_err)?;
        }
        Ok(())
    }

    fn remove_label(&self, node: NodeId, label: &str) -> Result<(), InventoryError> {
        let mut record = self.load_record(node)?;
        if record.labels.remove(label) {
            self.store_record(node, &record)?;
            let mut index = self.inner.open_table(LABELS).map_err(storage_err)?;
            index.remove((label, node.0)).map_err(storage_err)?;
        }
        Ok(())
    }

    fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        kind: &str,
        properties: Properties,
    ) -> Result<RelId, InventoryError> {
        self.load_record(start)?;
        self.load_record(end)?;
        let id = RelId(self.next_id(NEXT_REL_ID)?);
        self.store_rel(
            id,
            &RelRecord {
                kind: kind.to_string(),
                start: start.0,
                end: end.0,
                properties,
            },
        )?;
        let mut adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
        adjacency
            .insert((start.0, OUT, id.0), ())
            .map_err(storage_err)?;
        adjacency.insert((end.0, IN, id.0), ()).map_err(storage_err)?;
        Ok(id)
    }

    fn set_relationship_property(
        &self,
        rel: RelId,
        key: &str,
        value: PropertyValue,
    ) -> Result<(), InventoryError> {
        let mut record = self.load_rel(rel)?;
        record.properties.insert(key.to_string(), value);
        self.store_rel(rel, &record)
    }

    fn delete_relationship(&self, rel: RelId) -> Result<(), InventoryError> {
        let record = self.load_rel(rel)?;
        {
            let mut adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
            adjacency
                .remove((record.start, OUT, rel.0))
                .map_err(storage_err)?;
            adjacency
                .remove((record.end, IN, rel.0))
                .map_err(storage_err)?;
        }
        let mut rels = self.inner.open_table(RELS).map_err(storage_err)?;
        rels.remove(rel.0).map_err(storage_err)?;
        Ok(())
    }

    fn delete_node(&self, node: NodeId) -> Result<(), InventoryError> {
        let record = self.load_record(node)?;
        {
            let adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
            if !adjacent(&adjacency, node, Direction::Both)?.is_empty() {
                return Err(InventoryError::Storage(format!(
                    "node {} still has relationships",
                    node
                )));
            }
        }
        if let Some(uuid) = record.properties.get(PROPERTY_UUID).and_then(|v| v.as_text()) {
            self.unindex_uuid(uuid)?;
        }
        {
            let mut index = self.inner.open_table(LABELS).map_err(storage_err)?;
            for label in &record.labels {
                index
                    .remove((label.as_str(), node.0))
                    .map_err(storage_err)?;
            }
        }
        let mut nodes = self.inner.open_table(NODES).map_err(storage_err)?;
        nodes.remove(node.0).map_err(storage_err)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
