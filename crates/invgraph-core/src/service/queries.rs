//! Stored query definitions. The structure is opaque bytes owned by the
//! client; a query is either owned by one user or public.

use super::users::user_node;
use super::{InventoryService, require_name};
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{ActivityType, CompactQuery};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue};

impl InventoryService {
    /// Store a query. `owner` is a user name; `None` makes it public.
    pub fn create_query(
        &self,
        actor: &str,
        name: &str,
        owner: Option<&str>,
        description: &str,
        structure: &[u8],
    ) -> Result<NodeId, InventoryError> {
        require_name(name, "query")?;
        self.write(|tx, _| {
            let id = tx.create_node(&[LABEL_QUERIES])?;
            write_query(tx, id, name, description, structure)?;
            set_owner(tx, id, owner)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Query {} created", name)),
            )?;
            Ok(id)
        })
    }

    /// Overwrite every field of a stored query, owner included.
    pub fn save_query(
        &self,
        actor: &str,
        id: NodeId,
        name: &str,
        owner: Option<&str>,
        description: &str,
        structure: &[u8],
    ) -> Result<(), InventoryError> {
        require_name(name, "query")?;
        self.write(|tx, _| {
            let node = query_node(tx, id)?;
            write_query(tx, node.id, name, description, structure)?;
            for rel in tx.incoming(node.id, REL_OWNS_QUERY)? {
                tx.delete_relationship(rel.id)?;
            }
            set_owner(tx, node.id, owner)?;
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Query {} saved", name)),
            )
        })
    }

    pub fn delete_query(&self, actor: &str, id: NodeId) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            let node = query_node(tx, id)?;
            tx.detach_delete(node.id)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Query {} deleted", node.name())),
            )
        })
    }

    pub fn get_query(&self, id: NodeId) -> Result<CompactQuery, InventoryError> {
        self.read(|tx| compact_query(tx, &query_node(tx, id)?))
    }

    /// Queries owned by `user`, followed by the public ones when
    /// `include_public` is set.
    pub fn get_queries(&self, user: &str, include_public: bool) -> Result<Vec<CompactQuery>, InventoryError> {
        self.read(|tx| {
            let user = user_node(tx, user)?;
            let mut owned = Vec::new();
            for rel in tx.outgoing(user.id, REL_OWNS_QUERY)? {
                owned.push(compact_query(tx, &tx.require_node(rel.end)?)?);
            }
            owned.sort_by_key(|q| q.id);
            if include_public {
                for node in tx.nodes(LABEL_QUERIES)? {
                    if node.boolean(PROPERTY_IS_PUBLIC) {
                        owned.push(compact_query(tx, &node)?);
                    }
                }
            }
            Ok(owned)
        })
    }
}

fn write_query(
    tx: &impl GraphWrite,
    id: NodeId,
    name: &str,
    description: &str,
    structure: &[u8],
) -> Result<(), InventoryError> {
    tx.set_property(id, PROPERTY_NAME, name.into())?;
    tx.set_property(id, PROPERTY_DESCRIPTION, description.into())?;
    tx.set_property(id, PROPERTY_STRUCTURE, PropertyValue::Bytes(structure.to_vec()))
}

fn set_owner(tx: &impl GraphWrite, id: NodeId, owner: Option<&str>) -> Result<(), InventoryError> {
    tx.set_property(id, PROPERTY_IS_PUBLIC, owner.is_none().into())?;
    if let Some(owner) = owner {
        let user = user_node(tx, owner)?;
        tx.relate(user.id, id, REL_OWNS_QUERY)?;
    }
    Ok(())
}

fn query_node(tx: &impl GraphRead, id: NodeId) -> Result<Node, InventoryError> {
    match tx.node(id)? {
        Some(node) if node.has_label(LABEL_QUERIES) => Ok(node),
        _ => Err(InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::QUERY_NOT_FOUND).arg(id),
        )),
    }
}

fn compact_query(tx: &impl GraphRead, node: &Node) -> Result<CompactQuery, InventoryError> {
    let owner = tx.incoming(node.id, REL_OWNS_QUERY)?.first().map(|rel| rel.start);
    Ok(CompactQuery {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        owner,
        structure: node
            .property(PROPERTY_STRUCTURE)
            .and_then(PropertyValue::as_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
