//! # Audit Trail
//!
//! Activity log entries, written inside the transaction of the mutation
//! they describe.
//!
//! ```text
//! (object | GeneralActivityLog) -HAS_HISTORY_ENTRY-> (entry) -PERFORMED_BY-> (user)
//! ```
//!
//! Entries of deleted users stay readable: deleted users are relabelled,
//! never removed.

use crate::hierarchy::special_node;
use crate::messages;
use crate::primitives::*;
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{ActivityLogEntry, ActivityType};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue, now_millis};

const PROPERTY_TIMESTAMP: &str = "timestamp";

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditTrail;

impl AuditTrail {
    pub fn new() -> Self {
        Self
    }

    pub fn create_general_activity_log_entry(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<NodeId, InventoryError> {
        let log = special_node(tx, NODE_GENERAL_ACTIVITY_LOG)?;
        self.write_entry(tx, log.id, actor, activity, change)
    }

    pub fn create_object_activity_log_entry(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        object: NodeId,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<NodeId, InventoryError> {
        self.write_entry(tx, object, actor, activity, change)
    }

    fn write_entry(
        &self,
        tx: &impl GraphWrite,
        owner: NodeId,
        actor: &str,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<NodeId, InventoryError> {
        let user = actor_node(tx, actor)?;
        let entry = tx.create_node(&[LABEL_ACTIVITY_LOGS])?;
        tx.set_property(entry, PROPERTY_TYPE, activity.code().into())?;
        tx.set_property(entry, PROPERTY_TIMESTAMP, now_millis().into())?;
        tx.set_property(
            entry,
            PROPERTY_AFFECTED_PROPERTIES,
            PropertyValue::TextList(change.affected_properties.clone()),
        )?;
        tx.set_property(
            entry,
            PROPERTY_OLD_VALUES,
            PropertyValue::TextList(change.old_values.clone()),
        )?;
        tx.set_property(
            entry,
            PROPERTY_NEW_VALUES,
            PropertyValue::TextList(change.new_values.clone()),
        )?;
        tx.set_property(entry, PROPERTY_NOTES, change.notes.as_str().into())?;
        tx.relate(owner, entry, REL_HAS_HISTORY_ENTRY)?;
        tx.relate(entry, user, REL_PERFORMED_BY)?;
        Ok(entry)
    }

    /// Entries of one object, newest first. `limit == 0` returns all.
    pub fn get_business_object_audit_trail(
        &self,
        tx: &impl GraphRead,
        object: &Node,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, InventoryError> {
        let mut entries = self.entries_of(tx, object)?;
        if limit > 0 {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// General entries, newest first, `limit` per zero-based `page`.
    pub fn get_general_activity_audit_trail(
        &self,
        tx: &impl GraphRead,
        page: usize,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, InventoryError> {
        let log = special_node(tx, NODE_GENERAL_ACTIVITY_LOG)?;
        let entries = self.entries_of(tx, &log)?;
        if limit == 0 {
            return Ok(entries);
        }
        Ok(entries
            .into_iter()
            .skip(page.saturating_mul(limit))
            .take(limit)
            .collect())
    }

    fn entries_of(&self, tx: &impl GraphRead, owner: &Node) -> Result<Vec<ActivityLogEntry>, InventoryError> {
        let subject = if owner.has_label(LABEL_SPECIAL_NODES) {
            None
        } else {
            owner.uuid().map(str::to_string)
        };
        let mut entries = Vec::new();
        for rel in tx.outgoing(owner.id, REL_HAS_HISTORY_ENTRY)? {
            let node = tx.require_node(rel.end)?;
            entries.push(read_entry(tx, &node, subject.clone())?);
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}

/// Active or deleted user performing an action.
fn actor_node(tx: &impl GraphRead, name: &str) -> Result<NodeId, InventoryError> {
    let key = PropertyValue::from(name);
    for label in [LABEL_USERS, LABEL_DELETED_USERS] {
        if let Some(node) = tx.find_node(label, PROPERTY_NAME, &key)? {
            return Ok(node.id);
        }
    }
    Err(InventoryError::ApplicationObjectNotFound(
        ErrorMessage::new(messages::USER_NOT_FOUND).arg(name),
    ))
}

fn text_list(node: &Node, key: &str) -> Vec<String> {
    node.property(key)
        .and_then(PropertyValue::as_text_list)
        .map(<[String]>::to_vec)
        .unwrap_or_default()
}

fn read_entry(
    tx: &impl GraphRead,
    node: &Node,
    object: Option<String>,
) -> Result<ActivityLogEntry, InventoryError> {
    let code = node.integer(PROPERTY_TYPE).unwrap_or(0);
    let activity_type = ActivityType::from_code(code).ok_or_else(|| {
        InventoryError::InvalidArgument(
            ErrorMessage::new(messages::PROPERTY_TYPE)
                .arg(PROPERTY_TYPE)
                .arg(LABEL_ACTIVITY_LOGS)
                .arg(code),
        )
    })?;
    let performing_user = match tx.first_outgoing(node.id, REL_PERFORMED_BY)? {
        Some(user) => tx.require_node(user)?.name(),
        None => String::new(),
    };
    Ok(ActivityLogEntry {
        id: node.id,
        object,
        activity_type,
        performing_user,
        timestamp: node.integer(PROPERTY_TIMESTAMP).unwrap_or(0),
        affected_properties: text_list(node, PROPERTY_AFFECTED_PROPERTIES),
        old_values: text_list(node, PROPERTY_OLD_VALUES),
        new_values: text_list(node, PROPERTY_NEW_VALUES),
        notes: node.text_or_empty(PROPERTY_NOTES),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GraphDb, WriteTx};

    fn seed(tx: &WriteTx) -> NodeId {
        let log = tx.create_node(&[LABEL_SPECIAL_NODES]).expect("log");
        tx.set_property(log, PROPERTY_NAME, NODE_GENERAL_ACTIVITY_LOG.into())
            .expect("name");
        let user = tx.create_node(&[LABEL_USERS]).expect("user");
        tx.set_property(user, PROPERTY_NAME, "admin".into()).expect("name");
        user
    }

    #[test]
    fn general_trail_is_paged_newest_first() {
        let db = GraphDb::in_memory().expect("open db");
        let tx = db.begin_write().expect("begin");
        seed(&tx);
        let audit = AuditTrail::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            let change = ChangeDescriptor::with_notes(format!("entry {}", i));
            ids.push(
                audit
                    .create_general_activity_log_entry(&tx, "admin", ActivityType::OpenSession, &change)
                    .expect("entry"),
            );
        }
        let first = audit.get_general_activity_audit_trail(&tx, 0, 2).expect("page");
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, ids[4]);
        assert_eq!(first[0].performing_user, "admin");
        assert!(first[0].object.is_none());
        let last = audit.get_general_activity_audit_trail(&tx, 2, 2).expect("page");
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].notes, "entry 0");
        assert_eq!(audit.get_general_activity_audit_trail(&tx, 0, 0).expect("all").len(), 5);
    }

    #[test]
    fn object_trail_keeps_change_descriptor() {
        let db = GraphDb::in_memory().expect("open db");
        let tx = db.begin_write().expect("begin");
        seed(&tx);
        let object = tx.create_node(&[LABEL_INVENTORY_OBJECTS]).expect("object");
        tx.set_property(object, PROPERTY_UUID, "u-1".into()).expect("uuid");
        let mut change = ChangeDescriptor::new();
        change.record("name", Some("a".into()), Some("b".into()));
        let audit = AuditTrail::new();
        audit
            .create_object_activity_log_entry(&tx, "admin", object, ActivityType::UpdateInventoryObject, &change)
            .expect("entry");
        let node = tx.require_node(object).expect("node");
        let trail = audit.get_business_object_audit_trail(&tx, &node, 10).expect("trail");
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].object.as_deref(), Some("u-1"));
        assert_eq!(trail[0].activity_type, ActivityType::UpdateInventoryObject);
        assert_eq!(trail[0].affected_properties, vec!["name".to_string()]);
        assert_eq!(trail[0].old_values, vec!["a".to_string()]);
    }

    #[test]
    fn unknown_actor_is_rejected() {
        let db = GraphDb::in_memory().expect("open db");
        let tx = db.begin_write().expect("begin");
        seed(&tx);
        let err = AuditTrail::new()
            .create_general_activity_log_entry(&tx, "ghost", ActivityType::OpenSession, &ChangeDescriptor::new())
            .expect_err("no such user");
        assert_eq!(err.key(), Some(messages::USER_NOT_FOUND));
    }
}
