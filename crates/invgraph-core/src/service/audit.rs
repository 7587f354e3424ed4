//! Reading the activity log and recording entries for changes made
//! outside the service.

use super::InventoryService;
use crate::types::model::{ActivityLogEntry, ActivityType};
use crate::types::{ChangeDescriptor, InventoryError, NodeId};

impl InventoryService {
    pub fn create_general_activity_log_entry(
        &self,
        actor: &str,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, _| self.audit.create_general_activity_log_entry(tx, actor, activity, change))
    }

    pub fn create_object_activity_log_entry(
        &self,
        actor: &str,
        class_name: &str,
        uuid: &str,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<NodeId, InventoryError> {
        self.write(|tx, _| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            self.audit
                .create_object_activity_log_entry(tx, actor, node.id, activity, change)
        })
    }

    /// Entries of one object, newest first. `limit == 0` returns all.
    pub fn get_business_object_audit_trail(
        &self,
        class_name: &str,
        uuid: &str,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, InventoryError> {
        self.read(|tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            self.audit.get_business_object_audit_trail(tx, &node, limit)
        })
    }

    /// General entries, newest first, `limit` per zero-based `page`.
    pub fn get_general_activity_audit_trail(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<Vec<ActivityLogEntry>, InventoryError> {
        self.read(|tx| self.audit.get_general_activity_audit_trail(tx, page, limit))
    }
}

// =============================================================================
// TESTS
// =============================================================================
