//! # Script Host
//!
//! [`ScriptHost`] over a transaction owned by the host. Filters,
//! validators and scripted queries run on a read snapshot; tasks run on a
//! write transaction the caller commits or drops once the script returns.
//!
//! Blobs saved by a script bypass the transaction. Their names are kept as
//! external effects so a failed task can report what already happened.

use super::InventoryService;
use super::config_vars::config_value_in;
use super::inventory::{children_of, objects_of_class};
use super::list_types::list_type_update;
use crate::audit::AuditTrail;
use crate::blob::{BlobKind, BlobStore};
use crate::cache::{CacheLayer, CacheUpdate};
use crate::mapper::{EntityMapper, WriteMode, parse_changes};
use crate::messages;
use crate::script::{ScriptHost, ScriptValue};
use crate::storage::{GraphRead, ReadTx, WriteTx};
use crate::types::model::{ActivityType, BusinessObject, BusinessObjectLight, ConfigValue};
use crate::types::{ErrorMessage, InventoryError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The transaction a host runs on.
pub enum HostTx {
    Read(ReadTx),
    Write(WriteTx),
}

impl fmt::Debug for HostTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(_) => f.write_str("HostTx::Read"),
            Self::Write(_) => f.write_str("HostTx::Write"),
        }
    }
}

pub struct TxHost {
    tx: Mutex<Option<HostTx>>,
    actor: String,
    context: String,
    mapper: EntityMapper,
    cache: Arc<CacheLayer>,
    blobs: Arc<dyn BlobStore>,
    audit: AuditTrail,
    external_effects: Mutex<Vec<String>>,
    cache_updates: Mutex<Vec<CacheUpdate>>,
}

impl fmt::Debug for TxHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHost")
            .field("actor", &self.actor)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Evaluate `$body` with `$tx` bound to whichever transaction the host holds.
macro_rules! with_tx {
    ($host:expr, |$tx:ident| $body:expr) => {{
        let guard = $host.tx.lock();
        match guard.as_ref() {
            Some(HostTx::Read($tx)) => $body,
            Some(HostTx::Write($tx)) => $body,
            None => Err($host.closed()),
        }
    }};
}

impl InventoryService {
    /// Host on a fresh read snapshot. Read hosts act for nobody.
    pub(crate) fn read_host(&self, context: &str) -> Result<Arc<TxHost>, InventoryError> {
        let tx = self.begin_read()?;
        Ok(Arc::new(self.host(HostTx::Read(tx), "", context)))
    }

    /// Host on a new write transaction. Nothing is committed until the
    /// caller takes the transaction back with [`TxHost::finish`].
    pub(crate) fn write_host(&self, actor: &str, context: &str) -> Result<Arc<TxHost>, InventoryError> {
        let tx = self.begin_write()?;
        Ok(Arc::new(self.host(HostTx::Write(tx), actor, context)))
    }

    fn host(&self, tx: HostTx, actor: &str, context: &str) -> TxHost {
        TxHost {
            tx: Mutex::new(Some(tx)),
            actor: actor.to_string(),
            context: context.to_string(),
            mapper: self.mapper.clone(),
            cache: Arc::clone(&self.cache),
            blobs: self.blob_store(),
            audit: AuditTrail::new(),
            external_effects: Mutex::new(Vec::new()),
            cache_updates: Mutex::new(Vec::new()),
        }
    }
}

impl TxHost {
    /// Take the transaction back. Later host calls fail.
    pub fn finish(&self) -> Option<HostTx> {
        self.tx.lock().take()
    }

    /// Names of the blobs written so far.
    pub fn external_effects(&self) -> Vec<String> {
        self.external_effects.lock().clone()
    }

    /// Cache updates owed once the write transaction commits.
    pub fn take_cache_updates(&self) -> Vec<CacheUpdate> {
        std::mem::take(&mut *self.cache_updates.lock())
    }

    fn closed(&self) -> InventoryError {
        InventoryError::Storage(format!("transaction of {} is already closed", self.context))
    }

    fn read_only(&self) -> InventoryError {
        InventoryError::OperationNotPermitted(
            ErrorMessage::new(messages::SCRIPT_READ_ONLY).arg(&self.context),
        )
    }

    fn object(&self, tx: &impl GraphRead, class_name: &str, uuid: &str) -> Result<BusinessObject, InventoryError> {
        let node = self.mapper.object_node(tx, class_name, uuid)?;
        self.mapper.materialize_node(tx, &node)
    }
}

impl ScriptHost for TxHost {
    fn get_object(&self, class_name: &str, uuid: &str) -> Result<ScriptValue, InventoryError> {
        with_tx!(self, |tx| self.object(tx, class_name, uuid).map(|o| object_value(&o)))
    }

    fn get_children(&self, class_name: &str, uuid: &str) -> Result<ScriptValue, InventoryError> {
        with_tx!(self, |tx| {
            let node = self.mapper.object_node(tx, class_name, uuid)?;
            let children = children_of(&self.mapper, tx, node.id, false)?;
            Ok(ScriptValue::Array(children.iter().map(light_value).collect()))
        })
    }

    fn get_objects_of_class(&self, class_name: &str) -> Result<ScriptValue, InventoryError> {
        with_tx!(self, |tx| {
            let objects = objects_of_class(&self.mapper, tx, class_name, 0)?;
            Ok(ScriptValue::Array(objects.iter().map(light_value).collect()))
        })
    }

    fn is_subclass_of(&self, class_name: &str, super_class: &str) -> Result<bool, InventoryError> {
        with_tx!(self, |tx| self.mapper.catalog().is_subclass_of(tx, class_name, super_class))
    }

    fn get_attribute(
        &self,
        class_name: &str,
        uuid: &str,
        attribute: &str,
    ) -> Result<ScriptValue, InventoryError> {
        with_tx!(self, |tx| {
            let object = self.object(tx, class_name, uuid)?;
            Ok(object
                .attribute_text(attribute)
                .map(ScriptValue::Text)
                .unwrap_or(ScriptValue::Unit))
        })
    }

    fn set_attribute(
        &self,
        class_name: &str,
        uuid: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), InventoryError> {
        let guard = self.tx.lock();
        let tx = match guard.as_ref() {
            Some(HostTx::Write(tx)) => tx,
            Some(HostTx::Read(_)) => return Err(self.read_only()),
            None => return Err(self.closed()),
        };
        let node = self.mapper.object_node(tx, class_name, uuid)?;
        let membership = self.mapper.membership(tx, node.id)?;
        let class = self.mapper.catalog().get_class(tx, &membership.class_name)?;
        let mut raw = BTreeMap::new();
        raw.insert(attribute.to_string(), value.to_string());
        let changes = parse_changes(&class, &raw)?;
        let change = self
            .mapper
            .dematerialize(tx, node.id, &class, &changes, WriteMode::Update)?;
        if !change.is_empty() {
            self.cache_updates
                .lock()
                .extend(list_type_update(&self.mapper, tx, &node)?);
            self.audit.create_object_activity_log_entry(
                tx,
                &self.actor,
                node.id,
                ActivityType::UpdateInventoryObject,
                &change,
            )?;
        }
        Ok(())
    }

    fn config_value(&self, name: &str) -> Result<ScriptValue, InventoryError> {
        with_tx!(self, |tx| config_value_in(&self.cache, tx, name).map(config_script_value))
    }

    fn save_blob(&self, name: &str, content: &str) -> Result<(), InventoryError> {
        match self.tx.lock().as_ref() {
            Some(HostTx::Write(_)) => {}
            Some(HostTx::Read(_)) => return Err(self.read_only()),
            None => return Err(self.closed()),
        }
        self.blobs.save(BlobKind::Attachment, name, content.as_bytes())?;
        self.external_effects.lock().push(name.to_string());
        Ok(())
    }

    fn log(&self, message: &str) {
        tracing::info!(event = "script_log", context = %self.context, actor = %self.actor, "{}", message);
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn light_value(object: &BusinessObjectLight) -> ScriptValue {
    let mut map = BTreeMap::new();
    map.insert("class_name".to_string(), ScriptValue::from(object.class_name.as_str()));
    map.insert("uuid".to_string(), ScriptValue::from(object.uuid.as_str()));
    map.insert("name".to_string(), ScriptValue::from(object.name.as_str()));
    ScriptValue::Map(map)
}

fn object_value(object: &BusinessObject) -> ScriptValue {
    let attributes = object
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), ScriptValue::Text(value.to_string())))
        .collect();
    let mut map = BTreeMap::new();
    map.insert("class_name".to_string(), ScriptValue::from(object.class_name.as_str()));
    map.insert("uuid".to_string(), ScriptValue::from(object.uuid.as_str()));
    map.insert("name".to_string(), ScriptValue::from(object.name.as_str()));
    map.insert("attributes".to_string(), ScriptValue::Map(attributes));
    ScriptValue::Map(map)
}

fn config_script_value(value: ConfigValue) -> ScriptValue {
    let texts = |items: Vec<String>| ScriptValue::Array(items.into_iter().map(ScriptValue::Text).collect());
    match value {
        ConfigValue::Text(s) => ScriptValue::Text(s),
        ConfigValue::Integer(i) => ScriptValue::Int(i),
        ConfigValue::Float(f) => ScriptValue::Float(f),
        ConfigValue::Boolean(b) => ScriptValue::Bool(b),
        ConfigValue::Array(items) => texts(items),
        ConfigValue::Matrix(rows) => ScriptValue::Array(rows.into_iter().map(texts).collect()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::*;
    use crate::service::tests::service;
    use crate::types::AttributeValue;
    use crate::types::model::{AttributeChanges, ClassDefinition};

    fn rack(service: &InventoryService) -> String {
        service
            .create_class(ADMIN_USER, &ClassDefinition::new("Rack", CLASS_INVENTORY_OBJECT))
            .expect("class");
        service.add_possible_children(ADMIN_USER, None, &["Rack"]).expect("children");
        let mut attrs = AttributeChanges::new();
        attrs.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text("r1".into())));
        service
            .create_object(ADMIN_USER, "Rack", None, &attrs, None)
            .expect("rack")
    }

    #[test]
    fn read_host_serves_objects_but_refuses_writes() {
        let service = service();
        let uuid = rack(&service);
        let host = service.read_host("lookup").expect("host");

        let object = host.get_object("Rack", &uuid).expect("object");
        let name = object.as_map().and_then(|m| m.get("name")).cloned();
        assert_eq!(name, Some(ScriptValue::from("r1")));
        assert_eq!(
            host.get_objects_of_class(CLASS_INVENTORY_OBJECT)
                .expect("objects")
                .as_array()
                .map(<[ScriptValue]>::len),
            Some(1)
        );
        let err = host.set_attribute("Rack", &uuid, PROPERTY_NAME, "r2").expect_err("read only");
        assert_eq!(err.key(), Some(messages::SCRIPT_READ_ONLY));
        assert!(host.save_blob("out.txt", "x").is_err());
    }

    #[test]
    fn write_host_changes_are_committed_by_the_caller() {
        let service = service();
        let uuid = rack(&service);
        let host = service.write_host(ADMIN_USER, "rename").expect("host");
        host.set_attribute("Rack", &uuid, PROPERTY_NAME, "r2").expect("set");
        assert_eq!(
            host.get_attribute("Rack", &uuid, PROPERTY_NAME).expect("attr"),
            ScriptValue::from("r2")
        );
        host.save_blob("report.txt", "done").expect("blob");
        assert_eq!(host.external_effects(), vec!["report.txt".to_string()]);

        let tx = match host.finish() {
            Some(HostTx::Write(tx)) => Some(tx),
            _ => None,
        };
        tx.expect("write transaction").commit().expect("commit");
        assert!(host.get_object("Rack", &uuid).is_err());
        assert_eq!(service.get_object("Rack", &uuid).expect("object").name, "r2");
    }

    #[test]
    fn config_values_keep_their_type() {
        let matrix = ConfigValue::Matrix(vec![vec!["a".into(), "b".into()]]);
        let value = config_script_value(matrix);
        assert_eq!(
            value,
            ScriptValue::Array(vec![ScriptValue::Array(vec![
                ScriptValue::from("a"),
                ScriptValue::from("b")
            ])])
        );
        assert_eq!(config_script_value(ConfigValue::Integer(3)), ScriptValue::Int(3));
    }
}
