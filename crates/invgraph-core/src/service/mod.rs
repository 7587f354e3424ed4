//! # Inventory Service
//!
//! The explicitly owned context every operation runs through. It holds the
//! graph database, the shared caches, the session table, the script engine
//! and the blob store, and is passed around by reference.
//!
//! Each public operation opens exactly one transaction:
//! - reads run on a snapshot tagged with the cache generation;
//! - writes collect their cache updates and blob removals, and those are
//!   applied only after the commit succeeded.
//!
//! Mutations take the name of the acting user; audit entries are written
//! inside the same transaction.

mod audit;
mod config_vars;
mod host;
mod inventory;
mod list_types;
mod metadata;
mod pools;
mod queries;
mod rules;
mod scripted;
mod tasks;
mod templates;
mod users;
mod views;

pub use config_vars::{NewConfigurationVariable, parse_value};
pub use host::{HostTx, TxHost};
pub use inventory::ObjectRef;
pub use scripted::{NewDefinition, NewQueryParameter, ScriptedQueryUpdate};
pub use tasks::{TaskExecutionError, TaskOutcome};
pub use views::NewView;

use crate::audit::AuditTrail;
use crate::blob::{self, BlobRef, BlobStore, FsBlobStore, MemoryBlobStore};
use crate::cache::{CacheLayer, CacheUpdate};
use crate::config::ServiceConfig;
use crate::hierarchy::HierarchyManager;
use crate::mapper::EntityMapper;
use crate::messages;
use crate::primitives::*;
use crate::rules::RuleEngine;
use crate::schema::{SchemaCatalog, create_core_classes};
use crate::script::{ExecutionBudget, RhaiEngine, ScriptEngine};
use crate::session::{SessionRegistry, hash_password};
use crate::storage::{GraphDb, GraphRead, GraphWrite, ReadTx, WriteTx};
use crate::types::model::{ActivityType, UserType};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, PropertyValue, now_millis};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Side effects of a write transaction, released after its commit.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub cache: Vec<CacheUpdate>,
    pub blobs: Vec<BlobRef>,
}

pub struct InventoryService {
    db: GraphDb,
    cache: Arc<CacheLayer>,
    catalog: SchemaCatalog,
    mapper: EntityMapper,
    hierarchy: HierarchyManager,
    sessions: SessionRegistry,
    rules: RuleEngine,
    audit: AuditTrail,
    blobs: Arc<dyn BlobStore>,
    config: ServiceConfig,
}

impl fmt::Debug for InventoryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryService")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InventoryService {
    /// Open (or create) a persistent store. Blobs go to the configured
    /// directories.
    pub fn open(path: impl AsRef<Path>, config: ServiceConfig) -> Result<Self, InventoryError> {
        let db = GraphDb::open(path)?;
        let blobs = FsBlobStore::new(&config.attachments_path, &config.backgrounds_path);
        Ok(Self::with_parts(db, config, Arc::new(RhaiEngine::new()), Arc::new(blobs)))
    }

    /// A volatile store with in-memory blobs.
    pub fn in_memory(config: ServiceConfig) -> Result<Self, InventoryError> {
        let db = GraphDb::in_memory()?;
        Ok(Self::with_parts(
            db,
            config,
            Arc::new(RhaiEngine::new()),
            Arc::new(MemoryBlobStore::new()),
        ))
    }

    pub fn with_parts(
        db: GraphDb,
        config: ServiceConfig,
        engine: Arc<dyn ScriptEngine>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let cache = Arc::new(CacheLayer::new());
        let catalog = SchemaCatalog::new(Arc::clone(&cache));
        let mapper = EntityMapper::new(catalog.clone());
        let hierarchy = HierarchyManager::new(mapper.clone());
        let rules = RuleEngine::new(mapper.clone(), engine);
        Self {
            db,
            cache,
            catalog,
            mapper,
            hierarchy,
            sessions: SessionRegistry::new(),
            rules,
            audit: AuditTrail::new(),
            blobs,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn mapper(&self) -> &EntityMapper {
        &self.mapper
    }

    pub fn hierarchy(&self) -> &HierarchyManager {
        &self.hierarchy
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Node and relationship counts of the committed graph.
    pub fn stats(&self) -> Result<(u64, u64), InventoryError> {
        self.read(|tx| Ok((tx.node_count()?, tx.relationship_count()?)))
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    pub fn is_initialized(&self) -> Result<bool, InventoryError> {
        self.read(|tx| {
            Ok(tx
                .find_node(
                    LABEL_SPECIAL_NODES,
                    PROPERTY_NAME,
                    &PropertyValue::from(NODE_DUMMY_ROOT),
                )?
                .is_some())
        })
    }

    /// Create the core classes, the special nodes and the default
    /// administrator. Fails on an already initialized store.
    pub fn bootstrap(&self, admin_password: &str) -> Result<(), InventoryError> {
        if admin_password.is_empty() {
            return Err(InventoryError::InvalidArgument(ErrorMessage::new(
                messages::PASSWORD_EMPTY,
            )));
        }
        self.write(|tx, effects| {
            if tx
                .find_node(LABEL_SPECIAL_NODES, PROPERTY_NAME, &PropertyValue::from(NODE_DUMMY_ROOT))?
                .is_some()
            {
                return Err(InventoryError::OperationNotPermitted(ErrorMessage::new(
                    messages::ALREADY_INITIALIZED,
                )));
            }
            create_core_classes(&self.catalog, tx, &mut effects.cache)?;
            for name in [
                NODE_DUMMY_ROOT,
                NODE_GROUPS,
                NODE_GENERAL_ACTIVITY_LOG,
                NODE_OBJECT_ACTIVITY_LOG,
            ] {
                let node = tx.create_node(&[LABEL_SPECIAL_NODES])?;
                tx.set_property(node, PROPERTY_NAME, name.into())?;
            }
            let groups = crate::hierarchy::special_node(tx, NODE_GROUPS)?;
            let group = tx.create_node(&[LABEL_GROUPS])?;
            tx.set_property(group, PROPERTY_NAME, ADMIN_GROUP.into())?;
            tx.set_property(group, PROPERTY_DESCRIPTION, "Administrators".into())?;
            tx.set_property(group, PROPERTY_CREATION_DATE, now_millis().into())?;
            tx.relate(group, groups.id, REL_CHILD_OF)?;

            let admin = tx.create_node(&[LABEL_USERS])?;
            tx.set_property(admin, PROPERTY_NAME, ADMIN_USER.into())?;
            tx.set_property(admin, PROPERTY_PASSWORD, hash_password(admin_password).into())?;
            tx.set_property(admin, PROPERTY_ENABLED, true.into())?;
            tx.set_property(admin, PROPERTY_TYPE, UserType::Gui.code().into())?;
            tx.set_property(admin, PROPERTY_CREATION_DATE, now_millis().into())?;
            tx.relate(admin, group, REL_BELONGS_TO_GROUP)?;

            self.audit.create_general_activity_log_entry(
                tx,
                ADMIN_USER,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes("Database initialized"),
            )?;
            tracing::info!(event = "store_initialized", "Inventory store initialized");
            Ok(())
        })
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Run `f` on a read snapshot that may use the caches.
    pub(crate) fn read<R>(
        &self,
        f: impl FnOnce(&ReadTx) -> Result<R, InventoryError>,
    ) -> Result<R, InventoryError> {
        let tx = self.db.begin_read_at(Some(self.cache.generation()))?;
        f(&tx)
    }

    /// Run `f` in a write transaction. On success the transaction is
    /// committed, then caches are updated and dropped blobs removed. On
    /// error nothing is committed and no side effect is released.
    pub(crate) fn write<R>(
        &self,
        f: impl FnOnce(&WriteTx, &mut Effects) -> Result<R, InventoryError>,
    ) -> Result<R, InventoryError> {
        let tx = self.db.begin_write()?;
        let mut effects = Effects::default();
        let result = f(&tx, &mut effects)?;
        tx.commit()?;
        self.release(effects);
        Ok(result)
    }

    pub(crate) fn begin_write(&self) -> Result<WriteTx, InventoryError> {
        self.db.begin_write()
    }

    pub(crate) fn begin_read(&self) -> Result<ReadTx, InventoryError> {
        self.db.begin_read_at(Some(self.cache.generation()))
    }

    pub(crate) fn release(&self, effects: Effects) {
        self.cache.apply(effects.cache);
        blob::discard(self.blobs.as_ref(), &effects.blobs);
    }

    pub(crate) fn budget(&self) -> ExecutionBudget {
        ExecutionBudget::new(self.config.script_max_operations, self.config.script_timeout())
    }

    pub(crate) fn blob_store(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs)
    }

    pub(crate) fn log_general(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<(), InventoryError> {
        self.audit
            .create_general_activity_log_entry(tx, actor, activity, change)
            .map(|_| ())
    }

    pub(crate) fn log_object(
        &self,
        tx: &impl GraphWrite,
        actor: &str,
        object: crate::types::NodeId,
        activity: ActivityType,
        change: &ChangeDescriptor,
    ) -> Result<(), InventoryError> {
        self.audit
            .create_object_activity_log_entry(tx, actor, object, activity, change)
            .map(|_| ())
    }
}

/// Empty names are rejected before anything is written.
pub(crate) fn require_name(name: &str, what: &str) -> Result<(), InventoryError> {
    if name.trim().is_empty() {
        return Err(InventoryError::InvalidArgument(
            ErrorMessage::new(messages::NAME_EMPTY).arg(what),
        ));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// An initialized in-memory service.
    pub(crate) fn service() -> InventoryService {
        service_with(ServiceConfig::default())
    }

    pub(crate) fn service_with(config: ServiceConfig) -> InventoryService {
        let service = InventoryService::in_memory(config).expect("open service");
        service.bootstrap("admin-secret").expect("bootstrap");
        service
    }

    #[test]
    fn bootstrap_once() {
        let service = InventoryService::in_memory(ServiceConfig::default()).expect("open");
        assert!(!service.is_initialized().expect("status"));
        service.bootstrap("pw").expect("bootstrap");
        assert!(service.is_initialized().expect("status"));
        let err = service.bootstrap("pw").expect_err("twice");
        assert_eq!(err.key(), Some(messages::ALREADY_INITIALIZED));
        let (nodes, rels) = service.stats().expect("stats");
        assert!(nodes > 0);
        assert!(rels > 0);
    }

    #[test]
    fn failed_write_releases_nothing() {
        let service = service();
        let generation = service.cache().generation();
        let result: Result<(), InventoryError> = service.write(|tx, effects| {
            tx.create_node(&[LABEL_POOLS])?;
            effects.cache.push(CacheUpdate::SchemaChanged);
            Err(InventoryError::InvalidArgument(ErrorMessage::new(messages::NAME_EMPTY)))
        });
        assert!(result.is_err());
        assert_eq!(service.cache().generation(), generation);
        let pools = service.read(|tx| tx.nodes_with_label(LABEL_POOLS)).expect("read");
        assert!(pools.is_empty());
    }
}
