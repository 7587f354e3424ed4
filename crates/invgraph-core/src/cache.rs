//! # Cache Layer
//!
//! Per-kind lookups derived from the graph, kept behind one lock with a
//! generation counter.
//!
//! Two paths touch the caches:
//! - Writers collect [`CacheUpdate`]s while their transaction runs and
//!   hand them to [`CacheLayer::apply`] after the commit succeeded. A
//!   rolled back transaction simply drops its updates.
//! - Readers fill misses with [`CacheLayer::get_or_load`]. The value is
//!   stored only if no update was applied since the reader's snapshot
//!   began, so a slow reader can never overwrite a newer entry with the
//!   state it saw.
//!
//! Write transactions bypass the caches completely: they may observe
//! their own uncommitted changes.

use crate::script::CompiledScript;
use crate::types::model::{ClassMetadata, ConfigValue, GroupProfile, ListTypeItem, UserProfile, ValidatorDefinition};
use crate::types::{InventoryError, NodeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The cached lookups. Keys are the post-mutation names.
#[derive(Debug, Default)]
pub struct Caches {
    pub classes: HashMap<String, Arc<ClassMetadata>>,
    /// (class, special) -> possible children names, inherited and expanded.
    pub possible_children: HashMap<(String, bool), Vec<String>>,
    /// Names of every class, transitively, that extends the key.
    pub subclasses: HashMap<String, Vec<String>>,
    pub users: HashMap<String, UserProfile>,
    pub groups: HashMap<String, GroupProfile>,
    /// List type class -> items sorted by name.
    pub list_types: HashMap<String, Vec<ListTypeItem>>,
    pub config_values: HashMap<String, ConfigValue>,
    /// Class -> validator definitions that apply to it.
    pub validators: HashMap<String, Vec<ValidatorDefinition>>,
    /// (class, definition id) -> compiled filter or validator.
    pub artifacts: HashMap<(String, NodeId), CompiledScript>,
}

/// A post-commit cache mutation.
#[derive(Debug, Clone)]
pub enum CacheUpdate {
    PutClass(ClassMetadata),
    RemoveClass(String),
    /// Inheritance or attributes changed: every derived schema entry is stale.
    SchemaChanged,
    PossibleChildrenChanged,
    PutUser(UserProfile),
    RemoveUser(String),
    PutGroup(GroupProfile),
    RemoveGroup(String),
    /// Any group may now list a different set of users or privileges.
    UsersChanged,
    ListTypeChanged(String),
    RemoveConfigValue(String),
    ValidatorsChanged,
    RemoveArtifact(String, NodeId),
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    caches: Caches,
}

/// Shared, post-commit caches.
#[derive(Debug, Default)]
pub struct CacheLayer {
    inner: RwLock<Inner>,
}

impl CacheLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation. Capture it before beginning a read transaction.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Look a value up. Always misses for write transactions (`epoch == None`).
    pub fn lookup<R>(&self, epoch: Option<u64>, get: impl FnOnce(&Caches) -> Option<R>) -> Option<R> {
        epoch?;
        get(&self.inner.read().caches)
    }

    /// Store a value read at `epoch`. Returns false, and stores nothing, if
    /// an update was applied since.
    pub fn populate(&self, epoch: Option<u64>, put: impl FnOnce(&mut Caches)) -> bool {
        let Some(epoch) = epoch else {
            return false;
        };
        let mut inner = self.inner.write();
        if inner.generation != epoch {
            return false;
        }
        put(&mut inner.caches);
        true
    }

    /// Cache hit, or load and populate.
    pub fn get_or_load<V: Clone>(
        &self,
        epoch: Option<u64>,
        get: impl FnOnce(&Caches) -> Option<V>,
        load: impl FnOnce() -> Result<V, InventoryError>,
        put: impl FnOnce(&mut Caches, V),
    ) -> Result<V, InventoryError> {
        if let Some(hit) = self.lookup(epoch, get) {
            return Ok(hit);
        }
        let value = load()?;
        let stored = value.clone();
        self.populate(epoch, move |c| put(c, stored));
        Ok(value)
    }

    /// Apply the updates of a committed transaction.
    pub fn apply(&self, updates: Vec<CacheUpdate>) {
        if updates.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        inner.generation += 1;
        let count = updates.len();
        for update in updates {
            apply_one(&mut inner.caches, update);
        }
        tracing::debug!(
            event = "cache_apply",
            updates = count,
            generation = inner.generation
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.caches = Caches::default();
    }
}

fn apply_one(caches: &mut Caches, update: CacheUpdate) {
    match update {
        CacheUpdate::PutClass(class) => {
            // A rename arrives as PutClass under the new name; the old key
            // is removed by the id match.
            caches.classes.retain(|name, c| c.id != class.id || *name == class.name);
            caches.classes.insert(class.name.clone(), Arc::new(class));
        }
        CacheUpdate::RemoveClass(name) => {
            caches.classes.remove(&name);
            caches.possible_children.clear();
            caches.subclasses.clear();
            caches.validators.clear();
        }
        CacheUpdate::SchemaChanged => {
            caches.classes.clear();
            caches.possible_children.clear();
            caches.subclasses.clear();
            caches.validators.clear();
            caches.list_types.clear();
        }
        CacheUpdate::PossibleChildrenChanged => caches.possible_children.clear(),
        CacheUpdate::PutUser(user) => {
            caches.users.retain(|name, u| u.id != user.id || *name == user.name);
            caches.users.insert(user.name.clone(), user);
        }
        CacheUpdate::RemoveUser(name) => {
            caches.users.remove(&name);
        }
        CacheUpdate::PutGroup(group) => {
            caches.groups.retain(|name, g| g.id != group.id || *name == group.name);
            caches.groups.insert(group.name.clone(), group);
        }
        CacheUpdate::RemoveGroup(name) => {
            caches.groups.remove(&name);
        }
        CacheUpdate::UsersChanged => {
            caches.users.clear();
            caches.groups.clear();
        }
        CacheUpdate::ListTypeChanged(class) => {
            caches.list_types.remove(&class);
        }
        CacheUpdate::RemoveConfigValue(name) => {
            caches.config_values.remove(&name);
        }
        CacheUpdate::ValidatorsChanged => caches.validators.clear(),
        CacheUpdate::RemoveArtifact(class, id) => {
            caches.artifacts.remove(&(class, id));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: u64, name: &str) -> ClassMetadata {
        ClassMetadata {
            id: NodeId(id),
            name: name.to_string(),
            display_name: String::new(),
            description: String::new(),
            parent: None,
            abstract_class: false,
            in_design: false,
            custom: true,
            creation_date: 0,
            attributes: Vec::new(),
        }
    }

    #[test]
    fn write_transactions_never_hit() {
        let cache = CacheLayer::new();
        cache.apply(vec![CacheUpdate::PutClass(class(1, "Router"))]);
        assert!(cache.lookup(None, |c| c.classes.get("Router").cloned()).is_none());
        let epoch = Some(cache.generation());
        assert!(cache.lookup(epoch, |c| c.classes.get("Router").cloned()).is_some());
        assert!(!cache.populate(None, |_| {}));
    }

    #[test]
    fn stale_reader_cannot_populate() {
        let cache = CacheLayer::new();
        let epoch = Some(cache.generation());
        cache.apply(vec![CacheUpdate::RemoveConfigValue("x".into())]);
        let stored = cache.populate(epoch, |c| {
            c.config_values.insert("x".into(), ConfigValue::Integer(1));
        });
        assert!(!stored);
        let now = Some(cache.generation());
        assert!(cache.lookup(now, |c| c.config_values.get("x").cloned()).is_none());
    }

    #[test]
    fn rename_removes_old_key() {
        let cache = CacheLayer::new();
        cache.apply(vec![CacheUpdate::PutClass(class(1, "Router"))]);
        cache.apply(vec![CacheUpdate::PutClass(class(1, "CoreRouter"))]);
        let epoch = Some(cache.generation());
        assert!(cache.lookup(epoch, |c| c.classes.get("Router").cloned()).is_none());
        assert!(cache.lookup(epoch, |c| c.classes.get("CoreRouter").cloned()).is_some());
    }

    #[test]
    fn get_or_load_fills_once() {
        let cache = CacheLayer::new();
        let epoch = Some(cache.generation());
        let mut loads = 0;
        for _ in 0..3 {
            let value = cache
                .get_or_load(
                    epoch,
                    |c| c.config_values.get("v").cloned(),
                    || {
                        loads += 1;
                        Ok(ConfigValue::Integer(42))
                    },
                    |c, v| {
                        c.config_values.insert("v".into(), v);
                    },
                )
                .expect("load");
            assert_eq!(value, ConfigValue::Integer(42));
        }
        assert_eq!(loads, 1);
    }

    #[test]
    fn empty_update_list_keeps_generation() {
        let cache = CacheLayer::new();
        let before = cache.generation();
        cache.apply(Vec::new());
        assert_eq!(cache.generation(), before);
        cache.clear();
        assert_eq!(cache.generation(), before + 1);
    }
}
