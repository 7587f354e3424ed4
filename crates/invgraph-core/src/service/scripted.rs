//! # Scripted Definitions
//!
//! Filters, validators and scripted queries. Filter and validator scripts
//! are compiled when they are stored, so a broken script never lands in
//! the graph; compiled artifacts are cached by (class, definition id).
//!
//! All three run on a read-only host.

use super::InventoryService;
use super::config_vars::{application_pool, application_pool_node, create_application_pool};
use super::inventory::children_of;
use crate::cache::CacheUpdate;
use crate::messages;
use crate::primitives::*;
use crate::rules::{expect_bool, expect_query_result, expect_validator};
use crate::script::{Bindings, CompiledScript, ScriptHost, ScriptValue};
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    ActivityType, ApplicationPool, BusinessObjectLight, DefinitionUpdate, FilterDefinition,
    ScriptedQuery, ScriptedQueryParameter, ScriptedQueryResult, Validator, ValidatorDefinition,
};
use crate::types::{ChangeDescriptor, ErrorMessage, InventoryError, NodeId, PropertyValue};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of compiled scripted queries in the artifact cache.
const QUERY_ARTIFACT: &str = "ScriptedQuery";

/// Input for a new filter or validator definition.
#[derive(Debug, Clone, Copy)]
pub struct NewDefinition<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub class_name: &'a str,
    pub script: &'a str,
    pub enabled: bool,
}

/// Partial update of a scripted query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptedQueryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub script: Option<String>,
    pub enabled: Option<bool>,
}

/// Input for a scripted query parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewQueryParameter {
    pub name: String,
    pub description: String,
    pub param_type: String,
    pub mandatory: bool,
    pub default_value: Option<String>,
}

/// Which of the two compiled definition kinds a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionKind {
    Filter,
    Validator,
}

impl DefinitionKind {
    fn label(self) -> &'static str {
        match self {
            Self::Filter => LABEL_FILTERS,
            Self::Validator => LABEL_VALIDATORS,
        }
    }

    fn not_found(self, id: NodeId) -> InventoryError {
        let key = match self {
            Self::Filter => messages::FILTER_NOT_FOUND,
            Self::Validator => messages::VALIDATOR_NOT_FOUND,
        };
        InventoryError::ApplicationObjectNotFound(ErrorMessage::new(key).arg(id))
    }

    fn context(self, name: &str) -> String {
        match self {
            Self::Filter => format!("filter {}", name),
            Self::Validator => format!("validator {}", name),
        }
    }
}

impl InventoryService {
    // =========================================================================
    // FILTERS
    // =========================================================================

    pub fn create_filter_definition(
        &self,
        actor: &str,
        definition: &NewDefinition<'_>,
    ) -> Result<NodeId, InventoryError> {
        self.create_definition(actor, DefinitionKind::Filter, definition)
    }

    pub fn update_filter_definition(
        &self,
        actor: &str,
        id: NodeId,
        update: &DefinitionUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.update_definition(actor, DefinitionKind::Filter, id, update)
    }

    pub fn delete_filter_definition(&self, actor: &str, id: NodeId) -> Result<(), InventoryError> {
        self.delete_definition(actor, DefinitionKind::Filter, id)
    }

    pub fn get_filter_definition(&self, id: NodeId) -> Result<FilterDefinition, InventoryError> {
        self.read(|tx| {
            let node = definition_node(tx, DefinitionKind::Filter, id)?;
            Ok(filter_definition(&node))
        })
    }

    /// Filters of `class_name`, and with `include_parents` also those of
    /// every superclass.
    pub fn get_filter_definitions_for_class(
        &self,
        class_name: &str,
        include_parents: bool,
    ) -> Result<Vec<FilterDefinition>, InventoryError> {
        self.read(|tx| {
            self.catalog.class_node(tx, class_name)?;
            let mut out = Vec::new();
            for node in tx.nodes(LABEL_FILTERS)? {
                let filter = filter_definition(&node);
                let applies = if include_parents {
                    self.catalog.is_subclass_of(tx, class_name, &filter.class_name)?
                } else {
                    filter.class_name == class_name
                };
                if applies {
                    out.push(filter);
                }
            }
            Ok(out)
        })
    }

    /// Children of the object for which the filter script returns `true`.
    /// The script sees each child as `object`.
    pub fn run_filter(
        &self,
        filter_id: NodeId,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<BusinessObjectLight>, InventoryError> {
        let (filter, script, children) = self.read(|tx| {
            let node = definition_node(tx, DefinitionKind::Filter, filter_id)?;
            let filter = filter_definition(&node);
            if !filter.enabled {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::DEFINITION_DISABLED).arg(&filter.name),
                ));
            }
            let object = self.mapper.object_node(tx, class_name, uuid)?;
            let membership = self.mapper.membership(tx, object.id)?;
            if !self
                .catalog
                .is_subclass_of(tx, &membership.class_name, &filter.class_name)?
            {
                return Err(InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::FILTER_CLASS_MISMATCH)
                        .arg(&filter.name)
                        .arg(&membership.class_name),
                ));
            }
            let script = self.definition_script(tx, DefinitionKind::Filter, &node)?;
            let children = children_of(&self.mapper, tx, object.id, false)?;
            Ok((filter, script, children))
        })?;

        let host = self.read_host(script.context())?;
        let budget = self.budget();
        let mut out = Vec::new();
        for child in children {
            let mut bindings = Bindings::new();
            bindings.insert("object".to_string(), host.get_object(&child.class_name, &child.uuid)?);
            let value = self.rules.invoke(
                &script,
                Arc::clone(&host) as Arc<dyn ScriptHost>,
                bindings,
                &budget,
            )?;
            if expect_bool(script.context(), value)? {
                out.push(child);
            }
        }
        tracing::debug!(event = "filter_ran", filter = %filter.name, matched = out.len());
        Ok(out)
    }

    // =========================================================================
    // VALIDATORS
    // =========================================================================

    pub fn create_validator_definition(
        &self,
        actor: &str,
        definition: &NewDefinition<'_>,
    ) -> Result<NodeId, InventoryError> {
        self.create_definition(actor, DefinitionKind::Validator, definition)
    }

    pub fn update_validator_definition(
        &self,
        actor: &str,
        id: NodeId,
        update: &DefinitionUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.update_definition(actor, DefinitionKind::Validator, id, update)
    }

    pub fn delete_validator_definition(&self, actor: &str, id: NodeId) -> Result<(), InventoryError> {
        self.delete_definition(actor, DefinitionKind::Validator, id)
    }

    pub fn get_validator_definition(&self, id: NodeId) -> Result<ValidatorDefinition, InventoryError> {
        self.read(|tx| {
            let node = definition_node(tx, DefinitionKind::Validator, id)?;
            Ok(validator_definition(&node))
        })
    }

    /// Validators whose class is `class_name` or one of its superclasses.
    pub fn get_validator_definitions_for_class(
        &self,
        class_name: &str,
    ) -> Result<Vec<ValidatorDefinition>, InventoryError> {
        self.read(|tx| self.validators_for(tx, class_name))
    }

    /// Run every enabled validator that applies to the object's class and
    /// collect those that fired.
    pub fn run_validations_for_object(
        &self,
        class_name: &str,
        uuid: &str,
    ) -> Result<Vec<Validator>, InventoryError> {
        let (object_class, scripts) = self.read(|tx| {
            let object = self.mapper.object_node(tx, class_name, uuid)?;
            let membership = self.mapper.membership(tx, object.id)?;
            let mut scripts = Vec::new();
            for definition in self.validators_for(tx, &membership.class_name)? {
                if !definition.enabled {
                    continue;
                }
                let node = definition_node(tx, DefinitionKind::Validator, definition.id)?;
                scripts.push((definition.name, self.definition_script(tx, DefinitionKind::Validator, &node)?));
            }
            Ok((membership.class_name, scripts))
        })?;
        if scripts.is_empty() {
            return Ok(Vec::new());
        }

        let host = self.read_host(&format!("validations of {}", uuid))?;
        let object = host.get_object(&object_class, uuid)?;
        let budget = self.budget();
        let mut fired = Vec::new();
        for (name, script) in scripts {
            let mut bindings = Bindings::new();
            bindings.insert("object".to_string(), object.clone());
            let value = self.rules.invoke(
                &script,
                Arc::clone(&host) as Arc<dyn ScriptHost>,
                bindings,
                &budget,
            )?;
            if let Some(properties) = expect_validator(script.context(), value)? {
                fired.push(Validator { name, properties });
            }
        }
        Ok(fired)
    }

    fn validators_for(
        &self,
        tx: &impl GraphRead,
        class_name: &str,
    ) -> Result<Vec<ValidatorDefinition>, InventoryError> {
        self.cache.get_or_load(
            tx.cache_epoch(),
            |c| c.validators.get(class_name).cloned(),
            || {
                self.catalog.class_node(tx, class_name)?;
                let mut out = Vec::new();
                for node in tx.nodes(LABEL_VALIDATORS)? {
                    let validator = validator_definition(&node);
                    if self.catalog.is_subclass_of(tx, class_name, &validator.class_name)? {
                        out.push(validator);
                    }
                }
                Ok(out)
            },
            |c, validators| {
                c.validators.insert(class_name.to_string(), validators);
            },
        )
    }

    // =========================================================================
    // SHARED DEFINITION LIFECYCLE
    // =========================================================================

    fn create_definition(
        &self,
        actor: &str,
        kind: DefinitionKind,
        definition: &NewDefinition<'_>,
    ) -> Result<NodeId, InventoryError> {
        super::require_name(definition.name, "definition")?;
        self.rules.compile(definition.script, &kind.context(definition.name))?;
        self.write(|tx, effects| {
            self.catalog.class_node(tx, definition.class_name)?;
            let id = tx.create_node(&[kind.label()])?;
            tx.set_property(id, PROPERTY_NAME, definition.name.into())?;
            tx.set_property(id, PROPERTY_DESCRIPTION, definition.description.into())?;
            tx.set_property(id, PROPERTY_CLASS_NAME, definition.class_name.into())?;
            tx.set_property(id, PROPERTY_SCRIPT, definition.script.into())?;
            tx.set_property(id, PROPERTY_ENABLED, definition.enabled.into())?;
            if kind == DefinitionKind::Validator {
                effects.cache.push(CacheUpdate::ValidatorsChanged);
            }
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("{} created", kind.context(definition.name))),
            )?;
            Ok(id)
        })
    }

    fn update_definition(
        &self,
        actor: &str,
        kind: DefinitionKind,
        id: NodeId,
        update: &DefinitionUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        self.write(|tx, effects| {
            let node = definition_node(tx, kind, id)?;
            let old_class = node.text_or_empty(PROPERTY_CLASS_NAME);
            let name = update.name.clone().unwrap_or_else(|| node.name());
            super::require_name(&name, "definition")?;
            if let Some(script) = &update.script {
                self.rules.compile(script, &kind.context(&name))?;
            }
            if let Some(class_name) = &update.class_name {
                self.catalog.class_node(tx, class_name)?;
            }

            let mut change = ChangeDescriptor::new();
            let texts = [
                (PROPERTY_NAME, update.name.as_deref()),
                (PROPERTY_DESCRIPTION, update.description.as_deref()),
                (PROPERTY_CLASS_NAME, update.class_name.as_deref()),
                (PROPERTY_SCRIPT, update.script.as_deref()),
            ];
            for (key, value) in texts {
                if let Some(value) = value {
                    set_recorded(tx, &node, key, value.into(), &mut change)?;
                }
            }
            if let Some(enabled) = update.enabled {
                set_recorded(tx, &node, PROPERTY_ENABLED, enabled.into(), &mut change)?;
            }

            effects.cache.push(CacheUpdate::RemoveArtifact(old_class, id));
            if kind == DefinitionKind::Validator {
                effects.cache.push(CacheUpdate::ValidatorsChanged);
            }
            change.notes = format!("{} updated", kind.context(&name));
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    fn delete_definition(&self, actor: &str, kind: DefinitionKind, id: NodeId) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = definition_node(tx, kind, id)?;
            tx.detach_delete(node.id)?;
            effects.cache.push(CacheUpdate::RemoveArtifact(
                node.text_or_empty(PROPERTY_CLASS_NAME),
                id,
            ));
            if kind == DefinitionKind::Validator {
                effects.cache.push(CacheUpdate::ValidatorsChanged);
            }
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("{} deleted", kind.context(&node.name()))),
            )
        })
    }

    fn definition_script(
        &self,
        tx: &impl GraphRead,
        kind: DefinitionKind,
        node: &Node,
    ) -> Result<CompiledScript, InventoryError> {
        let key = (node.text_or_empty(PROPERTY_CLASS_NAME), node.id);
        self.cache.get_or_load(
            tx.cache_epoch(),
            |c| c.artifacts.get(&key).cloned(),
            || {
                self.rules
                    .compile(&node.text_or_empty(PROPERTY_SCRIPT), &kind.context(&node.name()))
            },
            |c, script| {
                c.artifacts.insert(key.clone(), script);
            },
        )
    }

    // =========================================================================
    // SCRIPTED QUERY POOLS
    // =========================================================================

    pub fn create_scripted_queries_pool(
        &self,
        actor: &str,
        name: &str,
        description: &str,
    ) -> Result<String, InventoryError> {
        super::require_name(name, "pool")?;
        self.write(|tx, _| {
            let uuid = create_application_pool(tx, LABEL_SCRIPTED_QUERY_POOLS, name, description)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Scripted queries pool {} created", name)),
            )?;
            Ok(uuid)
        })
    }

    pub fn update_scripted_queries_pool(
        &self,
        actor: &str,
        uuid: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<ChangeDescriptor, InventoryError> {
        if let Some(name) = name {
            super::require_name(name, "pool")?;
        }
        self.write(|tx, _| {
            let pool = application_pool_node(tx, LABEL_SCRIPTED_QUERY_POOLS, uuid)?;
            let mut change = ChangeDescriptor::new();
            for (key, value) in [(PROPERTY_NAME, name), (PROPERTY_DESCRIPTION, description)] {
                if let Some(value) = value {
                    set_recorded(tx, &pool, key, value.into(), &mut change)?;
                }
            }
            change.notes = format!("Scripted queries pool {} updated", pool.name());
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    /// Delete the pool with its queries and their parameters.
    pub fn delete_scripted_queries_pool(&self, actor: &str, uuid: &str) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let pool = application_pool_node(tx, LABEL_SCRIPTED_QUERY_POOLS, uuid)?;
            for rel in tx.incoming(pool.id, REL_CHILD_OF)? {
                delete_query_node(tx, rel.start)?;
                effects
                    .cache
                    .push(CacheUpdate::RemoveArtifact(QUERY_ARTIFACT.to_string(), rel.start));
            }
            tx.detach_delete(pool.id)?;
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Scripted queries pool {} deleted", pool.name())),
            )
        })
    }

    pub fn get_scripted_queries_pools(&self) -> Result<Vec<ApplicationPool>, InventoryError> {
        self.read(|tx| {
            let mut pools: Vec<_> = tx
                .nodes(LABEL_SCRIPTED_QUERY_POOLS)?
                .iter()
                .map(application_pool)
                .collect();
            pools.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(pools)
        })
    }

    // =========================================================================
    // SCRIPTED QUERIES
    // =========================================================================

    pub fn create_scripted_query(
        &self,
        actor: &str,
        pool_uuid: &str,
        name: &str,
        description: &str,
        script: &str,
        enabled: bool,
    ) -> Result<String, InventoryError> {
        super::require_name(name, "scripted query")?;
        self.write(|tx, _| {
            let pool = application_pool_node(tx, LABEL_SCRIPTED_QUERY_POOLS, pool_uuid)?;
            let node = tx.create_node(&[LABEL_SCRIPTED_QUERIES])?;
            let uuid = uuid::Uuid::new_v4().to_string();
            tx.set_property(node, PROPERTY_UUID, uuid.as_str().into())?;
            tx.set_property(node, PROPERTY_NAME, name.into())?;
            tx.set_property(node, PROPERTY_DESCRIPTION, description.into())?;
            tx.set_property(node, PROPERTY_SCRIPT, script.into())?;
            tx.set_property(node, PROPERTY_ENABLED, enabled.into())?;
            tx.relate(node, pool.id, REL_CHILD_OF)?;
            self.log_general(
                tx,
                actor,
                ActivityType::CreateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Scripted query {} created", name)),
            )?;
            Ok(uuid)
        })
    }

    pub fn update_scripted_query(
        &self,
        actor: &str,
        uuid: &str,
        update: &ScriptedQueryUpdate,
    ) -> Result<ChangeDescriptor, InventoryError> {
        if let Some(name) = &update.name {
            super::require_name(name, "scripted query")?;
        }
        self.write(|tx, effects| {
            let node = scripted_query_node(tx, uuid)?;
            let mut change = ChangeDescriptor::new();
            let texts = [
                (PROPERTY_NAME, update.name.as_deref()),
                (PROPERTY_DESCRIPTION, update.description.as_deref()),
                (PROPERTY_SCRIPT, update.script.as_deref()),
            ];
            for (key, value) in texts {
                if let Some(value) = value {
                    set_recorded(tx, &node, key, value.into(), &mut change)?;
                }
            }
            if let Some(enabled) = update.enabled {
                set_recorded(tx, &node, PROPERTY_ENABLED, enabled.into(), &mut change)?;
            }
            if update.script.is_some() {
                effects
                    .cache
                    .push(CacheUpdate::RemoveArtifact(QUERY_ARTIFACT.to_string(), node.id));
            }
            change.notes = format!("Scripted query {} updated", node.name());
            self.log_general(tx, actor, ActivityType::UpdateApplicationObject, &change)?;
            Ok(change)
        })
    }

    pub fn delete_scripted_query(&self, actor: &str, uuid: &str) -> Result<(), InventoryError> {
        self.write(|tx, effects| {
            let node = scripted_query_node(tx, uuid)?;
            delete_query_node(tx, node.id)?;
            effects
                .cache
                .push(CacheUpdate::RemoveArtifact(QUERY_ARTIFACT.to_string(), node.id));
            self.log_general(
                tx,
                actor,
                ActivityType::DeleteApplicationObject,
                &ChangeDescriptor::with_notes(format!("Scripted query {} deleted", node.name())),
            )
        })
    }

    pub fn get_scripted_query(&self, uuid: &str) -> Result<ScriptedQuery, InventoryError> {
        self.read(|tx| scripted_query(tx, &scripted_query_node(tx, uuid)?))
    }

    pub fn get_scripted_queries_in_pool(
        &self,
        pool_uuid: &str,
    ) -> Result<Vec<ScriptedQuery>, InventoryError> {
        self.read(|tx| {
            let pool = application_pool_node(tx, LABEL_SCRIPTED_QUERY_POOLS, pool_uuid)?;
            let mut out = Vec::new();
            for rel in tx.incoming(pool.id, REL_CHILD_OF)? {
                out.push(scripted_query(tx, &tx.require_node(rel.start)?)?);
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    pub fn create_scripted_query_parameter(
        &self,
        actor: &str,
        query_uuid: &str,
        parameter: &NewQueryParameter,
    ) -> Result<NodeId, InventoryError> {
        super::require_name(&parameter.name, "parameter")?;
        self.write(|tx, _| {
            let query = scripted_query_node(tx, query_uuid)?;
            let id = tx.create_node(&[LABEL_SCRIPTED_QUERY_PARAMETERS])?;
            tx.set_property(id, PROPERTY_NAME, parameter.name.as_str().into())?;
            tx.set_property(id, PROPERTY_DESCRIPTION, parameter.description.as_str().into())?;
            tx.set_property(id, PROPERTY_TYPE, parameter.param_type.as_str().into())?;
            tx.set_property(id, PROPERTY_MANDATORY, parameter.mandatory.into())?;
            if let Some(default_value) = &parameter.default_value {
                tx.set_property(id, PROPERTY_DEFAULT_VALUE, default_value.as_str().into())?;
            }
            tx.relate(id, query.id, REL_CHILD_OF)?;
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!(
                    "Parameter {} added to scripted query {}",
                    parameter.name,
                    query.name()
                )),
            )?;
            Ok(id)
        })
    }

    pub fn delete_scripted_query_parameter(
        &self,
        actor: &str,
        query_uuid: &str,
        id: NodeId,
    ) -> Result<(), InventoryError> {
        self.write(|tx, _| {
            let query = scripted_query_node(tx, query_uuid)?;
            let rel = tx
                .incoming(query.id, REL_CHILD_OF)?
                .into_iter()
                .find(|rel| rel.start == id)
                .ok_or_else(|| {
                    InventoryError::ApplicationObjectNotFound(
                        ErrorMessage::new(messages::PARAMETER_NOT_FOUND)
                            .arg(id)
                            .arg(query.name()),
                    )
                })?;
            tx.detach_delete(rel.start)?;
            self.log_general(
                tx,
                actor,
                ActivityType::UpdateApplicationObject,
                &ChangeDescriptor::with_notes(format!("Parameter removed from scripted query {}", query.name())),
            )
        })
    }

    /// Run the query with `parameters`, filling in defaults. Mandatory
    /// parameters without a value or default are rejected before the
    /// script runs.
    pub fn execute_scripted_query(
        &self,
        uuid: &str,
        parameters: &BTreeMap<String, String>,
    ) -> Result<ScriptedQueryResult, InventoryError> {
        let (script, bindings) = self.read(|tx| {
            let node = scripted_query_node(tx, uuid)?;
            let query = scripted_query(tx, &node)?;
            if !query.enabled {
                return Err(InventoryError::OperationNotPermitted(
                    ErrorMessage::new(messages::SCRIPTED_QUERY_DISABLED).arg(&query.name),
                ));
            }
            let mut values: BTreeMap<String, ScriptValue> = parameters
                .iter()
                .map(|(k, v)| (k.clone(), ScriptValue::from(v.as_str())))
                .collect();
            for parameter in &query.parameters {
                if values.contains_key(&parameter.name) {
                    continue;
                }
                match &parameter.default_value {
                    Some(default_value) => {
                        values.insert(parameter.name.clone(), ScriptValue::from(default_value.as_str()));
                    }
                    None if parameter.mandatory => {
                        return Err(InventoryError::InvalidArgument(
                            ErrorMessage::new(messages::PARAMETER_MISSING).arg(&parameter.name),
                        ));
                    }
                    None => {}
                }
            }
            let key = (QUERY_ARTIFACT.to_string(), node.id);
            let script = self.cache.get_or_load(
                tx.cache_epoch(),
                |c| c.artifacts.get(&key).cloned(),
                || self.rules.compile(&query.script, &format!("scripted query {}", query.name)),
                |c, script| {
                    c.artifacts.insert(key.clone(), script);
                },
            )?;
            let mut bindings = Bindings::new();
            bindings.insert("parameters".to_string(), ScriptValue::Map(values));
            Ok((script, bindings))
        })?;

        let host = self.read_host(script.context())?;
        let value = self.rules.invoke(&script, host, bindings, &self.budget())?;
        expect_query_result(script.context(), value)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn definition_node(tx: &impl GraphRead, kind: DefinitionKind, id: NodeId) -> Result<Node, InventoryError> {
    match tx.node(id)? {
        Some(node) if node.has_label(kind.label()) => Ok(node),
        _ => Err(kind.not_found(id)),
    }
}

fn filter_definition(node: &Node) -> FilterDefinition {
    FilterDefinition {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        class_name: node.text_or_empty(PROPERTY_CLASS_NAME),
        script: node.text_or_empty(PROPERTY_SCRIPT),
        enabled: node.boolean(PROPERTY_ENABLED),
    }
}

fn validator_definition(node: &Node) -> ValidatorDefinition {
    ValidatorDefinition {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        class_name: node.text_or_empty(PROPERTY_CLASS_NAME),
        script: node.text_or_empty(PROPERTY_SCRIPT),
        enabled: node.boolean(PROPERTY_ENABLED),
    }
}

fn scripted_query_node(tx: &impl GraphRead, uuid: &str) -> Result<Node, InventoryError> {
    tx.node_by_uuid(uuid)?
        .filter(|n| n.has_label(LABEL_SCRIPTED_QUERIES))
        .ok_or_else(|| {
            InventoryError::ApplicationObjectNotFound(
                ErrorMessage::new(messages::SCRIPTED_QUERY_NOT_FOUND).arg(uuid),
            )
        })
}

fn scripted_query(tx: &impl GraphRead, node: &Node) -> Result<ScriptedQuery, InventoryError> {
    let mut parameters = Vec::new();
    for rel in tx.incoming(node.id, REL_CHILD_OF)? {
        let parameter = tx.require_node(rel.start)?;
        parameters.push(ScriptedQueryParameter {
            id: parameter.id,
            name: parameter.name(),
            description: parameter.text_or_empty(PROPERTY_DESCRIPTION),
            param_type: parameter.text_or_empty(PROPERTY_TYPE),
            mandatory: parameter.boolean(PROPERTY_MANDATORY),
            default_value: parameter.text(PROPERTY_DEFAULT_VALUE).map(str::to_string),
        });
    }
    parameters.sort_by_key(|p| p.id);
    Ok(ScriptedQuery {
        uuid: node.uuid().unwrap_or_default().to_string(),
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        script: node.text_or_empty(PROPERTY_SCRIPT),
        enabled: node.boolean(PROPERTY_ENABLED),
        parameters,
    })
}

fn delete_query_node(tx: &impl GraphWrite, query: NodeId) -> Result<(), InventoryError> {
    for rel in tx.incoming(query, REL_CHILD_OF)? {
        tx.detach_delete(rel.start)?;
    }
    tx.detach_delete(query)
}

/// Set a property and record the change when the value differs.
fn set_recorded(
    tx: &impl GraphWrite,
    node: &Node,
    key: &str,
    value: PropertyValue,
    change: &mut ChangeDescriptor,
) -> Result<(), InventoryError> {
    let old = node.property(key);
    if old == Some(&value) {
        return Ok(());
    }
    change.record(key, old.map(PropertyValue::render), Some(value.render()));
    tx.set_property(node.id, key, value)
}

// =============================================================================
// TESTS
// =============================================================================
