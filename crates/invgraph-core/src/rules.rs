//! # Rule Engine
//!
//! Evaluation of user-authored logic:
//! - relationship-by-attribute-value business rules, stored as
//!   `businessRules` nodes and checked before special relationships are
//!   created;
//! - scripts, compiled through a [`ScriptEngine`] and checked against the
//!   return shape their caller expects. `()` and unexpected shapes are
//!   errors, never coerced.

use crate::mapper::EntityMapper;
use crate::messages;
use crate::primitives::*;
use crate::script::{Bindings, CompiledScript, ExecutionBudget, ScriptEngine, ScriptHost, ScriptValue};
use crate::storage::{GraphRead, GraphWrite, Node};
use crate::types::model::{
    BusinessRule, MessageLevel, NewBusinessRule, ResultMessage, ScriptedQueryResult, TaskResult,
};
use crate::types::{ErrorMessage, InventoryError, NodeId, PropertyValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct RuleEngine {
    mapper: EntityMapper,
    engine: Arc<dyn ScriptEngine>,
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine").finish_non_exhaustive()
    }
}

impl RuleEngine {
    pub fn new(mapper: EntityMapper, engine: Arc<dyn ScriptEngine>) -> Self {
        Self { mapper, engine }
    }

    // =========================================================================
    // SCRIPTS
    // =========================================================================

    pub fn compile(&self, source: &str, context: &str) -> Result<CompiledScript, InventoryError> {
        self.engine.compile(source, context)
    }

    pub fn invoke(
        &self,
        script: &CompiledScript,
        host: Arc<dyn ScriptHost>,
        bindings: Bindings,
        budget: &ExecutionBudget,
    ) -> Result<ScriptValue, InventoryError> {
        let started = std::time::Instant::now();
        let result = self.engine.invoke(script, host, bindings, budget);
        tracing::debug!(
            event = "script_invoked",
            context = script.context(),
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        result
    }

    // =========================================================================
    // BUSINESS RULES
    // =========================================================================

    pub fn create_business_rule(
        &self,
        tx: &impl GraphWrite,
        rule: &NewBusinessRule,
    ) -> Result<NodeId, InventoryError> {
        if rule.name.is_empty() {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::NAME_EMPTY).arg("business rule"),
            ));
        }
        if rule.rule_type < 1 || rule.scope < 1 || rule.applies_to.is_empty() {
            return Err(InventoryError::InvalidArgument(
                ErrorMessage::new(messages::RULE_INVALID).arg(&rule.name),
            ));
        }
        if rule.constraints.is_empty() {
            return Err(InventoryError::InvalidArgument(ErrorMessage::new(
                messages::RULE_NO_CONSTRAINTS,
            )));
        }
        self.mapper.catalog().class_node(tx, &rule.applies_to)?;

        let id = tx.create_node(&[LABEL_BUSINESS_RULES])?;
        tx.set_property(id, PROPERTY_NAME, rule.name.as_str().into())?;
        tx.set_property(id, PROPERTY_DESCRIPTION, rule.description.as_str().into())?;
        tx.set_property(id, PROPERTY_TYPE, rule.rule_type.into())?;
        tx.set_property(id, PROPERTY_SCOPE, rule.scope.into())?;
        tx.set_property(id, PROPERTY_APPLIES_TO, rule.applies_to.as_str().into())?;
        tx.set_property(id, PROPERTY_VERSION, rule.version.as_str().into())?;
        tx.set_property(
            id,
            PROPERTY_CONSTRAINTS,
            PropertyValue::TextList(rule.constraints.clone()),
        )?;
        Ok(id)
    }

    pub fn delete_business_rule(&self, tx: &impl GraphWrite, id: NodeId) -> Result<(), InventoryError> {
        let node = rule_node(tx, id)?;
        tx.detach_delete(node.id)
    }

    /// Rules in storage order, optionally of one type.
    pub fn get_business_rules(
        &self,
        tx: &impl GraphRead,
        rule_type: Option<i64>,
    ) -> Result<Vec<BusinessRule>, InventoryError> {
        Ok(tx
            .nodes(LABEL_BUSINESS_RULES)?
            .iter()
            .map(business_rule)
            .filter(|r| rule_type.is_none_or(|t| r.rule_type == t))
            .collect())
    }

    /// Check whether the source object may be related to the target.
    ///
    /// The rule constraints are `[target class, source attribute, target
    /// attribute, source value, target value]`. The first rule applying to
    /// the source class that names another target class rejects the pair;
    /// an empty value constraint accepts any pair; a rule whose source
    /// value matches decides on the target value. Without a deciding rule
    /// the pair is rejected.
    pub fn check_relationship_by_attribute_value(
        &self,
        tx: &impl GraphRead,
        source_class: &str,
        source_uuid: &str,
        target_class: &str,
        target_uuid: &str,
    ) -> Result<(), InventoryError> {
        let rules = self.get_business_rules(tx, Some(RULE_TYPE_RELATIONSHIP_BY_ATTRIBUTE_VALUE))?;
        for rule in rules.iter().filter(|r| r.applies_to == source_class) {
            let [target, source_attr, target_attr, source_value, target_value] =
                constraints(rule)?;
            if target != target_class {
                return Err(InventoryError::BusinessRuleViolation(
                    ErrorMessage::new(messages::RULE_CLASS_MISMATCH)
                        .arg(source_class)
                        .arg(target_class),
                ));
            }
            if source_value.is_empty() || target_value.is_empty() {
                return Ok(());
            }
            let source = self.mapper.object_node(tx, source_class, source_uuid)?;
            if self.attribute_text(tx, &source, source_class, source_attr)? != *source_value {
                continue;
            }
            let target = self.mapper.object_node(tx, target_class, target_uuid)?;
            if self.attribute_text(tx, &target, target_class, target_attr)? != *target_value {
                return Err(InventoryError::BusinessRuleViolation(
                    ErrorMessage::new(messages::RULE_VALUE_MISMATCH)
                        .arg(target_attr)
                        .arg(target_class)
                        .arg(source_attr)
                        .arg(source_class),
                ));
            }
            return Ok(());
        }
        Err(InventoryError::BusinessRuleViolation(
            ErrorMessage::new(messages::RULE_NO_MATCH)
                .arg(source_class)
                .arg(target_class),
        ))
    }

    /// Attribute value as compared by rules. List types compare by item name.
    fn attribute_text(
        &self,
        tx: &impl GraphRead,
        node: &Node,
        class_name: &str,
        attribute: &str,
    ) -> Result<String, InventoryError> {
        let class = self.mapper.catalog().get_class(tx, class_name)?;
        match class.attribute(attribute) {
            Some(attr) if !attr.attribute_type.is_primitive() => Ok(self
                .mapper
                .reference_names(tx, node.id, attribute)?
                .join(";")),
            _ => Ok(node
                .property(attribute)
                .map(PropertyValue::render)
                .unwrap_or_default()),
        }
    }
}

fn rule_node(tx: &impl GraphRead, id: NodeId) -> Result<Node, InventoryError> {
    match tx.node(id)? {
        Some(node) if node.has_label(LABEL_BUSINESS_RULES) => Ok(node),
        _ => Err(InventoryError::ApplicationObjectNotFound(
            ErrorMessage::new(messages::RULE_NOT_FOUND).arg(id),
        )),
    }
}

fn business_rule(node: &Node) -> BusinessRule {
    BusinessRule {
        id: node.id,
        name: node.name(),
        description: node.text_or_empty(PROPERTY_DESCRIPTION),
        rule_type: node.integer(PROPERTY_TYPE).unwrap_or(0),
        scope: node.integer(PROPERTY_SCOPE).unwrap_or(0),
        applies_to: node.text_or_empty(PROPERTY_APPLIES_TO),
        version: node.text_or_empty(PROPERTY_VERSION),
        constraints: node
            .property(PROPERTY_CONSTRAINTS)
            .and_then(PropertyValue::as_text_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
    }
}

fn constraints(rule: &BusinessRule) -> Result<[&String; RULE_RELATIONSHIP_CONSTRAINTS], InventoryError> {
    let c = &rule.constraints;
    match (c.first(), c.get(1), c.get(2), c.get(3), c.get(4)) {
        (Some(a), Some(b), Some(d), Some(e), Some(f)) => Ok([a, b, d, e, f]),
        _ => Err(InventoryError::InvalidArgument(
            ErrorMessage::new(messages::RULE_MALFORMED)
                .arg(&rule.name)
                .arg(c.len() + 1),
        )),
    }
}

// =============================================================================
// RESULT SHAPES
// =============================================================================

fn null_result(context: &str) -> InventoryError {
    InventoryError::InvalidArgument(ErrorMessage::new(messages::SCRIPT_NULL_RESULT).arg(context))
}

fn wrong_shape(context: &str, expected: &str) -> InventoryError {
    InventoryError::InvalidArgument(
        ErrorMessage::new(messages::SCRIPT_RESULT_TYPE)
            .arg(context)
            .arg(expected),
    )
}

/// Filter predicates return a boolean.
pub fn expect_bool(context: &str, value: ScriptValue) -> Result<bool, InventoryError> {
    match value {
        ScriptValue::Unit => Err(null_result(context)),
        ScriptValue::Bool(b) => Ok(b),
        _ => Err(wrong_shape(context, "a boolean")),
    }
}

/// Tasks return `#{ messages: [#{ level, text }] }`.
pub fn expect_task_result(context: &str, value: ScriptValue) -> Result<TaskResult, InventoryError> {
    const SHAPE: &str = "#{ messages: [#{ level, text }] }";
    if value == ScriptValue::Unit {
        return Err(null_result(context));
    }
    let messages = value
        .as_map()
        .and_then(|m| m.get("messages"))
        .and_then(ScriptValue::as_array)
        .ok_or_else(|| wrong_shape(context, SHAPE))?;
    let mut result = TaskResult::default();
    for message in messages {
        let entry = message.as_map().ok_or_else(|| wrong_shape(context, SHAPE))?;
        let level = match entry.get("level").and_then(ScriptValue::render).as_deref() {
            Some("info" | "information") => MessageLevel::Information,
            Some("warning") => MessageLevel::Warning,
            Some("error") => MessageLevel::Error,
            _ => return Err(wrong_shape(context, SHAPE)),
        };
        let text = entry
            .get("text")
            .and_then(ScriptValue::render)
            .ok_or_else(|| wrong_shape(context, SHAPE))?;
        result.messages.push(ResultMessage { level, text });
    }
    Ok(result)
}

/// Validators return `false` when they do not fire, or the properties of
/// the fired validator.
pub fn expect_validator(
    context: &str,
    value: ScriptValue,
) -> Result<Option<BTreeMap<String, String>>, InventoryError> {
    const SHAPE: &str = "false or a map of properties";
    match value {
        ScriptValue::Unit => Err(null_result(context)),
        ScriptValue::Bool(false) => Ok(None),
        ScriptValue::Map(entries) => {
            let mut properties = BTreeMap::new();
            for (key, value) in entries {
                let text = value.render().ok_or_else(|| wrong_shape(context, SHAPE))?;
                properties.insert(key, text);
            }
            Ok(Some(properties))
        }
        _ => Err(wrong_shape(context, SHAPE)),
    }
}

/// Scripted queries return `#{ columns: [..], rows: [[..]] }`.
pub fn expect_query_result(
    context: &str,
    value: ScriptValue,
) -> Result<ScriptedQueryResult, InventoryError> {
    const SHAPE: &str = "#{ columns: [..], rows: [[..]] }";
    if value == ScriptValue::Unit {
        return Err(null_result(context));
    }
    let map = value.as_map().ok_or_else(|| wrong_shape(context, SHAPE))?;
    let texts = |items: &[ScriptValue]| -> Result<Vec<String>, InventoryError> {
        items
            .iter()
            .map(|v| v.render().ok_or_else(|| wrong_shape(context, SHAPE)))
            .collect()
    };
    let columns = map
        .get("columns")
        .and_then(ScriptValue::as_array)
        .ok_or_else(|| wrong_shape(context, SHAPE))?;
    let rows = map
        .get("rows")
        .and_then(ScriptValue::as_array)
        .ok_or_else(|| wrong_shape(context, SHAPE))?;
    let mut result = ScriptedQueryResult {
        columns: texts(columns)?,
        rows: Vec::with_capacity(rows.len()),
    };
    for row in rows {
        let cells = row.as_array().ok_or_else(|| wrong_shape(context, SHAPE))?;
        if cells.len() != result.columns.len() {
            return Err(wrong_shape(context, SHAPE));
        }
        result.rows.push(texts(cells)?);
    }
    Ok(result)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;
    use crate::schema::{SchemaCatalog, create_core_classes};
    use crate::script::RhaiEngine;
    use crate::storage::{GraphDb, WriteTx};
    use crate::types::AttributeValue;
    use crate::types::model::{AttributeChanges, AttributeDefinition, AttributeType, ClassDefinition};

    struct Fixture {
        db: GraphDb,
        rules: RuleEngine,
        mapper: EntityMapper,
    }

    fn fixture() -> Fixture {
        let db = GraphDb::in_memory().expect("open db");
        let catalog = SchemaCatalog::new(Arc::new(CacheLayer::new()));
        let mapper = EntityMapper::new(catalog.clone());
        let tx = db.begin_write().expect("begin");
        let mut u = Vec::new();
        create_core_classes(&catalog, &tx, &mut u).expect("core");
        catalog
            .create_class(&tx, &ClassDefinition::new("LinkType", CLASS_GENERIC_OBJECT_LIST), &mut u)
            .expect("class");
        for name in ["Link", "Port"] {
            catalog
                .create_class(&tx, &ClassDefinition::new(name, CLASS_INVENTORY_OBJECT), &mut u)
                .expect("class");
        }
        catalog
            .create_attribute(
                &tx,
                "Link",
                &AttributeDefinition::new("linkType", AttributeType::ListType("LinkType".into())),
                &mut u,
            )
            .expect("attribute");
        catalog
            .create_attribute(&tx, "Port", &AttributeDefinition::new("medium", AttributeType::String), &mut u)
            .expect("attribute");
        tx.commit().expect("commit");
        let rules = RuleEngine::new(mapper.clone(), Arc::new(RhaiEngine::new()));
        Fixture { db, rules, mapper }
    }

    fn object(f: &Fixture, tx: &WriteTx, class: &str, attrs: &[(&str, AttributeValue)]) -> String {
        let class = f.mapper.catalog().get_class(tx, class).expect("class");
        let mut changes = AttributeChanges::new();
        for (name, value) in attrs {
            changes.insert(name.to_string(), Some(value.clone()));
        }
        let label = if class.parent.as_deref() == Some(CLASS_GENERIC_OBJECT_LIST) {
            LABEL_LIST_TYPE_ITEMS
        } else {
            LABEL_INVENTORY_OBJECTS
        };
        f.mapper
            .create_instance(tx, &class, false, label, &changes)
            .expect("create")
            .1
    }

    fn rule(target: &str, source_value: &str, target_value: &str) -> NewBusinessRule {
        NewBusinessRule::relationship_by_attribute_value(
            "fiber", "Link", target, "linkType", "medium", source_value, target_value,
        )
    }

    #[test]
    fn list_type_values_compare_by_name() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let fiber = object(&f, &tx, "LinkType", &[("name", AttributeValue::Text("Fiber".into()))]);
        let link = object(&f, &tx, "Link", &[("linkType", AttributeValue::reference(&fiber))]);
        let optical = object(&f, &tx, "Port", &[("medium", AttributeValue::Text("optical".into()))]);
        let copper = object(&f, &tx, "Port", &[("medium", AttributeValue::Text("copper".into()))]);
        f.rules.create_business_rule(&tx, &rule("Port", "Fiber", "optical")).expect("rule");

        f.rules
            .check_relationship_by_attribute_value(&tx, "Link", &link, "Port", &optical)
            .expect("allowed");
        let err = f
            .rules
            .check_relationship_by_attribute_value(&tx, "Link", &link, "Port", &copper)
            .expect_err("rejected");
        assert_eq!(err.key(), Some(messages::RULE_VALUE_MISMATCH));
    }

    #[test]
    fn first_applicable_rule_with_other_target_rejects() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let link = object(&f, &tx, "Link", &[]);
        let port = object(&f, &tx, "Port", &[]);
        f.rules.create_business_rule(&tx, &rule("Link", "", "")).expect("rule");
        f.rules.create_business_rule(&tx, &rule("Port", "", "")).expect("rule");
        let err = f
            .rules
            .check_relationship_by_attribute_value(&tx, "Link", &link, "Port", &port)
            .expect_err("class mismatch");
        assert!(matches!(err, InventoryError::BusinessRuleViolation(_)));
        assert_eq!(err.key(), Some(messages::RULE_CLASS_MISMATCH));
    }

    #[test]
    fn empty_constraint_values_are_wildcards_and_absence_denies() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let link = object(&f, &tx, "Link", &[]);
        let port = object(&f, &tx, "Port", &[]);
        let err = f
            .rules
            .check_relationship_by_attribute_value(&tx, "Link", &link, "Port", &port)
            .expect_err("no rule");
        assert_eq!(err.key(), Some(messages::RULE_NO_MATCH));
        let id = f.rules.create_business_rule(&tx, &rule("Port", "", "optical")).expect("rule");
        f.rules
            .check_relationship_by_attribute_value(&tx, "Link", &link, "Port", &port)
            .expect("wildcard");
        f.rules.delete_business_rule(&tx, id).expect("delete");
        assert!(f.rules.get_business_rules(&tx, None).expect("rules").is_empty());
    }

    #[test]
    fn rules_need_constraints() {
        let f = fixture();
        let tx = f.db.begin_write().expect("begin");
        let mut bad = rule("Port", "", "");
        bad.constraints.clear();
        let err = f.rules.create_business_rule(&tx, &bad).expect_err("no constraints");
        assert_eq!(err.key(), Some(messages::RULE_NO_CONSTRAINTS));
    }

    #[test]
    fn result_shapes_are_strict() {
        assert!(expect_bool("f", ScriptValue::Bool(true)).expect("bool"));
        let err = expect_bool("f", ScriptValue::Unit).expect_err("null");
        assert_eq!(err.key(), Some(messages::SCRIPT_NULL_RESULT));
        let err = expect_bool("f", ScriptValue::Int(1)).expect_err("not bool");
        assert_eq!(err.key(), Some(messages::SCRIPT_RESULT_TYPE));

        let mut message = BTreeMap::new();
        message.insert("level".to_string(), ScriptValue::from("warning"));
        message.insert("text".to_string(), ScriptValue::from("careful"));
        let mut task = BTreeMap::new();
        task.insert(
            "messages".to_string(),
            ScriptValue::Array(vec![ScriptValue::Map(message)]),
        );
        let result = expect_task_result("t", ScriptValue::Map(task)).expect("task");
        assert_eq!(result.messages[0].level, MessageLevel::Warning);
        assert!(!result.has_errors());

        assert_eq!(expect_validator("v", ScriptValue::Bool(false)).expect("validator"), None);
        assert!(expect_validator("v", ScriptValue::Bool(true)).is_err());
    }

    #[test]
    fn query_rows_must_match_columns() {
        let mut map = BTreeMap::new();
        map.insert(
            "columns".to_string(),
            ScriptValue::Array(vec!["name".into(), "count".into()]),
        );
        map.insert(
            "rows".to_string(),
            ScriptValue::Array(vec![ScriptValue::Array(vec!["a".into(), ScriptValue::Int(2)])]),
        );
        let result = expect_query_result("q", ScriptValue::Map(map.clone())).expect("query");
        assert_eq!(result.rows, vec![vec!["a".to_string(), "2".to_string()]]);

        map.insert(
            "rows".to_string(),
            ScriptValue::Array(vec![ScriptValue::Array(vec!["a".into()])]),
        );
        assert!(expect_query_result("q", ScriptValue::Map(map)).is_err());
    }
}
