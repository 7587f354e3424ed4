//! # Message Catalog
//!
//! Stable message keys carried by every `InventoryError`, and the English
//! catalog used to render them. Presentation layers supply their own
//! [`MessageCatalog`] for other languages; control flow only ever looks at
//! the key.

/// Translates a message key with positional arguments (`{0}`, `{1}`, ...).
pub trait MessageCatalog {
    fn translate(&self, key: &str, args: &[String]) -> String;
}

// =============================================================================
// KEYS: SCHEMA
// =============================================================================

pub const CLASS_NOT_FOUND: &str = "metadata.class.not_found";
pub const CLASS_EXISTS: &str = "metadata.class.exists";
pub const CLASS_NAME_INVALID: &str = "metadata.class.name_invalid";
pub const CLASS_ABSTRACT: &str = "metadata.class.abstract";
pub const CLASS_IN_DESIGN: &str = "metadata.class.in_design";
pub const CLASS_CORE: &str = "metadata.class.core";
pub const CLASS_HAS_INSTANCES: &str = "metadata.class.has_instances";
pub const CLASS_HAS_SUBCLASSES: &str = "metadata.class.has_subclasses";
pub const NOT_SUBCLASS: &str = "metadata.class.not_subclass";
pub const ATTRIBUTE_NOT_FOUND: &str = "metadata.attribute.not_found";
pub const ATTRIBUTE_EXISTS: &str = "metadata.attribute.exists";
pub const ATTRIBUTE_NAME_INVALID: &str = "metadata.attribute.name_invalid";
pub const ATTRIBUTE_CORE: &str = "metadata.attribute.core";
pub const NOT_POSSIBLE_CHILD: &str = "metadata.class.not_possible_child";
pub const NOT_POSSIBLE_SPECIAL_CHILD: &str = "metadata.class.not_possible_special_child";

// =============================================================================
// KEYS: OBJECTS & INTEGRITY
// =============================================================================

pub const OBJECT_NOT_FOUND: &str = "object.not_found";
pub const OBJECT_UUID_NOT_FOUND: &str = "object.uuid.not_found";
pub const ATTRIBUTE_MANDATORY: &str = "object.attribute.mandatory";
pub const ATTRIBUTE_UNIQUE: &str = "object.attribute.unique";
pub const ATTRIBUTE_READ_ONLY: &str = "object.attribute.read_only";
pub const ATTRIBUTE_UNDECLARED: &str = "object.attribute.undeclared";
pub const VALUE_TYPE_MISMATCH: &str = "object.value.type_mismatch";
pub const VALUE_UNPARSABLE: &str = "object.value.unparsable";
pub const LIST_TYPE_REFERENCE_INVALID: &str = "object.value.list_type_item";
pub const SINGLE_SELECTION: &str = "object.value.single_selection";
pub const DELETE_PROTECTED: &str = "object.delete.protected";
pub const RELATIONSHIP_NOT_FOUND: &str = "object.relationship.not_found";
pub const UNTAGGED_RELATIONSHIP: &str = "integrity.relationship.untagged";
pub const UNDECLARED_TAG: &str = "integrity.relationship.undeclared";
pub const CLASS_MEMBERSHIP: &str = "integrity.class_membership";
pub const PROPERTY_TYPE: &str = "integrity.property.type";
pub const HIERARCHY_CYCLE: &str = "integrity.hierarchy.cycle";
pub const SPECIAL_NODE_MISSING: &str = "integrity.special_node";
pub const ALREADY_INITIALIZED: &str = "integrity.already_initialized";
pub const NAME_EMPTY: &str = "common.name.empty";
pub const PROCESS_INSTANCE_NOT_FOUND: &str = "process_instance.not_found";

// =============================================================================
// KEYS: POOLS, TEMPLATES, NAME PATTERNS, LIST TYPES
// =============================================================================

pub const POOL_NOT_FOUND: &str = "pool.not_found";
pub const APPLICATION_POOL_NOT_FOUND: &str = "pool.application.not_found";
pub const POOL_CLASS_MISMATCH: &str = "pool.class.mismatch";
pub const TEMPLATE_NOT_FOUND: &str = "template.not_found";
pub const ARRAY_SIZE_MISMATCH: &str = "template.array_size";
pub const PATTERN_INVALID: &str = "pattern.invalid";
pub const PATTERN_TOO_SHORT: &str = "pattern.too_short";
pub const LIST_TYPE_ITEM_NOT_FOUND: &str = "listtype.item.not_found";
pub const LIST_TYPE_NAME_NOT_FOUND: &str = "listtype.item.name_not_found";
pub const NOT_A_LIST_TYPE: &str = "listtype.class.invalid";
pub const LIST_TYPE_ITEM_IN_USE: &str = "listtype.item.in_use";

// =============================================================================
// KEYS: VIEWS & FILES
// =============================================================================

pub const VIEW_NOT_FOUND: &str = "view.not_found";
pub const FILE_NOT_FOUND: &str = "file.not_found";
pub const FILE_TOO_LARGE: &str = "file.too_large";

// =============================================================================
// KEYS: USERS, GROUPS, SESSIONS
// =============================================================================

pub const USER_NOT_FOUND: &str = "user.not_found";
pub const USER_NAME_INVALID: &str = "user.name.invalid";
pub const USER_EXISTS: &str = "user.exists";
pub const PASSWORD_EMPTY: &str = "user.password.empty";
pub const SYSTEM_USER: &str = "user.system";
pub const ADMIN_PROTECTED: &str = "user.admin";
pub const ORPHAN_USER: &str = "user.orphan";
pub const ALREADY_MEMBER: &str = "user.already_member";
pub const NOT_MEMBER: &str = "user.not_member";
pub const GROUP_NOT_FOUND: &str = "group.not_found";
pub const GROUP_NAME_INVALID: &str = "group.name.invalid";
pub const GROUP_EXISTS: &str = "group.exists";
pub const GROUP_HOLDS_ADMIN: &str = "group.admin";
pub const PRIVILEGE_NOT_FOUND: &str = "privilege.not_found";
pub const BAD_CREDENTIALS: &str = "session.credentials";
pub const USER_DISABLED: &str = "session.user_disabled";
pub const SESSION_NOT_FOUND: &str = "session.not_found";
pub const SESSION_INVALID: &str = "session.invalid";
pub const USER_HAS_SESSIONS: &str = "user.has_sessions";

// =============================================================================
// KEYS: CONFIGURATION VARIABLES
// =============================================================================

pub const CONFIG_VARIABLE_NOT_FOUND: &str = "config.variable.not_found";
pub const CONFIG_VARIABLE_EXISTS: &str = "config.variable.exists";
pub const CONFIG_TYPE_INVALID: &str = "config.type.invalid";
pub const CONFIG_VALUE_INVALID: &str = "config.value.invalid";
pub const CONFIG_PROPERTY_INVALID: &str = "config.property.invalid";

// =============================================================================
// KEYS: SCRIPTS, TASKS, QUERIES, RULES
// =============================================================================

pub const SCRIPT_COMPILE: &str = "script.compile";
pub const SCRIPT_RUNTIME: &str = "script.runtime";
pub const SCRIPT_NULL_RESULT: &str = "script.result.null";
pub const SCRIPT_RESULT_TYPE: &str = "script.result.type";
pub const SCRIPT_BUDGET: &str = "script.budget";
pub const SCRIPT_CANCELLED: &str = "script.cancelled";
pub const SCRIPT_READ_ONLY: &str = "script.read_only";
pub const TASK_NOT_FOUND: &str = "task.not_found";
pub const TASK_NO_SCRIPT: &str = "task.no_script";
pub const TASK_DISABLED: &str = "task.disabled";
pub const TASK_PROPERTY_INVALID: &str = "task.property.invalid";
pub const ALREADY_SUBSCRIBED: &str = "task.already_subscribed";
pub const NOT_SUBSCRIBED: &str = "task.not_subscribed";
pub const FILTER_NOT_FOUND: &str = "filter.not_found";
pub const VALIDATOR_NOT_FOUND: &str = "validator.not_found";
pub const QUERY_NOT_FOUND: &str = "query.not_found";
pub const SCRIPTED_QUERY_NOT_FOUND: &str = "query.scripted.not_found";
pub const SCRIPTED_QUERY_DISABLED: &str = "query.scripted.disabled";
pub const PARAMETER_MISSING: &str = "query.parameter.missing";
pub const PARAMETER_NOT_FOUND: &str = "query.parameter.not_found";
pub const DEFINITION_DISABLED: &str = "script.definition.disabled";
pub const FILTER_CLASS_MISMATCH: &str = "filter.class_mismatch";
pub const RULE_INVALID: &str = "rule.invalid";
pub const RULE_NO_CONSTRAINTS: &str = "rule.no_constraints";
pub const RULE_NOT_FOUND: &str = "rule.not_found";
pub const RULE_MALFORMED: &str = "rule.malformed";
pub const RULE_CLASS_MISMATCH: &str = "rule.class_mismatch";
pub const RULE_VALUE_MISMATCH: &str = "rule.value_mismatch";
pub const RULE_NO_MATCH: &str = "rule.no_match";
pub const ARGUMENT_MALFORMED: &str = "argument.malformed";

// =============================================================================
// ENGLISH CATALOG
// =============================================================================

/// Built-in catalog used by `Display`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishCatalog;

impl EnglishCatalog {
    fn template(key: &str) -> Option<&'static str> {
        let template = match key {
            CLASS_NOT_FOUND => "Class {0} could not be found",
            CLASS_EXISTS => "A class named {0} already exists",
            CLASS_NAME_INVALID => "{0} is not a valid class name",
            CLASS_ABSTRACT => "Class {0} is abstract and can not be instantiated",
            CLASS_IN_DESIGN => "Class {0} is in design and can not be instantiated",
            CLASS_CORE => "Class {0} is part of the core model and can not be modified",
            CLASS_HAS_INSTANCES => "Class {0} has instances and can not be deleted",
            CLASS_HAS_SUBCLASSES => "Class {0} has subclasses and can not be deleted",
            NOT_SUBCLASS => "Class {0} is not a subclass of {1}",
            ATTRIBUTE_NOT_FOUND => "Attribute {0} could not be found in class {1}",
            ATTRIBUTE_EXISTS => "Class {0} already has an attribute named {1}",
            ATTRIBUTE_NAME_INVALID => "{0} is not a valid attribute name",
            ATTRIBUTE_CORE => "Attribute {0} is part of the core model and can not be deleted",
            NOT_POSSIBLE_CHILD => "An instance of {0} can not be a child of an instance of {1}",
            NOT_POSSIBLE_SPECIAL_CHILD => {
                "An instance of {0} can not be a special child of an instance of {1}"
            }
            OBJECT_NOT_FOUND => "Object of class {0} with id {1} could not be found",
            OBJECT_UUID_NOT_FOUND => "No object with id {0} could be found",
            ATTRIBUTE_MANDATORY => "Attribute {0} of class {1} is mandatory",
            ATTRIBUTE_UNIQUE => "Value {0} of attribute {1} is already in use in class {2}",
            ATTRIBUTE_READ_ONLY => "Attribute {0} of class {1} is read only",
            ATTRIBUTE_UNDECLARED => "Class {0} has no attribute {1}",
            VALUE_TYPE_MISMATCH => "Attribute {0} expects {1}, got {2}",
            VALUE_UNPARSABLE => "Value {0} can not be converted to {1}",
            LIST_TYPE_REFERENCE_INVALID => "{0} is not an item of list type {1}",
            SINGLE_SELECTION => "Attribute {0} accepts a single list type item",
            DELETE_PROTECTED => "Object {0} has relationships that prevent its deletion",
            RELATIONSHIP_NOT_FOUND => "No {0} relationship between {1} and {2}",
            UNTAGGED_RELATIONSHIP => "A relationship of object {0} lacks its attribute name",
            UNDECLARED_TAG => {
                "Object {0} is related through {1}, which is not an attribute of class {2}"
            }
            CLASS_MEMBERSHIP => "Node {0} does not have exactly one class membership",
            PROPERTY_TYPE => "Stored value of {0} in {1} does not match its declared type {2}",
            HIERARCHY_CYCLE => "Node {0} was reached twice while traversing a hierarchy",
            SPECIAL_NODE_MISSING => "Special node {0} is missing. The database is not initialized",
            ALREADY_INITIALIZED => "The database is already initialized",
            NAME_EMPTY => "The name of the {0} can not be empty",
            PROCESS_INSTANCE_NOT_FOUND => "Process instance {0} could not be found",
            POOL_NOT_FOUND => "Pool {0} could not be found",
            APPLICATION_POOL_NOT_FOUND => "Pool {0} could not be found",
            POOL_CLASS_MISMATCH => "Pool {0} only accepts instances of {1}",
            TEMPLATE_NOT_FOUND => "Template element of class {0} with id {1} could not be found",
            ARRAY_SIZE_MISMATCH => "Got {0} attribute names and {1} values",
            PATTERN_INVALID => "Invalid name pattern {0}",
            PATTERN_TOO_SHORT => "The name pattern yields {0} names, {1} were requested",
            LIST_TYPE_ITEM_NOT_FOUND => "List type item {1} of class {0} could not be found",
            LIST_TYPE_NAME_NOT_FOUND => "List type {0} has no item named {1}",
            NOT_A_LIST_TYPE => "Class {0} is not a list type",
            LIST_TYPE_ITEM_IN_USE => "List type item {0} is still referenced by other objects",
            VIEW_NOT_FOUND => "View {0} could not be found",
            FILE_NOT_FOUND => "File {0} could not be found",
            FILE_TOO_LARGE => "File {0} exceeds the maximum size of {1} bytes",
            USER_NOT_FOUND => "User {0} could not be found",
            USER_NAME_INVALID => "User name {0} contains invalid characters",
            USER_EXISTS => "User name {0} already exists",
            PASSWORD_EMPTY => "The password can not be empty",
            SYSTEM_USER => "User {0} is a system user and can not be modified",
            ADMIN_PROTECTED => "The default administrator can not be deleted",
            ORPHAN_USER => {
                "User {0} can not be removed from group {1}: it would not belong to any group"
            }
            ALREADY_MEMBER => "User {0} already belongs to group {1}",
            NOT_MEMBER => "User {0} does not belong to group {1}",
            GROUP_NOT_FOUND => "Group {0} could not be found",
            GROUP_NAME_INVALID => "Group name {0} contains invalid characters",
            GROUP_EXISTS => "Group name {0} already exists",
            GROUP_HOLDS_ADMIN => "Group {0} holds the default administrator and can not be deleted",
            PRIVILEGE_NOT_FOUND => "Privilege {0} is not set for {1}",
            BAD_CREDENTIALS => "User or password incorrect",
            USER_DISABLED => "User {0} is not enabled",
            SESSION_NOT_FOUND => "Session {0} does not exist",
            SESSION_INVALID => "The session is not valid for user {0}",
            USER_HAS_SESSIONS => "User {0} has open sessions and can not be deleted",
            CONFIG_VARIABLE_NOT_FOUND => "Configuration variable {0} could not be found",
            CONFIG_VARIABLE_EXISTS => "There is already a configuration variable named {0}",
            CONFIG_TYPE_INVALID => "The specified type ({0}) is not valid",
            CONFIG_VALUE_INVALID => "Value of configuration variable {0} ({1}) can not be converted to {2}",
            CONFIG_PROPERTY_INVALID => "Invalid configuration variable property: {0}",
            SCRIPT_COMPILE => "Script {0} could not be compiled: {1}",
            SCRIPT_RUNTIME => "Script {0} failed: {1}",
            SCRIPT_NULL_RESULT => "Script {0} returned no value",
            SCRIPT_RESULT_TYPE => "Script {0} must return {1}",
            SCRIPT_BUDGET => "Script {0} exceeded its execution budget",
            SCRIPT_CANCELLED => "Script {0} was cancelled",
            SCRIPT_READ_ONLY => "Script {0} can not modify the inventory",
            TASK_NOT_FOUND => "Task {0} could not be found",
            TASK_NO_SCRIPT => "Task {0} does not have a script",
            TASK_DISABLED => "Task {0} is disabled",
            TASK_PROPERTY_INVALID => "Invalid task property: {0}",
            ALREADY_SUBSCRIBED => "User {0} is already subscribed to task {1}",
            NOT_SUBSCRIBED => "User {0} is not subscribed to task {1}",
            FILTER_NOT_FOUND => "Filter definition {0} could not be found",
            VALIDATOR_NOT_FOUND => "Validator definition {0} could not be found",
            QUERY_NOT_FOUND => "Query {0} could not be found",
            SCRIPTED_QUERY_NOT_FOUND => "Scripted query {0} could not be found",
            SCRIPTED_QUERY_DISABLED => "Scripted query {0} is disabled",
            PARAMETER_MISSING => "Mandatory parameter {0} is missing",
            PARAMETER_NOT_FOUND => "Parameter {0} of scripted query {1} could not be found",
            DEFINITION_DISABLED => "Definition {0} is disabled",
            FILTER_CLASS_MISMATCH => "Filter {0} does not apply to objects of class {1}",
            RULE_INVALID => "Invalid business rule: {0}",
            RULE_NO_CONSTRAINTS => "The rule must have at least one constraint",
            RULE_NOT_FOUND => "Business rule {0} could not be found",
            RULE_MALFORMED => "Business rule {0} lacks constraint {1}",
            RULE_CLASS_MISMATCH => "Objects of class {0} can not be connected to objects of class {1}",
            RULE_VALUE_MISMATCH => "Value of {0} in {1} does not match {2} in {3}",
            RULE_NO_MATCH => "No matching rule was found for {0} and {1}",
            ARGUMENT_MALFORMED => "Argument {0} must have the form {1}",
            _ => return None,
        };
        Some(template)
    }
}

impl MessageCatalog for EnglishCatalog {
    fn translate(&self, key: &str, args: &[String]) -> String {
        match Self::template(key) {
            Some(template) => fill(template, args),
            None if args.is_empty() => key.to_string(),
            None => format!("{} [{}]", key, args.join(", ")),
        }
    }
}

/// Substitute `{n}` placeholders. Placeholders without an argument stay as is.
pub fn fill(template: &str, args: &[String]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", i), arg);
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_positional_arguments() {
        let text = EnglishCatalog.translate(NOT_SUBCLASS, &["Router".into(), "GenericPort".into()]);
        assert_eq!(text, "Class Router is not a subclass of GenericPort");
    }

    #[test]
    fn unknown_key_falls_back_to_key() {
        assert_eq!(EnglishCatalog.translate("x.y", &[]), "x.y");
        assert_eq!(EnglishCatalog.translate("x.y", &["a".into()]), "x.y [a]");
    }

    #[test]
    fn missing_argument_keeps_placeholder() {
        assert_eq!(fill("{0} and {1}", &["a".into()]), "a and {1}");
    }
}
