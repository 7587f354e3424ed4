//! # Primitives
//!
//! Node labels, relationship types, property keys and limits shared by
//! every component. These names are the on-disk vocabulary of the graph:
//! changing one breaks existing databases.

// =============================================================================
// NODE LABELS
// =============================================================================

pub const LABEL_CLASSES: &str = "classes";
pub const LABEL_ATTRIBUTES: &str = "attributes";
pub const LABEL_INVENTORY_OBJECTS: &str = "inventoryObjects";
pub const LABEL_LIST_TYPE_ITEMS: &str = "listTypeItems";
pub const LABEL_POOLS: &str = "pools";
pub const LABEL_TEMPLATES: &str = "templates";
pub const LABEL_TEMPLATE_ELEMENTS: &str = "templateElements";
pub const LABEL_SPECIAL_NODES: &str = "specialNodes";
pub const LABEL_USERS: &str = "users";
pub const LABEL_DELETED_USERS: &str = "deletedUsers";
pub const LABEL_GROUPS: &str = "groups";
pub const LABEL_PRIVILEGES: &str = "privileges";
pub const LABEL_OBJECT_VIEWS: &str = "objectRelatedViews";
pub const LABEL_GENERAL_VIEWS: &str = "generalViews";
pub const LABEL_FILES: &str = "files";
pub const LABEL_ACTIVITY_LOGS: &str = "activityLogs";
pub const LABEL_CONFIG_VARIABLES: &str = "configurationVariables";
pub const LABEL_CONFIG_VARIABLE_POOLS: &str = "configurationVariablesPools";
pub const LABEL_TASKS: &str = "tasks";
pub const LABEL_QUERIES: &str = "queries";
pub const LABEL_SCRIPTED_QUERIES: &str = "scriptedQueries";
pub const LABEL_SCRIPTED_QUERY_PARAMETERS: &str = "scriptedQueryParameters";
pub const LABEL_SCRIPTED_QUERY_POOLS: &str = "scriptedQueriesPools";
pub const LABEL_FILTERS: &str = "filters";
pub const LABEL_VALIDATORS: &str = "validatorDefinitions";
pub const LABEL_BUSINESS_RULES: &str = "businessRules";
pub const LABEL_PROCESS_INSTANCES: &str = "processInstances";

// =============================================================================
// RELATIONSHIP TYPES
// =============================================================================

/// Normal (searchable) class membership.
pub const REL_INSTANCE_OF: &str = "INSTANCE_OF";
/// Template-scoped class membership, excluded from ordinary search.
pub const REL_INSTANCE_OF_SPECIAL: &str = "INSTANCE_OF_SPECIAL";
pub const REL_EXTENDS: &str = "EXTENDS";
pub const REL_HAS_ATTRIBUTE: &str = "HAS_ATTRIBUTE";
pub const REL_POSSIBLE_CHILD: &str = "POSSIBLE_CHILD";
pub const REL_POSSIBLE_SPECIAL_CHILD: &str = "POSSIBLE_SPECIAL_CHILD";
pub const REL_CHILD_OF: &str = "CHILD_OF";
pub const REL_CHILD_OF_SPECIAL: &str = "CHILD_OF_SPECIAL";
/// List type attribute edge, tagged with the attribute name.
pub const REL_RELATED_TO: &str = "RELATED_TO";
pub const REL_RELATED_TO_SPECIAL: &str = "RELATED_TO_SPECIAL";
pub const REL_HAS_TEMPLATE: &str = "HAS_TEMPLATE";
pub const REL_HAS_VIEW: &str = "HAS_VIEW";
pub const REL_HAS_ATTACHMENT: &str = "HAS_ATTACHMENT";
pub const REL_HAS_HISTORY_ENTRY: &str = "HAS_HISTORY_ENTRY";
pub const REL_PERFORMED_BY: &str = "PERFORMED_BY";
pub const REL_HAS_PROCESS_INSTANCE: &str = "HAS_PROCESS_INSTANCE";
pub const REL_BELONGS_TO_GROUP: &str = "BELONGS_TO_GROUP";
pub const REL_HAS_PRIVILEGE: &str = "HAS_PRIVILEGE";
pub const REL_SUBSCRIBED_TO: &str = "SUBSCRIBED_TO";
pub const REL_OWNS_QUERY: &str = "OWNS_QUERY";

// =============================================================================
// PROPERTY KEYS
// =============================================================================

/// Stable external identity. Indexed by the storage layer.
pub const PROPERTY_UUID: &str = "_uuid";
pub const PROPERTY_NAME: &str = "name";
pub const PROPERTY_DISPLAY_NAME: &str = "displayName";
pub const PROPERTY_DESCRIPTION: &str = "description";
pub const PROPERTY_CREATION_DATE: &str = "creationDate";
pub const PROPERTY_ABSTRACT: &str = "abstract";
pub const PROPERTY_IN_DESIGN: &str = "inDesign";
pub const PROPERTY_CUSTOM: &str = "custom";
pub const PROPERTY_TYPE: &str = "type";
pub const PROPERTY_MANDATORY: &str = "mandatory";
pub const PROPERTY_UNIQUE: &str = "unique";
pub const PROPERTY_READ_ONLY: &str = "readOnly";
pub const PROPERTY_VISIBLE: &str = "visible";
pub const PROPERTY_NO_COPY: &str = "noCopy";
pub const PROPERTY_MULTIPLE: &str = "multiple";
pub const PROPERTY_ORDER: &str = "order";
pub const PROPERTY_CLASS_NAME: &str = "className";
pub const PROPERTY_STRUCTURE: &str = "structure";
pub const PROPERTY_BACKGROUND: &str = "background";
pub const PROPERTY_TAGS: &str = "tags";
pub const PROPERTY_PASSWORD: &str = "password";
pub const PROPERTY_FIRST_NAME: &str = "firstName";
pub const PROPERTY_LAST_NAME: &str = "lastName";
pub const PROPERTY_EMAIL: &str = "email";
pub const PROPERTY_ENABLED: &str = "enabled";
pub const PROPERTY_FEATURE_TOKEN: &str = "featureToken";
pub const PROPERTY_ACCESS_LEVEL: &str = "accessLevel";
pub const PROPERTY_MASKED: &str = "masked";
pub const PROPERTY_VALUE: &str = "value";
pub const PROPERTY_SCRIPT: &str = "script";
pub const PROPERTY_COMMIT_ON_EXECUTE: &str = "commitOnExecute";
pub const PROPERTY_EXECUTION_TYPE: &str = "executionType";
pub const PROPERTY_EVERY_X_MINUTES: &str = "everyXMinutes";
pub const PROPERTY_START_TIME: &str = "startTime";
pub const PROPERTY_NOTIFICATION_TYPE: &str = "notificationType";
pub const PROPERTY_SCOPE: &str = "scope";
pub const PROPERTY_APPLIES_TO: &str = "appliesTo";
pub const PROPERTY_VERSION: &str = "version";
pub const PROPERTY_CONSTRAINTS: &str = "constraints";
pub const PROPERTY_AFFECTED_PROPERTIES: &str = "affectedProperties";
pub const PROPERTY_OLD_VALUES: &str = "oldValues";
pub const PROPERTY_NEW_VALUES: &str = "newValues";
pub const PROPERTY_NOTES: &str = "notes";
pub const PROPERTY_DEFAULT_VALUE: &str = "defaultValue";
pub const PROPERTY_IS_PUBLIC: &str = "isPublic";

/// Prefix of task parameters stored on the task node.
pub const TASK_PARAMETER_PREFIX: &str = "PARAM_";

// =============================================================================
// RELATIONSHIP TAGS
// =============================================================================

/// Tag on the CHILD_OF_SPECIAL edge linking a pool to its parent.
pub const TAG_POOL: &str = "pool";
/// Tag on the INSTANCE_OF_SPECIAL edge of a template root.
pub const TAG_TEMPLATE: &str = "template";
/// Pairwise sequential mirror between generated siblings.
pub const TAG_MIRROR: &str = "mirror";
/// All-to-one mirror from the first generated sibling.
pub const TAG_MIRROR_MULTIPLE: &str = "mirrorMultiple";

// =============================================================================
// CORE CLASSES & SPECIAL NODES
// =============================================================================

pub const CLASS_ROOT_OBJECT: &str = "RootObject";
pub const CLASS_INVENTORY_OBJECT: &str = "InventoryObject";
pub const CLASS_GENERIC_OBJECT_LIST: &str = "GenericObjectList";
/// Class whose possible children may be created at the top of the containment tree.
pub const CLASS_DUMMY_ROOT: &str = "DummyRoot";

pub const NODE_DUMMY_ROOT: &str = "DummyRoot";
pub const NODE_GROUPS: &str = "Groups";
pub const NODE_GENERAL_ACTIVITY_LOG: &str = "GeneralActivityLog";
pub const NODE_OBJECT_ACTIVITY_LOG: &str = "ObjectActivityLog";

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_GROUP: &str = "Administrators";

// =============================================================================
// NAME VALIDATION
// =============================================================================

pub const USER_NAME_PATTERN: &str = r"^[a-zA-Z0-9_.]*$";
pub const GROUP_NAME_PATTERN: &str = r"^[a-zA-Z0-9_. ]*$";
pub const CLASS_NAME_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9_]*$";
pub const ATTRIBUTE_NAME_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9_]*$";

// =============================================================================
// BUSINESS RULES
// =============================================================================

pub const RULE_TYPE_RELATIONSHIP_BY_ATTRIBUTE_VALUE: i64 = 1;
pub const RULE_SCOPE_ALL: i64 = 1;
/// Constraints a relationship-by-attribute-value rule must carry.
pub const RULE_RELATIONSHIP_CONSTRAINTS: usize = 5;

// =============================================================================
// LIMITS
// =============================================================================

/// Upper bound on names generated by one bulk creation.
pub const MAX_BULK_ELEMENTS: usize = 10_000;
