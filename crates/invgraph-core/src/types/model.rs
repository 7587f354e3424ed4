//! # Domain Model
//!
//! Entities materialized from the graph and handed to callers. None of
//! these types hold graph handles beyond plain ids; they are complete
//! snapshots taken inside one transaction.

use super::{AttributeValue, NodeId};
use crate::primitives;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SCHEMA
// =============================================================================

/// Declared type of an attribute.
///
/// Every name that is not a primitive type names a list type class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Integer,
    Long,
    Float,
    Boolean,
    Date,
    Timestamp,
    Binary,
    ListType(String),
}

impl AttributeType {
    pub fn parse(name: &str) -> Self {
        match name {
            "String" => Self::String,
            "Integer" => Self::Integer,
            "Long" => Self::Long,
            "Float" => Self::Float,
            "Boolean" => Self::Boolean,
            "Date" => Self::Date,
            "Timestamp" => Self::Timestamp,
            "Binary" => Self::Binary,
            other => Self::ListType(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Long => "Long",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::Timestamp => "Timestamp",
            Self::Binary => "Binary",
            Self::ListType(class) => class,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::ListType(_))
    }
}

/// An attribute as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    pub id: NodeId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub attribute_type: AttributeType,
    pub mandatory: bool,
    pub unique: bool,
    pub read_only: bool,
    pub visible: bool,
    /// Excluded when objects are copied.
    pub no_copy: bool,
    /// List type attribute accepting several items.
    pub multiple: bool,
    pub order: i64,
}

/// A class as loaded by the catalog, inherited attributes included.
///
/// Attributes are ordered root class first, so `name` and `creationDate`
/// always lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetadata {
    pub id: NodeId,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub parent: Option<String>,
    pub abstract_class: bool,
    pub in_design: bool,
    pub custom: bool,
    pub creation_date: i64,
    pub attributes: Vec<AttributeMetadata>,
}

impl ClassMetadata {
    pub fn attribute(&self, name: &str) -> Option<&AttributeMetadata> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Whether instances may be created.
    pub fn is_instanceable(&self) -> bool {
        !self.abstract_class && !self.in_design
    }
}

/// Lightweight class reference returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassMetadataLight {
    pub id: NodeId,
    pub name: String,
    pub display_name: String,
    pub abstract_class: bool,
}

impl From<&ClassMetadata> for ClassMetadataLight {
    fn from(class: &ClassMetadata) -> Self {
        Self {
            id: class.id,
            name: class.name.clone(),
            display_name: class.display_name.clone(),
            abstract_class: class.abstract_class,
        }
    }
}

/// Input for class creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    pub parent: Option<String>,
    pub display_name: String,
    pub description: String,
    pub abstract_class: bool,
    pub in_design: bool,
}

impl ClassDefinition {
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn abstract_class(mut self) -> Self {
        self.abstract_class = true;
        self
    }

    #[must_use]
    pub fn in_design(mut self) -> Self {
        self.in_design = true;
        self
    }
}

/// Partial update of class properties. `None` leaves a property untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassUpdate {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub abstract_class: Option<bool>,
    pub in_design: Option<bool>,
}

/// Input for attribute creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub attribute_type: AttributeType,
    pub display_name: String,
    pub description: String,
    pub mandatory: bool,
    pub unique: bool,
    pub read_only: bool,
    pub visible: bool,
    pub no_copy: bool,
    pub multiple: bool,
    pub order: i64,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            display_name: String::new(),
            description: String::new(),
            mandatory: false,
            unique: false,
            read_only: false,
            visible: true,
            no_copy: false,
            multiple: false,
            order: 1000,
        }
    }

    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn no_copy(mut self) -> Self {
        self.no_copy = true;
        self
    }

    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

// =============================================================================
// BUSINESS OBJECTS
// =============================================================================

/// Identity triple of a business object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusinessObjectLight {
    pub class_name: String,
    pub uuid: String,
    pub name: String,
}

/// A fully materialized business object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessObject {
    pub class_name: String,
    pub uuid: String,
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl BusinessObject {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Attribute rendered as text; list type references are `;` joined.
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(ToString::to_string)
    }

    pub fn light(&self) -> BusinessObjectLight {
        BusinessObjectLight {
            class_name: self.class_name.clone(),
            uuid: self.uuid.clone(),
            name: self.name.clone(),
        }
    }
}

/// Template elements share the business object shape; they differ only in
/// their (special) class membership.
pub type TemplateObject = BusinessObject;

/// Light form of a template element.
pub type TemplateObjectLight = BusinessObjectLight;

/// Attribute changes: `None` clears a value.
pub type AttributeChanges = BTreeMap<String, Option<AttributeValue>>;

/// An item of a list type (an enumerated value other objects reference).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListTypeItem {
    pub class_name: String,
    pub uuid: String,
    pub name: String,
    pub display_name: Option<String>,
    pub creation_date: i64,
}

impl ListTypeItem {
    pub fn light(&self) -> BusinessObjectLight {
        BusinessObjectLight {
            class_name: self.class_name.clone(),
            uuid: self.uuid.clone(),
            name: self.name.clone(),
        }
    }
}

/// An administrative container constraining the class of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub class_name: String,
    pub pool_type: i64,
}

/// Pool of application objects (configuration variables, scripted queries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPool {
    pub uuid: String,
    pub name: String,
    pub description: String,
}

/// Link from an object to a process instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub object: BusinessObjectLight,
}

/// Special relationship between two objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialRelationship {
    pub name: String,
    pub other: BusinessObjectLight,
    pub outgoing: bool,
}

// =============================================================================
// VIEWS & FILES
// =============================================================================

/// A view with its opaque structure and optional external background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewObject {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub class_name: String,
    pub structure: Vec<u8>,
    pub background: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewObjectLight {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub class_name: String,
}

/// Partial update of a view. `Some(vec![])` as background removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub structure: Option<Vec<u8>>,
    pub background: Option<Vec<u8>>,
}

/// Metadata of a file attached to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObjectLight {
    pub id: NodeId,
    pub name: String,
    pub tags: String,
    pub creation_date: i64,
}

/// An attached file with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: NodeId,
    pub name: String,
    pub tags: String,
    pub creation_date: i64,
    pub content: Vec<u8>,
}

// =============================================================================
// USERS, GROUPS & SESSIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserType {
    Gui,
    WebService,
    Southbound,
    /// Created by the store itself; immutable through the public API.
    System,
}

impl UserType {
    pub fn code(self) -> i64 {
        match self {
            Self::Gui => 1,
            Self::WebService => 2,
            Self::Southbound => 3,
            Self::System => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Gui),
            2 => Some(Self::WebService),
            3 => Some(Self::Southbound),
            4 => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    Read,
    ReadWrite,
}

impl AccessLevel {
    pub fn code(self) -> i64 {
        match self {
            Self::Read => 1,
            Self::ReadWrite => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Read),
            2 => Some(Self::ReadWrite),
            _ => None,
        }
    }
}

/// Access to one feature, identified by its token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Privilege {
    pub feature_token: String,
    pub access_level: AccessLevel,
}

impl Privilege {
    pub fn new(feature_token: impl Into<String>, access_level: AccessLevel) -> Self {
        Self {
            feature_token: feature_token.into(),
            access_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: NodeId,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enabled: bool,
    pub user_type: UserType,
    pub creation_date: i64,
    pub privileges: Vec<Privilege>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProfile {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub creation_date: i64,
    pub privileges: Vec<Privilege>,
}

/// Input for user creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub enabled: bool,
    pub user_type: UserType,
    pub privileges: Vec<Privilege>,
    pub default_group: NodeId,
}

impl NewUser {
    pub fn new(name: impl Into<String>, password: impl Into<String>, default_group: NodeId) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            enabled: true,
            user_type: UserType::Gui,
            privileges: Vec::new(),
            default_group,
        }
    }
}

/// Partial update of a user. `None` leaves a property untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub enabled: Option<bool>,
    pub user_type: Option<UserType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionType {
    Desktop,
    Web,
    WebService,
}

/// Ephemeral login record. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
    pub session_type: SessionType,
    pub ip_address: String,
    pub created_at: i64,
}

// =============================================================================
// CONFIGURATION VARIABLES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigVariableType {
    String,
    Integer,
    Float,
    Boolean,
    /// Comma separated list.
    Array,
    /// Rows separated by `;`, cells by `,`.
    Matrix,
}

impl ConfigVariableType {
    pub fn code(self) -> i64 {
        match self {
            Self::String => 0,
            Self::Integer => 1,
            Self::Float => 2,
            Self::Boolean => 3,
            Self::Array => 4,
            Self::Matrix => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::String),
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::Boolean),
            4 => Some(Self::Array),
            5 => Some(Self::Matrix),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationVariable {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    /// Raw value, always stored as text.
    pub value_definition: String,
    pub masked: bool,
    pub variable_type: ConfigVariableType,
}

/// Typed value of a configuration variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<String>),
    Matrix(Vec<Vec<String>>),
}

// =============================================================================
// SCRIPTED APPLICATION OBJECTS
// =============================================================================

/// A filter: a boolean predicate over the children of an object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub class_name: String,
    pub script: String,
    pub enabled: bool,
}

/// A validator: fires on objects of its class and subclasses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorDefinition {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub class_name: String,
    pub script: String,
    pub enabled: bool,
}

/// Partial update of a filter or validator definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub class_name: Option<String>,
    pub script: Option<String>,
    pub enabled: Option<bool>,
}

/// Result of a validator that fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskScheduleDescriptor {
    pub start_time: i64,
    pub every_x_minutes: i64,
    pub execution_type: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskNotificationDescriptor {
    pub email: String,
    pub notification_type: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub commit_on_execute: bool,
    pub script: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub schedule: TaskScheduleDescriptor,
    pub notification: TaskNotificationDescriptor,
}

/// Input for task creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub commit_on_execute: bool,
    pub script: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub schedule: TaskScheduleDescriptor,
    pub notification: TaskNotificationDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Information,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// What a task script reports back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub messages: Vec<ResultMessage>,
}

impl TaskResult {
    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.level == MessageLevel::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedQueryParameter {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub param_type: String,
    pub mandatory: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedQuery {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub script: String,
    pub enabled: bool,
    pub parameters: Vec<ScriptedQueryParameter>,
}

/// Tabular result of a scripted query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptedQueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A stored query definition. `owner` is `None` for public queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactQuery {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub owner: Option<NodeId>,
    pub structure: Vec<u8>,
}

// =============================================================================
// BUSINESS RULES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRule {
    pub id: NodeId,
    pub name: String,
    pub description: String,
    pub rule_type: i64,
    pub scope: i64,
    pub applies_to: String,
    pub version: String,
    pub constraints: Vec<String>,
}

/// Input for business rule creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBusinessRule {
    pub name: String,
    pub description: String,
    pub rule_type: i64,
    pub scope: i64,
    pub applies_to: String,
    pub version: String,
    pub constraints: Vec<String>,
}

impl NewBusinessRule {
    /// A relationship-by-attribute-value rule: objects of `applies_to`
    /// whose `source_attribute` equals `source_value` may only relate to
    /// objects of `target_class` whose `target_attribute` equals `target_value`.
    pub fn relationship_by_attribute_value(
        name: impl Into<String>,
        applies_to: impl Into<String>,
        target_class: impl Into<String>,
        source_attribute: impl Into<String>,
        target_attribute: impl Into<String>,
        source_value: impl Into<String>,
        target_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            rule_type: primitives::RULE_TYPE_RELATIONSHIP_BY_ATTRIBUTE_VALUE,
            scope: primitives::RULE_SCOPE_ALL,
            applies_to: applies_to.into(),
            version: "1.0".to_string(),
            constraints: vec![
                target_class.into(),
                source_attribute.into(),
                target_attribute.into(),
                source_value.into(),
                target_value.into(),
            ],
        }
    }
}

// =============================================================================
// AUDIT TRAIL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    CreateInventoryObject,
    DeleteInventoryObject,
    UpdateInventoryObject,
    CreateMetadataObject,
    DeleteMetadataObject,
    UpdateMetadataObject,
    CreateApplicationObject,
    DeleteApplicationObject,
    UpdateApplicationObject,
    CreateRelationship,
    ReleaseRelationship,
    OpenSession,
    CloseSession,
    ExecuteTask,
}

impl ActivityType {
    pub fn code(self) -> i64 {
        match self {
            Self::CreateInventoryObject => 1,
            Self::DeleteInventoryObject => 2,
            Self::UpdateInventoryObject => 3,
            Self::CreateMetadataObject => 4,
            Self::DeleteMetadataObject => 5,
            Self::UpdateMetadataObject => 6,
            Self::CreateApplicationObject => 7,
            Self::DeleteApplicationObject => 8,
            Self::UpdateApplicationObject => 9,
            Self::CreateRelationship => 10,
            Self::ReleaseRelationship => 11,
            Self::OpenSession => 12,
            Self::CloseSession => 13,
            Self::ExecuteTask => 14,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        [
            Self::CreateInventoryObject,
            Self::DeleteInventoryObject,
            Self::UpdateInventoryObject,
            Self::CreateMetadataObject,
            Self::DeleteMetadataObject,
            Self::UpdateMetadataObject,
            Self::CreateApplicationObject,
            Self::DeleteApplicationObject,
            Self::UpdateApplicationObject,
            Self::CreateRelationship,
            Self::ReleaseRelationship,
            Self::OpenSession,
            Self::CloseSession,
            Self::ExecuteTask,
        ]
        .into_iter()
        .find(|t| t.code() == code)
    }
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: NodeId,
    /// Uuid of the subject object; `None` for general entries.
    pub object: Option<String>,
    pub activity_type: ActivityType,
    pub performing_user: String,
    pub timestamp: i64,
    pub affected_properties: Vec<String>,
    pub old_values: Vec<String>,
    pub new_values: Vec<String>,
    pub notes: String,
}
