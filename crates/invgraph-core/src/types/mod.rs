//! # Core Type Definitions
//!
//! This module contains the value and error vocabulary shared by every
//! component of the store:
//! - Graph handles (`NodeId`, `RelId`)
//! - Stored property values (`PropertyValue`)
//! - Typed attribute values (`AttributeValue`) and their declared-type conversion
//! - Change descriptors produced by update operations
//! - Error types (`InventoryError`, `ErrorMessage`)
//!
//! Domain entities live in [`model`].

pub mod model;

use crate::messages::{self, EnglishCatalog, MessageCatalog};
use model::AttributeType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// GRAPH HANDLES
// =============================================================================

/// Internal identifier of a node in the property graph.
///
/// Node ids are handles, not identity: business objects are addressed by
/// their uuid. Application objects whose lifecycle the store owns (views,
/// tasks, users, rules...) use the node id directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal identifier of a relationship in the property graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelId(pub u64);

// =============================================================================
// STORED PROPERTY VALUES
// =============================================================================

/// A value as the graph stores it on a node or relationship.
///
/// The graph has no null: absent properties are simply not present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    TextList(Vec<String>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(l) => Some(l),
            _ => None,
        }
    }

    /// Render the value as text, the form used in change descriptors and audit entries.
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Bytes(b) => hex(b),
            Self::TextList(l) => l.join(";"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

fn hex(bytes: &[u8]) -> String {
    use fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

// =============================================================================
// ATTRIBUTE VALUES
// =============================================================================

/// Typed value of a business object attribute.
///
/// `Reference` holds the uuids of the list type items an attribute points
/// to. Single-selection attributes hold at most one; multi-selection
/// attributes hold one per related edge, rendered joined with `;`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    Reference(Vec<String>),
}

impl AttributeValue {
    /// Single list type reference.
    pub fn reference(uuid: impl Into<String>) -> Self {
        Self::Reference(vec![uuid.into()])
    }

    /// Parse raw text into the value shape the declared type expects.
    ///
    /// This is the only text-to-value conversion in the store. Ambiguous or
    /// lossy input (`"yes"` for a Boolean, `"1.5"` for an Integer) is rejected.
    /// For list types, `""` and `"0"` mean "no reference"; several uuids are
    /// separated by `;`.
    pub fn parse_for(attribute_type: &AttributeType, raw: &str) -> Result<Self, InventoryError> {
        let unparsable = || {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::VALUE_UNPARSABLE)
                    .arg(raw)
                    .arg(attribute_type.as_str()),
            )
        };
        match attribute_type {
            AttributeType::String => Ok(Self::Text(raw.to_string())),
            AttributeType::Integer
            | AttributeType::Long
            | AttributeType::Date
            | AttributeType::Timestamp => raw
                .trim()
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|_| unparsable()),
            AttributeType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|_| unparsable()),
            AttributeType::Boolean => match raw.trim() {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(unparsable()),
            },
            AttributeType::Binary => Err(unparsable()),
            AttributeType::ListType(_) => Ok(Self::Reference(
                raw.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && *s != "0")
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    /// Name of the value shape, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "Text",
            Self::Integer(_) => "Integer",
            Self::Float(_) => "Float",
            Self::Boolean(_) => "Boolean",
            Self::Bytes(_) => "Bytes",
            Self::Reference(_) => "Reference",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Bytes(b) => write!(f, "{}", hex(b)),
            Self::Reference(uuids) => write!(f, "{}", uuids.join(";")),
        }
    }
}

// =============================================================================
// CHANGE DESCRIPTOR
// =============================================================================

/// Structured diff produced by update operations and stored by the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    pub affected_properties: Vec<String>,
    pub old_values: Vec<String>,
    pub new_values: Vec<String>,
    pub notes: String,
}

impl ChangeDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(notes: impl Into<String>) -> Self {
        Self {
            notes: notes.into(),
            ..Self::default()
        }
    }

    /// Record one property change. Absent values are recorded as empty strings.
    pub fn record(&mut self, property: &str, old: Option<String>, new: Option<String>) {
        self.affected_properties.push(property.to_string());
        self.old_values.push(old.unwrap_or_default());
        self.new_values.push(new.unwrap_or_default());
    }

    pub fn is_empty(&self) -> bool {
        self.affected_properties.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Stable message key plus positional arguments.
///
/// The key drives localisation; callers must never branch on the rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub key: &'static str,
    pub args: Vec<String>,
}

impl ErrorMessage {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Render with a caller supplied catalog.
    pub fn translate(&self, catalog: &dyn MessageCatalog) -> String {
        catalog.translate(self.key, &self.args)
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", EnglishCatalog.translate(self.key, &self.args))
    }
}

/// Errors that can occur in store operations.
///
/// Validation failures are raised before any mutation. Any error raised
/// after a write aborts the surrounding transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// A class or attribute is absent from the schema catalog.
    #[error("{0}")]
    MetadataObjectNotFound(ErrorMessage),

    /// A user, group, pool, view, task, query or similar is absent.
    #[error("{0}")]
    ApplicationObjectNotFound(ErrorMessage),

    /// An inventory object, template element or list type item is absent.
    #[error("{0}")]
    BusinessObjectNotFound(ErrorMessage),

    /// Malformed input, schema mismatch or data integrity violation.
    #[error("{0}")]
    InvalidArgument(ErrorMessage),

    /// The operation is understood but forbidden in the current state.
    #[error("{0}")]
    OperationNotPermitted(ErrorMessage),

    /// Invalid session or credentials.
    #[error("{0}")]
    NotAuthorized(ErrorMessage),

    #[error("{0}")]
    BusinessRuleViolation(ErrorMessage),

    #[error("{0}")]
    ScriptCompilationFailure(ErrorMessage),

    /// The script ran out of operations or time, or was cancelled.
    #[error("{0}")]
    ScriptAborted(ErrorMessage),

    #[error("{0}")]
    ArraySizeMismatch(ErrorMessage),

    /// The graph backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl InventoryError {
    /// The structured message, absent for infrastructure errors.
    pub fn message(&self) -> Option<&ErrorMessage> {
        match self {
            Self::MetadataObjectNotFound(m)
            | Self::ApplicationObjectNotFound(m)
            | Self::BusinessObjectNotFound(m)
            | Self::InvalidArgument(m)
            | Self::OperationNotPermitted(m)
            | Self::NotAuthorized(m)
            | Self::BusinessRuleViolation(m)
            | Self::ScriptCompilationFailure(m)
            | Self::ScriptAborted(m)
            | Self::ArraySizeMismatch(m) => Some(m),
            Self::Storage(_) | Self::Serialization(_) => None,
        }
    }

    /// The stable message key, absent for infrastructure errors.
    pub fn key(&self) -> Option<&'static str> {
        self.message().map(|m| m.key)
    }
}

/// Convert a backend error. Used at every redb call site.
pub(crate) fn storage_err(e: impl fmt::Display) -> InventoryError {
    InventoryError::Storage(e.to_string())
}

/// Current wall clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_ambiguous_booleans() {
        let err = AttributeValue::parse_for(&AttributeType::Boolean, "yes").expect_err("reject");
        assert_eq!(err.key(), Some(messages::VALUE_UNPARSABLE));
        assert_eq!(
            AttributeValue::parse_for(&AttributeType::Boolean, "true").expect("parse"),
            AttributeValue::Boolean(true)
        );
    }

    #[test]
    fn parse_rejects_fractional_integers() {
        assert!(AttributeValue::parse_for(&AttributeType::Integer, "1.5").is_err());
        assert_eq!(
            AttributeValue::parse_for(&AttributeType::Date, " 1700000000000 ").expect("parse"),
            AttributeValue::Integer(1_700_000_000_000)
        );
    }

    #[test]
    fn parse_list_type_sentinels_clear() {
        let t = AttributeType::ListType("EquipmentVendor".into());
        assert_eq!(
            AttributeValue::parse_for(&t, "0").expect("parse"),
            AttributeValue::Reference(vec![])
        );
        assert_eq!(
            AttributeValue::parse_for(&t, "a; b").expect("parse"),
            AttributeValue::Reference(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn references_render_joined() {
        let v = AttributeValue::Reference(vec!["u1".into(), "u2".into()]);
        assert_eq!(v.to_string(), "u1;u2");
    }

    #[test]
    fn change_descriptor_records_absent_as_empty() {
        let mut change = ChangeDescriptor::new();
        change.record("name", None, Some("rack-01".into()));
        assert_eq!(change.old_values, vec![String::new()]);
        assert_eq!(change.new_values, vec!["rack-01".to_string()]);
        assert!(!change.is_empty());
    }

    #[test]
    fn error_display_uses_catalog() {
        let err = InventoryError::MetadataObjectNotFound(
            ErrorMessage::new(messages::CLASS_NOT_FOUND).arg("Router"),
        );
        assert_eq!(err.to_string(), "Class Router could not be found");
        assert_eq!(err.key(), Some(messages::CLASS_NOT_FOUND));
        assert_eq!(InventoryError::Storage("x".into()).key(), None);
    }
}
