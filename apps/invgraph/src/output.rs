//! # Output
//!
//! JSON rendering for `--json-mode`. Model types serialize as they are,
//! except attribute maps: values are flattened to plain JSON and binary
//! values are base64 encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use invgraph_core::AttributeValue;
use invgraph_core::types::model::BusinessObject;
use serde::Serialize;
use serde_json::{Map, Value, json};

pub fn attribute_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Text(s) => Value::String(s.clone()),
        AttributeValue::Integer(i) => json!(i),
        AttributeValue::Float(f) => json!(f),
        AttributeValue::Boolean(b) => Value::Bool(*b),
        AttributeValue::Bytes(b) => Value::String(STANDARD.encode(b)),
        AttributeValue::Reference(uuids) => json!(uuids),
    }
}

pub fn object_json(object: &BusinessObject) -> Value {
    let attributes: Map<String, Value> = object
        .attributes
        .iter()
        .map(|(name, value)| (name.clone(), attribute_json(value)))
        .collect();
    json!({
        "class_name": object.class_name,
        "uuid": object.uuid,
        "name": object.name,
        "attributes": attributes,
    })
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!(event = "output_failure", reason = %e, "Cannot render JSON"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn binary_attributes_are_base64() {
        assert_eq!(
            attribute_json(&AttributeValue::Bytes(b"rack".to_vec())),
            Value::String("cmFjaw==".into())
        );
        assert_eq!(
            attribute_json(&AttributeValue::Reference(vec!["a".into(), "b".into()])),
            json!(["a", "b"])
        );
    }

    #[test]
    fn objects_flatten_their_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("units".to_string(), AttributeValue::Integer(42));
        let object = BusinessObject {
            class_name: "Rack".into(),
            uuid: "u-1".into(),
            name: "R1".into(),
            attributes,
        };
        let value = object_json(&object);
        assert_eq!(value["attributes"]["units"], json!(42));
        assert_eq!(value["name"], json!("R1"));
    }
}
