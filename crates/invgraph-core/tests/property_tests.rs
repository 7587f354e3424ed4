//! # Property-Based Tests
//!
//! Copy fidelity of template trees, name pattern expansion and attribute
//! value conversion, checked with proptest.

use invgraph_core::mapper::to_property;
use invgraph_core::pattern::{MirrorWiring, NamePattern};
use invgraph_core::primitives::{ADMIN_USER, CLASS_INVENTORY_OBJECT, PROPERTY_NAME};
use invgraph_core::types::PropertyValue;
use invgraph_core::types::model::{
    AttributeChanges, AttributeDefinition, AttributeType, ClassDefinition,
};
use invgraph_core::{AttributeValue, InventoryService, ServiceConfig};
use proptest::prelude::*;
use std::collections::BTreeSet;

// =============================================================================
// HELPERS
// =============================================================================

fn service() -> InventoryService {
    let service = InventoryService::in_memory(ServiceConfig::default()).expect("open");
    service.bootstrap("pw").expect("bootstrap");
    for name in ["Rack", "Slot"] {
        service
            .create_class(ADMIN_USER, &ClassDefinition::new(name, CLASS_INVENTORY_OBJECT))
            .expect("class");
    }
    service
        .create_attribute(ADMIN_USER, "Slot", &AttributeDefinition::new("position", AttributeType::Integer))
        .expect("attribute");
    service.add_possible_children(ADMIN_USER, Some("Rack"), &["Slot"]).expect("children");
    service.add_possible_children(ADMIN_USER, Some("Slot"), &["Slot"]).expect("children");
    service
}

/// Grow `depth` levels of `branching` slots below `parent`.
fn grow(service: &InventoryService, parent: (&str, &str), depth: usize, branching: usize) {
    if depth == 0 {
        return;
    }
    for i in 0..branching {
        let uuid = service
            .create_template_element(ADMIN_USER, "Slot", parent, &format!("s{}-{}", depth, i))
            .expect("element");
        let position = i.to_string();
        service
            .update_template_element(ADMIN_USER, "Slot", &uuid, &["position"], &[position.as_str()])
            .expect("position");
        grow(service, ("Slot", &uuid), depth - 1, branching);
    }
}

/// Names and positions of a subtree in pre-order, plus every uuid seen.
fn shape(
    service: &InventoryService,
    node: (&str, &str),
    out: &mut Vec<(usize, String, Option<String>)>,
    uuids: &mut BTreeSet<String>,
    level: usize,
) {
    let element = service.get_template_element(node.0, node.1).expect("element");
    out.push((level, element.name.clone(), element.attribute("position").map(|v| v.to_string())));
    uuids.insert(element.uuid.clone());
    let mut children = service
        .get_template_element_children(node.0, node.1)
        .expect("children");
    children.sort_by(|a, b| a.name.cmp(&b.name));
    for child in children {
        shape(service, (&child.class_name, &child.uuid), out, uuids, level + 1);
    }
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// A copied template subtree has the same shape and values as its
    /// source, and no uuid in common with it.
    #[test]
    fn template_copy_keeps_shape_with_fresh_uuids(depth in 1usize..4, branching in 1usize..3) {
        let service = service();
        let source = service.create_template(ADMIN_USER, "Rack", "source").expect("template");
        let target = service.create_template(ADMIN_USER, "Rack", "target").expect("template");
        grow(&service, ("Rack", &source), depth, branching);

        let roots = service.get_template_element_children("Rack", &source).expect("children");
        let refs: Vec<(&str, &str)> = roots.iter().map(|r| ("Slot", r.uuid.as_str())).collect();
        let copies = service
            .copy_template_elements(ADMIN_USER, &refs, ("Rack", &target))
            .expect("copy");
        prop_assert_eq!(copies.len(), branching);

        let (mut original, mut copied) = (Vec::new(), Vec::new());
        let (mut original_ids, mut copied_ids) = (BTreeSet::new(), BTreeSet::new());
        for root in &roots {
            shape(&service, ("Slot", &root.uuid), &mut original, &mut original_ids, 0);
        }
        let mut copy_roots = service.get_template_element_children("Rack", &target).expect("children");
        copy_roots.sort_by(|a, b| a.name.cmp(&b.name));
        for root in &copy_roots {
            shape(&service, ("Slot", &root.uuid), &mut copied, &mut copied_ids, 0);
        }
        original.sort();
        copied.sort();
        prop_assert_eq!(&original, &copied);
        prop_assert_eq!(original_ids.len(), copied_ids.len());
        prop_assert!(original_ids.is_disjoint(&copied_ids));
    }
}

proptest! {
    /// A sequence yields one name per index, in order.
    #[test]
    fn sequence_expands_every_index(from in 0i64..500, len in 1i64..50) {
        let to = from + len - 1;
        let pattern = NamePattern::parse(&format!("port-[sequence({},{})]", from, to)).expect("parse");
        prop_assert_eq!(pattern.names().len() as i64, len);
        prop_assert_eq!(pattern.names()[0].clone(), format!("port-{}", from));
        prop_assert_eq!(pattern.wiring(), MirrorWiring::None);
        prop_assert!(pattern.mirror_pairs(pattern.names().len()).is_empty());
        prop_assert!(pattern.take(pattern.names().len() + 1).is_err());
    }

    /// Mirrors come in front/back pairs wired to each other.
    #[test]
    fn mirror_pairs_front_and_back(len in 1usize..40) {
        let pattern = NamePattern::parse(&format!("[mirror(1,{})]", len)).expect("parse");
        prop_assert_eq!(pattern.names().len(), 2 * len);
        let pairs = pattern.mirror_pairs(2 * len);
        prop_assert_eq!(pairs.len(), len);
        for (front, back) in pairs {
            prop_assert!(pattern.names()[front].ends_with("-front"));
            prop_assert!(pattern.names()[back].ends_with("-back"));
        }
    }

    /// Multiple mirrors wire the single front to every back.
    #[test]
    fn multiple_mirror_wires_all_to_first(len in 1usize..40) {
        let pattern = NamePattern::parse(&format!("[multiple-mirror(1,{})]", len)).expect("parse");
        prop_assert_eq!(pattern.names().len(), len + 1);
        prop_assert_eq!(pattern.names()[0].as_str(), "front");
        prop_assert!(pattern.mirror_pairs(len + 1).iter().all(|(a, _)| *a == 0));
    }

    /// Integer text parses losslessly and is stored as an integer property.
    #[test]
    fn integer_text_round_trips(n in any::<i64>()) {
        let value = AttributeValue::parse_for(&AttributeType::Integer, &n.to_string()).expect("parse");
        prop_assert_eq!(&value, &AttributeValue::Integer(n));
        prop_assert_eq!(to_property(&value), Some(PropertyValue::Integer(n)));
        prop_assert_eq!(value.to_string(), n.to_string());
    }

    /// Text that is not exactly `true` or `false` is not a Boolean.
    #[test]
    fn boolean_rejects_everything_else(raw in "[a-zA-Z]{0,6}") {
        let parsed = AttributeValue::parse_for(&AttributeType::Boolean, &raw);
        match raw.as_str() {
            "true" => prop_assert_eq!(parsed.expect("true"), AttributeValue::Boolean(true)),
            "false" => prop_assert_eq!(parsed.expect("false"), AttributeValue::Boolean(false)),
            _ => prop_assert!(parsed.is_err()),
        }
    }

    /// Reference lists drop the "no reference" sentinels.
    #[test]
    fn list_type_references_skip_sentinels(uuids in proptest::collection::vec("[a-f0-9]{8}", 0..5)) {
        let mut raw = uuids.clone();
        raw.push("0".to_string());
        raw.push(String::new());
        let value = AttributeValue::parse_for(&AttributeType::ListType("Vendor".into()), &raw.join(";"))
            .expect("parse");
        prop_assert_eq!(&value, &AttributeValue::Reference(uuids));
        prop_assert_eq!(to_property(&value), None);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Attributes written on create come back unchanged when materialized.
    #[test]
    fn object_attributes_survive_the_store(name in "[a-zA-Z0-9]{1,20}", position in any::<i64>()) {
        let service = service();
        service.add_possible_children(ADMIN_USER, None, &["Slot"]).expect("root children");
        let mut attributes = AttributeChanges::new();
        attributes.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text(name.clone())));
        attributes.insert("position".into(), Some(AttributeValue::Integer(position)));
        let uuid = service
            .create_object(ADMIN_USER, "Slot", None, &attributes, None)
            .expect("create");
        let object = service.get_object("Slot", &uuid).expect("object");
        prop_assert_eq!(&object.name, &name);
        prop_assert_eq!(object.attribute("position"), Some(&AttributeValue::Integer(position)));
    }
}
