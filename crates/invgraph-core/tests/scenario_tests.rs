//! # Scenario Tests
//!
//! End-to-end behavior of the store through its public service:
//! group membership, pool cascades, session replacement, cache renames,
//! protected deletion and persistence across reopen.

use invgraph_core::messages;
use invgraph_core::primitives::{ADMIN_GROUP, ADMIN_USER, CLASS_INVENTORY_OBJECT, PROPERTY_NAME};
use invgraph_core::types::model::{
    AttributeChanges, ClassDefinition, ClassUpdate, NewUser, SessionType,
};
use invgraph_core::{AttributeValue, InventoryError, InventoryService, ServiceConfig};

// =============================================================================
// HELPERS
// =============================================================================

fn service() -> InventoryService {
    let service = InventoryService::in_memory(ServiceConfig::default()).expect("open");
    service.bootstrap("admin-secret").expect("bootstrap");
    service
}

fn schema(service: &InventoryService) {
    for name in ["Site", "Router"] {
        service
            .create_class(ADMIN_USER, &ClassDefinition::new(name, CLASS_INVENTORY_OBJECT))
            .expect("class");
    }
    service.add_possible_children(ADMIN_USER, None, &["Site"]).expect("children");
    service.add_possible_children(ADMIN_USER, Some("Site"), &["Router"]).expect("children");
}

fn named(name: &str) -> AttributeChanges {
    let mut changes = AttributeChanges::new();
    changes.insert(PROPERTY_NAME.into(), Some(AttributeValue::Text(name.into())));
    changes
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn user_must_keep_one_group() {
    let service = service();
    let admins = service.get_group(ADMIN_GROUP).expect("group").id;
    service.create_group(ADMIN_USER, "Operators", "").expect("group");
    service
        .create_user(ADMIN_USER, &NewUser::new("noc", "pw", admins))
        .expect("user");
    service.add_user_to_group(ADMIN_USER, "noc", "Operators").expect("add");

    service
        .remove_user_from_group(ADMIN_USER, "noc", ADMIN_GROUP)
        .expect("still in Operators");
    let err = service
        .remove_user_from_group(ADMIN_USER, "noc", "Operators")
        .expect_err("last group");
    assert!(matches!(err, InventoryError::OperationNotPermitted(_)));
    assert_eq!(err.key(), Some(messages::ORPHAN_USER));
    let groups = service.get_groups_for_user("noc").expect("groups");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "Operators");
}

#[test]
fn deleting_a_pool_removes_nested_pools_and_items() {
    let service = service();
    schema(&service);
    let general = |s: &InventoryService| s.get_general_activity_audit_trail(0, 0).expect("trail").len() as u64;
    let (nodes, relationships) = service.stats().expect("stats");
    let entries = general(&service);
    let outer = service
        .create_root_pool(ADMIN_USER, "spares", "", "Router", 1)
        .expect("pool");
    let inner = service
        .create_pool_in_pool(ADMIN_USER, &outer, "spares-east", "", "Router", 1)
        .expect("pool");
    let o = service
        .create_pool_item(ADMIN_USER, &outer, "Router", &named("r1"), None)
        .expect("item");
    let o2 = service
        .create_pool_item(ADMIN_USER, &inner, "Router", &named("r2"), None)
        .expect("item");
    assert_eq!(service.get_pool_items(&outer, 0).expect("items").len(), 1);

    service.delete_pools(ADMIN_USER, &[outer.as_str()]).expect("delete");
    assert!(service.get_pool(&outer).is_err());
    assert!(service.get_pool(&inner).is_err());
    assert!(service.get_object("Router", &o).is_err());
    assert!(service.get_object("Router", &o2).is_err());
    assert!(service.get_root_pools(Some("Router"), Some(1), false).expect("pools").is_empty());

    // Only the general log entries remain: one node and two edges each.
    let logged = general(&service) - entries;
    assert_eq!(service.stats().expect("stats"), (nodes + logged, relationships + 2 * logged));
}

#[test]
fn new_session_of_same_type_replaces_the_old_one() {
    let service = service();
    let first = service
        .create_session(ADMIN_USER, "admin-secret", SessionType::Desktop, "10.0.0.1")
        .expect("login");
    let web = service
        .create_session(ADMIN_USER, "admin-secret", SessionType::Web, "10.0.0.1")
        .expect("login");
    let second = service
        .create_session(ADMIN_USER, "admin-secret", SessionType::Desktop, "10.0.0.2")
        .expect("login");

    assert!(!service.is_session_valid(ADMIN_USER, &first.token));
    assert!(service.is_session_valid(ADMIN_USER, &second.token));
    assert!(service.is_session_valid(ADMIN_USER, &web.token));
    assert!(!service.is_session_valid("someone", &web.token));
    assert_eq!(service.get_sessions().len(), 2);

    service.close_session(&web.token).expect("close");
    assert!(service.get_user_in_session(&web.token).is_err());
    assert!(service.close_session(&web.token).is_err());
}

#[test]
fn wrong_password_and_unknown_user_look_alike() {
    let service = service();
    let unknown = service
        .create_session("ghost", "x", SessionType::Web, "")
        .expect_err("unknown");
    let wrong = service
        .create_session(ADMIN_USER, "x", SessionType::Web, "")
        .expect_err("wrong");
    assert_eq!(unknown.key(), wrong.key());
    assert_eq!(unknown.key(), Some(messages::BAD_CREDENTIALS));
}

#[test]
fn renamed_class_is_not_served_under_its_old_name() {
    let service = service();
    schema(&service);
    assert_eq!(service.get_class("Router").expect("class").name, "Router");
    let update = ClassUpdate {
        name: Some("CoreRouter".into()),
        ..ClassUpdate::default()
    };
    let change = service
        .set_class_properties(ADMIN_USER, "Router", &update)
        .expect("rename");
    assert!(change.affected_properties.iter().any(|p| p == PROPERTY_NAME));
    assert!(service.get_class("Router").is_err());
    assert_eq!(service.get_class("CoreRouter").expect("class").name, "CoreRouter");
    assert!(
        service
            .get_possible_children(Some("Site"))
            .expect("children")
            .iter()
            .any(|c| c == "CoreRouter")
    );
}

#[test]
fn related_objects_need_an_explicit_release_to_be_deleted() {
    let service = service();
    schema(&service);
    let site = service
        .create_object(ADMIN_USER, "Site", None, &named("HQ"), None)
        .expect("site");
    let a = service
        .create_object(ADMIN_USER, "Router", Some(("Site", &site)), &named("a"), None)
        .expect("a");
    let b = service
        .create_object(ADMIN_USER, "Router", Some(("Site", &site)), &named("b"), None)
        .expect("b");
    service
        .create_special_relationship(ADMIN_USER, ("Router", &a), ("Router", &b), "uplink")
        .expect("relate");

    let err = service
        .delete_objects(ADMIN_USER, &[("Site", &site)], false)
        .expect_err("protected");
    assert_eq!(err.key(), Some(messages::DELETE_PROTECTED));
    assert_eq!(service.get_children("Site", &site).expect("children").len(), 2);

    service
        .delete_objects(ADMIN_USER, &[("Site", &site)], true)
        .expect("released");
    assert!(service.get_object("Router", &a).is_err());
    assert!(service.get_root_objects().expect("roots").is_empty());
}

#[test]
fn committed_state_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ServiceConfig {
        attachments_path: dir.path().join("attachments"),
        backgrounds_path: dir.path().join("backgrounds"),
        ..ServiceConfig::default()
    };
    let path = dir.path().join("inventory.redb");
    let site = {
        let service = InventoryService::open(&path, config.clone()).expect("open");
        service.bootstrap("pw").expect("bootstrap");
        schema(&service);
        service
            .create_object(ADMIN_USER, "Site", None, &named("HQ"), None)
            .expect("site")
    };

    let service = InventoryService::open(&path, config).expect("reopen");
    assert!(service.is_initialized().expect("status"));
    assert_eq!(service.get_object("Site", &site).expect("site").name, "HQ");
    assert!(service.get_class("Router").is_ok());
}
