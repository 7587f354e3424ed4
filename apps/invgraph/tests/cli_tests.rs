//! Integration tests for the invgraph command line.
//!
//! Commands run against a database in a temporary directory; the result is
//! checked by reopening the store directly.

use clap::Parser;
use invgraph::cli::{Cli, Commands, ObjectAction, execute, key_values, object_ref};
use invgraph::config::AppConfig;
use invgraph_core::messages;
use invgraph_core::{InventoryService, ServiceConfig};
use std::path::Path;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        database: dir.join("inventory.redb"),
        service: ServiceConfig {
            attachments_path: dir.join("attachments"),
            backgrounds_path: dir.join("backgrounds"),
            ..ServiceConfig::default()
        },
    }
}

fn run(config: &AppConfig, args: &[&str]) -> Result<(), invgraph_core::InventoryError> {
    let mut argv = vec!["invgraph"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("arguments");
    execute(cli, config.clone())
}

// =============================================================================
// ARGUMENT TESTS
// =============================================================================

#[test]
fn test_object_create_arguments() {
    let cli = Cli::try_parse_from([
        "invgraph",
        "-D",
        "other.redb",
        "object",
        "create",
        "Rack",
        "--name",
        "R1",
        "--parent",
        "Building:b-1",
        "--attr",
        "units=42",
    ])
    .expect("parse");
    assert_eq!(cli.database.as_deref(), Some(Path::new("other.redb")));
    assert_eq!(cli.user, "admin");
    match cli.command {
        Some(Commands::Object {
            action: ObjectAction::Create {
                class,
                parent,
                attributes,
                ..
            },
        }) => {
            assert_eq!(class, "Rack");
            assert_eq!(parent.as_deref(), Some("Building:b-1"));
            assert_eq!(attributes, vec!["units=42".to_string()]);
        }
        other => assert!(other.is_none(), "unexpected command {:?}", other),
    }
}

#[test]
fn test_object_refs_and_pairs() {
    assert_eq!(object_ref("Rack:u-1").expect("ref"), ("Rack", "u-1"));
    let err = object_ref("u-1").expect_err("no class");
    assert_eq!(err.key(), Some(messages::ARGUMENT_MALFORMED));
    assert!(object_ref("Rack:").is_err());

    let pairs = key_values(&["a=1".to_string(), "b=x=y".to_string()]).expect("pairs");
    assert_eq!(pairs.get("b").map(String::as_str), Some("x=y"));
    assert!(key_values(&["=1".to_string()]).is_err());
    assert!(key_values(&["flag".to_string()]).is_err());
}

// =============================================================================
// EXECUTION TESTS
// =============================================================================

#[test]
fn test_commands_are_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());

    run(&config, &["init", "--admin-password", "pw"]).expect("init");
    run(&config, &["class", "create", "Router"]).expect("class");
    run(&config, &["class", "attribute", "Router", "ports", "-t", "Integer"]).expect("attribute");
    run(&config, &["class", "children", "Router"]).expect("children");
    run(
        &config,
        &["object", "create", "Router", "--name", "core-1", "--attr", "ports=48"],
    )
    .expect("object");
    run(&config, &["--json-mode", "audit", "general", "--limit", "5"]).expect("audit");

    let service = InventoryService::open(&config.database, config.service.clone()).expect("open");
    let roots = service.get_root_objects().expect("roots");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].name, "core-1");
    let object = service.get_object("Router", &roots[0].uuid).expect("object");
    assert_eq!(
        object.attribute("ports"),
        Some(&invgraph_core::AttributeValue::Integer(48))
    );
}

#[test]
fn test_store_errors_are_returned() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(dir.path());
    run(&config, &["init", "--admin-password", "pw"]).expect("init");

    let err = run(&config, &["init", "--admin-password", "pw"]).expect_err("twice");
    assert_eq!(err.key(), Some(messages::ALREADY_INITIALIZED));

    let err = run(&config, &["object", "create", "Nope", "--name", "x"]).expect_err("no class");
    assert!(err.key().is_some());

    let err = run(&config, &["object", "relate", "Router", "Router:u", "--name", "n"])
        .expect_err("malformed");
    assert_eq!(err.key(), Some(messages::ARGUMENT_MALFORMED));
}
