//! # CLI Command Implementations
//!
//! One function per command group. Every function runs against an open
//! service and either prints text or, in JSON mode, the serialized model.

use super::{
    AuditAction, ClassAction, ConfigVarAction, ListTypeAction, ObjectAction, PoolAction,
    TaskAction, TemplateAction, UserAction,
};
use crate::output::{object_json, print_json};
use invgraph_core::mapper::parse_changes;
use invgraph_core::messages;
use invgraph_core::primitives::PROPERTY_NAME;
use invgraph_core::service::{NewConfigurationVariable, ObjectRef};
use invgraph_core::types::model::{
    AttributeChanges, AttributeDefinition, AttributeType, BusinessObjectLight, ClassDefinition,
    NewTask, NewUser,
};
use invgraph_core::{
    AttributeValue, ErrorMessage, InventoryError, InventoryService, NodeId, TaskExecutionError,
    TaskOutcome,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maximum size of a task script file (1 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 1024 * 1024;

/// What every command needs.
pub struct Context<'a> {
    pub service: &'a InventoryService,
    pub actor: &'a str,
    pub json_mode: bool,
}

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

fn malformed(arg: &str, form: &str) -> InventoryError {
    InventoryError::InvalidArgument(
        ErrorMessage::new(messages::ARGUMENT_MALFORMED)
            .arg(arg)
            .arg(form),
    )
}

/// Split `Class:uuid`.
pub fn object_ref(arg: &str) -> Result<ObjectRef<'_>, InventoryError> {
    match arg.split_once(':') {
        Some((class, uuid)) if !class.is_empty() && !uuid.is_empty() => Ok((class, uuid)),
        _ => Err(malformed(arg, "Class:uuid")),
    }
}

/// Split repeated `name=value` arguments.
pub fn key_values(args: &[String]) -> Result<BTreeMap<String, String>, InventoryError> {
    let mut out = BTreeMap::new();
    for arg in args {
        let (key, value) = arg.split_once('=').ok_or_else(|| malformed(arg, "name=value"))?;
        if key.trim().is_empty() {
            return Err(malformed(arg, "name=value"));
        }
        out.insert(key.trim().to_string(), value.to_string());
    }
    Ok(out)
}

/// Raw attribute values converted against the declaration of `class`.
fn attribute_changes(
    ctx: &Context<'_>,
    class: &str,
    name: Option<&str>,
    args: &[String],
) -> Result<AttributeChanges, InventoryError> {
    let raw = key_values(args)?;
    let metadata = ctx.service.get_class(class)?;
    let mut changes = parse_changes(&metadata, &raw)?;
    if let Some(name) = name {
        changes.insert(PROPERTY_NAME.to_string(), Some(AttributeValue::Text(name.to_string())));
    }
    Ok(changes)
}

fn read_script(path: &Path) -> Result<String, InventoryError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| InventoryError::Storage(format!("Cannot read file metadata: {}", e)))?;
    if !metadata.is_file() {
        return Err(InventoryError::Storage(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_SCRIPT_FILE_SIZE {
        return Err(InventoryError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SCRIPT_FILE_SIZE
        )));
    }
    std::fs::read_to_string(path).map_err(|e| InventoryError::Storage(format!("Read file: {}", e)))
}

fn print_lights(ctx: &Context<'_>, objects: &[BusinessObjectLight]) {
    if ctx.json_mode {
        print_json(objects);
        return;
    }
    for object in objects {
        println!("{}  {}  {}", object.uuid, object.class_name, object.name);
    }
}

fn print_created(ctx: &Context<'_>, what: &str, id: &str) {
    if ctx.json_mode {
        print_json(&serde_json::json!({ "created": what, "id": id }));
    } else {
        println!("Created {} {}", what, id);
    }
}

// =============================================================================
// INIT & STATUS
// =============================================================================

pub fn cmd_init(ctx: &Context<'_>, database: &Path, admin_password: &str) -> Result<(), InventoryError> {
    ctx.service.bootstrap(admin_password)?;
    tracing::info!(event = "bootstrap", database = %database.display(), "Database initialized");
    println!("Initialized inventory database at {:?}", database);
    Ok(())
}

pub fn cmd_status(ctx: &Context<'_>, database: &Path) -> Result<(), InventoryError> {
    let initialized = ctx.service.is_initialized()?;
    let (nodes, relationships) = ctx.service.stats()?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "database": database.to_string_lossy(),
            "initialized": initialized,
            "node_count": nodes,
            "relationship_count": relationships,
        }));
        return Ok(());
    }

    println!("Invgraph Database Status");
    println!("========================");
    println!("Database:      {:?}", database);
    println!("Initialized:   {}", initialized);
    println!("Nodes:         {}", nodes);
    println!("Relationships: {}", relationships);
    Ok(())
}

// =============================================================================
// CLASSES
// =============================================================================

pub fn cmd_class(ctx: &Context<'_>, action: ClassAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        ClassAction::Create {
            name,
            parent,
            abstract_class,
        } => {
            let mut definition = ClassDefinition::new(&name, parent);
            if abstract_class {
                definition = definition.abstract_class();
            }
            let id = service.create_class(ctx.actor, &definition)?;
            print_created(ctx, "class", &id.to_string());
        }
        ClassAction::List => {
            let classes = service.get_all_classes()?;
            if ctx.json_mode {
                print_json(&classes);
            } else {
                for class in classes {
                    let marker = if class.abstract_class { " (abstract)" } else { "" };
                    println!("{}{}", class.name, marker);
                }
            }
        }
        ClassAction::Show { name } => {
            let class = service.get_class(&name)?;
            if ctx.json_mode {
                print_json(&*class);
                return Ok(());
            }
            println!("{} extends {}", class.name, class.parent.as_deref().unwrap_or("-"));
            for attr in &class.attributes {
                let mut modifiers = Vec::new();
                if attr.mandatory {
                    modifiers.push("mandatory");
                }
                if attr.unique {
                    modifiers.push("unique");
                }
                if attr.read_only {
                    modifiers.push("read-only");
                }
                println!("  {}: {} {}", attr.name, attr.attribute_type.as_str(), modifiers.join(","));
            }
        }
        ClassAction::Attribute {
            class,
            name,
            attribute_type,
            mandatory,
            unique,
        } => {
            let mut definition = AttributeDefinition::new(&name, AttributeType::parse(&attribute_type));
            if mandatory {
                definition = definition.mandatory();
            }
            if unique {
                definition = definition.unique();
            }
            let id = service.create_attribute(ctx.actor, &class, &definition)?;
            print_created(ctx, "attribute", &id.to_string());
        }
        ClassAction::Children {
            parent,
            children,
            special,
        } => {
            let children: Vec<&str> = children.iter().map(String::as_str).collect();
            if special {
                service.add_possible_special_children(ctx.actor, parent.as_deref(), &children)?;
            } else {
                service.add_possible_children(ctx.actor, parent.as_deref(), &children)?;
            }
            println!("{} possible children added", children.len());
        }
    }
    Ok(())
}

// =============================================================================
// OBJECTS
// =============================================================================

pub fn cmd_object(ctx: &Context<'_>, action: ObjectAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        ObjectAction::Create {
            class,
            name,
            parent,
            attributes,
            template,
        } => {
            let parent = parent.as_deref().map(object_ref).transpose()?;
            let changes = attribute_changes(ctx, &class, Some(&name), &attributes)?;
            let uuid = service.create_object(ctx.actor, &class, parent, &changes, template.as_deref())?;
            print_created(ctx, &class, &uuid);
        }
        ObjectAction::Bulk {
            class,
            parent,
            count,
            pattern,
        } => {
            let parent = parent.as_deref().map(object_ref).transpose()?;
            let uuids = service.create_bulk_objects(ctx.actor, &class, parent, count, &pattern)?;
            if ctx.json_mode {
                print_json(&uuids);
            } else {
                println!("Created {} objects of class {}", uuids.len(), class);
            }
        }
        ObjectAction::Show { class, uuid } => {
            let object = service.get_object(&class, &uuid)?;
            if ctx.json_mode {
                print_json(&object_json(&object));
                return Ok(());
            }
            println!("{} ({}) {}", object.name, object.class_name, object.uuid);
            for (name, value) in &object.attributes {
                println!("  {} = {}", name, value);
            }
        }
        ObjectAction::Children {
            class,
            uuid,
            special,
        } => {
            let children = if special {
                service.get_special_children(&class, &uuid)?
            } else {
                service.get_children(&class, &uuid)?
            };
            print_lights(ctx, &children);
        }
        ObjectAction::Roots => print_lights(ctx, &service.get_root_objects()?),
        ObjectAction::Update {
            class,
            uuid,
            attributes,
        } => {
            let object = service.get_object_light(&class, &uuid)?;
            let changes = attribute_changes(ctx, &object.class_name, None, &attributes)?;
            let change = service.update_object(ctx.actor, &class, &uuid, &changes)?;
            if ctx.json_mode {
                print_json(&change);
            } else {
                println!("Updated: {}", change.affected_properties.join(", "));
            }
        }
        ObjectAction::Delete {
            class,
            uuid,
            release,
        } => {
            service.delete_objects(ctx.actor, &[(class.as_str(), uuid.as_str())], release)?;
            println!("Deleted {} {}", class, uuid);
        }
        ObjectAction::Relate { source, target, name } => {
            service.create_special_relationship(ctx.actor, object_ref(&source)?, object_ref(&target)?, &name)?;
            println!("Related {} -[{}]-> {}", source, name, target);
        }
    }
    Ok(())
}

// =============================================================================
// POOLS
// =============================================================================

pub fn cmd_pool(ctx: &Context<'_>, action: PoolAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        PoolAction::Create {
            name,
            class,
            description,
            pool_type,
        } => {
            let uuid = service.create_root_pool(ctx.actor, &name, &description, &class, pool_type)?;
            print_created(ctx, "pool", &uuid);
        }
        PoolAction::List => {
            let pools = service.get_root_pools(None, None, false)?;
            if ctx.json_mode {
                print_json(&pools);
            } else {
                for pool in pools {
                    println!("{}  {}  [{}]", pool.uuid, pool.name, pool.class_name);
                }
            }
        }
        PoolAction::Items { uuid, limit } => print_lights(ctx, &service.get_pool_items(&uuid, limit)?),
        PoolAction::Delete { uuids } => {
            let uuids: Vec<&str> = uuids.iter().map(String::as_str).collect();
            service.delete_pools(ctx.actor, &uuids)?;
            println!("Deleted {} pools", uuids.len());
        }
    }
    Ok(())
}

// =============================================================================
// TEMPLATES
// =============================================================================

pub fn cmd_template(ctx: &Context<'_>, action: TemplateAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        TemplateAction::Create { class, name } => {
            let uuid = service.create_template(ctx.actor, &class, &name)?;
            print_created(ctx, "template", &uuid);
        }
        TemplateAction::List { class } => print_lights(ctx, &service.get_templates_for_class(&class)?),
        TemplateAction::Element {
            class,
            parent,
            name,
            special,
        } => {
            let parent = object_ref(&parent)?;
            let uuid = if special {
                service.create_template_special_element(ctx.actor, &class, parent, &name)?
            } else {
                service.create_template_element(ctx.actor, &class, parent, &name)?
            };
            print_created(ctx, "template element", &uuid);
        }
    }
    Ok(())
}

// =============================================================================
// LIST TYPES
// =============================================================================

pub fn cmd_list_type(ctx: &Context<'_>, action: ListTypeAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        ListTypeAction::Add {
            class,
            name,
            display_name,
        } => {
            let uuid = service.create_list_type_item(ctx.actor, &class, &name, display_name.as_deref())?;
            print_created(ctx, "list type item", &uuid);
        }
        ListTypeAction::Items { class } => {
            let items = service.get_list_type_items(&class)?;
            if ctx.json_mode {
                print_json(&items);
            } else {
                for item in items {
                    println!("{}  {}", item.uuid, item.display_name.as_deref().unwrap_or(&item.name));
                }
            }
        }
        ListTypeAction::Delete { class, uuid, release } => {
            service.delete_list_type_item(ctx.actor, &class, &uuid, release)?;
            println!("Deleted {} {}", class, uuid);
        }
    }
    Ok(())
}

// =============================================================================
// USERS
// =============================================================================

pub fn cmd_user(ctx: &Context<'_>, action: UserAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        UserAction::Create { name, password, group } => {
            let group = service.get_group(&group)?;
            let id = service.create_user(ctx.actor, &NewUser::new(&name, password, group.id))?;
            print_created(ctx, "user", &id.to_string());
        }
        UserAction::List => {
            let users = service.get_users()?;
            if ctx.json_mode {
                print_json(&users);
            } else {
                for user in users {
                    let state = if user.enabled { "" } else { " (disabled)" };
                    println!("{}{}", user.name, state);
                }
            }
        }
        UserAction::CreateGroup { name, description } => {
            let id = service.create_group(ctx.actor, &name, &description)?;
            print_created(ctx, "group", &id.to_string());
        }
        UserAction::Groups => {
            let groups = service.get_groups()?;
            if ctx.json_mode {
                print_json(&groups);
            } else {
                for group in groups {
                    println!("{}  {}", group.name, group.description);
                }
            }
        }
        UserAction::Join { user, group } => {
            service.add_user_to_group(ctx.actor, &user, &group)?;
            println!("{} joined {}", user, group);
        }
        UserAction::Leave { user, group } => {
            service.remove_user_from_group(ctx.actor, &user, &group)?;
            println!("{} left {}", user, group);
        }
    }
    Ok(())
}

// =============================================================================
// CONFIGURATION VARIABLES
// =============================================================================

pub fn cmd_config_var(ctx: &Context<'_>, action: ConfigVarAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        ConfigVarAction::CreatePool { name, description } => {
            let uuid = service.create_configuration_variables_pool(ctx.actor, &name, &description)?;
            print_created(ctx, "pool", &uuid);
        }
        ConfigVarAction::Pools => {
            let pools = service.get_configuration_variables_pools()?;
            if ctx.json_mode {
                print_json(&pools);
            } else {
                for pool in pools {
                    println!("{}  {}", pool.uuid, pool.name);
                }
            }
        }
        ConfigVarAction::Create {
            pool,
            name,
            value,
            variable_type,
            masked,
            description,
        } => {
            let variable = NewConfigurationVariable {
                name,
                description,
                variable_type: variable_type.into(),
                masked,
                value_definition: value,
            };
            let id = service.create_configuration_variable(ctx.actor, &pool, &variable)?;
            print_created(ctx, "configuration variable", &id.to_string());
        }
        ConfigVarAction::Get { name } => {
            let value = service.get_configuration_variable_value(&name)?;
            if ctx.json_mode {
                print_json(&value);
            } else {
                println!("{:?}", value);
            }
        }
        ConfigVarAction::Find { prefix } => {
            let variables = service.get_configuration_variables_with_prefix(&prefix)?;
            if ctx.json_mode {
                print_json(&variables);
            } else {
                for variable in variables {
                    let shown = if variable.masked { "****" } else { variable.value_definition.as_str() };
                    println!("{} = {}", variable.name, shown);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// TASKS
// =============================================================================

pub fn cmd_task(ctx: &Context<'_>, action: TaskAction) -> Result<(), InventoryError> {
    let service = ctx.service;
    match action {
        TaskAction::Create {
            name,
            script,
            parameters,
            commit,
        } => {
            let task = NewTask {
                name,
                enabled: true,
                commit_on_execute: commit,
                script: Some(read_script(&script)?),
                parameters: key_values(&parameters)?,
                ..NewTask::default()
            };
            let id = service.create_task(ctx.actor, &task)?;
            print_created(ctx, "task", &id.to_string());
        }
        TaskAction::List => {
            let tasks = service.get_tasks()?;
            if ctx.json_mode {
                print_json(&tasks);
            } else {
                for task in tasks {
                    let mode = if task.commit_on_execute { "commit" } else { "dry-run" };
                    println!("{}  {}  [{}]", task.id, task.name, mode);
                }
            }
        }
        TaskAction::Run { id } => return run_task(ctx, NodeId(id)),
        TaskAction::Delete { id } => {
            service.delete_task(ctx.actor, NodeId(id))?;
            println!("Deleted task {}", id);
        }
    }
    Ok(())
}

fn run_task(ctx: &Context<'_>, id: NodeId) -> Result<(), InventoryError> {
    match ctx.service.execute_task(ctx.actor, id) {
        Ok(outcome) => {
            let committed = matches!(outcome, TaskOutcome::Committed(_));
            let result = outcome.result();
            if ctx.json_mode {
                print_json(&serde_json::json!({ "committed": committed, "result": result }));
                return Ok(());
            }
            println!("Task {} {}", id, if committed { "committed" } else { "discarded" });
            for message in &result.messages {
                println!("  [{:?}] {}", message.level, message.text);
            }
            Ok(())
        }
        Err(TaskExecutionError::RolledBack(error)) => Err(error),
        Err(TaskExecutionError::PartiallyApplied {
            error,
            external_effects,
        }) => {
            tracing::warn!(
                event = "task_partially_applied",
                task = %id,
                effects = external_effects.len(),
                "Task failed after writing outside the transaction"
            );
            for effect in &external_effects {
                println!("  external effect kept: {}", effect);
            }
            Err(error)
        }
    }
}

// =============================================================================
// AUDIT
// =============================================================================

pub fn cmd_audit(ctx: &Context<'_>, action: AuditAction) -> Result<(), InventoryError> {
    let entries = match action {
        AuditAction::General { page, limit } => ctx.service.get_general_activity_audit_trail(page, limit)?,
        AuditAction::Object { class, uuid, limit } => {
            ctx.service.get_business_object_audit_trail(&class, &uuid, limit)?
        }
    };
    if ctx.json_mode {
        print_json(&entries);
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:?}  {}  {}",
            entry.timestamp, entry.activity_type, entry.performing_user, entry.notes
        );
    }
    Ok(())
}

/// Database path for the command line, falling back to the configuration.
pub fn database_path(flag: Option<&PathBuf>, configured: &Path) -> PathBuf {
    flag.cloned().unwrap_or_else(|| configured.to_path_buf())
}
