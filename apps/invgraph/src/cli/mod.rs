//! # Invgraph CLI Module
//!
//! Command line over an inventory database.
//!
//! ## Available Commands
//!
//! - `init` - Create the core schema and the default administrator
//! - `status` - Show database status
//! - `class` - Class catalog and containment rules
//! - `object` - Inventory objects and special relationships
//! - `pool` - Pools and pool items
//! - `template` - Templates and template elements
//! - `list-type` - List type items
//! - `user` - Users and groups
//! - `config-var` - Configuration variables and their pools
//! - `task` - Task definitions and execution
//! - `audit` - Activity log

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand, ValueEnum};
use invgraph_core::primitives::ADMIN_USER;
use invgraph_core::types::model::ConfigVariableType;
use invgraph_core::{InventoryError, InventoryService};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Invgraph - inventory store administration
#[derive(Parser, Debug)]
#[command(name = "invgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging when INVGRAPH_LOG is not set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "invgraph.toml")]
    pub config: PathBuf,

    /// Database path, overrides the configuration file
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// User the changes are recorded for
    #[arg(short, long, global = true, default_value = ADMIN_USER)]
    pub user: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the core schema and the default administrator
    Init {
        /// Password of the `admin` user
        #[arg(long)]
        admin_password: String,
    },

    /// Show database status
    Status,

    /// Class catalog
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },

    /// Inventory objects
    Object {
        #[command(subcommand)]
        action: ObjectAction,
    },

    /// Pools
    Pool {
        #[command(subcommand)]
        action: PoolAction,
    },

    /// Templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// List type items
    ListType {
        #[command(subcommand)]
        action: ListTypeAction,
    },

    /// Users and groups
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Configuration variables
    ConfigVar {
        #[command(subcommand)]
        action: ConfigVarAction,
    },

    /// Tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Activity log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClassAction {
    /// Create a class
    Create {
        name: String,
        /// Parent class
        #[arg(short, long, default_value = "InventoryObject")]
        parent: String,
        /// Instances can only be created of its subclasses
        #[arg(long = "abstract")]
        abstract_class: bool,
    },
    /// List every class
    List,
    /// Show a class with its attributes
    Show { name: String },
    /// Declare an attribute; the type is a primitive name or a list type class
    Attribute {
        class: String,
        name: String,
        #[arg(short = 't', long, default_value = "String")]
        attribute_type: String,
        #[arg(long)]
        mandatory: bool,
        #[arg(long)]
        unique: bool,
    },
    /// Allow children under a class (omit the parent for the root)
    Children {
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(required = true)]
        children: Vec<String>,
        /// Special containment instead of normal containment
        #[arg(long)]
        special: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ObjectAction {
    /// Create an object
    Create {
        class: String,
        #[arg(short, long)]
        name: String,
        /// Parent as `Class:uuid`; omitted for root objects
        #[arg(short, long)]
        parent: Option<String>,
        /// Attribute as `name=value`, repeatable
        #[arg(short, long = "attr")]
        attributes: Vec<String>,
        /// Template to spawn from
        #[arg(short, long)]
        template: Option<String>,
    },
    /// Create objects named by a pattern such as `port-[sequence(1,24)]`
    Bulk {
        class: String,
        #[arg(short, long)]
        parent: Option<String>,
        #[arg(short = 'n', long)]
        count: usize,
        #[arg(long)]
        pattern: String,
    },
    /// Show an object
    Show { class: String, uuid: String },
    /// List the children of an object
    Children {
        class: String,
        uuid: String,
        #[arg(long)]
        special: bool,
    },
    /// List the root objects
    Roots,
    /// Set attributes as `name=value`
    Update {
        class: String,
        uuid: String,
        #[arg(short, long = "attr", required = true)]
        attributes: Vec<String>,
    },
    /// Delete an object with its subtree
    Delete {
        class: String,
        uuid: String,
        /// Release special relationships instead of refusing
        #[arg(long)]
        release: bool,
    },
    /// Relate two objects, both given as `Class:uuid`
    Relate {
        source: String,
        target: String,
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PoolAction {
    /// Create a root pool
    Create {
        name: String,
        #[arg(long)]
        class: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(long, default_value = "1")]
        pool_type: i64,
    },
    /// List the root pools
    List,
    /// List the items of a pool
    Items {
        uuid: String,
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
    /// Delete pools with their content
    Delete {
        #[arg(required = true)]
        uuids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateAction {
    /// Create a template for a class
    Create { class: String, name: String },
    /// List the templates of a class
    List { class: String },
    /// Add an element under a template element given as `Class:uuid`
    Element {
        class: String,
        parent: String,
        name: String,
        #[arg(long)]
        special: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListTypeAction {
    /// Add an item to a list type
    Add {
        class: String,
        name: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List the items of a list type
    Items { class: String },
    /// Delete an item
    Delete {
        class: String,
        uuid: String,
        #[arg(long)]
        release: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Create a user
    Create {
        name: String,
        #[arg(long)]
        password: String,
        /// Default group
        #[arg(short, long, default_value = "Administrators")]
        group: String,
    },
    /// List users
    List,
    /// Create a group
    CreateGroup {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List groups
    Groups,
    /// Add a user to a group
    Join { user: String, group: String },
    /// Remove a user from a group
    Leave { user: String, group: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigVarAction {
    /// Create a pool of variables
    CreatePool {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List pools
    Pools,
    /// Create a variable in a pool
    Create {
        pool: String,
        name: String,
        value: String,
        #[arg(short = 't', long, value_enum, default_value = "string")]
        variable_type: VariableKind,
        #[arg(long)]
        masked: bool,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Show the typed value of a variable
    Get { name: String },
    /// List variables whose name starts with a prefix
    Find { prefix: String },
}

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// Create a task from a script file
    Create {
        name: String,
        #[arg(long)]
        script: PathBuf,
        /// Parameter as `name=value`, repeatable
        #[arg(short, long = "param")]
        parameters: Vec<String>,
        /// Commit the changes made by the script
        #[arg(long)]
        commit: bool,
    },
    /// List tasks
    List,
    /// Run a task
    Run { id: u64 },
    /// Delete a task
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum AuditAction {
    /// General activity, newest first
    General {
        #[arg(short, long, default_value = "0")]
        page: usize,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Activity of one object, newest first
    Object {
        class: String,
        uuid: String,
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
}

/// Declared type of a configuration variable.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Matrix,
}

impl From<VariableKind> for ConfigVariableType {
    fn from(kind: VariableKind) -> Self {
        match kind {
            VariableKind::String => Self::String,
            VariableKind::Integer => Self::Integer,
            VariableKind::Float => Self::Float,
            VariableKind::Boolean => Self::Boolean,
            VariableKind::Array => Self::Array,
            VariableKind::Matrix => Self::Matrix,
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: AppConfig) -> Result<(), InventoryError> {
    let database = database_path(cli.database.as_ref(), &config.database);
    let service = InventoryService::open(&database, config.service)?;
    let ctx = Context {
        service: &service,
        actor: &cli.user,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Init { admin_password }) => cmd_init(&ctx, &database, &admin_password),
        Some(Commands::Status) | None => cmd_status(&ctx, &database),
        Some(Commands::Class { action }) => cmd_class(&ctx, action),
        Some(Commands::Object { action }) => cmd_object(&ctx, action),
        Some(Commands::Pool { action }) => cmd_pool(&ctx, action),
        Some(Commands::Template { action }) => cmd_template(&ctx, action),
        Some(Commands::ListType { action }) => cmd_list_type(&ctx, action),
        Some(Commands::User { action }) => cmd_user(&ctx, action),
        Some(Commands::ConfigVar { action }) => cmd_config_var(&ctx, action),
        Some(Commands::Task { action }) => cmd_task(&ctx, action),
        Some(Commands::Audit { action }) => cmd_audit(&ctx, action),
    }
}
