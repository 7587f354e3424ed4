//! # invgraph-core
//!
//! The persistence core of the inventory - THE STORE.
//!
//! An object model of classes, attributes, list types, pools, templates,
//! views, users and scripts, persisted on a transactional property graph.
//!
//! ## Layers
//!
//! - `storage`: the redb property graph behind the `GraphRead`/`GraphWrite` seam
//! - `schema`, `mapper`, `hierarchy`: the class catalog, attribute mapping and
//!   recursive structure operations
//! - `cache`, `session`, `audit`, `rules`, `script`: cross-cutting services
//! - `service`: the explicitly owned context every public operation goes through
//!
//! ## Architectural Constraints
//!
//! - One graph transaction per public operation
//! - Caches and blob removals are applied only after a successful commit
//! - Errors carry a stable message key, rendered through `messages`
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod blob;
pub mod cache;
pub mod config;
pub mod hierarchy;
pub mod mapper;
pub mod messages;
pub mod pattern;
pub mod primitives;
pub mod rules;
pub mod schema;
pub mod script;
pub mod service;
pub mod session;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{AttributeValue, ChangeDescriptor, ErrorMessage, InventoryError, NodeId, RelId};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use config::ServiceConfig;
pub use messages::{EnglishCatalog, MessageCatalog};
pub use script::{ScriptEngine, ScriptHost};
pub use service::{InventoryService, TaskExecutionError, TaskOutcome};
pub use storage::{GraphDb, GraphRead, GraphWrite};
