//! # Service Configuration
//!
//! Settings shared by every operation of an `InventoryService`. Every
//! field has a default, so a partial (or absent) configuration file is
//! valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default attachment size limit: 10 MiB.
pub const DEFAULT_MAX_ATTACHMENT_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_SCRIPT_MAX_OPERATIONS: u64 = 1_000_000;
pub const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// When false, relationship business rules are not evaluated.
    pub enforce_business_rules: bool,
    /// Directory holding object attachments.
    pub attachments_path: PathBuf,
    /// Directory holding view backgrounds.
    pub backgrounds_path: PathBuf,
    /// Largest attachment accepted, in bytes.
    pub max_attachment_size: u64,
    /// Operation budget of one script invocation.
    pub script_max_operations: u64,
    /// Wall clock budget of one script invocation.
    pub script_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enforce_business_rules: false,
            attachments_path: PathBuf::from("attachments"),
            backgrounds_path: PathBuf::from("backgrounds"),
            max_attachment_size: DEFAULT_MAX_ATTACHMENT_SIZE,
            script_max_operations: DEFAULT_SCRIPT_MAX_OPERATIONS,
            script_timeout_ms: DEFAULT_SCRIPT_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }
}
