//! # Application Configuration
//!
//! The TOML file read at startup. A missing file means defaults; unknown
//! keys are rejected so typos do not pass silently.
//!
//! ```toml
//! database = "inventory.redb"
//!
//! [service]
//! enforce_business_rules = true
//! attachments_path = "/var/lib/invgraph/attachments"
//! script_timeout_ms = 5000
//! ```

use invgraph_core::{InventoryError, ServiceConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "invgraph.redb";

/// Largest configuration file accepted (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: PathBuf,
    pub service: ServiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        let metadata = std::fs::metadata(path)
            .map_err(|e| InventoryError::Storage(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(InventoryError::Serialization(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| InventoryError::Storage(format!("Read config: {}", e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, InventoryError> {
        toml::from_str(text)
            .map_err(|e| InventoryError::Serialization(format!("Invalid config: {}", e)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
