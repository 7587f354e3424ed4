//! # Blob Store
//!
//! External storage for attachment contents and view backgrounds. The
//! graph only records the deterministic blob names:
//! - attachments: `<ownerUuid>_<fileNodeId>`
//! - view backgrounds: `view-<ownerId>-<viewId>-<className>`
//!
//! Blob writes are not transactional. Deletions are issued after the
//! owning transaction committed, and their failures are logged only.

use crate::types::{InventoryError, NodeId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory a blob lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlobKind {
    Attachment,
    Background,
}

/// A blob scheduled for removal once its owner is gone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlobRef {
    pub kind: BlobKind,
    pub name: String,
}

impl BlobRef {
    pub fn attachment(name: impl Into<String>) -> Self {
        Self {
            kind: BlobKind::Attachment,
            name: name.into(),
        }
    }

    pub fn background(name: impl Into<String>) -> Self {
        Self {
            kind: BlobKind::Background,
            name: name.into(),
        }
    }
}

pub fn attachment_name(owner_uuid: &str, file: NodeId) -> String {
    format!("{}_{}", owner_uuid, file)
}

/// `owner` is the uuid of the owning object, or the list type class name
/// for layouts, or `general` for general views.
pub fn background_name(owner: &str, view: NodeId, class_name: &str) -> String {
    format!("view-{}-{}-{}", owner, view, class_name)
}

pub trait BlobStore: Send + Sync {
    fn save(&self, kind: BlobKind, name: &str, bytes: &[u8]) -> Result<(), InventoryError>;

    fn read(&self, kind: BlobKind, name: &str) -> Result<Vec<u8>, InventoryError>;

    fn delete(&self, kind: BlobKind, name: &str) -> Result<(), InventoryError>;
}

/// Remove blobs whose owners were deleted. Best effort.
pub fn discard(store: &dyn BlobStore, blobs: &[BlobRef]) {
    for blob in blobs {
        if let Err(e) = store.delete(blob.kind, &blob.name) {
            tracing::warn!(
                event = "blob_cleanup_failed",
                blob = %blob.name,
                error = %e,
                "Could not remove blob of a deleted object"
            );
        }
    }
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Blobs as plain files under two directories, created on first write.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    attachments: PathBuf,
    backgrounds: PathBuf,
}

impl FsBlobStore {
    pub fn new(attachments: impl Into<PathBuf>, backgrounds: impl Into<PathBuf>) -> Self {
        Self {
            attachments: attachments.into(),
            backgrounds: backgrounds.into(),
        }
    }

    fn dir(&self, kind: BlobKind) -> &Path {
        match kind {
            BlobKind::Attachment => &self.attachments,
            BlobKind::Background => &self.backgrounds,
        }
    }
}

fn io_err(path: &Path, e: std::io::Error) -> InventoryError {
    InventoryError::Storage(format!("{}: {}", path.display(), e))
}

impl BlobStore for FsBlobStore {
    fn save(&self, kind: BlobKind, name: &str, bytes: &[u8]) -> Result<(), InventoryError> {
        let dir = self.dir(kind);
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        let path = dir.join(name);
        fs::write(&path, bytes).map_err(|e| io_err(&path, e))
    }

    fn read(&self, kind: BlobKind, name: &str) -> Result<Vec<u8>, InventoryError> {
        let path = self.dir(kind).join(name);
        fs::read(&path).map_err(|e| io_err(&path, e))
    }

    fn delete(&self, kind: BlobKind, name: &str) -> Result<(), InventoryError> {
        let path = self.dir(kind).join(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

// =============================================================================
// IN MEMORY
// =============================================================================

/// Blobs kept in memory. Used with the in-memory graph backend.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<(BlobKind, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: BlobKind, name: &str) -> bool {
        self.blobs.read().contains_key(&(kind, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn save(&self, kind: BlobKind, name: &str, bytes: &[u8]) -> Result<(), InventoryError> {
        self.blobs.write().insert((kind, name.to_string()), bytes.to_vec());
        Ok(())
    }

    fn read(&self, kind: BlobKind, name: &str) -> Result<Vec<u8>, InventoryError> {
        self.blobs
            .read()
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| InventoryError::Storage(format!("blob {} not found", name)))
    }

    fn delete(&self, kind: BlobKind, name: &str) -> Result<(), InventoryError> {
        self.blobs.write().remove(&(kind, name.to_string()));
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
