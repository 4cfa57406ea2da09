//! Filesystem semantics over a flat object store.
//!
//! The [`StorageInterface`] trait is the caller-facing contract: paths in,
//! locators and file attributes out. [`ObjectStorage`] implements it on top
//! of an [`ObjectStoreClient`](crate::storage::client::ObjectStoreClient),
//! emulating directories with zero-byte marker objects.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::errors::StorageError;

pub mod attributes;
pub mod deleter;
pub mod directory;
pub mod lister;
pub mod mover;
pub mod object_storage;

pub use object_storage::ObjectStorage;

/// Boxed future returned by [`StorageInterface`] methods.
pub type StorageFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// Kind of entry a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileType {
    File,
    Directory,
}

/// Stat view of a file or directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttributes {
    /// Last non-empty segment of the key.
    pub file_name: String,
    pub file_type: FileType,
    /// Size in bytes; zero for directories.
    pub size: u64,
    pub last_modified_time: DateTime<Utc>,
    /// The store does not track creation, so this mirrors `last_modified_time`.
    pub creation_time: DateTime<Utc>,
    /// User metadata with camelCase keys.
    pub metadata: HashMap<String, String>,
}

impl FileAttributes {
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// A payload plus optional user metadata.
#[derive(Debug, Clone, Default)]
pub struct StorageObject {
    pub metadata: Option<HashMap<String, String>>,
    pub data: Bytes,
}

impl StorageObject {
    /// Payload with no metadata.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            metadata: None,
            data: data.into(),
        }
    }

    /// Payload with the given metadata.
    pub fn with_metadata(data: impl Into<Bytes>, metadata: HashMap<String, String>) -> Self {
        Self {
            metadata: Some(metadata),
            data: data.into(),
        }
    }
}

/// Result of removing a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The entry existed and was removed.
    Deleted,
    /// Nothing exists at the path.
    NotFound,
    /// The entry exists but could not be removed.
    Failed(String),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Tenant-scoped filesystem contract.
///
/// `tenant_id` of `None` addresses instance-level resources that live at
/// the bucket root. Paths may be bare (`/a/b.yml`) or locators
/// (`kestra:///a/b.yml`); returned locators always use the `kestra` scheme.
pub trait StorageInterface: Send + Sync {
    /// Read a file.
    fn get(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, Bytes>;

    /// Read a file along with its user metadata.
    fn get_with_metadata(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> StorageFuture<'_, StorageObject>;

    /// Every entry below `prefix`, at any depth, as locators.
    fn all_by_prefix(
        &self,
        tenant_id: Option<&str>,
        prefix: &str,
        include_directories: bool,
    ) -> StorageFuture<'_, Vec<String>>;

    /// Direct children of a directory.
    ///
    /// An empty existing directory yields an empty list; a missing one
    /// fails with [`StorageError::NotFound`].
    fn list(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, Vec<FileAttributes>>;

    /// Whether an object exists at exactly this path.
    ///
    /// Store failures read as `false`; only an invalid path is an error.
    fn exists(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, bool>;

    /// Stat a file, falling back to the directory of the same name.
    fn get_attributes(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> StorageFuture<'_, FileAttributes>;

    fn size(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, u64>;

    fn last_modified_time(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> StorageFuture<'_, DateTime<Utc>>;

    /// Write a file, creating missing parent directories.
    ///
    /// Returns the locator actually written, which differs from `uri` when
    /// the file name had to be shortened.
    fn put(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
        object: StorageObject,
    ) -> StorageFuture<'_, String>;

    /// Delete a file or a directory tree; `true` iff something was removed.
    fn delete(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, bool>;

    /// Like [`StorageInterface::delete`], but tells missing apart from failed.
    fn remove(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, DeleteOutcome>;

    /// Create a directory and its ancestors; returns its locator (ending in `/`).
    fn create_directory(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, String>;

    /// Copy-then-delete a file or directory tree; returns the destination locator.
    fn move_path(
        &self,
        tenant_id: Option<&str>,
        from: &str,
        to: &str,
    ) -> StorageFuture<'_, String>;

    /// Delete every object below `prefix`; returns the removed entries as locators.
    fn delete_by_prefix(
        &self,
        tenant_id: Option<&str>,
        prefix: &str,
    ) -> StorageFuture<'_, Vec<String>>;
}
