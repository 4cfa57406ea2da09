//! Object store client contract.
//!
//! Every object-store collaborator implements [`ObjectStoreClient`]. The
//! trait speaks in flat object keys only; directories, tenants and locators
//! are handled by the layer above. Methods use manual desugaring with
//! pinned futures so the trait stays object-safe.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::errors::{ClientError, DeleteFailure};

/// Boxed future returned by [`ObjectStoreClient`] methods.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Result of a stat (HEAD) call.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Stored user metadata (header-safe keys).
    pub metadata: HashMap<String, String>,
    /// Content type, if the store reports one.
    pub content_type: Option<String>,
}

/// A single object write.
#[derive(Debug, Clone)]
pub struct PutObject {
    /// Target object key.
    pub key: String,
    /// Object body.
    pub data: Bytes,
    /// User metadata, already in stored form.
    pub metadata: Option<HashMap<String, String>>,
    /// Content type; the store's default applies when `None`.
    pub content_type: Option<String>,
}

impl PutObject {
    /// Build a write of `data` to `key` with no metadata.
    pub fn new(key: impl Into<String>, data: Bytes) -> Self {
        Self {
            key: key.into(),
            data,
            metadata: None,
            content_type: None,
        }
    }
}

/// Async object-store contract.
pub trait ObjectStoreClient: Send + Sync + 'static {
    /// Read the full object at `key`.
    fn get_object(&self, key: &str) -> ClientFuture<'_, Bytes>;

    /// Stat the object at `key`; `ClientError::NoSuchKey` when absent.
    fn stat_object(&self, key: &str) -> ClientFuture<'_, ObjectStat>;

    /// Write an object.
    fn put_object(&self, request: PutObject) -> ClientFuture<'_, ()>;

    /// Delete a single object.
    fn remove_object(&self, key: &str) -> ClientFuture<'_, ()>;

    /// Delete many objects, returning the keys the store refused to delete.
    fn remove_objects(&self, keys: Vec<String>) -> ClientFuture<'_, Vec<DeleteFailure>>;

    /// List keys under `prefix`.
    ///
    /// Non-recursive listings group deeper keys on the `/` delimiter and
    /// return each group once as its common prefix (ending in `/`).
    fn list_objects(&self, prefix: &str, recursive: bool) -> ClientFuture<'_, Vec<String>>;

    /// Server-side copy of `source` to `dest`.
    fn copy_object(&self, source: &str, dest: &str) -> ClientFuture<'_, ()>;
}
