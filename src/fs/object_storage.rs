//! Object-store backed implementation of [`StorageInterface`].
//!
//! Keys are `{tenant}/{path}`; directories are zero-byte markers ending in
//! `/`. The client is built from the store configuration on first use and
//! shared by every call afterwards.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::errors::StorageError;
use crate::fs::{
    attributes, deleter, directory, lister, mover, DeleteOutcome, FileAttributes,
    StorageFuture, StorageInterface, StorageObject,
};
use crate::limit::limit;
use crate::metadata;
use crate::metrics;
use crate::path::{self, path_of, resolve, traversal_guard};
use crate::storage::client::{ObjectStoreClient, PutObject};
use crate::storage::s3::S3ObjectClient;

/// Filesystem facade over an object store.
pub struct ObjectStorage {
    /// Store settings; `None` when built around an existing client.
    config: Option<StoreConfig>,
    /// Shared client, built on first use.
    client: OnceCell<Arc<dyn ObjectStoreClient>>,
}

/// Time `fut` and record it under `operation`.
async fn instrumented<T>(
    operation: &'static str,
    fut: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    let start = Instant::now();
    let result = fut.await;
    metrics::record_operation(operation, start, result.is_ok());
    result
}

impl ObjectStorage {
    /// Wrap an already constructed client.
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            config: None,
            client: OnceCell::new_with(Some(client)),
        }
    }

    /// Connect lazily to the S3-compatible store described by `config`.
    ///
    /// The configuration is validated here; the connection is made on the
    /// first operation.
    pub fn from_config(config: StoreConfig) -> anyhow::Result<Self> {
        config.verify()?;
        Ok(Self {
            config: Some(config),
            client: OnceCell::new(),
        })
    }

    /// Store settings this facade was built from, if any.
    pub fn config(&self) -> Option<&StoreConfig> {
        self.config.as_ref()
    }

    /// Build the client now instead of on the first operation.
    pub async fn init(&self) -> Result<(), StorageError> {
        self.client().await.map(|_| ())
    }

    /// Release the client.
    pub fn close(self) {
        if self.client.initialized() {
            info!("Closing object storage client");
        }
        drop(self.client);
    }

    async fn client(&self) -> Result<&dyn ObjectStoreClient, StorageError> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let config = self.config.as_ref().ok_or_else(|| {
                    StorageError::Transport(anyhow::anyhow!("no object store configured"))
                })?;
                let client = S3ObjectClient::connect(config).await?;
                Ok::<Arc<dyn ObjectStoreClient>, StorageError>(Arc::new(client))
            })
            .await?;
        Ok(client.as_ref())
    }

    async fn exists_key(&self, key: &str) -> Result<bool, StorageError> {
        let client = self.client().await?;
        match client.stat_object(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_no_such_key() => Ok(false),
            Err(e) => {
                warn!("Unable to stat {}: {}", key, e);
                Ok(false)
            }
        }
    }

    async fn attributes(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> Result<FileAttributes, StorageError> {
        let mut key = resolve(tenant_id, uri)?;
        if !key.ends_with('/') && !self.exists_key(&key).await? {
            // Not a file; try the directory of the same name.
            key.push('/');
        }

        let client = self.client().await?;
        attributes::file_attributes(client, &key)
            .await
            .map_err(|e| e.into_storage(uri))
    }

    async fn remove_entry(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> Result<DeleteOutcome, StorageError> {
        let attrs = match self.attributes(tenant_id, uri).await {
            Ok(attrs) => attrs,
            Err(StorageError::NotFound { .. }) => return Ok(DeleteOutcome::NotFound),
            Err(e @ StorageError::InvalidPath { .. }) => return Err(e),
            Err(e) => return Ok(DeleteOutcome::Failed(e.to_string())),
        };

        let key = resolve(tenant_id, uri)?;
        let client = self.client().await?;

        if attrs.is_directory() {
            // Part of the tree may already be gone, so failures are raised.
            let prefix = lister::to_prefix(&key, true);
            let deleted = deleter::delete_by_prefix(client, tenant_id, &prefix).await?;
            return Ok(if deleted.is_empty() {
                DeleteOutcome::NotFound
            } else {
                DeleteOutcome::Deleted
            });
        }

        Ok(match client.remove_object(&key).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) => {
                warn!("Unable to delete {}: {}", uri, e);
                DeleteOutcome::Failed(e.to_string())
            }
        })
    }
}

impl StorageInterface for ObjectStorage {
    fn get(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, Bytes> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("get", async move {
            let key = resolve(tenant_id.as_deref(), &uri)?;
            debug!("get {}", key);
            self.client()
                .await?
                .get_object(&key)
                .await
                .map_err(|e| e.into_storage(&uri))
        }))
    }

    fn get_with_metadata(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> StorageFuture<'_, StorageObject> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("get_with_metadata", async move {
            let key = resolve(tenant_id.as_deref(), &uri)?;
            let client = self.client().await?;
            let stat = client
                .stat_object(&key)
                .await
                .map_err(|e| e.into_storage(&uri))?;
            let data = client
                .get_object(&key)
                .await
                .map_err(|e| e.into_storage(&uri))?;

            Ok(StorageObject {
                metadata: metadata::to_retrieved(Some(&stat.metadata)),
                data,
            })
        }))
    }

    fn all_by_prefix(
        &self,
        tenant_id: Option<&str>,
        prefix: &str,
        include_directories: bool,
    ) -> StorageFuture<'_, Vec<String>> {
        let tenant_id = tenant_id.map(str::to_string);
        let prefix = prefix.to_string();
        Box::pin(instrumented("all_by_prefix", async move {
            let key = resolve(tenant_id.as_deref(), &prefix)?;
            let client = self.client().await?;
            lister::all_by_prefix(client, &key, path_of(&prefix), include_directories)
                .await
                .map_err(|e| e.into_storage(&prefix))
        }))
    }

    fn list(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, Vec<FileAttributes>> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("list", async move {
            let key = resolve(tenant_id.as_deref(), &uri)?;
            let client = self.client().await?;
            let entries = lister::list(client, &key)
                .await
                .map_err(|e| e.into_storage(&uri))?;

            if entries.is_empty() {
                // Tell an empty directory apart from a missing one.
                self.attributes(tenant_id.as_deref(), &uri).await?;
            }
            Ok(entries)
        }))
    }

    fn exists(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, bool> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("exists", async move {
            let key = resolve(tenant_id.as_deref(), &uri)?;
            self.exists_key(&key).await
        }))
    }

    fn get_attributes(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> StorageFuture<'_, FileAttributes> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("get_attributes", async move {
            self.attributes(tenant_id.as_deref(), &uri).await
        }))
    }

    fn size(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, u64> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("size", async move {
            Ok(self.attributes(tenant_id.as_deref(), &uri).await?.size)
        }))
    }

    fn last_modified_time(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
    ) -> StorageFuture<'_, DateTime<Utc>> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("last_modified_time", async move {
            Ok(self
                .attributes(tenant_id.as_deref(), &uri)
                .await?
                .last_modified_time)
        }))
    }

    fn put(
        &self,
        tenant_id: Option<&str>,
        uri: &str,
        object: StorageObject,
    ) -> StorageFuture<'_, String> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("put", async move {
            traversal_guard(&uri)?;
            let limited = limit(path_of(&uri));
            let key = resolve(tenant_id.as_deref(), &limited)?;
            let client = self.client().await?;

            directory::ensure_ancestors(client, &key)
                .await
                .map_err(|e| e.into_storage(&uri))?;

            let mut request = PutObject::new(key, object.data);
            request.metadata = metadata::to_stored(object.metadata.as_ref());
            debug!("put {} ({} bytes)", request.key, request.data.len());
            client
                .put_object(request)
                .await
                .map_err(|e| e.into_storage(&uri))?;

            Ok(path::locator(&limited))
        }))
    }

    fn delete(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, bool> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("delete", async move {
            Ok(self
                .remove_entry(tenant_id.as_deref(), &uri)
                .await?
                .is_deleted())
        }))
    }

    fn remove(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, DeleteOutcome> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("remove", async move {
            self.remove_entry(tenant_id.as_deref(), &uri).await
        }))
    }

    fn create_directory(&self, tenant_id: Option<&str>, uri: &str) -> StorageFuture<'_, String> {
        let tenant_id = tenant_id.map(str::to_string);
        let uri = uri.to_string();
        Box::pin(instrumented("create_directory", async move {
            let key = resolve(tenant_id.as_deref(), &uri)?;
            let client = self.client().await?;
            directory::create_directory(client, &key)
                .await
                .map_err(|e| e.into_storage(&uri))?;

            let dir = path_of(&uri);
            Ok(path::locator(&lister::to_prefix(dir, true)))
        }))
    }

    fn move_path(
        &self,
        tenant_id: Option<&str>,
        from: &str,
        to: &str,
    ) -> StorageFuture<'_, String> {
        let tenant_id = tenant_id.map(str::to_string);
        let from = from.to_string();
        let to = to.to_string();
        Box::pin(instrumented("move", async move {
            let source = resolve(tenant_id.as_deref(), &from)?;
            let dest = resolve(tenant_id.as_deref(), &to)?;
            let attrs = self.attributes(tenant_id.as_deref(), &from).await?;

            let client = self.client().await?;
            mover::move_keys(client, &source, &dest, attrs.is_directory(), &from).await?;

            Ok(path::locator(path_of(&to)))
        }))
    }

    fn delete_by_prefix(
        &self,
        tenant_id: Option<&str>,
        prefix: &str,
    ) -> StorageFuture<'_, Vec<String>> {
        let tenant_id = tenant_id.map(str::to_string);
        let prefix = prefix.to_string();
        Box::pin(instrumented("delete_by_prefix", async move {
            let key = resolve(tenant_id.as_deref(), &prefix)?;
            let client = self.client().await?;
            deleter::delete_by_prefix(client, tenant_id.as_deref(), &key).await
        }))
    }
}
