//! In-memory object store client.
//!
//! Objects are held in a `tokio::sync::RwLock<BTreeMap<...>>` keyed by
//! object key, so prefix listings come out in the same lexicographic order
//! an S3 service returns. Listing, stat and bulk-delete semantics follow
//! S3: non-recursive listings collapse deeper keys into common prefixes,
//! missing keys report `NoSuchKey`, and bulk deletes report per-key errors
//! instead of failing the whole call.
//!
//! Deletes can be made to fail for chosen keys with
//! [`MemoryObjectClient::reject_deletes`], which is how partial-failure
//! paths are exercised without a real store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use super::client::{ClientFuture, ObjectStat, ObjectStoreClient, PutObject};
use crate::errors::{ClientError, DeleteFailure};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A stored object.
#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    metadata: HashMap<String, String>,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// In-memory object store client.
#[derive(Default)]
pub struct MemoryObjectClient {
    /// Object key -> stored object.
    objects: tokio::sync::RwLock<BTreeMap<String, MemoryObject>>,
    /// Keys whose deletion is refused.
    rejected: tokio::sync::RwLock<HashSet<String>>,
}

impl MemoryObjectClient {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delete of `key` fail with `AccessDenied`.
    pub async fn reject_deletes(&self, key: &str) {
        self.rejected.write().await.insert(key.to_string());
    }

    /// Snapshot of every key currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Content type stored for `key`, if the key exists.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }

    fn no_such_key(key: &str) -> ClientError {
        ClientError::NoSuchKey {
            key: key.to_string(),
        }
    }
}

impl ObjectStoreClient for MemoryObjectClient {
    fn get_object(&self, key: &str) -> ClientFuture<'_, Bytes> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            objects
                .get(&key)
                .map(|o| o.data.clone())
                .ok_or_else(|| Self::no_such_key(&key))
        })
    }

    fn stat_object(&self, key: &str) -> ClientFuture<'_, ObjectStat> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            let object = objects.get(&key).ok_or_else(|| Self::no_such_key(&key))?;
            Ok(ObjectStat {
                size: object.data.len() as u64,
                last_modified: object.last_modified,
                metadata: object.metadata.clone(),
                content_type: Some(object.content_type.clone()),
            })
        })
    }

    fn put_object(&self, request: PutObject) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            debug!("memory put_object: key={} size={}", request.key, request.data.len());
            // Header keys come back lower-cased from a real store.
            let metadata = request
                .metadata
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect();
            let object = MemoryObject {
                data: request.data,
                metadata,
                content_type: request
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                last_modified: Utc::now(),
            };
            self.objects.write().await.insert(request.key, object);
            Ok(())
        })
    }

    fn remove_object(&self, key: &str) -> ClientFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            if self.rejected.read().await.contains(&key) {
                return Err(ClientError::Other(anyhow::anyhow!(
                    "Access Denied deleting {key}"
                )));
            }
            // Like S3, deleting a missing key is not an error.
            self.objects.write().await.remove(&key);
            Ok(())
        })
    }

    fn remove_objects(&self, keys: Vec<String>) -> ClientFuture<'_, Vec<DeleteFailure>> {
        Box::pin(async move {
            let rejected = self.rejected.read().await;
            let mut objects = self.objects.write().await;
            let mut failures = Vec::new();

            for key in keys {
                if rejected.contains(&key) {
                    failures.push(DeleteFailure {
                        key,
                        code: "AccessDenied".to_string(),
                        message: "Access Denied".to_string(),
                    });
                } else {
                    objects.remove(&key);
                }
            }

            Ok(failures)
        })
    }

    fn list_objects(&self, prefix: &str, recursive: bool) -> ClientFuture<'_, Vec<String>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            let matching = objects
                .range(prefix.clone()..)
                .map(|(key, _)| key)
                .take_while(|key| key.starts_with(&prefix));

            if recursive {
                return Ok(matching.cloned().collect());
            }

            // BTreeSet keeps S3's lexicographic order with common prefixes deduplicated.
            let mut grouped = BTreeSet::new();
            for key in matching {
                let rest = &key[prefix.len()..];
                match rest.find('/') {
                    Some(idx) => grouped.insert(format!("{prefix}{}", &rest[..=idx])),
                    None => grouped.insert(key.clone()),
                };
            }
            Ok(grouped.into_iter().collect())
        })
    }

    fn copy_object(&self, source: &str, dest: &str) -> ClientFuture<'_, ()> {
        let source = source.to_string();
        let dest = dest.to_string();
        Box::pin(async move {
            let mut objects = self.objects.write().await;
            let mut object = objects
                .get(&source)
                .cloned()
                .ok_or_else(|| Self::no_such_key(&source))?;
            object.last_modified = Utc::now();
            objects.insert(dest, object);
            Ok(())
        })
    }
}
