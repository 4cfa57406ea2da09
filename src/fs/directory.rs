//! Directory emulation.
//!
//! A directory is a zero-byte object whose key ends in `/`. Writes create
//! the markers of every missing ancestor first, so listings can always
//! descend from the tenant root.

use bytes::Bytes;
use tracing::debug;

use crate::errors::ClientError;
use crate::storage::client::{ObjectStoreClient, PutObject};

/// Content type of directory markers.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// The directory portion of `key`, including its trailing `/`.
///
/// A key that already ends in `/` is its own directory part; a top-level
/// key has none.
pub fn directory_part(key: &str) -> &str {
    if key.ends_with('/') {
        return key;
    }
    match key.rfind('/') {
        Some(idx) => &key[..=idx],
        None => "",
    }
}

fn marker(key: &str) -> PutObject {
    let mut request = PutObject::new(key, Bytes::new());
    request.content_type = Some(DIRECTORY_CONTENT_TYPE.to_string());
    request
}

/// Make sure the marker of every directory above `key` exists.
///
/// Returns early when the immediate directory is already present. Markers
/// are written top-down and not rolled back on failure; re-running only
/// overwrites markers that already exist.
pub async fn ensure_ancestors(client: &dyn ObjectStoreClient, key: &str) -> Result<(), ClientError> {
    let dir = directory_part(key);
    if dir.is_empty() {
        return Ok(());
    }

    if client.stat_object(dir).await.is_ok() {
        return Ok(());
    }

    let mut aggregated = String::with_capacity(dir.len());
    for segment in dir.split_terminator('/') {
        aggregated.push_str(segment);
        aggregated.push('/');
        debug!("Creating directory marker {}", aggregated);
        client.put_object(marker(&aggregated)).await?;
    }

    Ok(())
}

/// Create the directory at `key` and its ancestors; returns the marker key.
pub async fn create_directory(
    client: &dyn ObjectStoreClient,
    key: &str,
) -> Result<String, ClientError> {
    let key = if key.ends_with('/') {
        key.to_string()
    } else {
        format!("{key}/")
    };

    ensure_ancestors(client, &key).await?;
    client.put_object(marker(&key)).await?;

    Ok(key)
}
