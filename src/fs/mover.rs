//! Copy-then-delete moves.
//!
//! The store has no rename, so a move copies every object to its new key
//! and then removes all sources in one bulk delete. Copies are not rolled
//! back when the delete reports failures.

use tracing::debug;

use crate::errors::{ClientError, StorageError};
use crate::fs::directory::ensure_ancestors;
use crate::fs::lister::to_prefix;
use crate::storage::client::ObjectStoreClient;

async fn copy_one(
    client: &dyn ObjectStoreClient,
    source: &str,
    dest: &str,
    to_delete: &mut Vec<String>,
) -> Result<(), ClientError> {
    ensure_ancestors(client, dest).await?;
    debug!("Moving {} -> {}", source, dest);
    client.copy_object(source, dest).await?;
    to_delete.push(source.to_string());
    Ok(())
}

/// Move `source` to `dest`; directories move with everything below them.
///
/// `locator` names the source in a `NotFound` error.
pub async fn move_keys(
    client: &dyn ObjectStoreClient,
    source: &str,
    dest: &str,
    is_directory: bool,
    locator: &str,
) -> Result<(), StorageError> {
    let mut to_delete = Vec::new();

    if is_directory {
        let source_prefix = to_prefix(source, true);
        let dest_root = dest.trim_end_matches('/');
        let keys = client
            .list_objects(&source_prefix, true)
            .await
            .map_err(|e| e.into_storage(locator))?;

        for key in keys {
            let rest = key.strip_prefix(source_prefix.as_str()).unwrap_or(key.as_str());
            let new_key = format!("{dest_root}/{rest}");
            copy_one(client, &key, &new_key, &mut to_delete)
                .await
                .map_err(|e| e.into_storage(locator))?;
        }
    } else {
        copy_one(client, source, dest, &mut to_delete)
            .await
            .map_err(|e| e.into_storage(locator))?;
    }

    if to_delete.is_empty() {
        return Ok(());
    }

    let failures = client
        .remove_objects(to_delete)
        .await
        .map_err(|e| e.into_storage(locator))?;
    if !failures.is_empty() {
        return Err(StorageError::AggregateDeleteFailure { failures });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::PutObject;
    use crate::storage::memory::MemoryObjectClient;
    use bytes::Bytes;

    async fn client_with(entries: &[(&str, &str)]) -> MemoryObjectClient {
        let client = MemoryObjectClient::new();
        for (key, body) in entries {
            client
                .put_object(PutObject::new(*key, Bytes::from(body.to_string())))
                .await
                .unwrap();
        }
        client
    }

    #[tokio::test]
    async fn test_move_file() {
        let client = client_with(&[("t/", ""), ("t/a.yml", "A")]).await;

        move_keys(&client, "t/a.yml", "t/sub/b.yml", false, "kestra:///a.yml")
            .await
            .unwrap();

        assert_eq!(client.keys().await, vec!["t/", "t/sub/", "t/sub/b.yml"]);
        assert_eq!(client.get_object("t/sub/b.yml").await.unwrap(), Bytes::from("A"));
    }

    #[tokio::test]
    async fn test_move_directory() {
        let client = client_with(&[
            ("t/", ""),
            ("t/src/", ""),
            ("t/src/1.yml", "one"),
            ("t/src/2.yml", "two"),
            ("t/src/deep/", ""),
            ("t/src/deep/3.yml", "three"),
        ])
        .await;

        move_keys(&client, "t/src", "t/dst", true, "kestra:///src")
            .await
            .unwrap();

        assert_eq!(
            client.keys().await,
            vec![
                "t/",
                "t/dst/",
                "t/dst/1.yml",
                "t/dst/2.yml",
                "t/dst/deep/",
                "t/dst/deep/3.yml",
            ]
        );
        assert_eq!(
            client.get_object("t/dst/deep/3.yml").await.unwrap(),
            Bytes::from("three")
        );
    }

    #[tokio::test]
    async fn test_move_missing_file_is_not_found() {
        let client = MemoryObjectClient::new();
        let err = move_keys(&client, "t/none.yml", "t/x.yml", false, "kestra:///none.yml")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { ref locator } if locator == "kestra:///none.yml"));
    }

    #[tokio::test]
    async fn test_move_reports_undeletable_sources() {
        let client = client_with(&[("t/", ""), ("t/a.yml", "A")]).await;
        client.reject_deletes("t/a.yml").await;

        let err = move_keys(&client, "t/a.yml", "t/b.yml", false, "kestra:///a.yml")
            .await
            .unwrap_err();

        assert_eq!(err.failed_keys(), vec!["t/a.yml"]);
        // The copy is kept.
        assert!(client.get_object("t/b.yml").await.is_ok());
    }
}
