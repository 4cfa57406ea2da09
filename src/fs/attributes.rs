//! File attributes built from object stat results.

use crate::errors::ClientError;
use crate::fs::{FileAttributes, FileType};
use crate::metadata;
use crate::storage::client::ObjectStoreClient;

/// Last non-empty `/`-separated segment of `key`.
pub fn file_name(key: &str) -> &str {
    key.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// Stat `key` into [`FileAttributes`]; keys ending in `/` are directories.
pub async fn file_attributes(
    client: &dyn ObjectStoreClient,
    key: &str,
) -> Result<FileAttributes, ClientError> {
    let stat = client.stat_object(key).await?;

    Ok(FileAttributes {
        file_name: file_name(key).to_string(),
        file_type: if key.ends_with('/') {
            FileType::Directory
        } else {
            FileType::File
        },
        size: stat.size,
        last_modified_time: stat.last_modified,
        creation_time: stat.last_modified,
        metadata: metadata::to_retrieved(Some(&stat.metadata)).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::PutObject;
    use crate::storage::memory::MemoryObjectClient;
    use bytes::Bytes;
    use std::collections::HashMap;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("t/a/b.yml"), "b.yml");
        assert_eq!(file_name("t/a/dir/"), "dir");
        assert_eq!(file_name("top"), "top");
        assert_eq!(file_name(""), "");
    }

    #[tokio::test]
    async fn test_file_attributes_for_file() {
        let client = MemoryObjectClient::new();
        let mut put = PutObject::new("t/a/b.yml", Bytes::from("hello"));
        put.metadata = Some(HashMap::from([(
            "execution_id".to_string(),
            "42".to_string(),
        )]));
        client.put_object(put).await.unwrap();

        let attrs = file_attributes(&client, "t/a/b.yml").await.unwrap();
        assert_eq!(attrs.file_name, "b.yml");
        assert_eq!(attrs.file_type, FileType::File);
        assert_eq!(attrs.size, 5);
        assert_eq!(attrs.creation_time, attrs.last_modified_time);
        assert_eq!(attrs.metadata.get("executionId").map(String::as_str), Some("42"));
    }

    #[tokio::test]
    async fn test_file_attributes_for_directory() {
        let client = MemoryObjectClient::new();
        client
            .put_object(PutObject::new("t/a/", Bytes::new()))
            .await
            .unwrap();

        let attrs = file_attributes(&client, "t/a/").await.unwrap();
        assert!(attrs.is_directory());
        assert_eq!(attrs.file_name, "a");
        assert_eq!(attrs.size, 0);
    }

    #[tokio::test]
    async fn test_file_attributes_missing() {
        let client = MemoryObjectClient::new();
        let err = file_attributes(&client, "nope").await.unwrap_err();
        assert!(err.is_no_such_key());
    }
}
