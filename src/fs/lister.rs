//! Prefix listings with directory semantics.

use crate::errors::ClientError;
use crate::fs::attributes::file_attributes;
use crate::fs::FileAttributes;
use crate::path;
use crate::storage::client::ObjectStoreClient;

/// Turn a key into a listing prefix.
///
/// Directory prefixes gain a trailing `/` unless they are the bucket root.
pub fn to_prefix(key: &str, is_directory: bool) -> String {
    if is_directory && !key.is_empty() && !key.ends_with('/') {
        format!("{key}/")
    } else {
        key.to_string()
    }
}

/// Whether a listed entry, reduced to its remainder after the prefix, is kept.
fn keep(rest: &str, recursive: bool, include_directories: bool) -> bool {
    !rest.is_empty()
        && rest != "/"
        && (recursive || !rest.trim_end_matches('/').contains('/'))
        && (include_directories || !rest.ends_with('/'))
}

/// Keys below `prefix`, excluding the prefix itself.
///
/// Non-recursive listings stay one level deep. The listing is fetched in
/// full before the returned iterator is handed out.
pub async fn keys_for_prefix(
    client: &dyn ObjectStoreClient,
    prefix: &str,
    recursive: bool,
    include_directories: bool,
) -> Result<impl Iterator<Item = String>, ClientError> {
    let keys = client.list_objects(prefix, recursive).await?;
    let prefix = prefix.to_string();

    Ok(keys.into_iter().filter(move |key| {
        key.strip_prefix(prefix.as_str())
            .is_some_and(|rest| keep(rest, recursive, include_directories))
    }))
}

/// Every entry under `key`, as locators rooted at `request_path`.
pub async fn all_by_prefix(
    client: &dyn ObjectStoreClient,
    key: &str,
    request_path: &str,
    include_directories: bool,
) -> Result<Vec<String>, ClientError> {
    let prefix = to_prefix(key, false);
    let keys = keys_for_prefix(client, &prefix, true, include_directories).await?;

    Ok(keys
        .map(|k| {
            let rest = k.strip_prefix(prefix.as_str()).unwrap_or(k.as_str());
            path::locator(&format!("{request_path}{rest}"))
        })
        .collect())
}

/// Attributes of the direct children of the directory `key`.
pub async fn list(
    client: &dyn ObjectStoreClient,
    key: &str,
) -> Result<Vec<FileAttributes>, ClientError> {
    let prefix = to_prefix(key, true);
    let mut entries = Vec::new();
    for child in keys_for_prefix(client, &prefix, false, true).await? {
        entries.push(file_attributes(client, &child).await?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::PutObject;
    use crate::storage::memory::MemoryObjectClient;
    use bytes::Bytes;

    async fn client_with(keys: &[&str]) -> MemoryObjectClient {
        let client = MemoryObjectClient::new();
        for key in keys {
            client
                .put_object(PutObject::new(*key, Bytes::new()))
                .await
                .unwrap();
        }
        client
    }

    fn tree() -> Vec<&'static str> {
        vec![
            "t/",
            "t/a/",
            "t/a/x.txt",
            "t/a/b/",
            "t/a/b/y.txt",
            "t/a/b/c/",
            "t/a/b/c/z.txt",
        ]
    }

    #[test]
    fn test_to_prefix() {
        assert_eq!(to_prefix("t/a", true), "t/a/");
        assert_eq!(to_prefix("t/a/", true), "t/a/");
        assert_eq!(to_prefix("", true), "");
        assert_eq!(to_prefix("t/a", false), "t/a");
    }

    #[test]
    fn test_keep_rules() {
        assert!(!keep("", true, true));
        assert!(!keep("/", true, true));
        assert!(keep("b/", false, true));
        assert!(!keep("b/", false, false));
        assert!(!keep("b/c.txt", false, true));
        assert!(keep("b/c.txt", true, false));
    }

    #[tokio::test]
    async fn test_keys_for_prefix_one_level() {
        let client = client_with(&tree()).await;
        let keys: Vec<_> = keys_for_prefix(&client, "t/a/", false, true)
            .await
            .unwrap()
            .collect();
        assert_eq!(keys, vec!["t/a/b/", "t/a/x.txt"]);
    }

    #[tokio::test]
    async fn test_keys_for_prefix_recursive_files_only() {
        let client = client_with(&tree()).await;
        let keys: Vec<_> = keys_for_prefix(&client, "t/a/", true, false)
            .await
            .unwrap()
            .collect();
        assert_eq!(keys, vec!["t/a/b/c/z.txt", "t/a/b/y.txt", "t/a/x.txt"]);
    }

    #[tokio::test]
    async fn test_all_by_prefix_maps_to_request_path() {
        let client = client_with(&tree()).await;
        let locators = all_by_prefix(&client, "t/a/b/", "/a/b/", true)
            .await
            .unwrap();
        assert_eq!(
            locators,
            vec![
                "kestra:///a/b/c/",
                "kestra:///a/b/c/z.txt",
                "kestra:///a/b/y.txt",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_excludes_self() {
        let client = client_with(&tree()).await;
        let names: Vec<_> = list(&client, "t/a")
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.file_name.clone(), a.is_directory()))
            .collect();
        assert_eq!(
            names,
            vec![("b".to_string(), true), ("x.txt".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let client = client_with(&tree()).await;
        assert!(list(&client, "t/zzz").await.unwrap().is_empty());
    }
}
