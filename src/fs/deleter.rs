//! Bulk deletion under a key prefix.

use tracing::debug;

use crate::errors::StorageError;
use crate::path;
use crate::storage::client::ObjectStoreClient;

/// Delete every object whose key starts with `prefix`.
///
/// All keys go out in a single bulk delete; any per-key failure fails the
/// whole call with the failing keys listed. Removed entries come back as
/// locators with the tenant and any trailing `/` stripped.
pub async fn delete_by_prefix(
    client: &dyn ObjectStoreClient,
    tenant_id: Option<&str>,
    prefix: &str,
) -> Result<Vec<String>, StorageError> {
    let keys = client
        .list_objects(prefix, true)
        .await
        .map_err(|e| e.into_storage(prefix))?;

    if keys.is_empty() {
        return Ok(Vec::new());
    }

    debug!("Deleting {} objects under {}", keys.len(), prefix);
    let failures = client
        .remove_objects(keys.clone())
        .await
        .map_err(|e| e.into_storage(prefix))?;
    if !failures.is_empty() {
        return Err(StorageError::AggregateDeleteFailure { failures });
    }

    Ok(keys
        .iter()
        .map(|key| {
            let name = path::strip_tenant(key, tenant_id);
            path::locator(name.strip_suffix('/').unwrap_or(name))
        })
        .collect())
}
