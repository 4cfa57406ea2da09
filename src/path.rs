//! Logical path to object key mapping.
//!
//! Callers address entries by a logical path relative to their tenant root,
//! either bare (`/file/a.yml`) or as a locator (`kestra:///file/a.yml`).
//! The object key is `{tenant}/{path}` with no leading slash, or just
//! `{path}` when no tenant is given (instance-level resources).

use crate::errors::StorageError;

/// Scheme of the locators handed back to callers.
pub const LOCATOR_SCHEME: &str = "kestra";

/// Return the path component of `uri`.
///
/// `kestra:///a/b` and `kestra://host/a/b` both yield `/a/b`; a string
/// without a scheme is returned unchanged.
pub fn path_of(uri: &str) -> &str {
    match uri.split_once("://") {
        Some((_scheme, rest)) => match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "",
        },
        None => uri,
    }
}

/// Reject any path that could escape the tenant root.
pub fn traversal_guard(uri: &str) -> Result<(), StorageError> {
    if uri.contains("..") {
        return Err(StorageError::InvalidPath {
            path: uri.to_string(),
        });
    }
    Ok(())
}

/// Resolve `uri` to the object key for `tenant_id`.
pub fn resolve(tenant_id: Option<&str>, uri: &str) -> Result<String, StorageError> {
    traversal_guard(uri)?;
    let path = path_of(uri);
    let path = path.strip_prefix('/').unwrap_or(path);

    Ok(match tenant_id {
        Some(tenant) => format!("{tenant}/{path}"),
        None => path.to_string(),
    })
}

/// Build the caller-facing locator for a tenant-relative path.
pub fn locator(path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{LOCATOR_SCHEME}:///{path}")
}

/// Strip the `{tenant}/` prefix from an object key.
pub fn strip_tenant<'a>(key: &'a str, tenant_id: Option<&str>) -> &'a str {
    match tenant_id {
        Some(tenant) => key
            .strip_prefix(tenant)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(key),
        None => key,
    }
}
