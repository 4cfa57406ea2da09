//! Error types for the storage layer.
//!
//! [`ClientError`] is what an object-store collaborator reports; the facade
//! reclassifies it into a [`StorageError`] carrying the caller-facing
//! locator, so callers can branch on a missing file without inspecting
//! transport details.

use thiserror::Error;

/// A single key the object store refused to delete during a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// Object key that could not be deleted.
    pub key: String,
    /// Store-specific error code (e.g. `AccessDenied`).
    pub code: String,
    /// Human-readable reason.
    pub message: String,
}

/// Errors reported by an object-store client collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The store answered with its "no such key" error code.
    #[error("No such key: {key}")]
    NoSuchKey { key: String },

    /// Any other failure (network, auth, throttling, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// Reclassify into a [`StorageError`], reporting `locator` for missing keys.
    pub fn into_storage(self, locator: &str) -> StorageError {
        match self {
            ClientError::NoSuchKey { .. } => StorageError::NotFound {
                locator: locator.to_string(),
            },
            ClientError::Other(e) => StorageError::Transport(e),
        }
    }

    /// Whether this is a missing-key error.
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, ClientError::NoSuchKey { .. })
    }
}

/// Errors surfaced by the filesystem-emulation layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The targeted file or directory does not exist.
    #[error("{locator} (File not found)")]
    NotFound { locator: String },

    /// The path tries to escape the tenant root.
    #[error("Invalid path '{path}': parent directory traversal is not allowed")]
    InvalidPath { path: String },

    /// A bulk delete reported one or more per-key failures.
    #[error("Unable to delete all files, failed on [{}]", failed_keys(.failures))]
    AggregateDeleteFailure { failures: Vec<DeleteFailure> },

    /// Catch-all for collaborator failures that are not a missing key.
    #[error("Object store request failed: {0}")]
    Transport(#[from] anyhow::Error),
}

impl StorageError {
    /// Return a stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound { .. } => "NotFound",
            StorageError::InvalidPath { .. } => "InvalidPath",
            StorageError::AggregateDeleteFailure { .. } => "AggregateDeleteFailure",
            StorageError::Transport(_) => "TransportFailure",
        }
    }

    /// Keys named by an aggregate delete failure (empty for other variants).
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            StorageError::AggregateDeleteFailure { failures } => {
                failures.iter().map(|f| f.key.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<ClientError> for StorageError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NoSuchKey { key } => StorageError::NotFound { locator: key },
            ClientError::Other(e) => StorageError::Transport(e),
        }
    }
}

fn failed_keys(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(|f| f.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(key: &str) -> DeleteFailure {
        DeleteFailure {
            key: key.to_string(),
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
        }
    }

    #[test]
    fn test_aggregate_message_lists_keys() {
        let err = StorageError::AggregateDeleteFailure {
            failures: vec![failure("t/a.yml"), failure("t/b/")],
        };
        assert_eq!(
            err.to_string(),
            "Unable to delete all files, failed on [t/a.yml, t/b/]"
        );
        assert_eq!(err.failed_keys(), vec!["t/a.yml", "t/b/"]);
        assert_eq!(err.code(), "AggregateDeleteFailure");
    }

    #[test]
    fn test_no_such_key_reclassified_with_locator() {
        let err = ClientError::NoSuchKey {
            key: "tenant/file.yml".to_string(),
        }
        .into_storage("kestra:///file.yml");
        match err {
            StorageError::NotFound { locator } => assert_eq!(locator, "kestra:///file.yml"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_other_client_error_is_transport() {
        let err = ClientError::Other(anyhow::anyhow!("connection reset")).into_storage("x");
        assert_eq!(err.code(), "TransportFailure");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_not_found_message() {
        let err = StorageError::NotFound {
            locator: "/file/storage/missing.yml".to_string(),
        };
        assert_eq!(err.to_string(), "/file/storage/missing.yml (File not found)");
    }
}
