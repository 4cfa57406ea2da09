//! tenantfs library: tenant-scoped filesystem semantics over S3-compatible
//! object storage.
//!
//! This crate maps file-like operations (read, write, list, move, delete,
//! create-directory, stat) onto a flat object store, emulating directories
//! with marker objects and keeping every tenant under its own key prefix.

pub mod config;
pub mod errors;
pub mod fs;
pub mod limit;
pub mod metadata;
pub mod metrics;
pub mod path;
pub mod storage;

pub use errors::StorageError;
pub use fs::{
    DeleteOutcome, FileAttributes, FileType, ObjectStorage, StorageInterface, StorageObject,
};
