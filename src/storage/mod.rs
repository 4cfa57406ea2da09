//! Object store collaborators.
//!
//! The [`client::ObjectStoreClient`] trait abstracts over the flat
//! key-value store underneath the filesystem layer. Implementations are a
//! gateway to any S3-compatible service and an in-process store.

pub mod client;
pub mod memory;
pub mod s3;
