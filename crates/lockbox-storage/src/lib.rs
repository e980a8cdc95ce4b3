//! Concrete storage implementations with encryption at rest.
//! Per-file AES-GCM keys, filesystem blobs and SQLite metadata.

pub mod cipher;
pub mod fs_blob_store;
pub mod sqlite_metadata;
