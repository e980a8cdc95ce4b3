//! Lockbox domain types: file metadata records, blob storage contracts and
//! their in-memory implementations.

pub mod blobs;
pub mod records;
