use thiserror::Error;

/// User-facing failure taxonomy of vault operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("File '{name}' already exists.")]
    AlreadyExists { name: String },
    #[error("File '{name}' not found in the database.")]
    RecordNotFound { name: String },
    #[error("File '{name}' not found on the storage system.")]
    BlobNotFound { name: String },
    /// Wrong key or corrupted ciphertext; the two are indistinguishable.
    #[error("Decryption failed. Invalid encryption key or corrupted file.")]
    Authentication,
    #[error("failed to write encrypted file: {reason}")]
    StorageWrite { reason: String },
    #[error("failed to save file metadata: {reason}")]
    MetadataWrite { reason: String },
    #[error("{reason}")]
    Internal { reason: String },
}

impl VaultError {
    pub(crate) fn internal(reason: impl ToString) -> Self {
        Self::Internal {
            reason: reason.to_string(),
        }
    }
}
