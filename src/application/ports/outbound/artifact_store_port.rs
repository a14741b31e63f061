//! Artifact store port - Durable home for finished storybooks

use async_trait::async_trait;

use crate::domain::entities::StoredArtifact;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage request failed: {0}")]
    Request(String),
    #[error("storage API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed storage response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// Name of the backend for logs and responses
    fn backend_name(&self) -> &'static str;

    /// Persist the bytes under a sanitized form of `suggested_filename`
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_filename: &str,
    ) -> Result<StoredArtifact, StorageError>;

    /// Fetch previously stored bytes; `Ok(None)` when nothing is stored under the name
    async fn retrieve(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
