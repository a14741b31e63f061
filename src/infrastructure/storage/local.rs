//! Scratch-directory backend

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::filename::sanitize_filename;
use super::LOCAL_FILES_ROUTE;
use crate::application::ports::outbound::{ArtifactStorePort, StorageError};
use crate::domain::entities::{RetrievalReference, StoredArtifact};

/// Stores storybooks on local disk; they are served by the retrieval route
pub struct LocalScratchStore {
    root: PathBuf,
}

impl LocalScratchStore {
    /// The directory is created on first store, not here
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn reference_for(filename: &str) -> RetrievalReference {
        RetrievalReference::LocalPath {
            path: format!("{}/{}", LOCAL_FILES_ROUTE, filename),
        }
    }
}

/// Write through `writer` to the freshly created `path`. On failure the file is
/// removed so the retrieval route never serves a truncated document.
async fn write_or_remove<W>(path: &Path, mut writer: W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(bytes).await?;
        writer.flush().await
    }
    .await;

    if written.is_err() {
        drop(writer);
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), "Failed to remove partial storybook: {}", e);
        }
    }
    written
}

#[async_trait]
impl ArtifactStorePort for LocalScratchStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_filename: &str,
    ) -> Result<StoredArtifact, StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let filename = sanitize_filename(suggested_filename);
        let path = self.root.join(&filename);

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        write_or_remove(&path, file, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote storybook to scratch dir");

        Ok(StoredArtifact {
            reference: Self::reference_for(&filename),
            filename,
            size_bytes: bytes.len(),
        })
    }

    async fn retrieve(&self, filename: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.root.join(sanitize_filename(filename));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts a few bytes, then fails like a full disk
    struct FailingWriter {
        accepted: usize,
    }

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.accepted >= 4 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")));
            }
            let n = buf.len().min(4 - self.accepted);
            self.accepted += n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalScratchStore::new(dir.path().join("nested"));

        let artifact = store
            .store(b"%PDF-1.5 test".to_vec(), "tale-1.pdf")
            .await
            .unwrap();
        assert_eq!(artifact.filename, "tale-1.pdf");
        assert_eq!(artifact.size_bytes, 13);
        assert_eq!(
            artifact.reference,
            RetrievalReference::LocalPath {
                path: "/api/storybooks/files/tale-1.pdf".to_string()
            }
        );
        assert!(dir.path().join("nested").join("tale-1.pdf").exists());

        let bytes = store.retrieve("tale-1.pdf").await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"%PDF-1.5 test"[..]));
    }

    #[tokio::test]
    async fn test_store_sanitizes_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalScratchStore::new(dir.path());

        let artifact = store.store(vec![1], "../escape me.pdf").await.unwrap();
        assert_eq!(artifact.filename, "escape_me.pdf");
        assert!(dir.path().join("escape_me.pdf").exists());
    }

    #[tokio::test]
    async fn test_missing_and_traversal_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalScratchStore::new(dir.path().join("books"));
        std::fs::write(dir.path().join("secret.pdf"), b"secret").unwrap();

        assert!(store.retrieve("nope.pdf").await.unwrap().is_none());
        assert!(store.retrieve("../secret.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_nothing_to_serve() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalScratchStore::new(dir.path());
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let err = write_or_remove(&path, FailingWriter { accepted: 0 }, b"%PDF-1.5 full document")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no space left");
        assert!(!path.exists());
        assert!(store.retrieve("broken.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_file_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalScratchStore::new(dir.path());

        store.store(vec![1], "same.pdf").await.unwrap();
        let err = store.store(vec![2], "same.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(store.retrieve("same.pdf").await.unwrap(), Some(vec![1]));
    }
}
