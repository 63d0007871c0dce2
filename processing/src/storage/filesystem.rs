use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{is_valid_key, upload_key, BlobError, BlobStore};

/// Blob store rooted at a local directory; keys map to relative paths.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(root.join("uploads")).await?;
        info!(root = %root.display(), "Using filesystem blob store");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

/// Writes `bytes` to a freshly created file, removing it again if the write
/// does not complete.
async fn persist<W>(mut file: W, path: &Path, bytes: &[u8]) -> Result<(), BlobError>
where
    W: AsyncWrite + Unpin,
{
    let written = match file.write_all(bytes).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        drop(file);
        if let Err(remove) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %remove, "Failed to remove partial blob");
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<String, BlobError> {
        let mut millis = chrono::Utc::now().timestamp_millis();
        loop {
            let key = upload_key(name, millis);
            let path = self.path_for(&key);
            let opened = fs::OpenOptions::new().write(true).create_new(true).open(&path).await;
            match opened {
                Ok(file) => {
                    persist(file, &path, &bytes).await?;
                    debug!(key = %key, size = bytes.len(), "Stored blob on disk");
                    return Ok(key);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        if !is_valid_key(key) {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(key.to_string())),
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

    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("no space left on device")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        fs::write(&path, b"").await.unwrap();

        let result = persist(FullDisk, &path, b"bankAccount,mobile,age\n").await;
        assert!(matches!(result, Err(BlobError::Io(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();
        let key = store.put("rows.csv", b"bankAccount,mobile,age\n".to_vec()).await.unwrap();
        assert!(dir.path().join(&key).exists());
        assert_eq!(store.get(&key).await.unwrap(), b"bankAccount,mobile,age\n".to_vec());

        let again = store.put("rows.csv", Vec::new()).await.unwrap();
        assert_ne!(key, again);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();
        assert!(matches!(
            store.get("uploads/1-nothing.csv").await,
            Err(BlobError::NotFound(_))
        ));
    }
}
