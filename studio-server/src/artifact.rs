//! Persistence of generated images.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::Result;

/// A persisted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    /// Retrieval path, e.g. `/images/<id>.png`.
    pub url: String,
    pub path: PathBuf,
}

/// Flat directory of PNG files named by random identifier.
///
/// Files are never overwritten and never removed unless [`ArtifactStore::evict`]
/// is called explicitly.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    url_prefix: String,
}

impl ArtifactStore {
    /// Open the store, creating `dir` if needed.
    pub async fn open(dir: impl Into<PathBuf>, url_prefix: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn url_for(&self, id: &str) -> String {
        format!("{}/{}.png", self.url_prefix, id)
    }

    /// Write `bytes` under a fresh identifier.
    pub async fn save(&self, bytes: &[u8]) -> Result<Artifact> {
        let id = Uuid::new_v4().simple().to_string();
        let path = self.dir.join(format!("{}.png", id));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        write_or_discard(&path, file, bytes).await?;

        tracing::debug!(id = %id, size = bytes.len(), "Artifact saved");

        Ok(Artifact {
            url: self.url_for(&id),
            id,
            path,
        })
    }

    /// Delete PNG artifacts last modified at least `older_than` ago.
    ///
    /// Returns the number of files removed. Nothing in the server calls this;
    /// retention is left to the operator.
    pub async fn evict(&self, older_than: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age >= older_than {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = %self.dir.display(), "Evicted artifacts");
        }
        Ok(removed)
    }
}

/// Write `bytes` to the freshly created file at `path`. A failed write
/// removes the file so no truncated image is ever served.
async fn write_or_discard<W>(path: &Path, mut file: W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = fs::remove_file(path).await {
            tracing::warn!(
                path = %path.display(),
                "Failed to remove partial artifact: {}",
                remove_err
            );
        }
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts a few bytes, then fails like a full disk.
    struct FullDisk {
        capacity: usize,
    }

    impl AsyncWrite for FullDisk {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.capacity == 0 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "no space left")));
            }
            let n = buf.len().min(self.capacity);
            self.capacity -= n;
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
    async fn test_failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.png");
        std::fs::write(&path, b"\x89PN").unwrap();

        let result = write_or_discard(&path, FullDisk { capacity: 4 }, b"png-bytes").await;

        assert!(matches!(result, Err(crate::Error::Internal(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_save_writes_file_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("images"), "/images/")
            .await
            .unwrap();

        let artifact = store.save(b"png-bytes").await.unwrap();

        assert_eq!(artifact.id.len(), 32);
        assert!(artifact.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(artifact.url, format!("/images/{}.png", artifact.id));
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"png-bytes");
    }

    #[tokio::test]
    async fn test_save_never_reuses_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "/images").await.unwrap();

        let a = store.save(b"same").await.unwrap();
        let b = store.save(b"same").await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_evict_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path(), "/images").await.unwrap();
        store.save(b"one").await.unwrap();
        store.save(b"two").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        assert_eq!(store.evict(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(store.evict(Duration::ZERO).await.unwrap(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
