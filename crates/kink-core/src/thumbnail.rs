use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::MetadataClient;
use crate::error::FetchError;

/// What [`ThumbnailCache::sync`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailSync {
    /// New art written.
    Updated,
    /// URL empty, file deleted.
    Removed,
    /// URL empty and there was nothing to delete.
    Absent,
    /// Fetch failed; whatever was cached before is still there.
    Kept,
}

/// A single album-art file at a fixed path.
///
/// Present iff the current track has art and fetching it succeeded. A failed
/// fetch leaves the previous image in place rather than blanking it.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    path: PathBuf,
}

impl ThumbnailCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub async fn sync(&self, client: &MetadataClient, url: &str, timeout: Duration) -> ThumbnailSync {
        if url.is_empty() {
            return self.clear().await;
        }

        match self.fetch_into_place(client, url, timeout).await {
            Ok(()) => {
                info!("Album art updated from {}", url);
                ThumbnailSync::Updated
            }
            Err(e) => {
                warn!("Keeping previous album art: {}", e);
                ThumbnailSync::Kept
            }
        }
    }

    async fn fetch_into_place(
        &self,
        client: &MetadataClient,
        url: &str,
        timeout: Duration,
    ) -> Result<(), FetchError> {
        let bytes = client.fetch_image(url, timeout).await?;
        let write_err = |source| FetchError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        // Stage beside the live file so a short write never replaces good art.
        let staging = self.staging_path();
        if let Err(e) = tokio::fs::write(&staging, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(write_err(e));
        }
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(write_err)
    }

    /// `album_art.jpg` → `album_art.jpg.part`, same directory.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        self.path.with_file_name(name)
    }

    async fn clear(&self) -> ThumbnailSync {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Album art removed: {:?}", self.path);
                ThumbnailSync::Removed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ThumbnailSync::Absent,
            Err(e) => {
                warn!("Could not remove album art {:?}: {}", self.path, e);
                ThumbnailSync::Kept
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_url_removes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("album_art.jpg"));
        std::fs::write(cache.path(), b"old").unwrap();

        let client = MetadataClient::new();
        assert_eq!(cache.sync(&client, "", Duration::from_secs(1)).await, ThumbnailSync::Removed);
        assert!(!cache.exists());
        assert_eq!(cache.sync(&client, "", Duration::from_secs(1)).await, ThumbnailSync::Absent);
        assert!(!cache.exists());
    }

    #[test]
    fn test_staging_path_is_a_sibling() {
        let cache = ThumbnailCache::new("/tmp/kink/album_art.jpg");
        assert_eq!(cache.staging_path(), PathBuf::from("/tmp/kink/album_art.jpg.part"));
    }

    #[tokio::test]
    async fn test_unreachable_url_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("album_art.jpg"));
        std::fs::write(cache.path(), b"old").unwrap();

        let client = MetadataClient::new();
        // Port 9 (discard) on loopback is closed on test machines.
        let outcome = cache
            .sync(&client, "http://127.0.0.1:9/art.jpg", Duration::from_secs(1))
            .await;
        assert_eq!(outcome, ThumbnailSync::Kept);
        assert_eq!(std::fs::read(cache.path()).unwrap(), b"old");
    }
}
