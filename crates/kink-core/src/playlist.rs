use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::protocol::NowPlaying;

/// Plain-text record of the tracks heard this session, one line per change.
#[derive(Debug, Clone)]
pub struct PlaylistLog {
    path: PathBuf,
}

impl PlaylistLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate (or create) the log.  Called once at startup.
    pub async fn reset(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, b"").await
    }

    pub async fn append(&self, np: &NowPlaying) -> std::io::Result<()> {
        let line = np.log_line();
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        f.write_all(format!("{line}\n").as_bytes()).await?;
        f.flush().await?;
        info!("{}", line);
        Ok(())
    }
}
