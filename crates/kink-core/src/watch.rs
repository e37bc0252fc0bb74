//! Settings file watching.
//!
//! Desktop openers (`gio open`, `kde-open`, `exo-open`) hand the file to an
//! editor and exit straight away, so the end of the opener says nothing about
//! the end of the edit.  Instead the settings directory is watched and every
//! burst of writes to the settings file becomes one
//! [`Command::ReloadSettings`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::protocol::Command;

/// Quiet period that closes a burst of file events.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Keeps the watch alive; dropping it stops reloads.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl SettingsWatcher {
    /// Watch `path` and send `ReloadSettings` on `commands` after each burst
    /// of changes.  The parent directory is watched, so editors that save by
    /// writing a new file and renaming it over the old one are seen too.
    pub fn start(
        path: &Path,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Result<Self, ConfigError> {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let watched = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if touches_settings(&event, &watched) {
                        let _ = raw_tx.send(());
                    }
                }
                Err(e) => warn!("Settings watch error: {}", e),
            })
            .map_err(|e| watch_error(&dir, e))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(&dir, e))?;

        tokio::spawn(debounce(raw_rx, commands));
        info!("Watching {:?} for edits", path);

        Ok(Self {
            _watcher: watcher,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn watch_error(dir: &Path, e: notify::Error) -> ConfigError {
    ConfigError::io(dir, std::io::Error::other(e.to_string()))
}

fn touches_settings(event: &Event, name: &OsString) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(name.as_os_str()))
}

/// One `ReloadSettings` per burst.  Ends when the watcher is dropped or the
/// dispatcher is gone.
async fn debounce(mut raw: mpsc::UnboundedReceiver<()>, commands: mpsc::UnboundedSender<Command>) {
    while raw.recv().await.is_some() {
        loop {
            match tokio::time::timeout(DEBOUNCE, raw.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }
        debug!("Settings file changed on disk");
        if commands.send(Command::ReloadSettings).is_err() {
            return;
        }
    }
}
