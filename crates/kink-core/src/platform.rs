use std::path::{Path, PathBuf};

use crate::APP_ID;

// On Linux every path follows the XDG layout under the home directory, the
// same way on every desktop, so the user can find the files the menu opens.

pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// `~/.local/share/kink-radio`: playlist log and the application log.
pub fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join(APP_ID)
}

/// `~/.config/kink-radio`: the settings file.
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_ID)
}

/// `~/.cache/kink-radio`: the album art thumbnail.
pub fn cache_dir() -> PathBuf {
    home_dir().join(".cache").join(APP_ID)
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.toml")
}

pub fn playlist_path() -> PathBuf {
    data_dir().join(format!("{APP_ID}.txt"))
}

pub fn log_path() -> PathBuf {
    data_dir().join(format!("{APP_ID}.log"))
}

pub fn thumbnail_path() -> PathBuf {
    cache_dir().join("album_art.jpg")
}

/// Desktop entry whose presence makes the session start us on login.
pub fn autostart_path() -> PathBuf {
    home_dir()
        .join(".config")
        .join("autostart")
        .join(format!("{APP_ID}-autostart.desktop"))
}

pub fn temp_dir() -> PathBuf {
    std::env::temp_dir()
}

pub fn mpv_socket_name() -> String {
    format!("{}/{APP_ID}-mpv.sock", temp_dir().display())
}

pub fn mpv_socket_arg() -> String {
    format!("--input-ipc-server={}", mpv_socket_name())
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    path.split(':')
        .map(|dir| PathBuf::from(dir).join(name))
        .find(|p| p.exists())
}

/// Find mpv for playback: `MPV_PATH` override, beside the executable, then PATH.
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MPV_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join("mpv");
            if local_mpv.exists() {
                return Some(local_mpv);
            }
        }
    }

    find_on_path("mpv")
}

/// Hand a URL or file to the desktop's default application.
///
/// The opener usually exits as soon as it has delegated, so it is not awaited;
/// tokio reaps it in the background.
pub fn open_with_default_app(target: impl AsRef<Path>) -> std::io::Result<()> {
    tokio::process::Command::new("xdg-open")
        .arg(target.as_ref())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    Ok(())
}
