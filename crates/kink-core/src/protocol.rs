use serde::{Deserialize, Serialize};

use crate::config::SettingKey;

/// What a station is airing right now.  Every field defaults to empty.
///
/// Two values compare equal only when every field matches; that is the whole
/// change-detection rule of the reconciliation loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub station: String,
    pub program: String,
    pub artist: String,
    pub title: String,
    pub album_art_url: String,
}

impl NowPlaying {
    /// Nothing known about `station` (metadata unavailable).
    pub fn empty_for(station: &str) -> Self {
        Self {
            station: station.to_string(),
            ..Self::default()
        }
    }

    /// The playlist log line: `"<station>: <artist> - <title>"`.
    pub fn log_line(&self) -> String {
        format!("{}: {} - {}", self.station, self.artist, self.title)
    }
}

/// Reachability of the metadata endpoint as of the last probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    #[default]
    Connected,
    Disconnected,
}

/// Edge produced by feeding one probe result into [`Connectivity::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same state as before.
    Steady,
    /// CONNECTED → DISCONNECTED.
    Lost,
    /// DISCONNECTED → CONNECTED.
    Restored,
}

impl Connectivity {
    pub fn is_connected(self) -> bool {
        self == Connectivity::Connected
    }

    pub fn observe(self, probe_ok: bool) -> (Connectivity, Transition) {
        match (self, probe_ok) {
            (Connectivity::Connected, true) => (Connectivity::Connected, Transition::Steady),
            (Connectivity::Connected, false) => (Connectivity::Disconnected, Transition::Lost),
            (Connectivity::Disconnected, true) => (Connectivity::Connected, Transition::Restored),
            (Connectivity::Disconnected, false) => {
                (Connectivity::Disconnected, Transition::Steady)
            }
        }
    }
}

/// Which tray icon variant to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrayIcon {
    #[default]
    Normal,
    Disconnected,
}

impl TrayIcon {
    pub fn for_connectivity(c: Connectivity) -> Self {
        match c {
            Connectivity::Connected => TrayIcon::Normal,
            Connectivity::Disconnected => TrayIcon::Disconnected,
        }
    }

    /// Freedesktop icon name shipped with the application.
    pub fn icon_name(self) -> &'static str {
        match self {
            TrayIcon::Normal => "kink-radio",
            TrayIcon::Disconnected => "kink-radio-grey",
        }
    }
}

/// Play button behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Play / pause: the stream stays loaded while paused.
    #[default]
    Pause,
    /// Play / stop: the stream is unloaded.
    Stop,
}

impl Transport {
    pub fn from_setting(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stop" => Transport::Stop,
            _ => Transport::Pause,
        }
    }
}

/// User actions coming out of the tray menu.  The dispatcher in [`crate::app`]
/// is the only consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SwitchStation(String),
    PlayPause,
    Play,
    Stop,
    /// Re-show the notification for the current track.
    ShowCurrent,
    OpenSite,
    OpenSettings,
    OpenPlaylist,
    /// Re-read the settings file (sent when it changes on disk).
    ReloadSettings,
    SaveSetting { key: SettingKey, value: String },
    Quit,
}
