use std::path::PathBuf;

/// Failures of the settings store and the autostart registration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
    #[error("could not place '{key}' in the settings table of {path}")]
    Misplaced { path: PathBuf, key: String },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures talking to the metadata or image endpoints.
///
/// None of these reach the user directly: the reconciliation loop maps each
/// one onto its local recovery (disconnected state, empty fields, stale
/// thumbnail).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{url} returned malformed JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the playback engine or of persisting the station it plays.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player engine unavailable: {0}")]
    Unavailable(String),
    #[error("player command '{command}' failed: {reason}")]
    Command { command: &'static str, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Anything that makes a dispatched tray command fail.  These are the only
/// errors that end the process.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Player(#[from] PlayerError),
}
