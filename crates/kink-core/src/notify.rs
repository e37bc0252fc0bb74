use std::path::Path;

use crate::protocol::NowPlaying;

/// One desktop notification, as handed to the notification service.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub summary: String,
    pub body: Option<String>,
    /// Icon name or path to an image file.
    pub icon: Option<String>,
    pub timeout_secs: i64,
}

/// Outbound notification surface.  Implementations must not block for long;
/// the reconciliation loop calls this from its own task.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Track announcement, or `None` when notifications are disabled
/// (`timeout_secs <= 0`).
pub fn song_notification(np: &NowPlaying, thumbnail: &Path, timeout_secs: i64) -> Option<Notification> {
    if timeout_secs <= 0 {
        return None;
    }
    Some(Notification {
        summary: format!("{}: {}", np.station, np.program),
        body: Some(format!(
            "<b>Artist</b>: {}\n<b>Title</b>: {}",
            np.artist, np.title
        )),
        icon: Some(thumbnail.display().to_string()),
        timeout_secs,
    })
}

pub fn connection_lost(station: &str, timeout_secs: i64) -> Notification {
    Notification {
        summary: format!("Unable to connect to: {station}"),
        body: None,
        icon: Some(crate::APP_ID.to_string()),
        timeout_secs,
    }
}
