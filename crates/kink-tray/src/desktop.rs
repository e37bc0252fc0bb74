//! Desktop notification service and the fatal error dialog.

use kink_core::notify::{Notification, NotificationSink};
use kink_core::APP_NAME;
use notify_rust::{Timeout, Urgency};
use tracing::{debug, warn};

/// Sends notifications over D-Bus.  `show` returns immediately; delivery runs
/// on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn build(n: &Notification) -> notify_rust::Notification {
        let mut out = notify_rust::Notification::new();
        out.appname(APP_NAME)
            .summary(&n.summary)
            .urgency(Urgency::Low)
            .timeout(timeout_for(n.timeout_secs));
        if let Some(body) = &n.body {
            out.body(body);
        }
        if let Some(icon) = &n.icon {
            out.icon(icon);
        }
        out
    }
}

/// Seconds → notify-rust timeout; non-positive means the server default.
fn timeout_for(secs: i64) -> Timeout {
    if secs <= 0 {
        Timeout::Default
    } else {
        Timeout::Milliseconds(u32::try_from(secs.saturating_mul(1000)).unwrap_or(u32::MAX))
    }
}

impl NotificationSink for DesktopNotifier {
    fn show(&self, n: Notification) {
        let notification = Self::build(&n);
        tokio::task::spawn_blocking(move || match notification.show() {
            Ok(_) => debug!("Notification shown: {}", n.summary),
            Err(e) => warn!("Notification failed: {}", e),
        });
    }
}

/// Modal error box, used once just before exiting on a fatal error.
pub async fn fatal_dialog(message: &str) {
    rfd::AsyncMessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(APP_NAME)
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show()
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_mapping() {
        assert_eq!(timeout_for(0), Timeout::Default);
        assert_eq!(timeout_for(-3), Timeout::Default);
        assert_eq!(timeout_for(10), Timeout::Milliseconds(10_000));
        assert_eq!(timeout_for(i64::MAX), Timeout::Milliseconds(u32::MAX));
    }
}
