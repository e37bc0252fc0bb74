//! StatusNotifierItem tray via ksni.
//!
//! The tray never touches the core directly: clicks become [`Command`]s on the
//! dispatcher channel, and the core's presenter calls arrive as
//! [`TrayUpdate`]s that the refresh task turns into fresh session snapshots.

use std::sync::Arc;

use kink_core::presenter::TrayPresenter;
use kink_core::protocol::{Command, TrayIcon};
use kink_core::session::{SessionManager, SessionSnapshot};
use kink_core::{APP_ID, APP_NAME};
use ksni::{menu::*, MenuItem, Status, ToolTip, Tray, TrayMethods};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayUpdate {
    Icon(TrayIcon),
    Rebuild,
}

/// The core-facing end of the tray: a [`TrayPresenter`] that only enqueues.
#[derive(Clone)]
pub struct TrayLink {
    tx: mpsc::UnboundedSender<TrayUpdate>,
}

impl TrayLink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TrayUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TrayPresenter for TrayLink {
    fn set_icon(&self, icon: TrayIcon) {
        let _ = self.tx.send(TrayUpdate::Icon(icon));
    }

    fn rebuild_menu(&self) {
        let _ = self.tx.send(TrayUpdate::Rebuild);
    }
}

pub struct KinkTray {
    tx: mpsc::UnboundedSender<Command>,
    state: SessionSnapshot,
    icon: TrayIcon,
}

impl KinkTray {
    pub fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            tx,
            state: SessionSnapshot::default(),
            icon: TrayIcon::Normal,
        }
    }

    fn send(&self, cmd: Command) {
        let _ = self.tx.send(cmd);
    }
}

/// "https://kink.nl/" → "kink.nl".
pub fn site_label(site: &str) -> &str {
    site.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(site)
}

impl Tray for KinkTray {
    fn id(&self) -> String {
        APP_ID.to_string()
    }

    fn title(&self) -> String {
        APP_NAME.to_string()
    }

    fn category(&self) -> ksni::Category {
        ksni::Category::ApplicationStatus
    }

    fn status(&self) -> Status {
        Status::Active
    }

    fn icon_name(&self) -> String {
        self.icon.icon_name().to_string()
    }

    fn tool_tip(&self) -> ToolTip {
        let np = &self.state.now_playing;
        let description = if !self.state.connectivity.is_connected() {
            format!("Unable to connect to: {}", self.state.station)
        } else if np.title.is_empty() {
            self.state.station.clone()
        } else {
            format!("{}: {} - {}", self.state.station, np.artist, np.title)
        };
        ToolTip {
            title: APP_NAME.to_string(),
            description,
            icon_name: String::new(),
            icon_pixmap: vec![],
        }
    }

    fn activate(&mut self, _x: i32, _y: i32) {
        self.send(Command::ShowCurrent);
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        build_menu(&self.state)
    }
}

fn build_menu(state: &SessionSnapshot) -> Vec<MenuItem<KinkTray>> {
    let connected = state.connectivity.is_connected();

    let header = SubMenu {
        label: site_label(&state.site).to_string(),
        icon_name: APP_ID.to_string(),
        submenu: vec![
            StandardItem {
                label: "Website".to_string(),
                icon_name: "web-browser-symbolic".to_string(),
                activate: Box::new(|t: &mut KinkTray| t.send(Command::OpenSite)),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Settings".to_string(),
                icon_name: "preferences-system-symbolic".to_string(),
                activate: Box::new(|t: &mut KinkTray| t.send(Command::OpenSettings)),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Playlist".to_string(),
                icon_name: "view-list-symbolic".to_string(),
                activate: Box::new(|t: &mut KinkTray| t.send(Command::OpenPlaylist)),
                ..Default::default()
            }
            .into(),
        ],
        ..Default::default()
    };

    let stations = state
        .stations
        .iter()
        .map(|id| {
            let target = id.clone();
            CheckmarkItem {
                label: id.clone(),
                checked: *id == state.station,
                enabled: connected,
                activate: Box::new(move |t: &mut KinkTray| {
                    t.send(Command::SwitchStation(target.clone()))
                }),
                ..Default::default()
            }
            .into()
        })
        .collect();

    let (play_label, play_icon) = if state.is_playing {
        ("Pause", "media-playback-pause-symbolic")
    } else {
        ("Play", "media-playback-start-symbolic")
    };

    vec![
        header.into(),
        MenuItem::Separator,
        SubMenu {
            label: "Stations".to_string(),
            enabled: connected && !state.stations.is_empty(),
            submenu: stations,
            ..Default::default()
        }
        .into(),
        StandardItem {
            label: "Now playing".to_string(),
            icon_name: "dialog-information-symbolic".to_string(),
            enabled: connected,
            activate: Box::new(|t: &mut KinkTray| t.send(Command::ShowCurrent)),
            ..Default::default()
        }
        .into(),
        StandardItem {
            label: play_label.to_string(),
            icon_name: play_icon.to_string(),
            enabled: connected,
            activate: Box::new(|t: &mut KinkTray| t.send(Command::PlayPause)),
            ..Default::default()
        }
        .into(),
        MenuItem::Separator,
        StandardItem {
            label: "Quit".to_string(),
            icon_name: "application-exit-symbolic".to_string(),
            activate: Box::new(|t: &mut KinkTray| t.send(Command::Quit)),
            ..Default::default()
        }
        .into(),
    ]
}

/// Register the tray with the session bus and keep it in step with the
/// session until the update channel closes.
pub async fn spawn(
    commands: mpsc::UnboundedSender<Command>,
    session: Arc<SessionManager>,
    mut updates: mpsc::UnboundedReceiver<TrayUpdate>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let mut tray = KinkTray::new(commands);
    tray.state = session.snapshot().await;

    let handle = tray
        .spawn()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start tray: {}", e))?;
    info!("Tray registered");

    Ok(tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let mut icon = None;
            if let TrayUpdate::Icon(i) = update {
                icon = Some(i);
            }
            // Coalesce a burst of rebuild requests into one snapshot.
            while let Ok(next) = updates.try_recv() {
                if let TrayUpdate::Icon(i) = next {
                    icon = Some(i);
                }
            }
            let state = session.snapshot().await;
            debug!("Tray refresh (icon: {:?})", icon);
            let alive = handle
                .update(move |t: &mut KinkTray| {
                    t.state = state;
                    if let Some(i) = icon {
                        t.icon = i;
                    }
                })
                .await;
            if alive.is_none() {
                break;
            }
        }
        handle.shutdown().await;
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kink_core::protocol::Connectivity;

    fn snapshot(connectivity: Connectivity) -> SessionSnapshot {
        SessionSnapshot {
            station: "kink-dna".into(),
            stations: vec!["kink".into(), "kink-dna".into()],
            site: "https://kink.nl/".into(),
            connectivity,
            is_playing: true,
            ..Default::default()
        }
    }

    fn standard<'a>(items: &'a [MenuItem<KinkTray>], label: &str) -> &'a StandardItem<KinkTray> {
        items
            .iter()
            .find_map(|i| match i {
                MenuItem::Standard(s) if s.label == label => Some(s),
                _ => None,
            })
            .unwrap()
    }

    fn stations_submenu(items: &[MenuItem<KinkTray>]) -> &SubMenu<KinkTray> {
        items
            .iter()
            .find_map(|i| match i {
                MenuItem::SubMenu(s) if s.label == "Stations" => Some(s),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_site_label() {
        assert_eq!(site_label("https://kink.nl"), "kink.nl");
        assert_eq!(site_label("https://kink.nl/"), "kink.nl");
        assert_eq!(site_label("https://example.org/radio"), "radio");
    }

    #[test]
    fn test_current_station_is_checked() {
        let menu = build_menu(&snapshot(Connectivity::Connected));
        let checked: Vec<_> = stations_submenu(&menu)
            .submenu
            .iter()
            .filter_map(|i| match i {
                MenuItem::Checkmark(c) if c.checked => Some(c.label.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(checked, vec!["kink-dna".to_string()]);
        assert!(standard(&menu, "Pause").enabled);
    }

    #[test]
    fn test_playback_items_disabled_while_disconnected() {
        let menu = build_menu(&snapshot(Connectivity::Disconnected));
        assert!(!stations_submenu(&menu).enabled);
        assert!(!standard(&menu, "Now playing").enabled);
        assert!(!standard(&menu, "Pause").enabled);
        assert!(standard(&menu, "Quit").enabled);
    }

    #[test]
    fn test_link_enqueues_updates() {
        let (link, mut rx) = TrayLink::channel();
        link.set_icon(TrayIcon::Disconnected);
        link.rebuild_menu();
        assert_eq!(rx.try_recv().unwrap(), TrayUpdate::Icon(TrayIcon::Disconnected));
        assert_eq!(rx.try_recv().unwrap(), TrayUpdate::Rebuild);
    }
}
