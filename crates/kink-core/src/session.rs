//! The shared session aggregate.
//!
//! The reconciliation loop and the command dispatcher run on different tasks
//! and both touch settings, the now-playing baseline, the connectivity flag
//! and the play state.  All of that lives in one `SessionState` behind one
//! mutex; nothing holds the lock across a network call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::autostart::AutostartEntry;
use crate::config::{self, ConfigStore, SettingKey};
use crate::error::ConfigError;
use crate::presenter::TrayPresenter;
use crate::protocol::{Connectivity, NowPlaying, Transport};

pub struct SessionState {
    pub settings: ConfigStore,
    /// Last record fetched by the loop.
    pub current: NowPlaying,
    /// Baseline for change detection: the last record that was announced.
    pub previous: NowPlaying,
    pub connectivity: Connectivity,
    pub is_playing: bool,
    pub stations: Vec<String>,
    /// Bumped on every mutation.
    pub rev: u64,
}

/// Settings a reconciliation tick needs, read once at the start of the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickParams {
    pub station: String,
    pub json_url: String,
    pub wait: Duration,
    pub notification_timeout: i64,
}

/// Read-only copy of the session for rendering the tray.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub station: String,
    pub stations: Vec<String>,
    pub site: String,
    pub connectivity: Connectivity,
    pub is_playing: bool,
    pub now_playing: NowPlaying,
}

/// Result of offering a freshly fetched record to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The station was switched while the fetch was in flight.
    Stale,
    Unchanged,
    Changed,
}

pub struct SessionManager {
    state: Mutex<SessionState>,
    presenter: Arc<dyn TrayPresenter>,
    autostart: AutostartEntry,
}

impl SessionManager {
    pub fn new(
        settings: ConfigStore,
        presenter: Arc<dyn TrayPresenter>,
        autostart: AutostartEntry,
    ) -> Self {
        let state = SessionState {
            settings,
            current: NowPlaying::default(),
            previous: NowPlaying::default(),
            connectivity: Connectivity::Connected,
            is_playing: false,
            stations: Vec::new(),
            rev: 1,
        };
        Self {
            state: Mutex::new(state),
            presenter,
            autostart,
        }
    }

    pub fn presenter(&self) -> &Arc<dyn TrayPresenter> {
        &self.presenter
    }

    pub fn autostart(&self) -> &AutostartEntry {
        &self.autostart
    }

    pub async fn settings_path(&self) -> std::path::PathBuf {
        self.state.lock().await.settings.path().to_path_buf()
    }

    // ── settings ──────────────────────────────────────────────────────────────

    /// Read a setting.  Reading a key that was missing from the file writes
    /// it there and rebuilds the menu.
    pub async fn setting(&self, key: SettingKey) -> String {
        let lookup = {
            let mut state = self.state.lock().await;
            let lookup = state.settings.get(key);
            if lookup.materialized {
                state.rev += 1;
            }
            lookup
        };
        if lookup.materialized {
            self.presenter.rebuild_menu();
        }
        lookup.value
    }

    pub async fn station(&self) -> String {
        self.setting(SettingKey::Station).await
    }

    pub async fn transport(&self) -> Transport {
        Transport::from_setting(&self.setting(SettingKey::Transport).await)
    }

    /// The single write path for settings: persists, refreshes the menu and
    /// keeps the autostart entry in line with `autostart`.
    pub async fn save_key(&self, key: SettingKey, value: impl ToString) -> Result<(), ConfigError> {
        let value = value.to_string();
        {
            let mut state = self.state.lock().await;
            state.settings.set(key, &value)?;
            state.rev += 1;
        }
        self.presenter.rebuild_menu();
        if key == SettingKey::Autostart {
            self.autostart.sync(config::parse_bool(&value))?;
        }
        Ok(())
    }

    pub async fn reload_settings(&self) -> Result<(), ConfigError> {
        {
            let mut state = self.state.lock().await;
            state.settings.reload()?;
            state.rev += 1;
        }
        info!("Settings reloaded");
        self.presenter.rebuild_menu();
        Ok(())
    }

    /// Make the autostart entry match the current setting (startup).
    pub async fn sync_autostart(&self) -> Result<bool, ConfigError> {
        let enabled = config::parse_bool(&self.setting(SettingKey::Autostart).await);
        self.autostart.sync(enabled)
    }

    pub async fn tick_params(&self) -> TickParams {
        let (params, materialized) = {
            let mut state = self.state.lock().await;
            let s = &mut state.settings;
            let station = s.get(SettingKey::Station);
            let json = s.get(SettingKey::Json);
            let wait = s.get(SettingKey::Wait);
            let timeout = s.get(SettingKey::NotificationTimeout);
            let materialized = station.materialized
                || json.materialized
                || wait.materialized
                || timeout.materialized;
            let params = TickParams {
                station: station.value,
                json_url: json.value,
                wait: config::wait_interval(&wait.value),
                notification_timeout: config::parse_int(
                    SettingKey::NotificationTimeout,
                    &timeout.value,
                ),
            };
            (params, materialized)
        };
        if materialized {
            self.presenter.rebuild_menu();
        }
        params
    }

    // ── loop-owned state ──────────────────────────────────────────────────────

    pub async fn set_connectivity(&self, connectivity: Connectivity) {
        let mut state = self.state.lock().await;
        if state.connectivity != connectivity {
            state.connectivity = connectivity;
            state.rev += 1;
        }
    }

    pub async fn set_stations(&self, stations: Vec<String>) {
        let mut state = self.state.lock().await;
        debug!("Station list: {:?}", stations);
        state.stations = stations;
        state.rev += 1;
    }

    /// Offer a fetched record.  Compared against the baseline under the lock,
    /// so a station switch that landed mid-tick is detected here.
    pub async fn observe_now_playing(&self, tick_station: &str, np: &NowPlaying) -> Observation {
        let mut state = self.state.lock().await;
        let station = state.settings.value(SettingKey::Station);
        if station != tick_station {
            debug!(
                "Discarding metadata for {} (station is now {})",
                tick_station, station
            );
            return Observation::Stale;
        }
        state.current = np.clone();
        if *np == state.previous {
            Observation::Unchanged
        } else {
            state.rev += 1;
            Observation::Changed
        }
    }

    /// Establish the new change-detection baseline.
    pub async fn set_baseline(&self, np: NowPlaying) {
        let mut state = self.state.lock().await;
        state.previous = np;
        state.rev += 1;
    }

    // ── dispatcher-owned state ────────────────────────────────────────────────

    pub async fn set_playing(&self, is_playing: bool) {
        {
            let mut state = self.state.lock().await;
            state.is_playing = is_playing;
            state.rev += 1;
        }
        self.presenter.rebuild_menu();
    }

    // ── readers ───────────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (snapshot, materialized) = {
            let mut state = self.state.lock().await;
            let station = state.settings.get(SettingKey::Station);
            let site = state.settings.get(SettingKey::Site);
            let materialized = station.materialized || site.materialized;
            if materialized {
                state.rev += 1;
            }
            let snapshot = SessionSnapshot {
                station: station.value,
                stations: state.stations.clone(),
                site: site.value,
                connectivity: state.connectivity,
                is_playing: state.is_playing,
                now_playing: state.current.clone(),
            };
            (snapshot, materialized)
        };
        if materialized {
            self.presenter.rebuild_menu();
        }
        snapshot
    }

    pub async fn rev(&self) -> u64 {
        self.state.lock().await.rev
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::TrayIcon;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    pub(crate) struct RecordingPresenter {
        pub icons: StdMutex<Vec<TrayIcon>>,
        pub rebuilds: StdMutex<usize>,
    }

    impl TrayPresenter for RecordingPresenter {
        fn set_icon(&self, icon: TrayIcon) {
            self.icons.lock().unwrap().push(icon);
        }

        fn rebuild_menu(&self) {
            *self.rebuilds.lock().unwrap() += 1;
        }
    }

    pub(crate) fn session_in(
        dir: &std::path::Path,
        settings: &str,
    ) -> (Arc<SessionManager>, Arc<RecordingPresenter>) {
        let path = dir.join("settings.toml");
        std::fs::write(&path, settings).unwrap();
        let store = ConfigStore::open(&path).unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let autostart = AutostartEntry::new(dir.join("autostart.desktop"), "kink-radio");
        let session = Arc::new(SessionManager::new(store, presenter.clone(), autostart));
        (session, presenter)
    }

    #[tokio::test]
    async fn test_materializing_read_rebuilds_menu() {
        let dir = tempfile::tempdir().unwrap();
        let (session, presenter) = session_in(dir.path(), "[kink]\nstation = \"kink\"\n");

        assert_eq!(session.station().await, "kink");
        assert_eq!(*presenter.rebuilds.lock().unwrap(), 0);

        assert_eq!(session.setting(SettingKey::Autoplay).await, "true");
        assert_eq!(*presenter.rebuilds.lock().unwrap(), 1);
        assert_eq!(session.setting(SettingKey::Autoplay).await, "true");
        assert_eq!(*presenter.rebuilds.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_autostart_toggles_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (session, presenter) = session_in(dir.path(), "[kink]\nautostart = \"false\"\n");

        session.save_key(SettingKey::Autostart, true).await.unwrap();
        assert!(session.autostart().is_registered());
        session.save_key(SettingKey::Autostart, false).await.unwrap();
        assert!(!session.autostart().is_registered());
        assert_eq!(*presenter.rebuilds.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_materializing_read_rebuilds_menu() {
        let dir = tempfile::tempdir().unwrap();
        let (session, presenter) = session_in(dir.path(), "[kink]\nstation = \"kink-dna\"\n");

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.station, "kink-dna");
        assert_eq!(snapshot.site, "https://kink.nl");
        assert_eq!(*presenter.rebuilds.lock().unwrap(), 1);
        let content = std::fs::read_to_string(session.settings_path().await).unwrap();
        assert!(content.contains("site = \"https://kink.nl\""));

        session.snapshot().await;
        assert_eq!(*presenter.rebuilds.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tick_params_clamp_wait() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(
            dir.path(),
            "[kink]\nstation = \"kink-dna\"\njson = \"http://x\"\nwait = \"0\"\nshow_notification = \"-1\"\n",
        );
        let params = session.tick_params().await;
        assert_eq!(params.station, "kink-dna");
        assert_eq!(params.json_url, "http://x");
        assert_eq!(params.wait, Duration::from_secs(1));
        assert_eq!(params.notification_timeout, -1);
    }

    #[tokio::test]
    async fn test_observe_detects_station_switch_mid_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), "[kink]\nstation = \"kink\"\n");
        let np = NowPlaying::empty_for("kink");

        session.save_key(SettingKey::Station, "kink-dna").await.unwrap();
        assert_eq!(session.observe_now_playing("kink", &np).await, Observation::Stale);
    }

    #[tokio::test]
    async fn test_observe_compares_against_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session_in(dir.path(), "[kink]\nstation = \"kink\"\n");
        let mut np = NowPlaying::empty_for("kink");
        np.title = "T".into();

        assert_eq!(session.observe_now_playing("kink", &np).await, Observation::Changed);
        // Baseline not replaced yet: still a change.
        assert_eq!(session.observe_now_playing("kink", &np).await, Observation::Changed);
        session.set_baseline(np.clone()).await;
        assert_eq!(session.observe_now_playing("kink", &np).await, Observation::Unchanged);
        assert_eq!(session.snapshot().await.now_playing, np);
    }
}
