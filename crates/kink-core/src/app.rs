//! Command dispatcher: the single handler switch between the tray menu and
//! the core.  It exclusively owns the player controller.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{self, SettingKey};
use crate::error::AppError;
use crate::notify::{self, NotificationSink};
use crate::platform;
use crate::player::{PlayerController, PlayerEngine};
use crate::protocol::Command;
use crate::session::SessionManager;
use crate::watch::SettingsWatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Dispatcher<E> {
    session: Arc<SessionManager>,
    player: PlayerController<E>,
    notifier: Arc<dyn NotificationSink>,
    thumbnail_path: PathBuf,
    playlist_path: PathBuf,
    /// Loop-back for commands this dispatcher schedules itself.
    commands: mpsc::UnboundedSender<Command>,
    /// Stops the reconciliation loop on quit.
    cancel: CancellationToken,
    /// Started the first time the settings file is opened for editing.
    settings_watch: Option<SettingsWatcher>,
}

impl<E: PlayerEngine> Dispatcher<E> {
    pub fn new(
        session: Arc<SessionManager>,
        player: PlayerController<E>,
        notifier: Arc<dyn NotificationSink>,
        thumbnail_path: PathBuf,
        playlist_path: PathBuf,
        commands: mpsc::UnboundedSender<Command>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            player,
            notifier,
            thumbnail_path,
            playlist_path,
            commands,
            cancel,
            settings_watch: None,
        }
    }

    pub fn player(&self) -> &PlayerController<E> {
        &self.player
    }

    /// Load the configured station and start it when `autoplay` is set.
    pub async fn start(&mut self) -> Result<(), AppError> {
        self.player.load_playlist().await?;
        if config::parse_bool(&self.session.setting(SettingKey::Autoplay).await) {
            self.player.play().await?;
        } else {
            self.session.set_playing(false).await;
        }
        Ok(())
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> Result<(), AppError> {
        while let Some(cmd) = rx.recv().await {
            if self.handle(cmd).await? == Flow::Quit {
                break;
            }
        }
        info!("Dispatcher finished");
        Ok(())
    }

    pub async fn handle(&mut self, cmd: Command) -> Result<Flow, AppError> {
        info!("Command: {:?}", cmd);
        match cmd {
            Command::SwitchStation(station) => {
                self.player.switch_station(&station).await?;
            }
            Command::PlayPause => self.player.play_pause().await?,
            Command::Play => self.player.play().await?,
            Command::Stop => self.player.stop().await?,
            Command::ShowCurrent => self.show_current().await,
            Command::OpenSite => {
                let site = self.session.setting(SettingKey::Site).await;
                open(&site);
            }
            Command::OpenPlaylist => open(&self.playlist_path.display().to_string()),
            Command::OpenSettings => self.open_settings().await,
            Command::ReloadSettings => {
                self.session.reload_settings().await?;
                let station = self.session.station().await;
                self.player.switch_station(&station).await?;
            }
            Command::SaveSetting { key, value } => {
                if key == SettingKey::Station {
                    self.player.switch_station(&value).await?;
                } else {
                    self.session.save_key(key, value).await?;
                }
            }
            Command::Quit => {
                self.quit().await?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    async fn show_current(&self) {
        let snapshot = self.session.snapshot().await;
        let timeout = config::parse_int(
            SettingKey::NotificationTimeout,
            &self.session.setting(SettingKey::NotificationTimeout).await,
        );
        if let Some(n) = notify::song_notification(&snapshot.now_playing, &self.thumbnail_path, timeout)
        {
            self.notifier.show(n);
        }
    }

    async fn open_settings(&mut self) {
        self.watch_settings().await;
        let path = self.session.settings_path().await;
        if let Err(e) = platform::open_with_default_app(&path) {
            warn!("Could not open {:?}: {}", path, e);
        }
    }

    /// Reload settings whenever the file changes on disk from now on.
    pub async fn watch_settings(&mut self) {
        if self.settings_watch.is_some() {
            return;
        }
        let path = self.session.settings_path().await;
        match SettingsWatcher::start(&path, self.commands.clone()) {
            Ok(w) => self.settings_watch = Some(w),
            Err(e) => warn!("Settings edits will not be picked up: {}", e),
        }
    }

    async fn quit(&mut self) -> Result<(), AppError> {
        info!("Quitting");
        self.cancel.cancel();
        if let Err(e) = self.player.stop().await {
            warn!("Stopping playback on quit failed: {}", e);
        }
        let station = self.session.station().await;
        self.session.save_key(SettingKey::Station, station).await?;
        Ok(())
    }
}

fn open(target: &str) {
    if let Err(e) = platform::open_with_default_app(target) {
        warn!("Could not open {}: {}", target, e);
    }
}
