use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::config::SettingKey;
use crate::error::PlayerError;
use crate::protocol::Transport;
use crate::session::SessionManager;

/// The media engine behind the controller.  It plays a play-list of exactly
/// one stream URL.
pub trait PlayerEngine: Send {
    /// Replace the play-list without starting playback.
    fn set_source(&mut self, url: &str) -> impl Future<Output = Result<(), PlayerError>> + Send;
    fn play(&mut self) -> impl Future<Output = Result<(), PlayerError>> + Send;
    fn pause(&mut self) -> impl Future<Output = Result<(), PlayerError>> + Send;
    fn stop(&mut self) -> impl Future<Output = Result<(), PlayerError>> + Send;
    fn is_playing(&mut self) -> impl Future<Output = bool> + Send;
}

/// Which stream setting serves `station`: exactly `kink` is the main stream,
/// then anything containing `dna`, then `distortion`, else the indie stream.
pub fn stream_key_for(station: &str) -> SettingKey {
    if station == "kink" {
        SettingKey::StreamKink
    } else if station.contains("dna") {
        SettingKey::StreamDna
    } else if station.contains("distortion") {
        SettingKey::StreamDistortion
    } else {
        SettingKey::StreamIndie
    }
}

pub struct PlayerController<E> {
    engine: E,
    session: Arc<SessionManager>,
    /// Station whose stream is currently loaded in the engine.
    loaded: Option<String>,
}

impl<E: PlayerEngine> PlayerController<E> {
    pub fn new(engine: E, session: Arc<SessionManager>) -> Self {
        Self {
            engine,
            session,
            loaded: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn loaded_station(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    /// Rebuild the engine's play-list for the configured station.
    pub async fn load_playlist(&mut self) -> Result<(), PlayerError> {
        let station = self.session.station().await;
        let url = self.session.setting(stream_key_for(&station)).await;
        info!("Playlist: {}", url);
        self.engine.set_source(&url).await?;
        self.loaded = Some(station);
        Ok(())
    }

    pub async fn is_playing(&mut self) -> bool {
        self.engine.is_playing().await
    }

    pub async fn play(&mut self) -> Result<(), PlayerError> {
        if self.loaded.is_none() {
            self.load_playlist().await?;
        }
        self.engine.play().await?;
        self.session.set_playing(true).await;
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), PlayerError> {
        self.engine.pause().await?;
        self.session.set_playing(false).await;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), PlayerError> {
        self.engine.stop().await?;
        self.session.set_playing(false).await;
        Ok(())
    }

    /// Toggle playback with the configured transport capability.
    pub async fn play_pause(&mut self) -> Result<(), PlayerError> {
        if self.engine.is_playing().await {
            match self.session.transport().await {
                Transport::Pause => self.pause().await,
                Transport::Stop => self.stop().await,
            }
        } else {
            self.play().await
        }
    }

    /// Switch to `station`.  Returns `false` when it is already loaded.
    /// Playback resumes on the new stream only if it was playing before.
    pub async fn switch_station(&mut self, station: &str) -> Result<bool, PlayerError> {
        if self.loaded.as_deref() == Some(station) {
            return Ok(false);
        }
        self.session.save_key(SettingKey::Station, station).await?;
        info!("Switch station: {}", station);

        let was_playing = self.engine.is_playing().await;
        if was_playing {
            self.engine.stop().await?;
        }
        self.load_playlist().await?;
        if was_playing {
            self.engine.play().await?;
        }
        self.session.set_playing(was_playing).await;
        Ok(true)
    }
}
