//! Background reconciliation loop.
//!
//! One tick:
//!
//! ```text
//!   cancelled? ── yes ──► exit
//!      │
//!   probe metadata endpoint ──► connectivity edge (Lost / Restored / Steady)
//!      │                           Lost:     notify once, grey icon, rebuild menu
//!      │                           Restored: normal icon, refresh stations, rebuild menu
//!   connected? ── no ──► wait
//!      │
//!   fetch now-playing ──► compare with baseline
//!      │                     unchanged: nothing
//!      │                     changed:   thumbnail, notification, log line, new baseline
//!   wait (interruptible)
//! ```
//!
//! The probe and the metadata fetch are separate requests; a failed fetch
//! only yields an empty record and never flips connectivity.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::MetadataClient;
use crate::notify::{self, NotificationSink};
use crate::playlist::PlaylistLog;
use crate::protocol::{Connectivity, NowPlaying, Transition, TrayIcon};
use crate::session::{Observation, SessionManager, TickParams};
use crate::thumbnail::ThumbnailCache;

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Disconnected,
    Unchanged,
    /// The station changed while the tick was in flight; result dropped.
    Stale,
    Changed(NowPlaying),
}

pub struct Reconciler {
    session: Arc<SessionManager>,
    client: MetadataClient,
    thumbnail: ThumbnailCache,
    playlist: PlaylistLog,
    notifier: Arc<dyn NotificationSink>,
    connectivity: Connectivity,
    stations_loaded: bool,
}

impl Reconciler {
    pub fn new(
        session: Arc<SessionManager>,
        client: MetadataClient,
        thumbnail: ThumbnailCache,
        playlist: PlaylistLog,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            session,
            client,
            thumbnail,
            playlist,
            notifier,
            // Optimistic start: the first failed probe counts as a loss.
            connectivity: Connectivity::Connected,
            stations_loaded: false,
        }
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Run until `cancel` fires.  The idle wait wakes immediately on
    /// cancellation; a request already in flight is allowed to finish or time
    /// out.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Reconciliation loop started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let params = self.session.tick_params().await;
            let outcome = self.tick_with(&params).await;
            debug!("Tick: {:?}", outcome);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(params.wait) => {}
            }
        }
        info!("Reconciliation loop stopped");
    }

    pub async fn tick(&mut self) -> TickOutcome {
        let params = self.session.tick_params().await;
        self.tick_with(&params).await
    }

    async fn tick_with(&mut self, params: &TickParams) -> TickOutcome {
        let probe_ok = self
            .client
            .probe_connectivity(&params.json_url, params.wait)
            .await;
        let (connectivity, transition) = self.connectivity.observe(probe_ok);
        self.connectivity = connectivity;
        self.session.set_connectivity(connectivity).await;

        let presenter = self.session.presenter().clone();
        match transition {
            Transition::Lost => {
                warn!("Lost connection to {}", params.json_url);
                self.notifier.show(notify::connection_lost(
                    &params.station,
                    params.notification_timeout,
                ));
                presenter.set_icon(TrayIcon::Disconnected);
                presenter.rebuild_menu();
            }
            Transition::Restored => {
                info!("Connection to {} restored", params.json_url);
                presenter.set_icon(TrayIcon::Normal);
                self.refresh_stations(params).await;
                presenter.rebuild_menu();
            }
            Transition::Steady => {}
        }

        if !connectivity.is_connected() {
            return TickOutcome::Disconnected;
        }

        if !self.stations_loaded {
            self.refresh_stations(params).await;
            presenter.rebuild_menu();
        }

        let np = self
            .client
            .fetch_now_playing(&params.json_url, &params.station, params.wait)
            .await;

        match self.session.observe_now_playing(&params.station, &np).await {
            Observation::Stale => return TickOutcome::Stale,
            Observation::Unchanged => return TickOutcome::Unchanged,
            Observation::Changed => {}
        }

        self.thumbnail
            .sync(&self.client, &np.album_art_url, params.wait)
            .await;

        if let Some(n) =
            notify::song_notification(&np, self.thumbnail.path(), params.notification_timeout)
        {
            self.notifier.show(n);
        }

        if let Err(e) = self.playlist.append(&np).await {
            warn!("Could not append to playlist {:?}: {}", self.playlist.path(), e);
        }

        self.session.set_baseline(np.clone()).await;
        TickOutcome::Changed(np)
    }

    async fn refresh_stations(&mut self, params: &TickParams) {
        let stations = self
            .client
            .list_stations(&params.json_url, params.wait)
            .await;
        if !stations.is_empty() {
            self.session.set_stations(stations).await;
            self.stations_loaded = true;
        }
    }
}
