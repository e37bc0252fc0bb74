//! Shared fixtures: an in-process metadata endpoint and recording sinks.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use kink_core::autostart::AutostartEntry;
use kink_core::config::ConfigStore;
use kink_core::notify::{Notification, NotificationSink};
use kink_core::presenter::TrayPresenter;
use kink_core::protocol::TrayIcon;
use kink_core::session::SessionManager;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

#[derive(Default)]
struct Script {
    /// Replies consumed one per request before falling back to `fallback`.
    queued: VecDeque<Reply>,
    fallback: Option<Reply>,
    hits: usize,
}

#[derive(Clone, Default)]
pub struct Route(Arc<Mutex<Script>>);

impl Route {
    pub fn set(&self, reply: Reply) {
        self.0.lock().unwrap().fallback = Some(reply);
    }

    pub fn push(&self, reply: Reply) {
        self.0.lock().unwrap().queued.push_back(reply);
    }

    pub fn hits(&self) -> usize {
        self.0.lock().unwrap().hits
    }

    fn next(&self) -> Reply {
        let mut s = self.0.lock().unwrap();
        s.hits += 1;
        s.queued
            .pop_front()
            .or_else(|| s.fallback.clone())
            .unwrap_or_else(|| Reply::status(StatusCode::NOT_FOUND))
    }
}

async fn serve_route(State(route): State<Route>) -> (StatusCode, String) {
    let reply = route.next();
    (reply.status, reply.body)
}

/// Mock server exposing `/now.json` and `/art.jpg`.
pub struct MockEndpoint {
    pub base: String,
    pub now: Route,
    pub art: Route,
}

impl MockEndpoint {
    pub async fn start() -> Self {
        let now = Route::default();
        let art = Route::default();
        let app = Router::new()
            .route("/now.json", get(serve_route).with_state(now.clone()))
            .route("/art.jpg", get(serve_route).with_state(art.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock endpoint");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{addr}"),
            now,
            art,
        }
    }

    pub fn json_url(&self) -> String {
        format!("{}/now.json", self.base)
    }

    pub fn art_url(&self) -> String {
        format!("{}/art.jpg", self.base)
    }
}

/// Now-playing document for one station.
pub fn document(station: &str, artist: &str, title: &str, program: &str, art: &str) -> String {
    serde_json::json!({
        "stations": { "kink": {}, "kink-dna": {}, "kink-distortion": {} },
        "extended": {
            station: {
                "artist": artist,
                "title": title,
                "program": { "title": program },
                "album_art": { "320": art }
            }
        }
    })
    .to_string()
}

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<Notification>>);

impl RecordingSink {
    pub fn all(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn show(&self, n: Notification) {
        self.0.lock().unwrap().push(n);
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    icons: Mutex<Vec<TrayIcon>>,
    rebuilds: Mutex<usize>,
}

impl RecordingPresenter {
    pub fn icons(&self) -> Vec<TrayIcon> {
        self.icons.lock().unwrap().clone()
    }

    pub fn rebuilds(&self) -> usize {
        *self.rebuilds.lock().unwrap()
    }
}

impl TrayPresenter for RecordingPresenter {
    fn set_icon(&self, icon: TrayIcon) {
        self.icons.lock().unwrap().push(icon);
    }

    fn rebuild_menu(&self) {
        *self.rebuilds.lock().unwrap() += 1;
    }
}

pub fn session(
    dir: &Path,
    settings: &str,
) -> (Arc<SessionManager>, Arc<RecordingPresenter>) {
    let path = dir.join("settings.toml");
    std::fs::write(&path, settings).expect("write settings");
    let store = ConfigStore::open(&path).expect("open settings");
    let presenter = Arc::new(RecordingPresenter::default());
    let autostart = AutostartEntry::new(dir.join("autostart.desktop"), "kink-radio");
    (
        Arc::new(SessionManager::new(store, presenter.clone(), autostart)),
        presenter,
    )
}
