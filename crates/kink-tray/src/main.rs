mod desktop;
mod mpv;
mod tray;

use std::sync::Arc;

use anyhow::Context;
use kink_core::app::Dispatcher;
use kink_core::autostart::AutostartEntry;
use kink_core::client::MetadataClient;
use kink_core::config::ConfigStore;
use kink_core::notify::NotificationSink;
use kink_core::platform;
use kink_core::player::PlayerController;
use kink_core::playlist::PlaylistLog;
use kink_core::protocol::Command;
use kink_core::reconcile::Reconciler;
use kink_core::session::SessionManager;
use kink_core::thumbnail::ThumbnailCache;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging() {
        eprintln!("kink-radio: could not open log file: {e:#}");
    }

    // Run on a task so a panic surfaces here as a JoinError instead of
    // unwinding past the dialog.
    let outcome = match tokio::spawn(run()).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(anyhow::anyhow!("panic: {}", panic_message(e.into_panic()))),
        Err(e) => Err(e.into()),
    };

    if let Err(e) = outcome {
        error!("Fatal: {:?}", e);
        desktop::fatal_dialog(&format!("{e:#}")).await;
        std::process::exit(1);
    }
}

fn init_logging() -> anyhow::Result<()> {
    let log_path = platform::log_path();
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening {}", log_path.display()))?;

    // RUST_LOG wins; otherwise debug for our crates, HTTP internals quiet.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "info,kink_core=debug,kink_tray=debug,hyper_util=warn,reqwest=warn".to_string()
    });
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("kink-radio log: {}", log_path.display());
    Ok(())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run() -> anyhow::Result<()> {
    info!("{} starting", kink_core::APP_NAME);

    for dir in [platform::data_dir(), platform::config_dir(), platform::cache_dir()] {
        std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    // ── settings + session ───────────────────────────────────────────────────
    let store = ConfigStore::open(platform::settings_path())?;
    let (link, tray_updates) = tray::TrayLink::channel();
    let session = Arc::new(SessionManager::new(
        store,
        Arc::new(link),
        AutostartEntry::for_current_exe(),
    ));
    if let Err(e) = session.sync_autostart().await {
        warn!("Autostart registration: {}", e);
    }

    // ── tray ─────────────────────────────────────────────────────────────────
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let _tray = tray::spawn(cmd_tx.clone(), session.clone(), tray_updates).await?;

    // ── playback ─────────────────────────────────────────────────────────────
    let playlist = PlaylistLog::new(platform::playlist_path());
    playlist
        .reset()
        .await
        .with_context(|| format!("resetting {}", playlist.path().display()))?;

    let notifier: Arc<dyn NotificationSink> = Arc::new(desktop::DesktopNotifier);
    let cancel = CancellationToken::new();
    let player = PlayerController::new(mpv::MpvEngine::new(), session.clone());
    let mut dispatcher = Dispatcher::new(
        session.clone(),
        player,
        notifier.clone(),
        platform::thumbnail_path(),
        playlist.path().to_path_buf(),
        cmd_tx.clone(),
        cancel.clone(),
    );
    dispatcher.start().await?;

    // ── reconciliation loop ──────────────────────────────────────────────────
    let reconciler = Reconciler::new(
        session.clone(),
        MetadataClient::new(),
        ThumbnailCache::new(platform::thumbnail_path()),
        playlist,
        notifier,
    );
    let loop_handle = tokio::spawn(reconciler.run(cancel.clone()));

    let quit_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received");
            let _ = quit_tx.send(Command::Quit);
        }
    });
    drop(cmd_tx);

    let dispatched = dispatcher.run(cmd_rx).await;
    // Covers the error path too; quit already cancelled on the normal one.
    cancel.cancel();
    if let Err(e) = loop_handle.await {
        warn!("Reconciliation loop ended abnormally: {}", e);
    }
    dispatched?;

    info!("Bye");
    Ok(())
}
