//! Core of the ꓘINK Radio tray player.
//!
//! Everything that can be exercised without a desktop session lives here: the
//! settings store, the now-playing model, the metadata client, the on-disk
//! playlist log and thumbnail cache, the shared session aggregate, the player
//! controller and the background reconciliation loop.  The `kink-tray` binary
//! only wires these to mpv, the StatusNotifierItem tray and the notification
//! daemon.

pub mod app;
pub mod autostart;
pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod now_playing;
pub mod platform;
pub mod player;
pub mod playlist;
pub mod presenter;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod thumbnail;
pub mod watch;

pub const APP_ID: &str = "kink-radio";
pub const APP_NAME: &str = "ꓘINK Radio";
