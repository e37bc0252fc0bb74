use crate::protocol::TrayIcon;

/// Outbound half of the tray: the core only ever asks for an icon change or a
/// menu rebuild.  Clicks come back as [`crate::protocol::Command`]s.
pub trait TrayPresenter: Send + Sync {
    fn set_icon(&self, icon: TrayIcon);
    fn rebuild_menu(&self);
}
