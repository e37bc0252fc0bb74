use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ConfigError;

/// The login-autostart desktop entry.  Its presence mirrors the `autostart`
/// setting.
#[derive(Debug, Clone)]
pub struct AutostartEntry {
    path: PathBuf,
    exec: String,
}

impl AutostartEntry {
    pub fn new(path: impl Into<PathBuf>, exec: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exec: exec.into(),
        }
    }

    /// Entry at the XDG autostart location launching the running executable.
    pub fn for_current_exe() -> Self {
        let exec = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| crate::APP_ID.to_string());
        Self::new(crate::platform::autostart_path(), exec)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_registered(&self) -> bool {
        self.path.exists()
    }

    fn desktop_file(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name={name}\n\
             Comment=Now playing on ꓘINK\n\
             Exec={exec}\n\
             Icon={id}\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            name = crate::APP_NAME,
            exec = self.exec,
            id = crate::APP_ID,
        )
    }

    /// Create the entry when enabled and absent, remove it when disabled and
    /// present.  Returns whether anything changed.
    pub fn sync(&self, enabled: bool) -> Result<bool, ConfigError> {
        match (enabled, self.is_registered()) {
            (true, false) => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
                }
                std::fs::write(&self.path, self.desktop_file())
                    .map_err(|e| ConfigError::io(&self.path, e))?;
                info!("Autostart registered: {:?}", self.path);
                Ok(true)
            }
            (false, true) => {
                std::fs::remove_file(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
                info!("Autostart removed: {:?}", self.path);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
