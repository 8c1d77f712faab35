// Window state persistence module
// Remembers the window size across runs in a small TOML file

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory name under the platform config directory
const APP_DIR: &str = "imeji";

/// State file name within the app config directory
const STATE_FILE: &str = "window.toml";

/// Environment variable overriding the config directory
pub const ENV_CONFIG_DIR: &str = "IMEJI_CONFIG_DIR";

/// Smallest window the viewer opens with
pub const MIN_WIDTH: u32 = 480;
pub const MIN_HEIGHT: u32 = 480;

#[derive(Debug, Error)]
pub enum WindowStateError {
    #[error("No config directory available")]
    NoConfigDir,

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed window state in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize window state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Window geometry that survives restarts. Wayland does not let clients
/// place toplevels, so only size and maximization are kept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowState {
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            maximized: false,
        }
    }
}

impl WindowState {
    /// Clamp to the minimum window size
    pub fn sanitized(self) -> Self {
        Self {
            width: self.width.max(MIN_WIDTH),
            height: self.height.max(MIN_HEIGHT),
            maximized: self.maximized,
        }
    }

    /// Load from `<dir>/window.toml`. A missing file yields the defaults.
    pub fn load_from(dir: &Path) -> Result<Self, WindowStateError> {
        let path = dir.join(STATE_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No window state at {}", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(WindowStateError::Io { path, source }),
        };

        let state: Self =
            toml::from_str(&text).map_err(|source| WindowStateError::Parse { path, source })?;
        Ok(state.sanitized())
    }

    /// Write to `<dir>/window.toml`, creating the directory if needed
    pub fn save_to(&self, dir: &Path) -> Result<(), WindowStateError> {
        fs::create_dir_all(dir).map_err(|source| WindowStateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(STATE_FILE);
        let text = toml::to_string(self)?;
        fs::write(&path, text).map_err(|source| WindowStateError::Io { path, source })
    }
}

/// Resolve the config directory: explicit override, then the environment
/// variable, then the platform default.
pub fn config_dir(cli_override: Option<&Path>) -> Result<PathBuf, WindowStateError> {
    if let Some(dir) = cli_override {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(ENV_CONFIG_DIR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(WindowStateError::NoConfigDir)
}
