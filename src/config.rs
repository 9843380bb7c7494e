// Settings loaded from `config.toml`
//
// Looked up at `<config dir>/brew-services-tui/config.toml` unless a path is
// given on the command line. Every field is optional:
//
// ```toml
// executable = "/opt/homebrew/bin/brew"
// refresh_interval_secs = 30
// command_timeout_secs = 60
// user = "alice"
// ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::brew::DEFAULT_BREW_PATH;
use crate::error::{Error, Result};

pub const APP_DIR: &str = "brew-services-tui";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the `brew` executable
    pub executable: PathBuf,

    /// Seconds between background refreshes, 0 disables them
    pub refresh_interval_secs: u64,

    /// Upper bound for a single `brew services` call, none by default
    pub command_timeout_secs: Option<u64>,

    /// Acting user for ownership checks. Defaults to the OS user.
    pub user: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_BREW_PATH),
            refresh_interval_secs: 30,
            command_timeout_secs: None,
            user: None,
        }
    }
}

impl Settings {
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// The user whose services may be controlled.
    ///
    /// Falls back to an empty name when the OS user cannot be determined,
    /// which makes every owned service read-only.
    pub fn acting_user(&self) -> String {
        self.user
            .clone()
            .or_else(current_os_user)
            .unwrap_or_else(|| {
                warn!("Could not determine the current user");
                String::new()
            })
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
        .ok_or_else(|| Error::config("no configuration directory on this platform"))
}

/// Reads settings from `path`, failing on unreadable or malformed files.
pub fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|source| Error::ConfigInvalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads settings, falling back to defaults when the file is missing or bad.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                return Settings::default();
            }
        },
    };

    if !path.exists() {
        debug!("No config at {:?}, using defaults", path);
        return Settings::default();
    }

    match read_settings(&path) {
        Ok(settings) => {
            debug!("Loaded settings from {:?}", path);
            settings
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            Settings::default()
        }
    }
}

#[cfg(unix)]
fn current_os_user() -> Option<String> {
    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => std::env::var("USER").ok(),
        Err(e) => {
            debug!("User lookup failed: {}", e);
            std::env::var("USER").ok()
        }
    }
}

#[cfg(not(unix))]
fn current_os_user() -> Option<String> {
    std::env::var("USERNAME").ok()
}
