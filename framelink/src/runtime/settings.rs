use std::error::Error;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories_next::BaseDirs;
use serde::{Deserialize, Serialize};

use super::log_buffer::DEFAULT_LOG_CAPACITY;
use crate::error::RemoteError;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteSettings {
    pub port: u16,
    pub address: String,
    /// Landing page served at `/`.
    pub page: Option<String>,
    pub worker_threads: usize,
    /// `None` lets a capture wait forever.
    pub capture_timeout_secs: Option<u64>,
    pub log_capacity: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            address: DEFAULT_ADDRESS.to_string(),
            page: None,
            worker_threads: 1,
            capture_timeout_secs: Some(DEFAULT_CAPTURE_TIMEOUT_SECS),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl RemoteSettings {
    pub fn capture_timeout(&self) -> Option<Duration> {
        self.capture_timeout_secs.map(Duration::from_secs)
    }

    pub fn page_path(&self) -> Option<PathBuf> {
        self.page
            .as_deref()
            .filter(|page| !page.trim().is_empty())
            .map(PathBuf::from)
    }

    /// True when a change between `self` and `other` requires rebinding the
    /// listener.
    pub fn listener_differs(&self, other: &Self) -> bool {
        self.port != other.port
            || self.address != other.address
            || self.worker_threads.max(1) != other.worker_threads.max(1)
    }
}

pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join("Framelink"))
}

pub fn default_settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("settings.json"))
}

pub fn save_settings(
    path: &Path,
    settings: &RemoteSettings,
) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(settings)?;
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir)?;
    }
    fs::write(path, json)?;
    Ok(())
}

pub fn load_settings(path: &Path) -> Result<RemoteSettings, Box<dyn Error>> {
    let json = fs::read_to_string(path)?;
    let settings = serde_json::from_str::<RemoteSettings>(&json)?;
    Ok(settings)
}

pub fn load_settings_if_exists(
    path: &Path,
) -> Result<Option<RemoteSettings>, Box<dyn Error>> {
    match load_settings(path) {
        Ok(settings) => Ok(Some(settings)),
        Err(err) => {
            if err
                .downcast_ref::<std::io::Error>()
                .is_some_and(|e| e.kind() == ErrorKind::NotFound)
            {
                Ok(None)
            } else {
                Err(err)
            }
        }
    }
}

/// Parses settings from a JSON value, e.g. one entry of a host-wide
/// settings document.
pub fn from_json_value(
    value: serde_json::Value,
) -> Result<RemoteSettings, RemoteError> {
    serde_json::from_value(value)
        .map_err(|err| RemoteError::Settings(err.to_string()))
}

pub fn to_json_value(
    settings: &RemoteSettings,
) -> Result<serde_json::Value, RemoteError> {
    serde_json::to_value(settings)
        .map_err(|err| RemoteError::Settings(err.to_string()))
}
