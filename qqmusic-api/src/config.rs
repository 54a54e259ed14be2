//! Runtime configuration, persisted as JSON at
//! `~/.config/qqmusic-proxy/config.json`.
//!
//! ```json
//! {
//!   "database": "/var/lib/qqmusic-proxy/credential.db",
//!   "initial_credential": { "musicid": 123456, "musickey": "Q_H_L_..." },
//!   "endpoint": "https://u.y.qq.com/cgi-bin/musics.fcg",
//!   "stream_domain": "https://isure.stream.qqmusic.qq.com/",
//!   "timeout_secs": 30
//! }
//! ```
//!
//! Every field is optional. A missing file yields [`Config::default`].

use crate::error::{QqMusicError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Vendor RPC endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://u.y.qq.com/cgi-bin/musics.fcg";

/// CDN prefix joined with each `purl`.
pub const DEFAULT_STREAM_DOMAIN: &str = "https://isure.stream.qqmusic.qq.com/";

const APP_DIR: &str = "qqmusic-proxy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding the credential row. Defaults to
    /// `<data_dir>/qqmusic-proxy/credential.db`.
    pub database: Option<PathBuf>,
    /// Credential JSON consumed once when the store is empty. May be given
    /// as a JSON string or inline object.
    #[serde(deserialize_with = "string_or_object")]
    pub initial_credential: Option<String>,
    pub endpoint: String,
    pub stream_domain: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            initial_credential: None,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            stream_domain: DEFAULT_STREAM_DOMAIN.to_owned(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, returning defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// `<config_dir>/qqmusic-proxy/config.json`.
    pub fn path() -> Result<PathBuf> {
        let config = dirs::config_dir()
            .ok_or_else(|| QqMusicError::Config("cannot determine config directory".into()))?;
        Ok(config.join(APP_DIR).join("config.json"))
    }

    /// Where the credential store lives.
    ///
    /// # Errors
    ///
    /// [`QqMusicError::Config`] when no path is configured and the platform
    /// has no data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let data = dirs::data_dir().ok_or_else(|| {
            QqMusicError::Config("no credential store configured and no data directory".into())
        })?;
        Ok(data.join(APP_DIR).join("credential.db"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn string_or_object<'de, D: Deserializer<'de>>(
    de: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}
