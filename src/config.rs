use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_DATASET: &str = "epa/fuel-economy";
pub const DEFAULT_DATA_DIR: &str = "dataset-folder";
pub const DEFAULT_API_BASE: &str = "https://www.kaggle.com/api/v1";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Runtime settings. The binary fills this from flags and `FUEL_ECONOMY_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote dataset, `owner/dataset-slug`.
    pub dataset: String,
    /// Root of the snapshot store.
    pub data_dir: PathBuf,
    /// Kaggle API base URL.
    pub api_base: String,
    /// How long an acquired snapshot is reused. Zero re-acquires on every
    /// call.
    pub cache_ttl: Duration,
    /// Use this zip archive instead of downloading.
    pub archive: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: DEFAULT_DATASET.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            api_base: DEFAULT_API_BASE.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            archive: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Kaggle credentials
// ---------------------------------------------------------------------------

/// API credentials, as found in the environment or `kaggle.json`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// `KAGGLE_USERNAME` + `KAGGLE_KEY`, else `kaggle.json` in
    /// `KAGGLE_CONFIG_DIR` or `~/.kaggle`.
    pub fn discover() -> Result<Self> {
        if let (Ok(username), Ok(key)) = (env::var("KAGGLE_USERNAME"), env::var("KAGGLE_KEY")) {
            return Ok(Credentials { username, key });
        }
        let dir = kaggle_config_dir(env::var_os("KAGGLE_CONFIG_DIR"), dirs::home_dir())
            .ok_or_else(|| {
                Error::Authentication("no KAGGLE_USERNAME/KAGGLE_KEY and no home directory".into())
            })?;
        Self::from_file(&dir.join("kaggle.json"))
    }

    /// Read a `kaggle.json` credentials file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Authentication(format!("could not read {}: {e}", path.display()))
        })?;
        let creds: Credentials = serde_json::from_str(&text).map_err(|e| {
            Error::Authentication(format!("malformed {}: {e}", path.display()))
        })?;
        if creds.username.is_empty() || creds.key.is_empty() {
            return Err(Error::Authentication(format!(
                "{} has an empty username or key",
                path.display()
            )));
        }
        Ok(creds)
    }
}

/// Where `kaggle.json` lives: the explicit override, else `<home>/.kaggle`.
fn kaggle_config_dir(explicit: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    match explicit {
        Some(dir) => Some(PathBuf::from(dir)),
        None => home.map(|home| home.join(".kaggle")),
    }
}
