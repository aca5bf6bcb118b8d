//! Application constants and startup settings.
//!
//! `Settings` is resolved once at process start (environment, optionally a
//! `.env` file) and then passed into services. Request handlers never read
//! the environment themselves.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "ClinicRx";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const ENV_BIND_ADDR: &str = "CLINICRX_BIND_ADDR";
pub const ENV_DATA_DIR: &str = "CLINICRX_DATA_DIR";
pub const ENV_STORAGE_URL: &str = "CLINICRX_STORAGE_URL";
pub const ENV_RELAY_URL: &str = "CLINICRX_RELAY_URL";
pub const ENV_RELAY_TOKEN: &str = "CLINICRX_RELAY_TOKEN";
pub const ENV_COUNTRY_CODE: &str = "CLINICRX_DEFAULT_COUNTRY_CODE";
pub const ENV_HTTP_TIMEOUT: &str = "CLINICRX_HTTP_TIMEOUT_SECS";

/// Fallback tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinicrx_lib=info,tower_http=warn"
}

/// Default data directory: `~/ClinicRx/`, or `./ClinicRx` when no home
/// directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(APP_NAME))
}

/// SQLite database location inside a data directory.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("database").join("clinicrx.db")
}

/// Local object-store root inside a data directory.
pub fn files_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("files")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings resolved at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Remote object store. `None` selects the local filesystem store.
    pub storage_url: Option<String>,
    /// Messaging relay. `None` disables delivery.
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub default_country_code: String,
    pub http_timeout_secs: u64,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: ENV_BIND_ADDR,
                value: bind_raw.clone(),
            })?;

        let http_timeout_secs = match get(ENV_HTTP_TIMEOUT) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_HTTP_TIMEOUT,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let default_country_code = match get(ENV_COUNTRY_CODE) {
            Some(code) => {
                let digits = code.trim_start_matches('+').to_string();
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_COUNTRY_CODE,
                        value: code,
                    });
                }
                digits
            }
            None => DEFAULT_COUNTRY_CODE.to_string(),
        };

        Ok(Self {
            bind_addr,
            data_dir: get(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(app_data_dir),
            storage_url: get(ENV_STORAGE_URL),
            relay_url: get(ENV_RELAY_URL),
            relay_token: get(ENV_RELAY_TOKEN),
            default_country_code,
            http_timeout_secs,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        database_path(&self.data_dir)
    }

    pub fn files_dir(&self) -> PathBuf {
        files_dir(&self.data_dir)
    }
}
