use crate::bridge::TokenStore;
use crate::error::config::ConfigError;
use crate::{DEFAULT_HEARTBEAT_TIMEOUT_MS, RELAY_DEFAULT_ADDRESS};

use common::ErrorLocation;

use std::env;
use std::net::SocketAddr;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "relay.json";
const CONFIG_VERSION: u32 = 1;
const CONFIG_DIR_NAME: &str = "worker-relay";

pub const CONFIG_DIR_ENV: &str = "RELAY_CONFIG_DIR";
pub const HEARTBEAT_TIMEOUT_ENV: &str = "HEARTBEAT_TIMEOUT";
pub const LISTEN_ADDRESS_ENV: &str = "RELAY_LISTEN_ADDRESS";
pub const WORKER_TOKENS_ENV: &str = "RELAY_WORKER_TOKENS";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Queue wait between liveness checks on an idle worker.
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    #[serde(default)]
    pub worker_tokens: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            listen_address: default_listen_address(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            worker_tokens: Vec::new(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_listen_address() -> String {
    RELAY_DEFAULT_ADDRESS.to_string()
}
fn default_heartbeat_timeout_ms() -> u64 {
    DEFAULT_HEARTBEAT_TIMEOUT_MS
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RelayConfig {
    /// Load config from {config_dir}/relay.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, parsed or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: RelayConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Load `.env` (if any), then the config file, then environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any stage fails or the merged result is invalid.
    pub fn load_with_env(config_dir: &Path) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded .env from: {:?}", path),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Failed to parse .env: {}", e),
        }

        let mut config = Self::load(config_dir)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `HEARTBEAT_TIMEOUT`, `RELAY_LISTEN_ADDRESS` and
    /// `RELAY_WORKER_TOKENS` onto this config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvError`] if a variable is set but unusable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(raw) = read_env(HEARTBEAT_TIMEOUT_ENV)? {
            let heartbeat = parse_heartbeat(&raw)?;
            self.heartbeat_timeout_ms =
                u64::try_from(heartbeat.as_millis()).map_err(|_| ConfigError::EnvError {
                    location: ErrorLocation::from(Location::caller()),
                    variable: HEARTBEAT_TIMEOUT_ENV.to_string(),
                    reason: format!("{raw} is too large"),
                })?;
            info!("Heartbeat timeout overridden to {heartbeat:?}");
        }

        if let Some(address) = read_env(LISTEN_ADDRESS_ENV)? {
            info!("Listen address overridden to {address}");
            self.listen_address = address;
        }

        if let Some(tokens) = read_env(WORKER_TOKENS_ENV)? {
            self.worker_tokens = tokens
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect();
            info!(
                "Worker tokens overridden from environment ({} token(s))",
                self.worker_tokens.len()
            );
        }

        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.heartbeat_timeout_ms == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("heartbeat_timeout_ms must be greater than zero"),
            });
        }

        if self.listen_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid listen_address: {} (expected host:port)",
                    self.listen_address
                ),
            });
        }

        if self.worker_tokens.iter().any(|token| token.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: String::from("worker_tokens must not contain empty tokens"),
            });
        }

        if self.worker_tokens.is_empty() {
            warn!("No worker tokens configured; every worker will be refused");
        }

        Ok(())
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(self.worker_tokens.iter().cloned())
    }
}

/// Resolve the config directory: `RELAY_CONFIG_DIR`, else the platform config dir.
///
/// # Errors
///
/// Returns [`ConfigError::DirectoryNotFound`] if neither is available.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
        info!("Using {CONFIG_DIR_ENV} override: {custom_dir}");
        return Ok(PathBuf::from(custom_dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
            reason: format!("No platform config directory and {CONFIG_DIR_ENV} is unset"),
        })
}

/// Parse a heartbeat value: bare integers are seconds, anything else is
/// read as a humantime duration such as `250ms` or `1m 30s`.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if the value is neither.
pub fn parse_heartbeat(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    humantime::parse_duration(raw).map_err(|e| ConfigError::EnvError {
        location: ErrorLocation::from(Location::caller()),
        variable: HEARTBEAT_TIMEOUT_ENV.to_string(),
        reason: format!("{raw}: {e}"),
    })
}

fn read_env(variable: &str) -> Result<Option<String>, ConfigError> {
    match env::var(variable) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvError {
            location: ErrorLocation::from(Location::caller()),
            variable: variable.to_string(),
            reason: e.to_string(),
        }),
    }
}
