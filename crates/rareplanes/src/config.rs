//! Configuration management for rareplanes.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "rareplanes";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "RAREPLANES_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `RAREPLANES_`, sections split on `__`)
/// 2. TOML config file at `~/.config/rareplanes/config.toml`
/// 3. Default values
///
/// Command-line flags are applied on top by the binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API configuration.
    pub api: ApiConfig,
    /// Region fetch configuration.
    pub fetch: FetchConfig,
    /// Scan and filter configuration.
    pub scan: ScanConfig,
    /// Map output configuration.
    pub map: MapConfig,
    /// Live server configuration.
    pub server: ServerConfig,
}

/// Remote API endpoints and client identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL of the aircraft rarity catalog.
    pub catalog_url: String,
    /// URL of the live flight feed.
    pub feed_url: String,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Client version sent to the catalog API.
    pub client_version: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Region fetch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of region requests in flight at once.
    pub concurrency: usize,
}

/// Scan and filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum rarity score to report.
    pub min_rarity: f64,
    /// Maximum number of rows in the terminal table.
    pub max_table_rows: usize,
}

/// Map output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Where the HTML map is written.
    pub output: PathBuf,
    /// Tile layer URL template.
    pub tile_url: String,
    /// Attribution shown for the tile layer.
    pub tile_attribution: String,
}

/// Live server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Upper bound for a single refresh request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://api.skycards.oldapes.com/models".to_string(),
            feed_url: "https://data-cloud.flightradar24.com/zones/fcgi/feed.js".to_string(),
            user_agent: "SkyCards/3.0.0 (iPhone; iOS 18.0)".to_string(),
            client_version: "3.0.0".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Get the per-request HTTP timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_rarity: 10.0,
            max_table_rows: 100,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("rare_planes_map.html"),
            tile_url: "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png".to_string(),
            tile_attribution: "&copy; OpenStreetMap contributors &copy; CARTO".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration, reading the default config file unless a path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.api.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "api.request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.fetch.concurrency == 0 {
            return Err(Error::ConfigValidation {
                message: "fetch.concurrency must be greater than 0".to_string(),
            });
        }

        if !self.scan.min_rarity.is_finite() || self.scan.min_rarity < 0.0 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "scan.min_rarity must be a non-negative number, got {}",
                    self.scan.min_rarity
                ),
            });
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "server.request_timeout_secs must be greater than 0".to_string(),
            });
        }

        self.server_addr()?;
        Ok(())
    }

    /// Get the live server request timeout.
    #[must_use]
    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Resolve the address the live server listens on.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.host` is not an IP address.
    pub fn server_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::ConfigValidation {
                message: format!("invalid server address '{}': {e}", self.server.host),
            })
    }
}
