//! # API Configuration
//!
//! Configuration for the SalesDesk API server.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SALESDESK_PORT=8080                                                │
//! │     SALESDESK_JWT_SECRET=...                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $SALESDESK_CONFIG, ./salesdesk.toml or the platform config dir     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     0.0.0.0:8080, ./salesdesk.db, 2h refresh, 3h staleness             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # salesdesk.toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "./salesdesk.db"
//! max_connections = 5
//!
//! [auth]
//! jwt_secret = "change-me"
//! jwt_lifetime_secs = 86400
//!
//! [cron]
//! token = "shared-secret"     # x-cloudscheduler-token, optional
//!
//! [stats]
//! refresh_interval_mins = 120
//! stale_after_mins = 180
//!
//! [ads]
//! access_token = "..."
//! account_id = "act_123"
//! api_base = "https://graph.facebook.com/v18.0"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use salesdesk_core::{STATS_REFRESH_INTERVAL_MINS, STATS_STALE_AFTER_MINS};
use salesdesk_db::DbConfig;

const DEV_JWT_SECRET: &str = "salesdesk-dev-secret-change-in-production";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: PathBuf::from("./salesdesk.db"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    pub jwt_lifetime_secs: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        AuthSection {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_lifetime_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CronSection {
    /// Shared secret expected in `x-cloudscheduler-token`. Unset means the
    /// cron endpoints are open.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSection {
    pub refresh_interval_mins: i64,
    pub stale_after_mins: i64,
}

impl Default for StatsSection {
    fn default() -> Self {
        StatsSection {
            refresh_interval_mins: STATS_REFRESH_INTERVAL_MINS,
            stale_after_mins: STATS_STALE_AFTER_MINS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsSection {
    pub access_token: Option<String>,
    /// Ad account to query. Looked up from the token when unset.
    pub account_id: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for AdsSection {
    fn default() -> Self {
        AdsSection {
            access_token: None,
            account_id: None,
            api_base: "https://graph.facebook.com/v18.0".to_string(),
            timeout_secs: 20,
        }
    }
}

// =============================================================================
// ApiConfig
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub auth: AuthSection,
    pub cron: CronSection,
    pub stats: StatsSection,
    pub ads: AdsSection,
}

impl ApiConfig {
    /// Loads configuration: defaults, then the TOML file, then environment
    /// overrides, then validation.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading API config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".into()));
        }
        if self.auth.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.jwt_lifetime_secs".into()));
        }
        if self.stats.refresh_interval_mins <= 0 {
            return Err(ConfigError::InvalidValue("stats.refresh_interval_mins".into()));
        }
        if self.stats.stale_after_mins < self.stats.refresh_interval_mins {
            return Err(ConfigError::InvalidValue(
                "stats.stale_after_mins must not be shorter than the refresh interval".into(),
            ));
        }
        if !self.ads.api_base.starts_with("http://") && !self.ads.api_base.starts_with("https://") {
            return Err(ConfigError::InvalidValue(format!(
                "ads.api_base must be an http(s) URL, got: {}",
                self.ads.api_base
            )));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Applies `SALESDESK_*` environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_parse::<u16>("SALESDESK_PORT")? {
            self.server.port = port;
        }
        if let Ok(addr) = std::env::var("SALESDESK_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("SALESDESK_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Ok(secret) = std::env::var("SALESDESK_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(secs) = env_parse::<i64>("SALESDESK_JWT_LIFETIME_SECS")? {
            self.auth.jwt_lifetime_secs = secs;
        }
        if let Ok(token) = std::env::var("SALESDESK_CRON_TOKEN") {
            self.cron.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(token) = std::env::var("SALESDESK_AD_ACCESS_TOKEN") {
            self.ads.access_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(account) = std::env::var("SALESDESK_AD_ACCOUNT_ID") {
            self.ads.account_id = Some(account).filter(|a| !a.is_empty());
        }
        if let Ok(base) = std::env::var("SALESDESK_AD_API_BASE") {
            self.ads.api_base = base;
        }
        if let Some(mins) = env_parse::<i64>("SALESDESK_STATS_INTERVAL_MINS")? {
            self.stats.refresh_interval_mins = mins;
        }
        if let Some(mins) = env_parse::<i64>("SALESDESK_STALE_AFTER_MINS")? {
            self.stats.stale_after_mins = mins;
        }
        Ok(())
    }

    /// `$SALESDESK_CONFIG`, then `./salesdesk.toml`, then the platform
    /// config directory.
    fn default_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SALESDESK_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from("salesdesk.toml");
        if local.exists() {
            return Some(local);
        }
        directories::ProjectDirs::from("com", "salesdesk", "api")
            .map(|dirs| dirs.config_dir().join("salesdesk.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind_addr, self.server.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind_addr".into()))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to read config file {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.stats.refresh_interval_mins, 120);
        assert_eq!(config.stats.stale_after_mins, 180);
        assert!(config.cron.token.is_none());
        assert!(config.uses_dev_secret());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ApiConfig::default();

        config.auth.jwt_secret = "  ".into();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = "secret".into();
        config.stats.stale_after_mins = 60;
        assert!(config.validate().is_err());

        config.stats.stale_after_mins = 180;
        config.ads.api_base = "graph.facebook.com".into();
        assert!(config.validate().is_err());

        config.ads.api_base = "https://graph.facebook.com/v18.0".into();
        config.server.bind_addr = "not an address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ApiConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [cron]
            token = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.cron.token.as_deref(), Some("abc"));
        assert_eq!(config.database.path, PathBuf::from("./salesdesk.db"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salesdesk.toml");
        std::fs::write(&path, "[auth]\njwt_secret = \"file-secret\"\n").unwrap();

        let config = ApiConfig::from_file(&path).unwrap();
        assert_eq!(config.auth.jwt_secret, "file-secret");
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }
}
