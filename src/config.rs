// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from a JSON file and environment variables.
//!
//! The file is optional: every credential can also come from the environment
//! (or a `.env` file). Environment values win over file values.

use crate::services::sport::is_known_sport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default ledger location, relative to the working directory.
pub const DEFAULT_LEDGER_PATH: &str = "sync_ledger.json";

/// Default number of retries for transient HTTP failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Prefix used by the example config for values the user must fill in.
const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strava: StravaConfig,
    #[serde(default)]
    pub komoot: KomootConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Strava OAuth application credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StravaConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Long-lived refresh token with `activity:read_all` scope
    #[serde(default)]
    pub refresh_token: String,
}

/// Komoot account credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KomootConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Settings for the sync run itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Where the sync ledger is persisted
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Retries for timeouts, 5xx and 429 responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Extra Strava type -> Komoot sport entries
    #[serde(default, alias = "default_sport_mapping")]
    pub sport_mapping: BTreeMap<String, String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            max_retries: DEFAULT_MAX_RETRIES,
            sport_mapping: BTreeMap::new(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_PATH)
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Config {
    /// Load configuration from `path` (if it exists) and apply environment
    /// overrides. A `.env` file in the working directory is honored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            Self::from_json(&raw)?
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using environment only");
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate_sport_mapping()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string. Unknown keys are ignored.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override file values with values from `lookup` (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };

        set(&mut self.strava.client_id, "STRAVA_CLIENT_ID");
        set(&mut self.strava.client_secret, "STRAVA_CLIENT_SECRET");
        set(&mut self.strava.refresh_token, "STRAVA_REFRESH_TOKEN");
        set(&mut self.komoot.email, "KOMOOT_EMAIL");
        set(&mut self.komoot.password, "KOMOOT_PASSWORD");

        if let Some(path) = lookup("SYNC_LEDGER_PATH").filter(|v| !v.trim().is_empty()) {
            self.sync.ledger_path = PathBuf::from(path.trim());
        }
    }

    /// Ensure all Strava credentials are present.
    pub fn validate_strava(&self) -> Result<(), ConfigError> {
        require(&self.strava.client_id, "strava.client_id")?;
        require(&self.strava.client_secret, "strava.client_secret")?;
        require(&self.strava.refresh_token, "strava.refresh_token")
    }

    /// Ensure all Komoot credentials are present.
    pub fn validate_komoot(&self) -> Result<(), ConfigError> {
        require(&self.komoot.email, "komoot.email")?;
        require(&self.komoot.password, "komoot.password")
    }

    /// Every configured mapping must target a sport Komoot knows.
    pub fn validate_sport_mapping(&self) -> Result<(), ConfigError> {
        for (source_type, sport) in &self.sync.sport_mapping {
            if !is_known_sport(sport) {
                return Err(ConfigError::InvalidSport {
                    source_type: source_type.clone(),
                    sport: sport.clone(),
                });
            }
        }
        Ok(())
    }

    /// Example configuration with placeholder credentials.
    pub fn example() -> Self {
        let mut sport_mapping = BTreeMap::new();
        sport_mapping.insert("Ride".to_string(), "touringbicycle".to_string());
        sport_mapping.insert("Run".to_string(), "jogging".to_string());
        sport_mapping.insert("Hike".to_string(), "hiking".to_string());

        Self {
            strava: StravaConfig {
                client_id: "YOUR_STRAVA_CLIENT_ID".to_string(),
                client_secret: "YOUR_STRAVA_CLIENT_SECRET".to_string(),
                refresh_token: "YOUR_STRAVA_REFRESH_TOKEN".to_string(),
            },
            komoot: KomootConfig {
                email: "YOUR_KOMOOT_EMAIL".to_string(),
                password: "YOUR_KOMOOT_PASSWORD".to_string(),
            },
            sync: SyncSettings {
                sport_mapping,
                ..SyncSettings::default()
            },
        }
    }

    /// Write the example configuration to `path`.
    ///
    /// Refuses to clobber an existing file unless `force` is set.
    pub fn write_example(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&Self::example())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, json).map_err(io_err)?;

        tracing::info!(path = %path.display(), "Wrote example configuration");
        Ok(())
    }
}

fn require(value: &str, key: &'static str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
        return Err(ConfigError::Missing(key));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required config value: {0}")]
    Missing(&'static str),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Config I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Config file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("sync.sport_mapping maps '{source_type}' to unknown Komoot sport '{sport}'")]
    InvalidSport { source_type: String, sport: String },
}
