//! Configuration management
//!
//! This module handles loading, validation, and management of the EDBP
//! plugin manager configuration. Configuration is stored in TOML format at
//! ~/.edbp/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **discovery**: Approved index, repository search, relay, and user agent
//! - **storage**: Database file and durable key for installed plugins
//!
//! # Path Expansion
//!
//! The configuration system automatically expands ~ to the user's home
//! directory and creates the data directory if it doesn't exist. A relative
//! `storage.database` is resolved against the data directory.
//!
//! # Examples
//!
//! ```no_run
//! use edbp_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Index: {}", config.discovery.index_url);
//! # Ok(())
//! # }
//! ```

use edbp_registry::RegistrySettings;
use sdk::errors::PluginError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::PLUGINS_KEY;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    pub core: CoreConfig,

    /// Remote discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Remote discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Approved-plugin index
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Repository search endpoint
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Repository topic plugins are tagged with
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Search page size (1-100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Organization whose repositories are official
    #[serde(default = "default_official_owner")]
    pub official_owner: String,

    /// Origin of the CORS relay; empty for direct downloads only
    #[serde(default)]
    pub relay_base: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, relative to the data directory unless absolute
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Durable key holding the installed-plugin array
    #[serde(default = "default_plugins_key")]
    pub plugins_key: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.edbp")
}

fn default_index_url() -> String {
    RegistrySettings::default().index_url
}

fn default_search_url() -> String {
    RegistrySettings::default().search_url
}

fn default_topic() -> String {
    RegistrySettings::default().topic
}

fn default_per_page() -> u32 {
    100
}

fn default_official_owner() -> String {
    edbp_registry::OFFICIAL_OWNER.to_string()
}

fn default_user_agent() -> String {
    RegistrySettings::default().user_agent
}

fn default_database() -> PathBuf {
    PathBuf::from("plugins.db")
}

fn default_plugins_key() -> String {
    PLUGINS_KEY.to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            search_url: default_search_url(),
            topic: default_topic(),
            per_page: default_per_page(),
            official_owner: default_official_owner(),
            relay_base: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            plugins_key: default_plugins_key(),
        }
    }
}

impl DiscoveryConfig {
    /// Settings for [`edbp_registry::RegistryClient`]
    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            index_url: self.index_url.clone(),
            search_url: self.search_url.clone(),
            topic: self.topic.clone(),
            per_page: self.per_page,
            official_owner: self.official_owner.clone(),
            relay_base: self.relay_base.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.edbp/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, PluginError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, PluginError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PluginError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self, PluginError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| PluginError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    pub fn create_default(path: &Path) -> Result<Self, PluginError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PluginError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();

        // Serialize before processing so the file keeps the portable ~ paths
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| PluginError::Config(format!("Failed to serialize config: {}", e)))?;

        config.validate_and_process()?;

        fs::write(path, toml_string)
            .map_err(|e| PluginError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    fn default_config_path() -> Result<PathBuf, PluginError> {
        let home = dirs::home_dir()
            .ok_or_else(|| PluginError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".edbp").join("config.toml"))
    }

    pub fn default_config() -> Self {
        Self {
            core: CoreConfig::default(),
            discovery: DiscoveryConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// Absolute path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        if self.storage.database.is_absolute() {
            self.storage.database.clone()
        } else {
            self.core.data_dir.join(&self.storage.database)
        }
    }

    fn validate_and_process(&mut self) -> Result<(), PluginError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(PluginError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !(1..=100).contains(&self.discovery.per_page) {
            return Err(PluginError::Config(
                "per_page must be between 1 and 100".to_string(),
            ));
        }

        if self.discovery.official_owner.trim().is_empty() {
            return Err(PluginError::Config(
                "official_owner must not be empty".to_string(),
            ));
        }

        if self.storage.plugins_key.trim().is_empty() {
            return Err(PluginError::Config(
                "plugins_key must not be empty".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.storage.database = expand_path(&self.storage.database)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                PluginError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, PluginError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| PluginError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| PluginError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| PluginError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
