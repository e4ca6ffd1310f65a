//! # Configuration Management Module
//!
//! TOML configuration for `missionctl` and embedders of the mission engine.
//!
//! ## Configuration Structure
//!
//! - [`EngineConfig`] - Where the Sled database lives
//! - [`LoggingConfig`] - Log level and optional log file
//! - [`RewardsConfig`] - Currency naming and the default ledger description
//! - [`LevelsConfig`] - Experience thresholds for each level
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mission_engine::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("missions.toml").await?;
//!     let config = Config::load("missions.toml").await?;
//!     println!("Database: {}", config.database_path().display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [engine]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//!
//! [rewards]
//! currency_name = "coins"
//! default_description = "Mission reward"
//!
//! [levels]
//! thresholds = [100, 250, 500, 1000, 2000, 4000, 8000]
//! ```
//!
//! Every section is optional; missing sections fall back to their defaults.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::mission::strategy::award::DEFAULT_CURRENCY_DESCRIPTION;
use crate::mission::types::LevelTable;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub levels: LevelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_dir: String,
    /// Overrides `<data_dir>/missions` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            db_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_currency_name")]
    pub currency_name: String,
    /// Ledger description for currency rewards stored without one.
    #[serde(default = "default_reward_description")]
    pub default_description: String,
}

fn default_currency_name() -> String {
    "coins".to_string()
}

fn default_reward_description() -> String {
    DEFAULT_CURRENCY_DESCRIPTION.to_string()
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            currency_name: default_currency_name(),
            default_description: default_reward_description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelsConfig {
    /// Cumulative experience needed for level 2, 3, ...
    pub thresholds: Vec<u64>,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            thresholds: LevelTable::default().thresholds,
        }
    }
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        if config.rewards.currency_name.trim().is_empty() {
            return Err(anyhow!("Config {}: rewards.currency_name must not be empty", path));
        }

        Ok(config)
    }

    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.engine.db_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.engine.data_dir).join("missions"),
        }
    }

    pub fn level_table(&self) -> LevelTable {
        LevelTable::new(self.levels.thresholds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        assert!(serialized.contains("[engine]"));
        assert!(!serialized.contains("db_path"));

        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.engine.data_dir, "./data");
        assert_eq!(parsed.logging.level, "info");
        assert_eq!(parsed.rewards.currency_name, "coins");
        assert_eq!(parsed.levels.thresholds, config.levels.thresholds);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[engine]\ndata_dir = \"/srv/missions\"\n").unwrap();
        assert_eq!(parsed.database_path(), PathBuf::from("/srv/missions/missions"));
        assert_eq!(parsed.rewards.default_description, DEFAULT_CURRENCY_DESCRIPTION);
        assert_eq!(parsed.level_table(), LevelTable::default());
    }

    #[test]
    fn test_db_path_overrides_data_dir() {
        let mut config = Config::default();
        config.engine.db_path = Some("/tmp/other.db".to_string());
        assert_eq!(config.database_path(), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_level_table_is_normalised() {
        let mut config = Config::default();
        config.levels.thresholds = vec![500, 0, 100, 100];
        assert_eq!(config.level_table().thresholds, vec![100, 500]);
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missions.toml");
        let path = path.to_str().unwrap();

        Config::create_default(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.logging.level, "info");
        assert!(loaded.logging.file.is_none());

        assert!(Config::load("/definitely/not/here.toml").await.is_err());
    }
}
