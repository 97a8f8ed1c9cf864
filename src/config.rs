//! Engine settings.
//!
//! Read from `rarity-engine.json` in the project directory when present;
//! every field falls back to its default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RarityError, Result};
use crate::rarity::DEFAULT_TOLERANCE;

/// Settings file name inside a project directory.
pub const CONFIG_FILE: &str = "rarity-engine.json";

/// Default lifetime of cached constraint tables in seconds.
const DEFAULT_CACHE_TTL_SECS: u64 = 5;

/// Default number of rarity backups to keep.
const DEFAULT_MAX_BACKUPS: usize = 10;

/// Default set created for a new project.
const DEFAULT_SET: &str = "set1";

/// Default planned output count of a new set.
const DEFAULT_OUTPUT_COUNT: u32 = 100;

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_max_backups() -> usize {
    DEFAULT_MAX_BACKUPS
}

fn default_set() -> String {
    DEFAULT_SET.to_string()
}

fn default_output_count() -> u32 {
    DEFAULT_OUTPUT_COUNT
}

/// Tunables of a rarity engine session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allowed distance from 100 for a layer to count as normalized.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// How long loaded constraint tables are reused before reloading.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Rarity backups kept in `backups/`; 0 disables backups.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Set used when a project is initialized.
    #[serde(default = "default_set")]
    pub default_set: String,

    /// Output count assigned to newly created sets.
    #[serde(default = "default_output_count")]
    pub default_output_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_backups: DEFAULT_MAX_BACKUPS,
            default_set: DEFAULT_SET.to_string(),
            default_output_count: DEFAULT_OUTPUT_COUNT,
        }
    }
}

impl EngineConfig {
    /// Path of the settings file for a project directory.
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE)
    }

    /// Load settings from `path`, using defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| RarityError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| RarityError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RarityError::SchemaValidation {
                reason: format!("tolerance must be a non-negative number, got {}", self.tolerance),
            });
        }
        if self.default_set.trim().is_empty() {
            return Err(RarityError::SchemaValidation {
                reason: "default_set must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let config = EngineConfig::load(&EngineConfig::path_in(temp.path())).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = tempdir().unwrap();
        let path = EngineConfig::path_in(temp.path());
        fs::write(&path, r#"{"max_backups": 2, "default_set": "genesis"}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_backups, 2);
        assert_eq!(config.default_set, "genesis");
        assert_eq!(config.tolerance, DEFAULT_TOLERANCE);
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let temp = tempdir().unwrap();
        let path = EngineConfig::path_in(temp.path());
        fs::write(&path, r#"{"tolerance": -1.0}"#).unwrap();

        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempdir().unwrap();
        let path = EngineConfig::path_in(temp.path());
        let config = EngineConfig {
            cache_ttl_secs: 1,
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
