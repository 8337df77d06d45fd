use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::buffer::{Clock, Replacer};

/// Number of frames used when no capacity is configured
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid capacity: {0} (must be >= 1)")]
    InvalidCapacity(usize),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Eviction strategy selectable at construction time
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    #[default]
    Clock,
}

impl ReplacementPolicy {
    /// Instantiate the policy for a pool of `capacity` frames
    pub fn build(self, capacity: usize) -> Box<dyn Replacer> {
        match self {
            ReplacementPolicy::Clock => Box::new(Clock::new(capacity)),
        }
    }
}

/// Construction-time options of a buffer pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of frames in the pool
    pub capacity: usize,
    pub replacement_policy: ReplacementPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            replacement_policy: ReplacementPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: PoolConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.replacement_policy, ReplacementPolicy::Clock);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PoolConfig::with_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pool.json");

        let config = PoolConfig::with_capacity(16);
        config.save(&path).unwrap();

        let loaded = PoolConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pool.json");
        fs::write(&path, r#"{ "capacity": 8 }"#).unwrap();

        let loaded = PoolConfig::load(&path).unwrap();
        assert_eq!(loaded.capacity, 8);
        assert_eq!(loaded.replacement_policy, ReplacementPolicy::Clock);

        fs::write(&path, r#"{ "replacement_policy": "clock" }"#).unwrap();
        let loaded = PoolConfig::load(&path).unwrap();
        assert_eq!(loaded.capacity, DEFAULT_CAPACITY);
    }

    #[test]
    fn test_load_rejects_bad_input() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pool.json");

        fs::write(&path, r#"{ "replacement_policy": "lru" }"#).unwrap();
        assert!(matches!(PoolConfig::load(&path), Err(ConfigError::Json(_))));

        fs::write(&path, r#"{ "capacity": 0 }"#).unwrap();
        assert!(matches!(
            PoolConfig::load(&path),
            Err(ConfigError::InvalidCapacity(0))
        ));

        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(PoolConfig::load(&missing), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_build_policy() {
        let replacer = ReplacementPolicy::Clock.build(4);
        assert_eq!(replacer.name(), "clock");
    }
}
