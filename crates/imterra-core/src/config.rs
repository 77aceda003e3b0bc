//! Configuration for imterra-core
//!
//! Tunables for the synchronization engine: bulk-insert batching and
//! fetch debouncing.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Engine-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Collection behavior
    pub collection: CollectionConfig,
    /// Data fetch behavior
    pub fetch: FetchConfig,
}

/// Collection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Items inserted per frame by `Collection::async_add`
    pub async_batch_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            async_batch_size: 500,
        }
    }
}

/// Fetch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Quiet period before a debounced fetch is issued, in milliseconds
    pub debounce_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

impl FetchConfig {
    /// Debounce delay as a `Duration`
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    #[cfg(feature = "toml-config")]
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.async_batch_size == 0 {
            return Err(ConfigError::OutOfRange(
                "collection.async_batch_size must be positive".to_string(),
            ));
        }

        if self.fetch.debounce_ms > 60_000 {
            return Err(ConfigError::OutOfRange(
                "fetch.debounce_ms must not exceed one minute".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection.async_batch_size, 500);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SyncConfig::from_json(r#"{"fetch": {"debounce_ms": 40}}"#).unwrap();
        assert_eq!(config.fetch.debounce_ms, 40);
        assert_eq!(config.collection.async_batch_size, 500);
    }

    #[test]
    fn test_zero_batch_rejected() {
        let err = SyncConfig::from_json(r#"{"collection": {"async_batch_size": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = SyncConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_loading() {
        let config = SyncConfig::from_toml("[collection]\nasync_batch_size = 64\n").unwrap();
        assert_eq!(config.collection.async_batch_size, 64);
    }
}
