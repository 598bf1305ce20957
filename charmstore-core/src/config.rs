//! Configuration types

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of batch calls a prefetch keeps in flight.
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

/// Configuration for a request-scoped entity cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum URLs per batched store call during prefetch.
    /// `None` sends each distinct field set as a single call.
    pub prefetch_batch_size: Option<usize>,
    /// How many batched store calls a prefetch runs concurrently.
    pub max_concurrent_batches: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefetch_batch_size: None,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split prefetch batches into calls of at most `size` URLs.
    pub fn with_prefetch_batch_size(mut self, size: usize) -> Self {
        self.prefetch_batch_size = Some(size);
        self
    }

    /// Set the number of concurrent prefetch batch calls.
    pub fn with_max_concurrent_batches(mut self, max: usize) -> Self {
        self.max_concurrent_batches = max;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefetch_batch_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "prefetch_batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be positive when set".to_string(),
            });
        }
        if self.max_concurrent_batches == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_batches".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_prefetch_batch_size(100)
            .with_max_concurrent_batches(2);

        assert_eq!(config.prefetch_batch_size, Some(100));
        assert_eq!(config.max_concurrent_batches, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_unbounded() {
        let config = CacheConfig::default();
        assert_eq!(config.prefetch_batch_size, None);
        assert_eq!(config.max_concurrent_batches, DEFAULT_MAX_CONCURRENT_BATCHES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = CacheConfig::new()
            .with_prefetch_batch_size(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "prefetch_batch_size"));

        let err = CacheConfig::new()
            .with_max_concurrent_batches(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "max_concurrent_batches"));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: CacheConfig = serde_json::from_str(r#"{"prefetch_batch_size": 50}"#).unwrap();
        assert_eq!(config.prefetch_batch_size, Some(50));
        assert_eq!(config.max_concurrent_batches, DEFAULT_MAX_CONCURRENT_BATCHES);
    }
}
