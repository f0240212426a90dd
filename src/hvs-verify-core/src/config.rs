//! Configuration for the verification service.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Configuration for dispatch and verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// How long a cached flavorgroup policy stays valid (seconds).
    pub policy_cache_ttl_secs: u64,
    /// Maximum verification tasks run at once by a worker.
    pub worker_concurrency: usize,
    /// Capacity of the verification queue channel.
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            policy_cache_ttl_secs: 300,
            worker_concurrency: 8,
            queue_capacity: 1024,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file; missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let data = std::fs::read_to_string(path).map_err(|e| VerifyError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Policy cache TTL.
    #[must_use]
    pub fn policy_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.policy_cache_ttl_secs)
    }

    /// Check that limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] if concurrency or capacity is zero.
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.worker_concurrency == 0 {
            return Err(VerifyError::Config {
                message: "worker_concurrency must be at least 1".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(VerifyError::Config {
                message: "queue_capacity must be at least 1".into(),
            });
        }
        Ok(())
    }
}
