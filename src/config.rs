//! Engine configuration
//!
//! Optional TOML file read by the `iam-eval` binary and usable by embedders:
//!
//! ```toml
//! policy_type = "resource"
//! pattern_cache_capacity = 500
//! log_filter = "iam_policy_engine=debug"
//! ```

use crate::error::{IamError, Result};
use crate::iam::cache::DEFAULT_CAPACITY;
use crate::iam::PolicyType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`crate::PolicyEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Policy type used when none is given explicitly
    pub policy_type: PolicyType,

    /// Number of compiled wildcard patterns kept per engine
    pub pattern_cache_capacity: usize,

    /// `tracing` filter directive, e.g. `"iam_policy_engine=trace"`
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            policy_type: PolicyType::Identity,
            pattern_cache_capacity: DEFAULT_CAPACITY,
            log_filter: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn with_policy_type(mut self, policy_type: PolicyType) -> Self {
        self.policy_type = policy_type;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.pattern_cache_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pattern_cache_capacity == 0 {
            return Err(IamError::Config(
                "pattern_cache_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
