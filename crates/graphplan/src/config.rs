//! Engine configuration.

use std::time::Duration;

use graphplan_core::{BackendTarget, PlannerConfig, ShardSet};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default number of cached plans.
pub const DEFAULT_PLAN_CACHE_CAPACITY: usize = 256;

/// Configuration for a [`QueryEngine`](crate::QueryEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Plan builder settings.
    pub planner: PlannerConfig,

    /// Backend every plan is sent to.
    pub backend: BackendTarget,

    /// Shards every plan fans out to.
    pub shards: ShardSet,

    /// Timeout for requests that carry none.
    pub timeout: Option<Duration>,

    /// Maximum number of cached plans. Zero disables the cache.
    pub plan_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            backend: BackendTarget::default(),
            shards: ShardSet::default(),
            timeout: None,
            plan_cache_capacity: DEFAULT_PLAN_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Read a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the planner configuration.
    pub fn with_planner(mut self, planner: PlannerConfig) -> Self {
        self.planner = planner;
        self
    }

    /// Set the backend target.
    pub fn with_backend(mut self, backend: BackendTarget) -> Self {
        self.backend = backend;
        self
    }

    /// Set the shards.
    pub fn with_shards(mut self, shards: ShardSet) -> Self {
        self.shards = shards;
        self
    }

    /// Set the default request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the plan cache capacity.
    pub fn with_plan_cache_capacity(mut self, capacity: usize) -> Self {
        self.plan_cache_capacity = capacity;
        self
    }
}
