//! Runtime knobs for the engine.

use std::time::Duration;

use coordination::{DedupMode, DEFAULT_SESSION_LENGTH_MINUTES};
use serde::{Deserialize, Serialize};

/// Engine-wide settings, normally built from the `[engine]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Length of a confirmed meeting unless the acceptance overrides it.
    pub session_length_minutes: i64,
    /// How existing tasks are matched against templates.
    pub dedup_mode: DedupMode,
    /// Maximum number of pipelines (and, separately, stages) held by the catalog cache.
    pub catalog_cache_capacity: u64,
    pub retry: RetrySettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            session_length_minutes: DEFAULT_SESSION_LENGTH_MINUTES,
            dedup_mode: DedupMode::TemplateId,
            catalog_cache_capacity: 256,
            retry: RetrySettings::default(),
        }
    }
}

/// Caller-level retry schedule for conflicts and transient storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first. `1` disables retrying.
    pub max_attempts: u32,
    /// Back-off before the second attempt; doubled for each further attempt.
    pub base_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(10),
        }
    }
}
