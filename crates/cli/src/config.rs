//! `matterflow.toml` loading and validation.
//!
//! Every field has a default, so an absent file or an empty one yields a
//! usable configuration for a local in-process run. The `[catalog]` section is
//! the source of truth for pipelines and task templates; it is seeded into
//! the store on startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use coordination::{
    CoordinationError, DedupMode, Pipeline, PipelineId, Stage, TaskTemplate,
    DEFAULT_SESSION_LENGTH_MINUTES, MAX_SESSION_LENGTH_MINUTES,
};
use engine::{EngineSettings, RetrySettings};
use platform::PlatformSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_MATTERFLOW_CONFIG: &str = "MATTERFLOW_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "matterflow.toml";

const DEFAULT_DATABASE_PATH: &str = "matterflow.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 10;
const DEFAULT_CATALOG_CACHE_CAPACITY: u64 = 256;
const DEFAULT_PLATFORM_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_SERVICE_NAME: &str = "matterflow";
const MAX_TEMPLATE_DUE_IN_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("environment variable {name} is not set")]
    MissingEnv { name: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<CoordinationError> for ConfigError {
    fn from(err: CoordinationError) -> Self {
        Self::Invalid(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatterflowConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub platform: PlatformConfig,
    pub telemetry: TelemetryConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub session_length_minutes: i64,
    /// Also treat an existing task with a template's title as covering it.
    pub legacy_title_matching: bool,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub catalog_cache_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_length_minutes: DEFAULT_SESSION_LENGTH_MINUTES,
            legacy_title_matching: false,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            catalog_cache_capacity: DEFAULT_CATALOG_CACHE_CAPACITY,
        }
    }
}

/// Without a `base_url` every actor is allowed and notifications are logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    /// Name of the environment variable holding the bearer token.
    pub token_env: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_PLATFORM_TIMEOUT_MS,
            token_env: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_LOG_FILTER.to_string(),
            otlp_endpoint: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub pipelines: Vec<PipelineConfig>,
    pub templates: Vec<TaskTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub id: PipelineId,
    pub name: String,
    pub stages: Vec<Stage>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Resolves the config path: `--config`, then `MATTERFLOW_CONFIG`, then
/// `matterflow.toml` in the working directory. Clap folds the first two.
pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Loads and validates `path`. A missing file yields the defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<MatterflowConfig, ConfigError> {
    let path = path.as_ref();
    let config = match std::fs::read_to_string(path) {
        Ok(raw) => toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => MatterflowConfig::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.validate()?;
    Ok(config)
}

impl MatterflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::invalid("database.busy_timeout_ms must be positive"));
        }
        if self.engine.session_length_minutes <= 0 {
            return Err(ConfigError::invalid("engine.session_length_minutes must be positive"));
        }
        if self.engine.session_length_minutes > MAX_SESSION_LENGTH_MINUTES {
            return Err(ConfigError::invalid(format!(
                "engine.session_length_minutes must be at most {MAX_SESSION_LENGTH_MINUTES}"
            )));
        }
        if self.engine.retry_attempts == 0 {
            return Err(ConfigError::invalid("engine.retry_attempts must be at least 1"));
        }
        if self.engine.catalog_cache_capacity == 0 {
            return Err(ConfigError::invalid("engine.catalog_cache_capacity must be positive"));
        }
        if let Some(base_url) = &self.platform.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(ConfigError::invalid(format!(
                    "platform.base_url '{base_url}' must be an http(s) URL"
                )));
            }
        }
        let pipelines = self.pipelines()?;
        for template in &self.catalog.templates {
            if !pipelines.iter().any(|p| p.contains(&template.stage_id)) {
                return Err(ConfigError::invalid(format!(
                    "template '{}' references unknown stage '{}'",
                    template.id, template.stage_id
                )));
            }
            if template.due_in_days.is_some_and(|days| days > MAX_TEMPLATE_DUE_IN_DAYS) {
                return Err(ConfigError::invalid(format!(
                    "template '{}' due_in_days must be at most {MAX_TEMPLATE_DUE_IN_DAYS}",
                    template.id
                )));
            }
        }
        Ok(())
    }

    /// The validated pipelines of the `[catalog]` section.
    pub fn pipelines(&self) -> Result<Vec<Pipeline>, ConfigError> {
        let mut pipelines: Vec<Pipeline> = Vec::with_capacity(self.catalog.pipelines.len());
        for entry in &self.catalog.pipelines {
            if pipelines.iter().any(|p| p.id() == &entry.id) {
                return Err(ConfigError::invalid(format!(
                    "pipeline '{}' is defined twice",
                    entry.id
                )));
            }
            if let Some(stage) = entry
                .stages
                .iter()
                .find(|s| pipelines.iter().any(|p| p.contains(&s.id)))
            {
                return Err(ConfigError::invalid(format!(
                    "stage '{}' of pipeline '{}' is already used by another pipeline",
                    stage.id, entry.id
                )));
            }
            pipelines.push(Pipeline::new(
                entry.id.clone(),
                entry.name.clone(),
                entry.stages.clone(),
            )?);
        }
        Ok(pipelines)
    }

    pub fn templates(&self) -> &[TaskTemplate] {
        &self.catalog.templates
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            session_length_minutes: self.engine.session_length_minutes,
            dedup_mode: if self.engine.legacy_title_matching {
                DedupMode::TemplateIdOrTitle
            } else {
                DedupMode::TemplateId
            },
            catalog_cache_capacity: self.engine.catalog_cache_capacity,
            retry: RetrySettings {
                max_attempts: self.engine.retry_attempts,
                base_backoff: Duration::from_millis(self.engine.retry_backoff_ms),
            },
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    /// HTTP platform settings, or `None` to run with the local stand-ins.
    pub fn platform_settings(&self) -> Result<Option<PlatformSettings>, ConfigError> {
        let Some(base_url) = &self.platform.base_url else {
            return Ok(None);
        };
        let bearer_token = match &self.platform.token_env {
            Some(name) => Some(
                std::env::var(name).map_err(|_| ConfigError::MissingEnv { name: name.clone() })?,
            ),
            None => None,
        };
        Ok(Some(PlatformSettings {
            base_url: base_url.clone(),
            timeout: Duration::from_millis(self.platform.timeout_ms),
            bearer_token,
        }))
    }
}
