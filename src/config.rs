use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::structuring::parser::TablePolicy;

/// Application-level constants
pub const APP_NAME: &str = "Sopflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var holding the OpenAI API key when none is configured explicitly.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Env var overriding the log filter (falls back to `RUST_LOG`).
pub const LOG_ENV: &str = "SOPFLOW_LOG";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "o4-mini";
const CONFIG_FILE_NAME: &str = "config.json";

/// Filter used when neither `SOPFLOW_LOG` nor `RUST_LOG` is set.
pub fn default_log_filter() -> &'static str {
    "sopflow=info,sopflow_lib=info"
}

/// Get the application data directory (~/Sopflow/ on all platforms).
/// `None` when the home directory cannot be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Default location of the user config file, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which chat backend serves the model calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    OpenAi,
    /// Local Ollama `/api/chat` endpoint.
    Ollama,
}

impl Backend {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Backend::OpenAi => DEFAULT_OPENAI_BASE_URL,
            Backend::Ollama => DEFAULT_OLLAMA_BASE_URL,
        }
    }
}

/// Retry behavior for model calls that fail with a transient error.
///
/// Delay before retry `n` (0-based) is `base_delay_ms * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        std::time::Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Everything a single pipeline run needs. Passed explicitly into the
/// orchestrator; nothing is read from process-wide state after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub backend: Backend,
    pub model: String,
    /// `None` means the backend's default endpoint.
    pub api_base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub table_policy: TablePolicy,
    /// Upper bound on participants processed at once in the table stage.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    /// Write every reply (and the run report) under `<output_dir>/raw/`.
    pub dump_raw_replies: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            backend: Backend::default(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: None,
            api_key: None,
            timeout_secs: 300,
            table_policy: TablePolicy::default(),
            max_concurrency: 1,
            retry: RetryPolicy::default(),
            dump_raw_replies: false,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.backend.default_base_url())
    }

    /// Configured API key, falling back to `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    pub fn raw_dump_dir(&self) -> Option<PathBuf> {
        self.dump_raw_replies.then(|| self.output_dir.join("raw"))
    }
}
