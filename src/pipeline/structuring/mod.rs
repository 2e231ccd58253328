pub mod types;
pub mod prompt;
pub mod parser;
pub mod sanitize;
pub mod openai;
pub mod ollama;
pub mod mock;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use sanitize::*;
pub use openai::*;
pub use ollama::*;
pub use mock::*;

use thiserror::Error;

use crate::config::{Backend, PipelineConfig};

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Model endpoint is not reachable at {0}")]
    Connection(String),

    #[error("Model endpoint returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Model returned an empty completion")]
    EmptyCompletion,

    #[error("No API key configured (set api_key or {})", crate::config::API_KEY_ENV)]
    MissingApiKey,

    #[error("Model {0} is not available on the backend")]
    NoModelAvailable(String),
}

impl StructuringError {
    /// Transient failures worth another attempt: connection drops, timeouts,
    /// rate limiting and server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            StructuringError::Connection(_) | StructuringError::HttpClient(_) => true,
            StructuringError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Build the chat client selected by `config.backend`.
///
/// Performs no network call; an unreachable endpoint shows up on the first
/// completion.
pub fn client_from_config(config: &PipelineConfig) -> Result<Box<dyn LlmClient>, StructuringError> {
    match config.backend {
        Backend::OpenAi => {
            let api_key = config
                .resolve_api_key()
                .ok_or(StructuringError::MissingApiKey)?;
            let client =
                OpenAiClient::new(config.base_url(), &api_key, &config.model, config.timeout_secs)?;
            Ok(Box::new(client))
        }
        Backend::Ollama => {
            let client = OllamaClient::new(config.base_url(), &config.model, config.timeout_secs)?;
            Ok(Box::new(client))
        }
    }
}
