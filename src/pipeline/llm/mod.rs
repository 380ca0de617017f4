//! Model provider boundary.
//!
//! The pipeline only needs "prompt in, text out" plus a deterministic
//! classification of failures, which drives the extraction retry policy.

pub mod ollama;

pub use ollama::{MockLlmClient, OllamaClient};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model provider rate limited the request (status {status}): {body}")]
    RateLimited { status: u16, body: String },

    #[error("Model provider is not reachable at {0}")]
    Connection(String),

    #[error("Model provider returned error (status {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// How the extraction client reacts to a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Quota or rate limit; retried with exponential backoff.
    RateLimited,
    /// The provider answered but the payload is unusable; not retried.
    Malformed,
    /// Everything else; surfaced to the caller.
    Other,
}

impl LlmError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            LlmError::RateLimited { .. } => FailureClass::RateLimited,
            LlmError::MalformedResponse(_) => FailureClass::Malformed,
            LlmError::Connection(_) | LlmError::Provider { .. } | LlmError::HttpClient(_) => {
                FailureClass::Other
            }
        }
    }

    /// Map a non-success HTTP status into the tagged error.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            LlmError::RateLimited { status, body }
        } else {
            LlmError::Provider { status, body }
        }
    }
}

/// LLM client abstraction (allows mocking).
pub trait LlmClient {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, LlmError>;

    fn is_model_available(&self, model: &str) -> Result<bool, LlmError>;

    fn list_models(&self) -> Result<Vec<String>, LlmError>;
}
