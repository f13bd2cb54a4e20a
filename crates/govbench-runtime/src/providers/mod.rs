//! Text generation providers.
//!
//! Every model call in the pipeline goes through [`TextGenerator`]: a prompt
//! goes in, free-form text comes out. Turning that text into a record is the
//! caller's job.
//!
//! ## Security
//!
//! Providers hold their key as an [`ApiCredential`], which never shows up in
//! `Debug` or `Display` output.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod scripted;
pub mod secrets;

#[cfg(feature = "gemini")]
mod gemini;

pub use scripted::ScriptedGenerator;
pub use secrets::{ApiCredential, CredentialSource, GOOGLE_API_KEY_ENV};

#[cfg(feature = "gemini")]
pub use gemini::GeminiProvider;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Errors from text generation providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Prompt blocked: {0}")]
    Blocked(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Parameters for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,

    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,

    /// Output token cap; provider default when unset
    pub max_output_tokens: Option<u32>,

    pub timeout: Duration,
}

impl GenerationConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_output_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Text returned by a provider.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// Concatenated text of the first candidate. May be empty.
    pub text: String,

    pub usage: TokenUsage,

    /// Model that served the request, as reported by the provider
    pub model: String,

    pub finish_reason: Option<String>,
}

/// Token usage from a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction so stages can run against any backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the generated text.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<Generation, ProviderError>;

    /// Check if provider is usable.
    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
