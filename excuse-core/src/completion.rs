//! Text-completion client for the hosted generative model.
//!
//! The service is consumed as an opaque prompt-in, text-out call. The Gemini
//! `generateContent` implementation applies a bounded request timeout and
//! retries transient failures with exponential backoff.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::CompletionConfig as CompletionSettings;

/// Default generative model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// CompletionBackend trait
// ============================================================================

/// Abstraction over text-completion providers.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a single prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Prompt rejected by the model: {reason}")]
    Blocked { reason: String },

    #[error("Missing text in response")]
    MissingText,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl CompletionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Http(_) | CompletionError::Timeout { .. } => true,
            CompletionError::Api { code, .. } => *code == 429 || *code >= 500,
            CompletionError::MissingText => true,
            CompletionError::Blocked { .. }
            | CompletionError::MissingApiKey
            | CompletionError::RetryExhausted { .. } => false,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Gemini completion client configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl CompletionConfig {
    /// Build from file settings and a key supplied by the caller. A missing key
    /// is left empty and rejected when the client is built.
    pub fn new(api_key: Option<String>, settings: &CompletionSettings) -> Self {
        Self {
            api_key: api_key.unwrap_or_default(),
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.timeout_seconds),
            max_retries: settings.max_retries,
            retry_delay_ms: settings.retry_delay_ms,
        }
    }
}

/// Create the completion backend from configuration.
pub fn create_backend(config: CompletionConfig) -> Result<Box<dyn CompletionBackend>, CompletionError> {
    Ok(Box::new(GeminiCompletionClient::new(config)?))
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiCompletionClient
// ============================================================================

/// Gemini completion client — calls the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiCompletionClient {
    client: Client,
    config: CompletionConfig,
    base_url: String,
}

impl GeminiCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        Self::with_base_url(config, GEMINI_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: CompletionConfig,
        base_url: String,
    ) -> Result<Self, CompletionError> {
        if config.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Generate text for the prompt, retrying transient failures.
    pub async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.generate_once(prompt),
            |e: &CompletionError| {
                let transient = e.is_transient();
                if transient {
                    tracing::warn!(error = %e, "Completion attempt failed, retrying");
                }
                transient
            },
        )
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(e) if e.is_transient() => {
                let attempts = self.config.max_retries + 1;
                tracing::error!(attempts, error = %e, "All completion attempts failed");
                Err(CompletionError::RetryExhausted {
                    attempts,
                    last: e.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Completion failed");
                Err(e)
            }
        }
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(CompletionError::Timeout {
                    seconds: self.config.timeout.as_secs(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(CompletionError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(CompletionError::Blocked { reason });
        }

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(CompletionError::MissingText);
        }

        Ok(text)
    }
}

#[async_trait]
impl CompletionBackend for GeminiCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.generate(prompt).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================
