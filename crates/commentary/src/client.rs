//! Text generation clients.
//!
//! `OpenAiCompatClient` speaks the `/chat/completions` dialect shared by
//! OpenRouter and Ollama. Anything else can plug in behind
//! `TextGenerationClient`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;

pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_RETRIES: u32 = 2;

const RETRY_BACKOFF_MS: u64 = 250;

/// One prompt pair plus output bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    /// Returns the completion text. Implementations own their retry budget.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenRouter,
    Ollama,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "mistralai/devstral-2512:free",
            Provider::Ollama => "llama3.2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "OpenRouter",
            Provider::Ollama => "Ollama",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Provider::OpenRouter)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Provider::OpenRouter),
            "ollama" => Ok(Provider::Ollama),
            other => Err(format!("unknown provider '{other}' (expected openrouter or ollama)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Per-attempt bound
    pub timeout: Duration,
    /// Attempts after the first one
    pub max_retries: u32,
}

impl ClientSettings {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::new(Provider::OpenRouter)
        }
    }

    pub fn ollama() -> Self {
        Self::new(Provider::Ollama)
    }

    /// Ollama runs locally without a credential; OpenRouter needs one.
    pub fn is_configured(&self) -> bool {
        !self.provider.requires_api_key()
            || self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// HTTP client for OpenAI-compatible chat completion endpoints. Holds one
/// connection pool; share it with `Arc` if several matches should reuse it.
pub struct OpenAiCompatClient {
    client: Client,
    settings: ClientSettings,
}

impl OpenAiCompatClient {
    pub fn new(settings: ClientSettings) -> Result<Self, LlmError> {
        if !settings.is_configured() {
            return Err(LlmError::NotConfigured("OPENROUTER_API_KEY not set"));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = settings.api_key.as_deref().filter(|_| settings.provider.requires_api_key()) {
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| LlmError::NotConfigured("API key is not a valid header value"))?;
            headers.insert(AUTHORIZATION, bearer);
            headers.insert(
                "HTTP-Referer",
                HeaderValue::from_static("https://github.com/chess-alive"),
            );
            headers.insert("X-Title", HeaderValue::from_static("ChessAlive"));
        }

        let client = Client::builder()
            .user_agent("ChessAlive/1.0")
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(LlmError::Status {
                provider: self.settings.provider.display_name(),
                status: status.as_u16(),
                detail,
            });
        }

        let data: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("JSON parse error: {e}")))?;

        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::Malformed("empty completion".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl TextGenerationClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.settings.timeout, self.send_once(request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.settings.timeout)),
            };

            match outcome {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "Completion received");
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "Completion failed, retrying");
                    tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
