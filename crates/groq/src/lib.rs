//! Groq chat-completions wrapper for Rust
//!
//! A type-safe, blocking interface to the Groq (OpenAI-compatible) chat API.
//!
//! # Example
//!
//! ```no_run
//! use groq::{ChatMessage, ChatRequest, Client, ModelPreset};
//!
//! let client = Client::from_env("GROQ_API_KEY")?.with_preset(ModelPreset::Fast);
//!
//! let request = ChatRequest::new(vec![
//!     ChatMessage::system("You are terse."),
//!     ChatMessage::user("What is an abstract?"),
//! ])
//! .with_max_tokens(100)
//! .with_temperature(0.7);
//!
//! let completion = client.chat(&request)?;
//! println!("{} ({} tokens)", completion.content, completion.usage.total_tokens);
//! # Ok::<(), groq::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default API root for Groq's OpenAI-compatible endpoints
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Errors that can occur when talking to the Groq API
#[derive(Error, Debug)]
pub enum Error {
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Response contained no choices")]
    EmptyResponse,

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status code for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure happened before a response arrived (connect, timeout)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(e) if e.is_connect() || e.is_timeout() || e.is_request())
    }
}

/// Result type for Groq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Model preference, mapped to a concrete Groq model id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPreset {
    /// Highest quality
    #[default]
    Best,
    /// Fastest
    Fast,
    /// Good for analysis
    Reasoning,
    /// Most efficient
    Efficient,
}

impl ModelPreset {
    /// Concrete model id sent to the API
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelPreset::Best => "llama-3.1-70b-versatile",
            ModelPreset::Fast => "llama-3.1-8b-instant",
            ModelPreset::Reasoning => "mixtral-8x7b-32768",
            ModelPreset::Efficient => "gemma-7b-it",
        }
    }
}

impl std::fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelPreset::Best => write!(f, "best"),
            ModelPreset::Fast => write!(f, "fast"),
            ModelPreset::Reasoning => write!(f, "reasoning"),
            ModelPreset::Efficient => write!(f, "efficient"),
        }
    }
}

impl std::str::FromStr for ModelPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best" => Ok(ModelPreset::Best),
            "fast" => Ok(ModelPreset::Fast),
            "reasoning" => Ok(ModelPreset::Reasoning),
            "efficient" => Ok(ModelPreset::Efficient),
            other => Err(format!("unknown model preset: {}", other)),
        }
    }
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat completion request (model is filled in by the client)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: None,
            temperature: None,
            top_p: Some(0.95),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Wire body: the request plus the model id
#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a ChatRequest,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Token accounting reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A finished completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub usage: Usage,
    pub finish_reason: Option<String>,
}

/// Groq API client
#[derive(Debug, Clone)]
pub struct Client {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::blocking::Client,
}

impl Client {
    /// Create a client with an explicit API key, using the default preset
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: ModelPreset::default().model_id().to_string(),
            http: reqwest::blocking::Client::new(),
        }
    }

    /// Create a client reading the API key from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(Error::MissingApiKey(var.to_string())),
        }
    }

    /// Use a model preset
    pub fn with_preset(mut self, preset: ModelPreset) -> Self {
        self.model = preset.model_id().to_string();
        self
    }

    /// Use an explicit model id
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a different OpenAI-compatible API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(self)
    }

    /// Model id used for requests
    pub fn model(&self) -> &str {
        &self.model
    }

    /// API root
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Run a chat completion
    pub fn chat(&self, request: &ChatRequest) -> Result<Completion> {
        let body = WireRequest {
            model: &self.model,
            request,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text()?;
        parse_completion(&text, &self.model)
    }
}

/// Parse a raw chat-completions response body
fn parse_completion(body: &str, requested_model: &str) -> Result<Completion> {
    let wire: WireResponse = serde_json::from_str(body)?;
    let choice = wire.choices.into_iter().next().ok_or(Error::EmptyResponse)?;

    Ok(Completion {
        content: choice.message.content,
        model: wire.model.unwrap_or_else(|| requested_model.to_string()),
        usage: wire.usage,
        finish_reason: choice.finish_reason,
    })
}
