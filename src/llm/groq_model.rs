//! Groq-backed language model
//!
//! Adapts [`groq::Client`] to [`LanguageModel`], retrying transient failures
//! and keeping usage counters.

use super::retry::{with_retry, RetryConfig};
use super::{GenerateOptions, LanguageModel};
use crate::config::LlmConfig;
use crate::{GrantFlowError, Result};
use groq::{ChatMessage, ChatRequest, ModelPreset};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

/// Usage counters for one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmStats {
    pub model: String,
    pub total_calls: u64,
    pub total_tokens: u64,
    pub total_errors: u64,
}

/// [`LanguageModel`] backed by the Groq chat-completions API
#[derive(Debug)]
pub struct GroqModel {
    client: groq::Client,
    retry: RetryConfig,
    stats: Mutex<LlmStats>,
}

impl GroqModel {
    pub fn new(client: groq::Client) -> Self {
        let stats = LlmStats {
            model: client.model().to_string(),
            ..LlmStats::default()
        };
        Self {
            client,
            retry: RetryConfig::default(),
            stats: Mutex::new(stats),
        }
    }

    /// Build a model from the `llm` config section
    ///
    /// `model` may be a preset name (best, fast, reasoning, efficient) or a
    /// raw model id.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = groq::Client::from_env(&config.api_key_env)?
            .with_base_url(config.base_url.as_str())
            .with_timeout(config.request_timeout())?;

        let client = match config.model.parse::<ModelPreset>() {
            Ok(preset) => client.with_preset(preset),
            Err(_) => client.with_model(config.model.as_str()),
        };

        info!(model = %client.model(), "Groq model initialized");
        Ok(Self::new(client).with_retry_config(RetryConfig::with_max_retries(config.max_retries)))
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn stats(&self) -> LlmStats {
        self.lock_stats().clone()
    }

    fn lock_stats(&self) -> MutexGuard<'_, LlmStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LanguageModel for GroqModel {
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatRequest::new(messages)
            .with_max_tokens(options.max_tokens)
            .with_temperature(options.temperature);

        with_retry(&self.retry, "groq.chat", || {
            let started = Instant::now();
            match self.client.chat(&request) {
                Ok(completion) => {
                    let mut stats = self.lock_stats();
                    stats.total_calls += 1;
                    stats.total_tokens += completion.usage.total_tokens;
                    debug!(
                        model = %completion.model,
                        tokens = completion.usage.total_tokens,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "LLM call completed"
                    );
                    Ok(completion.content)
                }
                Err(e) => {
                    self.lock_stats().total_errors += 1;
                    Err(GrantFlowError::from(e))
                }
            }
        })
    }
}
