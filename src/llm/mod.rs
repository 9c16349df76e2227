//! Language model collaborators
//!
//! Role agents talk to a model through the [`LanguageModel`] trait. The
//! production implementation is [`GroqModel`]; tests substitute scripted fakes.

mod groq_model;
pub mod retry;

pub use groq_model::{GroqModel, LlmStats};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryableError};

use crate::{GrantFlowError, Result};
use serde_json::Value;

/// System prompt used for every structured (JSON) generation
pub const JSON_SYSTEM_PROMPT: &str =
    "You are a precise JSON generator. Always return valid JSON with no additional text.";

/// Sampling parameters for one generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

impl GenerateOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Text generation backend
pub trait LanguageModel: Send + Sync {
    /// Generate free text for `prompt`
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Generate a JSON document shaped like `schema`
    ///
    /// The schema is appended to the prompt with an instruction to answer in
    /// pure JSON; the reply is parsed with [`extract_json`].
    fn generate_structured(
        &self,
        prompt: &str,
        schema: &Value,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Value> {
        let options =
            GenerateOptions::new(max_tokens, temperature).with_system_prompt(JSON_SYSTEM_PROMPT);
        let text = self.generate(&structured_prompt(prompt, schema), &options)?;
        extract_json(&text)
    }
}

/// Model for systems that must never generate, such as a status check
///
/// Every call fails with a configuration error.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

impl LanguageModel for OfflineModel {
    fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
        Err(GrantFlowError::Config(
            "No language model configured for this command".to_string(),
        ))
    }
}

fn structured_prompt(prompt: &str, schema: &Value) -> String {
    let schema = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{prompt}\n\n\
         IMPORTANT: Respond with ONLY valid JSON matching this schema:\n\
         {schema}\n\n\
         Do not include any explanation or markdown formatting.\n\n\
         Return pure JSON that can be parsed directly."
    )
}

/// Parse model output as JSON
///
/// Tries, in order: the whole text, the body of a ```` ```json ```` fence, and
/// the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Ok(value);
    }

    if let Some(body) = fenced_json(text) {
        return serde_json::from_str(body).map_err(|e| output_error(text, e));
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return serde_json::from_str(&text[start..=end]).map_err(|e| output_error(text, e));
        }
    }

    Err(GrantFlowError::LlmOutput(preview(text)))
}

fn fenced_json(text: &str) -> Option<&str> {
    let open = text.find("```json")?;
    let after_tag = &text[open + "```json".len()..];
    let body_start = after_tag.find('\n')? + 1;
    let body = &after_tag[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

fn output_error(text: &str, err: serde_json::Error) -> GrantFlowError {
    GrantFlowError::LlmOutput(format!("{} ({})", preview(text), err))
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_offline_model_refuses_to_generate() {
        let err = OfflineModel
            .generate_structured("prompt", &json!({}), 10, 0.1)
            .unwrap_err();
        assert!(matches!(err, GrantFlowError::Config(_)));
    }

    #[test]
    fn test_extract_plain_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(extract_json("  \n{\"a\": 1}\n").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here you go:\n```json\n{\"title\": \"X\", \"n\": [1, 2]}\n```\nThanks!";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"title": "X", "n": [1, 2]})
        );
    }

    #[test]
    fn test_extract_embedded_object() {
        let text = "Sure! {\"nested\": {\"k\": \"v\"}} hope that helps";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"nested": {"k": "v"}})
        );
    }

    #[test]
    fn test_extract_failure_is_llm_output_error() {
        let err = extract_json("no json here").unwrap_err();
        assert!(matches!(err, GrantFlowError::LlmOutput(_)));
        assert!(err.to_string().contains("no json here"));

        let err = extract_json("{ broken").unwrap_err();
        assert!(matches!(err, GrantFlowError::LlmOutput(_)));
    }

    struct Recording {
        reply: String,
        seen: Mutex<Vec<(String, GenerateOptions)>>,
    }

    impl LanguageModel for Recording {
        fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), options.clone()));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_generate_structured_appends_schema() {
        let model = Recording {
            reply: "```json\n{\"score\": 8}\n```".to_string(),
            seen: Mutex::new(Vec::new()),
        };

        let value = model
            .generate_structured("Rate it", &json!({"score": "number"}), 2000, 0.3)
            .unwrap();
        assert_eq!(value, json!({"score": 8}));

        let seen = model.seen.lock().unwrap();
        let (prompt, options) = &seen[0];
        assert!(prompt.starts_with("Rate it"));
        assert!(prompt.contains("\"score\": \"number\""));
        assert!(prompt.contains("Return pure JSON"));
        assert_eq!(options.max_tokens, 2000);
        assert_eq!(options.temperature, 0.3);
        assert_eq!(options.system_prompt.as_deref(), Some(JSON_SYSTEM_PROMPT));
    }

    #[test]
    fn test_generate_options_defaults() {
        let options = GenerateOptions::default();
        assert_eq!(options.max_tokens, 1000);
        assert_eq!(options.temperature, 0.7);
        assert!(options.system_prompt.is_none());
    }
}
