//! Error types for GrantFlow
//!
//! Defines a comprehensive error enum covering all failure modes across the system.
//! Uses thiserror for ergonomic error handling.

use crate::llm::retry::{RetryDecision, RetryableError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for GrantFlow operations
pub type Result<T> = std::result::Result<T, GrantFlowError>;

/// Comprehensive error type for GrantFlow operations
#[derive(Error, Debug)]
pub enum GrantFlowError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// LLM transport or API errors
    #[error("LLM error: {0}")]
    Llm(#[from] groq::Error),

    /// Model output that could not be turned into JSON
    #[error("Could not parse JSON from response: {0}")]
    LlmOutput(String),

    /// Document extraction errors
    #[error("Document error: {0}")]
    Document(String),

    /// Document does not exist
    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// Agent runtime errors (including failures inside `process`)
    #[error("Agent error: {0}")]
    Agent(String),

    /// Agent not registered with the system
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Supervisor task lookup failure
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Caller gave up waiting for a correlated response
    #[error("Timed out waiting for {agent} after {attempts} attempts")]
    Timeout { agent: String, attempts: u32 },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl RetryableError for GrantFlowError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            GrantFlowError::Llm(e) => {
                if e.is_transport() {
                    return RetryDecision::Retry;
                }
                match e.status() {
                    Some(429) => RetryDecision::RetryAfter(Duration::from_secs(60)),
                    Some(500..=599) => RetryDecision::Retry,
                    Some(_) => RetryDecision::NoRetry,
                    None => match e {
                        groq::Error::Http(_) => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    },
                }
            }
            GrantFlowError::Timeout { .. } => RetryDecision::Retry,
            GrantFlowError::Config(_)
            | GrantFlowError::Io(_)
            | GrantFlowError::Json(_)
            | GrantFlowError::Yaml(_)
            | GrantFlowError::LlmOutput(_)
            | GrantFlowError::Document(_)
            | GrantFlowError::DocumentNotFound(_)
            | GrantFlowError::Agent(_)
            | GrantFlowError::AgentNotFound(_)
            | GrantFlowError::TaskNotFound(_)
            | GrantFlowError::Other(_) => RetryDecision::NoRetry,
        }
    }
}
