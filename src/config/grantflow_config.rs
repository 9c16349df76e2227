//! GrantFlow configuration file handling
//!
//! Loads and manages the ~/.config/grantflow/config.yaml file.

use crate::swarm::ResponseCorrelation;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Agent runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How long a worker waits on its inbox before re-checking the stop flag
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on how long `stop()` waits for a worker thread
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Pause between agent starts in `start_all_agents`
    #[serde(default = "default_start_stagger_ms")]
    pub start_stagger_ms: u64,

    /// Entries kept in each agent's processing history
    #[serde(default = "default_processing_history_limit")]
    pub processing_history_limit: usize,

    /// Ring-buffer cap for the mailbox history (unbounded when unset)
    #[serde(default)]
    pub history_capacity: Option<usize>,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_join_timeout_ms() -> u64 {
    3000
}

fn default_start_stagger_ms() -> u64 {
    100
}

fn default_processing_history_limit() -> usize {
    100
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            start_stagger_ms: default_start_stagger_ms(),
            processing_history_limit: default_processing_history_limit(),
            history_capacity: None,
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn start_stagger(&self) -> Duration {
        Duration::from_millis(self.start_stagger_ms)
    }
}

/// Language model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model preset (best, fast, reasoning, efficient) or a raw model id
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat-completions base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "best".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_base_url() -> String {
    groq::DEFAULT_BASE_URL.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// End-to-end proposal pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Inbox identity the pipeline polls for responses
    #[serde(default = "default_caller")]
    pub caller: String,

    /// Wait per inbox poll
    #[serde(default = "default_pipeline_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before giving up on the analyst, evaluator or innovator
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Polls before giving up on the writer
    #[serde(default = "default_writer_max_attempts")]
    pub writer_max_attempts: u32,

    /// Characters of paper text handed to the analyst prompt
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_caller() -> String {
    "user".to_string()
}

fn default_pipeline_poll_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_writer_max_attempts() -> u32 {
    45
}

fn default_max_text_chars() -> usize {
    10_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            caller: default_caller(),
            poll_interval_ms: default_pipeline_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            writer_max_attempts: default_writer_max_attempts(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Supervisor settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// How RESPONSE messages are attached to tasks
    #[serde(default)]
    pub response_correlation: ResponseCorrelation,
}

/// GrantFlow configuration
///
/// Represents the complete ~/.config/grantflow/config.yaml file. Every section
/// and field is optional; missing values fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantFlowConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl GrantFlowConfig {
    /// Create a configuration with every default applied
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/grantflow/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::GrantFlowError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading GrantFlow configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            model = %config.llm.model,
            poll_interval_ms = config.runtime.poll_interval_ms,
            correlation = ?config.supervisor.response_correlation,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving GrantFlow configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/grantflow/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("grantflow");
        path.push("config.yaml");
        path
    }
}
