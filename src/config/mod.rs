//! Configuration system
//!
//! Loads ~/.config/grantflow/config.yaml with sections for:
//! - Agent runtime timing and history limits
//! - The Groq language model connection
//! - The proposal pipeline's caller identity and polling budget
//! - Supervisor response correlation

mod grantflow_config;
pub mod validation;

pub use grantflow_config::{
    GrantFlowConfig, LlmConfig, PipelineConfig, RuntimeConfig, SupervisorConfig,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
