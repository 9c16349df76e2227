//! Configuration validation
//!
//! Rejects settings that would make the runtime spin or hang:
//! - Zero polling and join intervals
//! - Zero-sized history buffers
//! - Pipelines that never poll
//! - Missing LLM connection details

use super::grantflow_config::GrantFlowConfig;
use crate::GrantFlowError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub section: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            section: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref section) = self.section {
            write!(f, "[{}] {}: {}", section, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a GrantFlow configuration, collecting every problem found
pub fn validate_config(config: &GrantFlowConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let runtime = &config.runtime;
    if runtime.poll_interval_ms == 0 {
        errors.push(
            ValidationError::new("poll_interval_ms", "Must be greater than zero").in_section("runtime"),
        );
    }
    if runtime.join_timeout_ms == 0 {
        errors.push(
            ValidationError::new("join_timeout_ms", "Must be greater than zero").in_section("runtime"),
        );
    }
    if runtime.processing_history_limit == 0 {
        errors.push(
            ValidationError::new("processing_history_limit", "Must keep at least one entry")
                .in_section("runtime"),
        );
    }
    if runtime.history_capacity == Some(0) {
        errors.push(
            ValidationError::new(
                "history_capacity",
                "Must keep at least one message (omit for unbounded)",
            )
            .in_section("runtime"),
        );
    }

    let llm = &config.llm;
    if llm.api_key_env.trim().is_empty() {
        errors.push(ValidationError::new("api_key_env", "Cannot be empty").in_section("llm"));
    }
    if llm.base_url.trim().is_empty() {
        errors.push(ValidationError::new("base_url", "Cannot be empty").in_section("llm"));
    }

    let pipeline = &config.pipeline;
    if pipeline.caller.trim().is_empty() {
        errors.push(ValidationError::new("caller", "Cannot be empty").in_section("pipeline"));
    }
    if pipeline.poll_interval_ms == 0 {
        errors.push(
            ValidationError::new("poll_interval_ms", "Must be greater than zero")
                .in_section("pipeline"),
        );
    }
    if pipeline.max_attempts == 0 {
        errors.push(
            ValidationError::new("max_attempts", "Must be greater than zero").in_section("pipeline"),
        );
    }
    if pipeline.writer_max_attempts == 0 {
        errors.push(
            ValidationError::new("writer_max_attempts", "Must be greater than zero")
                .in_section("pipeline"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a single error listing every problem
pub fn validate_config_result(config: &GrantFlowConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        GrantFlowError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GrantFlowConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = GrantFlowConfig::default();
        config.runtime.poll_interval_ms = 0;
        config.runtime.join_timeout_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.section.as_deref() == Some("runtime")));
    }

    #[test]
    fn test_zero_history_capacity_rejected() {
        let mut config = GrantFlowConfig::default();
        config.runtime.history_capacity = Some(0);
        config.runtime.processing_history_limit = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"history_capacity"));
        assert!(fields.contains(&"processing_history_limit"));
    }

    #[test]
    fn test_pipeline_and_llm_checks() {
        let mut config = GrantFlowConfig::default();
        config.pipeline.caller = "  ".to_string();
        config.pipeline.max_attempts = 0;
        config.pipeline.writer_max_attempts = 0;
        config.llm.api_key_env = String::new();
        config.llm.base_url = String::new();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_zero_pipeline_poll_interval_rejected() {
        let mut config = GrantFlowConfig::default();
        config.pipeline.poll_interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "poll_interval_ms");
        assert_eq!(errors[0].section.as_deref(), Some("pipeline"));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::new("caller", "Cannot be empty").in_section("pipeline");
        assert_eq!(err.to_string(), "[pipeline] caller: Cannot be empty");

        let err = ValidationError::new("field", "bad");
        assert_eq!(err.to_string(), "field: bad");
    }

    #[test]
    fn test_validate_config_result_joins_messages() {
        let mut config = GrantFlowConfig::default();
        config.runtime.poll_interval_ms = 0;
        config.pipeline.max_attempts = 0;

        let err = validate_config_result(&config).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("poll_interval_ms"));
        assert!(text.contains("max_attempts"));
    }
}
